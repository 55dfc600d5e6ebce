//! Data access over PostgreSQL.
//!
//! Search queries compute `total_count` as a window aggregate over the
//! filtered set; role-based sanitisation happens afterwards, at the policy
//! layer. Multi-step mutations (group cascades, deletions with back-reference
//! cleanup) run inside a single transaction.

pub mod choices;
pub mod favourites;
pub mod groups;
pub mod signals;
pub mod trends;
pub mod users;

use sqlx::postgres::PgRow;
use sqlx::Row;

/// Extracts the window total from a page of search rows.
pub(crate) fn total_count(rows: &[PgRow]) -> i64 {
    rows.first()
        .map(|row| row.get("total_count"))
        .unwrap_or_default()
}
