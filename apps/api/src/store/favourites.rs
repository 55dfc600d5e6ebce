//! Database operations for user favourites.

use serde::Serialize;
use sqlx::PgPool;

use crate::errors::AppError;
use crate::models::signal::Signal;

/// Outcome of a favourite toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FavouriteStatus {
    Created,
    Deleted,
}

/// Adds or removes a favourite depending on its current state.
/// Strictly alternates between `created` and `deleted` for a given pair.
pub async fn toggle_favourite(
    pool: &PgPool,
    user_id: i32,
    signal_id: i32,
) -> Result<FavouriteStatus, AppError> {
    let existing: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM favourites WHERE user_id = $1 AND signal_id = $2)",
    )
    .bind(user_id)
    .bind(signal_id)
    .fetch_one(pool)
    .await?;

    if existing {
        sqlx::query("DELETE FROM favourites WHERE user_id = $1 AND signal_id = $2")
            .bind(user_id)
            .bind(signal_id)
            .execute(pool)
            .await?;
        return Ok(FavouriteStatus::Deleted);
    }

    sqlx::query(
        "INSERT INTO favourites (user_id, signal_id, created_at) VALUES ($1, $2, NOW())",
    )
    .bind(user_id)
    .bind(signal_id)
    .execute(pool)
    .await?;
    Ok(FavouriteStatus::Created)
}

/// All signals the user has favorited, most recently favorited first.
pub async fn read_user_favourites(
    pool: &PgPool,
    user_id: i32,
) -> Result<Vec<Signal>, AppError> {
    let signals = sqlx::query_as(
        r#"
        SELECT
            s.*,
            COALESCE(
                array_agg(c.trend_id) FILTER (WHERE c.trend_id IS NOT NULL),
                ARRAY[]::integer[]
            ) AS connected_trends
        FROM signals s
        LEFT JOIN connections c ON s.id = c.signal_id
        JOIN favourites f ON s.id = f.signal_id
        WHERE f.user_id = $1
        GROUP BY s.id, f.created_at
        ORDER BY f.created_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(signals)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&FavouriteStatus::Created).unwrap(),
            "\"created\""
        );
        assert_eq!(
            serde_json::to_string(&FavouriteStatus::Deleted).unwrap(),
            "\"deleted\""
        );
    }
}

/// Whether a signal is favorited by a user.
pub async fn is_signal_favorited(
    pool: &PgPool,
    user_email: &str,
    signal_id: i32,
) -> Result<bool, AppError> {
    let favorited = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1
            FROM favourites f
            JOIN users u ON f.user_id = u.id
            WHERE u.email = $1 AND f.signal_id = $2
        )
        "#,
    )
    .bind(user_email)
    .bind(signal_id)
    .fetch_one(pool)
    .await?;
    Ok(favorited)
}
