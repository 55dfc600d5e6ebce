use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::page::Moderated;
use crate::models::taxonomy::{Goal, Score, Signature, Status, Steep};
use crate::policy::EMAIL_MASK;

/// The signal entity model used in the database and API endpoints.
///
/// A signal is a single piece of evidence or indicator that points to,
/// relates to, or otherwise supports a trend.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Signal {
    #[serde(default)]
    pub id: i32,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub status: Status,
    pub created_by: Option<String>,
    pub created_for: Option<String>,
    #[serde(default = "Utc::now")]
    pub modified_at: DateTime<Utc>,
    pub modified_by: Option<String>,
    /// A clear and concise title headline.
    pub headline: Option<String>,
    pub description: Option<String>,
    /// A base64-encoded image on submission, a blob URL once stored.
    pub attachment: Option<String>,
    pub steep_primary: Option<Steep>,
    pub steep_secondary: Option<Vec<Steep>>,
    pub signature_primary: Option<Signature>,
    pub signature_secondary: Option<Vec<Signature>>,
    pub sdgs: Option<Vec<Goal>>,
    pub created_unit: Option<String>,
    pub url: Option<String>,
    pub relevance: Option<String>,
    /// Up to 3 clear, simple keywords for ease of searchability.
    pub keywords: Option<Vec<String>>,
    /// Region and/or country for which this signal has greatest relevance.
    pub location: Option<String>,
    pub score: Option<Score>,
    /// IDs of trends connected to this signal.
    #[sqlx(default)]
    pub connected_trends: Option<Vec<i32>>,
    /// Whether the current viewer has favorited this signal. Computed per
    /// request, never read from the signals table itself.
    #[serde(default)]
    #[sqlx(default)]
    pub favorite: bool,
}

impl Moderated for Signal {
    fn status(&self) -> Status {
        self.status
    }

    fn created_by(&self) -> Option<&str> {
        self.created_by.as_deref()
    }

    fn anonymise(&mut self) {
        self.created_by = Some(EMAIL_MASK.to_string());
        self.modified_by = Some(EMAIL_MASK.to_string());
    }
}
