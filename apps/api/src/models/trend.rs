use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::page::Moderated;
use crate::models::taxonomy::{Goal, Horizon, Rating, Signature, Status, Steep};
use crate::policy::EMAIL_MASK;

/// The trend entity model used in the database and API endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Trend {
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
    pub headline: Option<String>,
    pub description: Option<String>,
    pub attachment: Option<String>,
    pub steep_primary: Option<Steep>,
    pub steep_secondary: Option<Vec<Steep>>,
    pub signature_primary: Option<Signature>,
    pub signature_secondary: Option<Vec<Signature>>,
    pub sdgs: Option<Vec<Goal>>,
    pub assigned_to: Option<String>,
    pub time_horizon: Option<Horizon>,
    pub impact_rating: Option<Rating>,
    pub impact_description: Option<String>,
    /// IDs of signals connected to this trend.
    #[sqlx(default)]
    pub connected_signals: Option<Vec<i32>>,
}

impl Moderated for Trend {
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
