//! Query parameters for search endpoints.
//!
//! List-valued facets arrive as comma-separated query values; items may use
//! short variant names where the canonical label itself contains a comma
//! (see `models::taxonomy`). Pagination fields are repeated on each filter
//! struct rather than flattened: query-string deserialization cannot see
//! through `#[serde(flatten)]` for numeric fields.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer};

use crate::errors::AppError;
use crate::models::taxonomy::{Goal, Horizon, Rating, Role, Score, Signature, Status, Steep};

pub const MAX_PER_PAGE: i64 = 10_000;

/// Columns that search endpoints may order signals by.
pub const SIGNAL_SORT_COLUMNS: &[&str] = &[
    "id",
    "created_at",
    "modified_at",
    "status",
    "created_by",
    "created_for",
    "created_unit",
    "headline",
    "location",
    "score",
];

/// Columns that search endpoints may order trends by.
pub const TREND_SORT_COLUMNS: &[&str] = &[
    "id",
    "created_at",
    "modified_at",
    "status",
    "created_by",
    "created_for",
    "headline",
    "time_horizon",
    "impact_rating",
];

/// Columns that search endpoints may order users by.
pub const USER_SORT_COLUMNS: &[&str] = &["id", "created_at", "email", "name", "role", "unit"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

/// Resolved pagination parameters shared by all search endpoints.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub page: i64,
    pub per_page: i64,
    pub order_by: String,
    pub direction: Direction,
}

impl Default for Pagination {
    fn default() -> Self {
        Pagination {
            page: default_page(),
            per_page: default_per_page(),
            order_by: default_order_by(),
            direction: default_direction(),
        }
    }
}

impl Pagination {
    pub fn limit(&self) -> i64 {
        self.per_page
    }

    pub fn offset(&self) -> i64 {
        self.per_page * (self.page - 1)
    }

    /// Checks bounds and resolves `order_by` against a column whitelist.
    /// The returned identifier is safe to interpolate into SQL.
    pub fn order_column(&self, sortable: &'static [&'static str]) -> Result<&str, AppError> {
        if self.page < 1 {
            return Err(AppError::Validation("page must be positive".to_string()));
        }
        if self.per_page < 1 || self.per_page > MAX_PER_PAGE {
            return Err(AppError::Validation(format!(
                "per_page must be between 1 and {MAX_PER_PAGE}"
            )));
        }
        sortable
            .iter()
            .find(|column| **column == self.order_by)
            .copied()
            .ok_or_else(|| AppError::Validation(format!("cannot order by '{}'", self.order_by)))
    }
}

fn default_page() -> i64 {
    1
}

fn default_per_page() -> i64 {
    10
}

fn default_order_by() -> String {
    "created_at".to_string()
}

fn default_direction() -> Direction {
    Direction::Desc
}

macro_rules! pagination_fields {
    ($name:ident) => {
        impl $name {
            pub fn pagination(&self) -> Pagination {
                Pagination {
                    page: self.page,
                    per_page: self.per_page,
                    order_by: self.order_by.clone(),
                    direction: self.direction,
                }
            }
        }
    };
}

/// Filter parameters for searching signals.
#[derive(Debug, Clone, Deserialize)]
pub struct SignalFilters {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_per_page")]
    pub per_page: i64,
    #[serde(default = "default_order_by")]
    pub order_by: String,
    #[serde(default = "default_direction")]
    pub direction: Direction,
    #[serde(default, deserialize_with = "comma_list")]
    pub ids: Option<Vec<i32>>,
    #[serde(default = "default_statuses", deserialize_with = "comma_list_required")]
    pub statuses: Vec<Status>,
    pub created_by: Option<String>,
    pub created_for: Option<String>,
    pub steep_primary: Option<Steep>,
    #[serde(default, deserialize_with = "comma_list")]
    pub steep_secondary: Option<Vec<Steep>>,
    pub signature_primary: Option<Signature>,
    #[serde(default, deserialize_with = "comma_list")]
    pub signature_secondary: Option<Vec<Signature>>,
    #[serde(default, deserialize_with = "comma_list")]
    pub sdgs: Option<Vec<Goal>>,
    pub query: Option<String>,
    pub location: Option<String>,
    pub bureau: Option<String>,
    pub score: Option<Score>,
    pub unit: Option<String>,
}

pagination_fields!(SignalFilters);

/// Filter parameters for searching trends.
#[derive(Debug, Clone, Deserialize)]
pub struct TrendFilters {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_per_page")]
    pub per_page: i64,
    #[serde(default = "default_order_by")]
    pub order_by: String,
    #[serde(default = "default_direction")]
    pub direction: Direction,
    #[serde(default, deserialize_with = "comma_list")]
    pub ids: Option<Vec<i32>>,
    #[serde(default = "default_statuses", deserialize_with = "comma_list_required")]
    pub statuses: Vec<Status>,
    pub created_by: Option<String>,
    pub created_for: Option<String>,
    pub steep_primary: Option<Steep>,
    #[serde(default, deserialize_with = "comma_list")]
    pub steep_secondary: Option<Vec<Steep>>,
    pub signature_primary: Option<Signature>,
    #[serde(default, deserialize_with = "comma_list")]
    pub signature_secondary: Option<Vec<Signature>>,
    #[serde(default, deserialize_with = "comma_list")]
    pub sdgs: Option<Vec<Goal>>,
    pub query: Option<String>,
    pub assigned_to: Option<String>,
    pub time_horizon: Option<Horizon>,
    pub impact_rating: Option<Rating>,
}

pagination_fields!(TrendFilters);

/// Filter parameters for searching users.
#[derive(Debug, Clone, Deserialize)]
pub struct UserFilters {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_per_page")]
    pub per_page: i64,
    #[serde(default = "default_order_by")]
    pub order_by: String,
    #[serde(default = "default_direction")]
    pub direction: Direction,
    #[serde(default, deserialize_with = "comma_list")]
    pub roles: Option<Vec<Role>>,
    pub query: Option<String>,
}

pagination_fields!(UserFilters);

fn default_statuses() -> Vec<Status> {
    vec![Status::Approved]
}

fn comma_list<'de, D, T>(deserializer: D) -> Result<Option<Vec<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: fmt::Display,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(value) if value.trim().is_empty() => Ok(None),
        Some(value) => parse_items(&value)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

fn comma_list_required<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: fmt::Display,
{
    let raw = String::deserialize(deserializer)?;
    parse_items(&raw).map_err(serde::de::Error::custom)
}

fn parse_items<T>(raw: &str) -> Result<Vec<T>, String>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| item.parse().map_err(|e: T::Err| e.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_is_per_page_times_zero_based_page() {
        let pagination = Pagination {
            page: 3,
            per_page: 10,
            ..Pagination::default()
        };
        assert_eq!(pagination.offset(), 20);
        assert_eq!(pagination.limit(), 10);
    }

    #[test]
    fn first_page_has_zero_offset() {
        assert_eq!(Pagination::default().offset(), 0);
    }

    #[test]
    fn order_column_rejects_unknown_identifier() {
        let pagination = Pagination {
            order_by: "id; DROP TABLE signals".to_string(),
            ..Pagination::default()
        };
        assert!(pagination.order_column(SIGNAL_SORT_COLUMNS).is_err());
    }

    #[test]
    fn order_column_accepts_whitelisted_identifier() {
        let pagination = Pagination {
            order_by: "headline".to_string(),
            ..Pagination::default()
        };
        assert_eq!(
            pagination.order_column(SIGNAL_SORT_COLUMNS).unwrap(),
            "headline"
        );
    }

    #[test]
    fn pagination_bounds_are_enforced() {
        let too_big = Pagination {
            per_page: MAX_PER_PAGE + 1,
            ..Pagination::default()
        };
        assert!(too_big.order_column(SIGNAL_SORT_COLUMNS).is_err());

        let zero_page = Pagination {
            page: 0,
            ..Pagination::default()
        };
        assert!(zero_page.order_column(SIGNAL_SORT_COLUMNS).is_err());
    }

    #[test]
    fn filters_deserialize_comma_lists() {
        let filters: SignalFilters = serde_json::from_value(serde_json::json!({
            "statuses": "Draft,New",
            "steep_secondary": "Social, Technological",
            "ids": "1,2,3",
        }))
        .unwrap();
        assert_eq!(filters.statuses, vec![Status::Draft, Status::New]);
        assert_eq!(
            filters.steep_secondary,
            Some(vec![Steep::Social, Steep::Technological])
        );
        assert_eq!(filters.ids, Some(vec![1, 2, 3]));
    }

    #[test]
    fn statuses_default_to_approved() {
        let filters: SignalFilters = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(filters.statuses, vec![Status::Approved]);
        assert_eq!(filters.page, 1);
        assert_eq!(filters.per_page, 10);
    }
}
