//! Handlers for obtaining valid choice options for form fields.

use std::collections::BTreeMap;

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};

use crate::auth::CurrentUser;
use crate::errors::AppError;
use crate::models::taxonomy::static_choices;
use crate::state::AppState;
use crate::store;

const CREATED_FOR: &[&str] = &[
    "General scanning",
    "Global Signals Spotlight 2024",
    "Global Signals Spotlight 2023",
    "HDR 2023",
    "Sustainable Finance Hub 2023",
];

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(read_choices))
        .route("/:name", get(read_field_choices))
}

/// List valid options for all fields.
async fn read_choices(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
) -> Result<Json<Value>, AppError> {
    let mut choices: BTreeMap<String, Value> = static_choices()
        .into_iter()
        .map(|(name, options)| (name.to_string(), json!(options)))
        .collect();
    choices.insert("created_for".to_string(), json!(CREATED_FOR));
    choices.insert(
        "unit_name".to_string(),
        json!(store::choices::get_unit_names(&state.db).await?),
    );
    choices.insert(
        "unit_region".to_string(),
        json!(store::choices::get_unit_regions(&state.db).await?),
    );
    choices.insert(
        "location".to_string(),
        json!(store::choices::get_location_names(&state.db).await?),
    );
    Ok(Json(json!(choices)))
}

/// List valid options for a given field.
async fn read_field_choices(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    Path(name): Path<String>,
) -> Result<Json<Vec<String>>, AppError> {
    let options = match name.as_str() {
        "unit_name" => store::choices::get_unit_names(&state.db).await?,
        "unit_region" => store::choices::get_unit_regions(&state.db).await?,
        "location" => store::choices::get_location_names(&state.db).await?,
        "created_for" => CREATED_FOR.iter().map(|s| s.to_string()).collect(),
        other => static_choices()
            .into_iter()
            .find(|(field, _)| *field == other)
            .map(|(_, options)| options.into_iter().map(String::from).collect())
            .ok_or(AppError::NotFound)?,
    };
    Ok(Json(options))
}
