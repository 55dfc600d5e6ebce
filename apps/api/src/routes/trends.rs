//! Handlers for retrieving, submitting and updating trends.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::auth::{require_staff, CurrentUser};
use crate::errors::AppError;
use crate::models::filters::TrendFilters;
use crate::models::page::Page;
use crate::models::taxonomy::Status;
use crate::models::trend::Trend;
use crate::policy;
use crate::state::AppState;
use crate::store;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_trends).post(create_trend))
        .route("/search", get(search_trends))
        .route("/me", get(read_my_trends))
        .route(
            "/:uid",
            get(read_trend).put(update_trend).delete(delete_trend),
        )
}

/// Retrieve all trends from the database. Requires authentication.
async fn list_trends(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
) -> Result<Json<Vec<Trend>>, AppError> {
    let trends = store::trends::list_trends(&state.db).await?;
    Ok(Json(trends))
}

/// Search trends in the database using pagination and filters.
async fn search_trends(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(filters): Query<TrendFilters>,
) -> Result<Json<Page<Trend>>, AppError> {
    let page = store::trends::search_trends(&state.db, &filters).await?;
    Ok(Json(page.sanitise(&user)))
}

#[derive(Deserialize)]
struct StatusQuery {
    status: Status,
}

/// Retrieve trends with a given status submitted by the current user.
async fn read_my_trends(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<StatusQuery>,
) -> Result<Json<Vec<Trend>>, AppError> {
    let trends = store::trends::read_user_trends(&state.db, &user.email, params.status).await?;
    Ok(Json(trends))
}

/// Submit a trend to the database. Trend curation is a staff concern.
async fn create_trend(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(mut trend): Json<Trend>,
) -> Result<(StatusCode, Json<Trend>), AppError> {
    require_staff(&user)?;
    trend.created_by = Some(user.email.clone());
    trend.modified_by = Some(user.email.clone());

    let trend_id = store::trends::create_trend(&state.db, &state.storage, &trend).await?;
    let created = store::trends::read_trend(&state.db, trend_id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Retrieve a trend by ID. Visitors may only read approved trends.
async fn read_trend(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(uid): Path<i32>,
) -> Result<Json<Trend>, AppError> {
    let trend = store::trends::read_trend(&state.db, uid)
        .await?
        .ok_or(AppError::NotFound)?;
    if !policy::can_view(&user, &trend) {
        return Err(AppError::PermissionDenied);
    }
    Ok(Json(trend))
}

/// Update a trend.
async fn update_trend(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(uid): Path<i32>,
    Json(mut trend): Json<Trend>,
) -> Result<Json<Trend>, AppError> {
    require_staff(&user)?;
    if uid != trend.id {
        return Err(AppError::IdMismatch);
    }

    trend.modified_by = Some(user.email.clone());
    let trend_id = store::trends::update_trend(&state.db, &state.storage, &trend)
        .await?
        .ok_or(AppError::NotFound)?;
    let updated = store::trends::read_trend(&state.db, trend_id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(updated))
}

/// Delete a trend along with its stored attachment.
async fn delete_trend(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(uid): Path<i32>,
) -> Result<Json<Trend>, AppError> {
    require_staff(&user)?;
    let trend = store::trends::delete_trend(&state.db, &state.storage, uid)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(trend))
}
