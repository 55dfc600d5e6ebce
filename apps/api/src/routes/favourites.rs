//! Handlers for managing a user's favourite signals.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::auth::{require_regular, CurrentUser};
use crate::errors::AppError;
use crate::models::signal::Signal;
use crate::state::AppState;
use crate::store;
use crate::store::favourites::FavouriteStatus;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(fetch_user_favourites))
        .route("/:signal_id", post(create_or_remove_favourite))
}

#[derive(Serialize)]
struct FavouriteResponse {
    status: FavouriteStatus,
}

/// Add or remove a signal from the user's favourites depending on current
/// state. Repeated calls strictly alternate between created and deleted.
async fn create_or_remove_favourite(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(signal_id): Path<i32>,
) -> Result<Json<FavouriteResponse>, AppError> {
    require_regular(&user)?;
    if !store::signals::signal_exists(&state.db, signal_id).await? {
        return Err(AppError::NotFound);
    }
    let account = store::users::read_user_by_email(&state.db, &user.email)
        .await?
        .ok_or(AppError::NotFound)?;

    let status = store::favourites::toggle_favourite(&state.db, account.id, signal_id).await?;
    Ok(Json(FavouriteResponse { status }))
}

/// All signals the current user has favorited, in chronological order of
/// when they were favorited.
async fn fetch_user_favourites(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<Signal>>, AppError> {
    require_regular(&user)?;
    let Some(account) = store::users::read_user_by_email(&state.db, &user.email).await? else {
        return Ok(Json(vec![]));
    };
    let signals = store::favourites::read_user_favourites(&state.db, account.id).await?;
    Ok(Json(signals))
}
