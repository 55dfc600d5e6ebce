//! Handlers for retrieving, submitting and updating signals.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::auth::{require_regular, CurrentUser};
use crate::errors::AppError;
use crate::models::filters::SignalFilters;
use crate::models::group::Collaborator;
use crate::models::page::Page;
use crate::models::signal::Signal;
use crate::models::taxonomy::Status;
use crate::news::ArticleSuggestion;
use crate::policy;
use crate::state::AppState;
use crate::store;
use crate::{genai, news};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/search", get(search_signals))
        .route("/generation", get(generate_signal))
        .route("/autocomplete", get(autocomplete_signal))
        .route("/me", get(read_my_signals))
        .route("/", post(create_signal))
        .route(
            "/:uid",
            get(read_signal).put(update_signal).delete(delete_signal),
        )
        .route("/:uid/can-edit", get(can_edit_signal))
        .route("/:uid/collaborators", get(list_collaborators))
        .route(
            "/:uid/collaborators/:collaborator",
            post(add_collaborator).delete(remove_collaborator),
        )
        .route("/:uid/group-collaborators", get(group_collaborators))
}

/// Search signals in the database using pagination and filters.
/// The page is sanitised for the caller's role after retrieval.
async fn search_signals(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(filters): Query<SignalFilters>,
) -> Result<Json<Page<Signal>>, AppError> {
    let page = store::signals::search_signals(&state.db, &filters).await?;
    Ok(Json(page.sanitise(&user)))
}

#[derive(Deserialize)]
struct GenerationQuery {
    /// A public webpage URL whose content will be used to generate a signal.
    url: String,
}

/// Generate a draft signal from web content.
async fn generate_signal(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<GenerationQuery>,
) -> Result<Json<Signal>, AppError> {
    require_regular(&user)?;
    let content = genai::scrape_content(&state.http, &params.url).await?;
    let mut signal = genai::generate_signal(&state.http, &state.config, &content).await?;
    signal.created_by = Some(user.email.clone());
    signal.created_unit = user.unit.clone();
    signal.url = Some(params.url);
    Ok(Json(signal))
}

#[derive(Deserialize)]
struct AutocompleteQuery {
    query: String,
}

/// Get article suggestions converted to simplified signal dictionaries.
async fn autocomplete_signal(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    Query(params): Query<AutocompleteQuery>,
) -> Result<Json<Vec<ArticleSuggestion>>, AppError> {
    let suggestions = news::autocomplete(&state.http, &state.config, &params.query).await?;
    Ok(Json(suggestions))
}

#[derive(Deserialize)]
struct StatusQuery {
    status: Status,
}

/// Retrieve signals with a given status submitted by the current user.
async fn read_my_signals(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<StatusQuery>,
) -> Result<Json<Vec<Signal>>, AppError> {
    let signals = store::signals::read_user_signals(&state.db, &user.email, params.status).await?;
    Ok(Json(signals))
}

/// Submit a signal to the database. A base64 image attachment is uploaded
/// to blob storage on a best-effort basis.
async fn create_signal(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(mut signal): Json<Signal>,
) -> Result<(StatusCode, Json<Signal>), AppError> {
    require_regular(&user)?;
    signal.created_by = Some(user.email.clone());
    signal.modified_by = Some(user.email.clone());
    signal.created_unit = user.unit.clone();

    let signal_id = store::signals::create_signal(&state.db, &state.storage, &signal).await?;
    let created = store::signals::read_signal(&state.db, signal_id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Retrieve a signal by ID. Visitors may only read approved signals.
async fn read_signal(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(uid): Path<i32>,
) -> Result<Json<Signal>, AppError> {
    let mut signal = store::signals::read_signal(&state.db, uid)
        .await?
        .ok_or(AppError::NotFound)?;
    if !policy::can_view(&user, &signal) {
        return Err(AppError::PermissionDenied);
    }
    if user.is_regular() {
        signal.favorite =
            store::favourites::is_signal_favorited(&state.db, &user.email, uid).await?;
    }
    Ok(Json(signal))
}

/// Update a signal. Permitted for staff, the creator, direct collaborators
/// and group collaborators; status is an ordinary field under the same gate.
async fn update_signal(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(uid): Path<i32>,
    Json(mut signal): Json<Signal>,
) -> Result<Json<Signal>, AppError> {
    if uid != signal.id {
        return Err(AppError::IdMismatch);
    }
    if store::signals::read_signal(&state.db, uid).await?.is_none() {
        return Err(AppError::NotFound);
    }
    if !store::signals::can_user_edit_signal(&state.db, uid, &user).await? {
        return Err(AppError::PermissionDenied);
    }

    signal.modified_by = Some(user.email.clone());
    let signal_id = store::signals::update_signal(&state.db, &state.storage, &signal)
        .await?
        .ok_or(AppError::NotFound)?;
    let updated = store::signals::read_signal(&state.db, signal_id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(updated))
}

/// Delete a signal. Restricted to staff and the creator; group references
/// and favourites are cleaned up along with the stored attachment.
async fn delete_signal(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(uid): Path<i32>,
) -> Result<Json<Signal>, AppError> {
    require_creator(&state, uid, &user).await?;
    let signal = store::signals::delete_signal(&state.db, &state.storage, uid)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(signal))
}

/// Whether the current user may edit the signal.
async fn can_edit_signal(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(uid): Path<i32>,
) -> Result<Json<bool>, AppError> {
    if store::signals::read_signal(&state.db, uid).await?.is_none() {
        return Err(AppError::NotFound);
    }
    let allowed = store::signals::can_user_edit_signal(&state.db, uid, &user).await?;
    Ok(Json(allowed))
}

/// All collaborators on a signal: user emails and `group:{id}` tokens.
async fn list_collaborators(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(uid): Path<i32>,
) -> Result<Json<Vec<Collaborator>>, AppError> {
    require_regular(&user)?;
    if !store::signals::signal_exists(&state.db, uid).await? {
        return Err(AppError::NotFound);
    }
    let collaborators = store::signals::get_signal_collaborators(&state.db, uid).await?;
    Ok(Json(collaborators))
}

/// Add a collaborator (a user email or `group:{id}`) to a signal.
async fn add_collaborator(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((uid, token)): Path<(i32, String)>,
) -> Result<Json<bool>, AppError> {
    if !store::signals::can_user_edit_signal(&state.db, uid, &user).await? {
        return Err(AppError::PermissionDenied);
    }
    let collaborator: Collaborator = token.parse().map_err(AppError::Validation)?;
    if !store::signals::add_collaborator(&state.db, uid, &collaborator).await? {
        return Err(AppError::NotFound);
    }
    Ok(Json(true))
}

/// Remove a collaborator from a signal.
async fn remove_collaborator(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((uid, token)): Path<(i32, String)>,
) -> Result<Json<bool>, AppError> {
    if !store::signals::can_user_edit_signal(&state.db, uid, &user).await? {
        return Err(AppError::PermissionDenied);
    }
    let collaborator: Collaborator = token.parse().map_err(AppError::Validation)?;
    if !store::signals::remove_collaborator(&state.db, uid, &collaborator).await? {
        return Err(AppError::NotFound);
    }
    Ok(Json(true))
}

/// IDs of users granted edit access through any owning group's
/// collaborator map.
async fn group_collaborators(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(uid): Path<i32>,
) -> Result<Json<Vec<i32>>, AppError> {
    require_regular(&user)?;
    if !store::signals::signal_exists(&state.db, uid).await? {
        return Err(AppError::NotFound);
    }
    let collaborators = store::groups::signal_group_collaborators(&state.db, uid).await?;
    Ok(Json(collaborators.into_iter().collect()))
}

/// Requires that the user is at least a curator or created the signal.
async fn require_creator(
    state: &AppState,
    uid: i32,
    user: &crate::models::user::User,
) -> Result<(), AppError> {
    if user.is_staff() {
        return Ok(());
    }
    let signal = store::signals::read_signal(&state.db, uid)
        .await?
        .ok_or(AppError::NotFound)?;
    if signal.created_by.as_deref() != Some(user.email.as_str()) {
        return Err(AppError::PermissionDenied);
    }
    Ok(())
}
