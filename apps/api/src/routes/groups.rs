//! Handlers for managing user groups and their collaboration state.
//!
//! Creating a group is open to any logged-in user, who becomes a member and
//! an admin of it. Membership, signal and collaborator mutations require
//! group admin rights (platform admins always qualify); the full listing is
//! platform-admin only.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::auth::{require_admin, require_regular, CurrentUser};
use crate::errors::AppError;
use crate::models::group::{GroupWithSignals, UserGroup};
use crate::models::user::User;
use crate::state::AppState;
use crate::store;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_groups).post(create_group))
        .route("/me", get(read_my_groups))
        .route(
            "/:group_id",
            get(read_group).put(update_group).delete(delete_group),
        )
        .route(
            "/:group_id/members/:user_id",
            post(add_member).delete(remove_member),
        )
        .route(
            "/:group_id/signals/:signal_id",
            post(add_signal).delete(remove_signal),
        )
        .route(
            "/:group_id/signals/:signal_id/collaborators/:user_id",
            post(add_collaborator).delete(remove_collaborator),
        )
}

/// List all user groups.
async fn list_groups(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<UserGroup>>, AppError> {
    require_admin(&user)?;
    let groups = store::groups::list_groups(&state.db).await?;
    Ok(Json(groups))
}

#[derive(Deserialize)]
struct GroupPayload {
    name: String,
    /// Emails of initial members; unknown addresses are skipped.
    #[serde(default)]
    users: Vec<String>,
}

/// Create a user group. The creator becomes a member and an admin.
async fn create_group(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<GroupPayload>,
) -> Result<(StatusCode, Json<UserGroup>), AppError> {
    require_regular(&user)?;
    if payload.name.trim().len() < 3 {
        return Err(AppError::Validation(
            "group name must be at least 3 characters".to_string(),
        ));
    }
    let group_id =
        store::groups::create_group(&state.db, payload.name.trim(), &user, &payload.users).await?;
    let group = store::groups::read_group(&state.db, group_id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok((StatusCode::CREATED, Json(group)))
}

/// The current user's groups with their signals (flagged with per-viewer
/// edit access) and members.
async fn read_my_groups(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<GroupWithSignals>>, AppError> {
    require_regular(&user)?;
    let groups = store::groups::groups_with_signals_for_user(&state.db, user.id).await?;
    Ok(Json(groups))
}

/// Read a single group. Restricted to its members and platform admins.
async fn read_group(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(group_id): Path<i32>,
) -> Result<Json<UserGroup>, AppError> {
    let group = store::groups::read_group(&state.db, group_id)
        .await?
        .ok_or(AppError::NotFound)?;
    if !user.is_admin() && !group.is_member(user.id) {
        return Err(AppError::PermissionDenied);
    }
    Ok(Json(group))
}

/// Wholesale group update, re-establishing map/membership invariants.
async fn update_group(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(group_id): Path<i32>,
    Json(group): Json<UserGroup>,
) -> Result<Json<UserGroup>, AppError> {
    if group_id != group.id {
        return Err(AppError::IdMismatch);
    }
    require_group_admin(&state, group_id, &user).await?;
    let updated_id = store::groups::update_group(&state.db, &group)
        .await?
        .ok_or(AppError::NotFound)?;
    let updated = store::groups::read_group(&state.db, updated_id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(updated))
}

/// Delete a group, cleaning up its signal collaborator references.
async fn delete_group(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(group_id): Path<i32>,
) -> Result<Json<bool>, AppError> {
    require_group_admin(&state, group_id, &user).await?;
    if !store::groups::delete_group(&state.db, group_id).await? {
        return Err(AppError::NotFound);
    }
    Ok(Json(true))
}

/// Add a user to a group.
async fn add_member(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((group_id, user_id)): Path<(i32, i32)>,
) -> Result<Json<bool>, AppError> {
    require_group_admin(&state, group_id, &user).await?;
    if !store::groups::add_user(&state.db, group_id, user_id).await? {
        return Err(AppError::NotFound);
    }
    Ok(Json(true))
}

/// Remove a user from a group, cascading into its collaborator map.
async fn remove_member(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((group_id, user_id)): Path<(i32, i32)>,
) -> Result<Json<bool>, AppError> {
    require_group_admin(&state, group_id, &user).await?;
    if !store::groups::remove_user(&state.db, group_id, user_id).await? {
        return Err(AppError::NotFound);
    }
    Ok(Json(true))
}

/// Associate a signal with a group.
async fn add_signal(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((group_id, signal_id)): Path<(i32, i32)>,
) -> Result<Json<bool>, AppError> {
    require_group_admin(&state, group_id, &user).await?;
    if !store::groups::add_signal(&state.db, group_id, signal_id).await? {
        return Err(AppError::NotFound);
    }
    Ok(Json(true))
}

/// Dissociate a signal from a group, deleting its collaborator-map entry.
async fn remove_signal(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((group_id, signal_id)): Path<(i32, i32)>,
) -> Result<Json<bool>, AppError> {
    require_group_admin(&state, group_id, &user).await?;
    if !store::groups::remove_signal(&state.db, group_id, signal_id).await? {
        return Err(AppError::NotFound);
    }
    Ok(Json(true))
}

/// Grant a member edit access to one of the group's signals.
async fn add_collaborator(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((group_id, signal_id, user_id)): Path<(i32, i32, i32)>,
) -> Result<Json<bool>, AppError> {
    require_group_admin(&state, group_id, &user).await?;
    if !store::groups::add_collaborator(&state.db, group_id, signal_id, user_id).await? {
        return Err(AppError::NotFound);
    }
    Ok(Json(true))
}

/// Revoke a member's edit access to one of the group's signals.
async fn remove_collaborator(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((group_id, signal_id, user_id)): Path<(i32, i32, i32)>,
) -> Result<Json<bool>, AppError> {
    require_group_admin(&state, group_id, &user).await?;
    if !store::groups::remove_collaborator(&state.db, group_id, signal_id, user_id).await? {
        return Err(AppError::NotFound);
    }
    Ok(Json(true))
}

/// Requires platform-admin or group-admin rights for a group mutation.
async fn require_group_admin(
    state: &AppState,
    group_id: i32,
    user: &User,
) -> Result<(), AppError> {
    let group = store::groups::read_group(&state.db, group_id)
        .await?
        .ok_or(AppError::NotFound)?;
    if user.is_admin() || group.is_admin(user.id) {
        return Ok(());
    }
    Err(AppError::PermissionDenied)
}
