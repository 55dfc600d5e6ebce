//! Handlers for reading and updating users.

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};

use crate::auth::{require_admin, require_regular, CurrentUser};
use crate::errors::AppError;
use crate::models::filters::UserFilters;
use crate::models::page::Page;
use crate::models::user::User;
use crate::state::AppState;
use crate::store;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/search", get(search_users))
        .route("/me", get(read_current_user))
        .route("/:uid", get(read_user).put(update_user))
}

/// Search users in the database using pagination and filters.
async fn search_users(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(filters): Query<UserFilters>,
) -> Result<Json<Page<User>>, AppError> {
    require_admin(&user)?;
    let page = store::users::search_users(&state.db, &filters).await?;
    Ok(Json(page))
}

/// Read the current user information resolved from the credential.
async fn read_current_user(CurrentUser(user): CurrentUser) -> Json<User> {
    Json(user)
}

/// Read a user from the database using an ID.
async fn read_user(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(uid): Path<i32>,
) -> Result<Json<User>, AppError> {
    require_admin(&user)?;
    let target = store::users::read_user(&state.db, uid)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(target))
}

/// Update a user. Non-admin users can only update their own name, unit and
/// accelerator-lab flag; only admins can change roles.
async fn update_user(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(uid): Path<i32>,
    Json(user_new): Json<User>,
) -> Result<Json<User>, AppError> {
    require_regular(&user)?;
    if uid != user_new.id {
        return Err(AppError::IdMismatch);
    }
    if user.is_admin() {
        // admins may update anyone, including roles
    } else if user.email != user_new.email || user.id != user_new.id {
        return Err(AppError::PermissionDenied);
    } else if user.role != user_new.role {
        return Err(AppError::PermissionDenied);
    }

    let user_id = store::users::update_user(&state.db, &user_new)
        .await?
        .ok_or(AppError::NotFound)?;
    let updated = store::users::read_user(&state.db, user_id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(updated))
}
