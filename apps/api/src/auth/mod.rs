//! Request authentication and role gates.
//!
//! Every endpoint reads the `access_token` header. The predefined API key
//! maps to a fixed anonymous visitor (admin in local mode); anything else
//! must be a JWT issued by the identity provider. Users are provisioned
//! lazily on first successful token authentication.

pub mod jwks;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use jsonwebtoken::{Algorithm, Validation};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::EnvMode;
use crate::errors::AppError;
use crate::models::taxonomy::Role;
use crate::models::user::User;
use crate::state::AppState;
use crate::store;

/// Identity attached to the anonymous API-key visitor.
pub const ANONYMOUS_EMAIL: &str = "name.surname@undp.org";

const ACCESS_TOKEN_HEADER: &str = "access_token";

#[derive(Debug, Deserialize)]
struct Claims {
    unique_name: Option<String>,
    name: Option<String>,
}

/// The authenticated caller, extracted from the `access_token` header.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let token = parts
            .headers
            .get(ACCESS_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or(AppError::NotAuthenticated)?;
        authenticate(state, token).await.map(CurrentUser)
    }
}

/// Resolves a bearer credential to a user, provisioning first-time users.
pub async fn authenticate(state: &AppState, token: &str) -> Result<User, AppError> {
    if token == state.config.api_key {
        return Ok(match state.config.env_mode {
            EnvMode::Local => User {
                role: Role::Admin,
                ..User::visitor(ANONYMOUS_EMAIL)
            },
            EnvMode::Production => User::visitor(ANONYMOUS_EMAIL),
        });
    }

    let claims = decode_token(state, token).await?;
    let (Some(email), Some(name)) = (claims.unique_name, claims.name) else {
        return Err(AppError::NotAuthenticated);
    };

    if let Some(user) = store::users::read_user_by_email(&state.db, &email).await? {
        return Ok(user);
    }

    debug!("Provisioning first-time user {email}");
    let user = User {
        role: Role::User,
        name: Some(name),
        ..User::visitor(&email)
    };
    let user_id = store::users::create_user(&state.db, &user).await?;
    store::users::read_user(&state.db, user_id)
        .await?
        .ok_or(AppError::NotAuthenticated)
}

async fn decode_token(state: &AppState, token: &str) -> Result<Claims, AppError> {
    let header = jsonwebtoken::decode_header(token).map_err(|_| AppError::NotAuthenticated)?;
    let kid = header.kid.ok_or(AppError::NotAuthenticated)?;

    let key = state
        .jwks
        .decoding_key(&state.http, &state.config.tenant_id, &kid)
        .await
        .map_err(|e| {
            warn!("Could not obtain a signing key: {e}");
            AppError::NotAuthenticated
        })?;

    let mut validation = Validation::new(Algorithm::RS256);
    validation.set_audience(&[state.config.client_id.clone()]);
    validation.set_issuer(&[format!(
        "https://sts.windows.net/{}/",
        state.config.tenant_id
    )]);

    jsonwebtoken::decode::<Claims>(token, &key, &validation)
        .map(|data| data.claims)
        .map_err(|_| AppError::NotAuthenticated)
}

/// Requires that the user is assigned an admin role.
pub fn require_admin(user: &User) -> Result<(), AppError> {
    if !user.is_admin() {
        warn!(
            "Permission denied: {} with role {} attempted an admin action",
            user.email, user.role
        );
        return Err(AppError::PermissionDenied);
    }
    Ok(())
}

/// Requires that the user is at least a curator.
pub fn require_staff(user: &User) -> Result<(), AppError> {
    if !user.is_staff() {
        return Err(AppError::PermissionDenied);
    }
    Ok(())
}

/// Requires a logged-in user, i.e. not the API-key visitor.
pub fn require_regular(user: &User) -> Result<(), AppError> {
    if !user.is_regular() {
        return Err(AppError::PermissionDenied);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> User {
        User {
            role,
            ..User::visitor("t@undp.org")
        }
    }

    #[test]
    fn admin_gate() {
        assert!(require_admin(&user(Role::Admin)).is_ok());
        assert!(require_admin(&user(Role::Curator)).is_err());
        assert!(require_admin(&user(Role::User)).is_err());
    }

    #[test]
    fn staff_gate() {
        assert!(require_staff(&user(Role::Admin)).is_ok());
        assert!(require_staff(&user(Role::Curator)).is_ok());
        assert!(require_staff(&user(Role::User)).is_err());
    }

    #[test]
    fn regular_gate_excludes_visitor() {
        assert!(require_regular(&user(Role::User)).is_ok());
        assert!(require_regular(&user(Role::Visitor)).is_err());
    }
}
