//! Handlers for email delivery and digest generation.

use anyhow::anyhow;
use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::{require_admin, CurrentUser};
use crate::digest::{self, DigestRequest, DigestSummary};
use crate::errors::AppError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/send", post(send_email))
        .route("/digest", post(send_digest))
}

#[derive(Deserialize)]
struct EmailRequest {
    to_emails: Vec<String>,
    subject: String,
    content: String,
    #[serde(default = "default_content_type")]
    content_type: String,
}

fn default_content_type() -> String {
    "text/plain".to_string()
}

/// Send an email to multiple recipients. Only accessible by admin users.
async fn send_email(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<EmailRequest>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;
    let success = state
        .email
        .send(
            &request.to_emails,
            &request.subject,
            &request.content,
            &request.content_type,
        )
        .await?;
    if !success {
        return Err(AppError::Internal(anyhow!("failed to send email")));
    }
    Ok(Json(json!({ "message": "Email sent successfully" })))
}

/// Assemble and send a signals digest to all staff users.
/// Triggered by request or an external scheduler; there is no internal one.
async fn send_digest(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<DigestRequest>,
) -> Result<Json<DigestSummary>, AppError> {
    require_admin(&user)?;
    let summary = digest::send_digest(&state.db, state.email.as_ref(), &request).await?;
    Ok(Json(summary))
}
