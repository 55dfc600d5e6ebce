use std::sync::Arc;

use sqlx::PgPool;

use crate::auth::jwks::JwksCache;
use crate::config::Config;
use crate::email::EmailSender;
use crate::storage::Storage;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
    /// Blob storage for image attachments.
    pub storage: Storage,
    /// Outbound email seam; concrete provider chosen at startup.
    pub email: Arc<dyn EmailSender>,
    /// Identity-provider signing keys, TTL-cached.
    pub jwks: JwksCache,
    /// Shared HTTP client for identity, news and generation calls.
    pub http: reqwest::Client,
}
