use anyhow::{Context, Result};

/// Deployment mode. Local mode relaxes authentication for development:
/// the API key maps to an admin identity instead of an anonymous visitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvMode {
    Local,
    Production,
}

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// Shared secret granting anonymous read-only access.
    pub api_key: String,
    /// Identity-provider tenant used to locate the JWKS endpoint.
    pub tenant_id: String,
    /// Expected JWT audience.
    pub client_id: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub sendgrid_api_key: Option<String>,
    pub email_from: String,
    pub azure_openai_endpoint: Option<String>,
    pub azure_openai_api_key: Option<String>,
    pub news_api_key: Option<String>,
    pub env_mode: EnvMode,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let env_mode = match std::env::var("ENV_MODE").as_deref() {
            Ok("local") => EnvMode::Local,
            _ => EnvMode::Production,
        };

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            api_key: require_env("API_KEY")?,
            tenant_id: require_env("TENANT_ID")?,
            client_id: require_env("CLIENT_ID")?,
            s3_bucket: require_env("S3_BUCKET")?,
            s3_endpoint: require_env("S3_ENDPOINT")?,
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            sendgrid_api_key: std::env::var("SENDGRID_API_KEY").ok(),
            email_from: std::env::var("EMAIL_FROM")
                .unwrap_or_else(|_| "notifications@undp.org".to_string()),
            azure_openai_endpoint: std::env::var("AZURE_OPENAI_ENDPOINT").ok(),
            azure_openai_api_key: std::env::var("AZURE_OPENAI_API_KEY").ok(),
            news_api_key: std::env::var("NEWS_API_KEY").ok(),
            env_mode,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}
