//! Outbound email delivery behind a provider-agnostic seam.
//!
//! `AppState` holds an `Arc<dyn EmailSender>`; the concrete provider is
//! chosen at startup from configuration. Digest generation only produces
//! recipient lists and bodies, it never talks to a provider directly.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::json;
use tracing::{info, warn};

use crate::config::Config;

#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Sends one message to all recipients. Returns false when the provider
    /// rejects the message without a transport error.
    async fn send(
        &self,
        to: &[String],
        subject: &str,
        content: &str,
        content_type: &str,
    ) -> Result<bool>;
}

/// SendGrid v3 REST implementation.
pub struct SendGridSender {
    http: reqwest::Client,
    api_key: String,
    from: String,
}

impl SendGridSender {
    const API_URL: &'static str = "https://api.sendgrid.com/v3/mail/send";

    pub fn new(http: reqwest::Client, api_key: String, from: String) -> Self {
        SendGridSender {
            http,
            api_key,
            from,
        }
    }
}

#[async_trait]
impl EmailSender for SendGridSender {
    async fn send(
        &self,
        to: &[String],
        subject: &str,
        content: &str,
        content_type: &str,
    ) -> Result<bool> {
        if to.is_empty() {
            return Ok(false);
        }
        let body = json!({
            "personalizations": [{
                "to": to.iter().map(|email| json!({"email": email})).collect::<Vec<_>>(),
            }],
            "from": {"email": self.from},
            "subject": subject,
            "content": [{"type": content_type, "value": content}],
        });

        let response = self
            .http
            .post(Self::API_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| anyhow!("sendgrid request failed: {e}"))?;

        let status = response.status();
        if status.is_success() {
            info!("Sent email '{subject}' to {} recipients", to.len());
            Ok(true)
        } else {
            let detail = response.text().await.unwrap_or_default();
            warn!("SendGrid rejected email '{subject}': {status} {detail}");
            Ok(false)
        }
    }
}

/// Log-only sender for local development and environments without a
/// provider key.
pub struct LogSender;

#[async_trait]
impl EmailSender for LogSender {
    async fn send(
        &self,
        to: &[String],
        subject: &str,
        _content: &str,
        _content_type: &str,
    ) -> Result<bool> {
        info!("Email delivery disabled; would send '{subject}' to {to:?}");
        Ok(true)
    }
}

/// Picks the configured provider, falling back to logging when no key is set.
pub fn create_sender(config: &Config, http: &reqwest::Client) -> Arc<dyn EmailSender> {
    match &config.sendgrid_api_key {
        Some(api_key) => Arc::new(SendGridSender::new(
            http.clone(),
            api_key.clone(),
            config.email_from.clone(),
        )),
        None => {
            warn!("SENDGRID_API_KEY is not set; emails will only be logged");
            Arc::new(LogSender)
        }
    }
}
