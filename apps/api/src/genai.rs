//! Signal generation from web content via Azure OpenAI.
//!
//! The single point of entry for all model calls: no other module may talk
//! to the generation API directly. Failures surface as 422 responses
//! without internal detail.

use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::config::Config;
use crate::errors::AppError;
use crate::models::signal::Signal;

const API_VERSION: &str = "2024-02-15-preview";
/// The deployment used for all generation calls.
pub const MODEL: &str = "gpt-4o-mini";
const SCRAPE_TIMEOUT: Duration = Duration::from_secs(10);

const SYSTEM_MESSAGE: &str = r#"You are a Signal Scanner within the Strategy & Futures Team at the United Nations Development Programme.
Your task is to generate a Signal from web content provided by the user. A Signal is defined as a single
piece of evidence or indicator that points to, relates to, or otherwise supports a trend.
It can also stand alone as a potential indicator of future change in one or more trends.

### Rules
1. Your output must be a valid JSON object without any markdown fencing.
2. Populate only these fields: headline, description, steep_primary, steep_secondary,
   signature_primary, signature_secondary, sdgs, keywords.
3. The response must be in English, so translate content if necessary.
4. For headline and description, do not just copy-paste text, instead summarize the information
   in a concise yet insightful manner."#;

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// Fetch the text content of a public web page to be fed to the model.
pub async fn scrape_content(http: &reqwest::Client, url: &str) -> Result<String, AppError> {
    let response = http
        .get(url)
        .header(reqwest::header::USER_AGENT, "Mozilla/5.0")
        .timeout(SCRAPE_TIMEOUT)
        .send()
        .await
        .map_err(|e| AppError::ContentFetch(e.to_string()))?;
    if !response.status().is_success() {
        return Err(AppError::ContentFetch(format!(
            "unexpected status {} from {url}",
            response.status()
        )));
    }
    response
        .text()
        .await
        .map_err(|e| AppError::ContentFetch(e.to_string()))
}

/// Generate a draft signal from scraped text.
pub async fn generate_signal(
    http: &reqwest::Client,
    config: &Config,
    text: &str,
) -> Result<Signal, AppError> {
    let (Some(endpoint), Some(api_key)) = (
        config.azure_openai_endpoint.as_deref(),
        config.azure_openai_api_key.as_deref(),
    ) else {
        return Err(AppError::Generation(
            "signal generation is not configured".to_string(),
        ));
    };

    let url = format!(
        "{}/openai/deployments/{MODEL}/chat/completions?api-version={API_VERSION}",
        endpoint.trim_end_matches('/')
    );
    let body = json!({
        "messages": [
            {"role": "system", "content": SYSTEM_MESSAGE},
            {"role": "user", "content": text},
        ],
        // vary the output to alleviate occasional formatting errors
        "temperature": 0.3,
    });

    let response = http
        .post(&url)
        .header("api-key", api_key)
        .json(&body)
        .send()
        .await
        .map_err(|e| AppError::Generation(e.to_string()))?;
    if !response.status().is_success() {
        return Err(AppError::Generation(format!(
            "generation API returned {}",
            response.status()
        )));
    }

    let chat: ChatResponse = response
        .json()
        .await
        .map_err(|e| AppError::Generation(e.to_string()))?;
    let content = chat
        .choices
        .first()
        .and_then(|choice| choice.message.content.as_deref())
        .ok_or_else(|| AppError::Generation("model returned no content".to_string()))?;

    serde_json::from_str(content)
        .map_err(|e| AppError::Generation(format!("model output is not a valid signal: {e}")))
}
