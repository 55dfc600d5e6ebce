//! Article suggestions from an external news-search API, used by the
//! signal autocomplete endpoint.

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::errors::AppError;

const API_URL: &str = "https://api.worldnewsapi.com/search-news";
const MAX_RESULTS: u32 = 10;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    news: Vec<Article>,
}

#[derive(Debug, Deserialize)]
struct Article {
    title: Option<String>,
    summary: Option<String>,
    text: Option<String>,
    url: Option<String>,
}

/// A news article reduced to the fields a draft signal needs.
#[derive(Debug, Clone, Serialize)]
pub struct ArticleSuggestion {
    pub headline: String,
    pub description: Option<String>,
    pub url: Option<String>,
}

/// Search news articles matching a query, reduced to simplified signal
/// suggestions.
pub async fn autocomplete(
    http: &reqwest::Client,
    config: &Config,
    query: &str,
) -> Result<Vec<ArticleSuggestion>, AppError> {
    let Some(api_key) = config.news_api_key.as_deref() else {
        return Err(AppError::ContentFetch(
            "news search is not configured".to_string(),
        ));
    };

    let number = MAX_RESULTS.to_string();
    let response = http
        .get(API_URL)
        .query(&[
            ("text", query),
            ("language", "en"),
            ("number", number.as_str()),
        ])
        .header("x-api-key", api_key)
        .send()
        .await
        .map_err(|e| AppError::ContentFetch(e.to_string()))?;
    if !response.status().is_success() {
        return Err(AppError::ContentFetch(format!(
            "news API returned {}",
            response.status()
        )));
    }

    let results: SearchResponse = response
        .json()
        .await
        .map_err(|e| AppError::ContentFetch(e.to_string()))?;

    let suggestions = results
        .news
        .into_iter()
        .filter_map(|article| {
            let headline = article.title?;
            Some(ArticleSuggestion {
                headline,
                description: article.summary.or(article.text),
                url: article.url,
            })
        })
        .collect();
    Ok(suggestions)
}
