//! Digest emails summarising recently submitted signals.
//!
//! The digest is assembled on request (or by an external scheduler hitting
//! the endpoint): fetch recent signals, build the recipient list, render a
//! plain HTML listing and hand it to the email seam. There is no internal
//! scheduler.

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::info;

use crate::email::EmailSender;
use crate::errors::AppError;
use crate::models::signal::Signal;
use crate::models::taxonomy::Status;
use crate::store::users;

const DEFAULT_LIMIT: i64 = 10;

#[derive(Debug, Clone, Deserialize)]
pub struct DigestRequest {
    /// Look-back window in days; unbounded when absent.
    pub days: Option<i64>,
    /// Statuses to include; defaults to drafts.
    pub statuses: Option<Vec<Status>>,
    pub limit: Option<i64>,
    /// Optional custom introduction paragraph.
    pub intro: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DigestSummary {
    pub signals: usize,
    /// How many of the digest's signals came from Accelerator Labs users.
    pub acclab_signals: usize,
    pub recipients: usize,
    pub sent: bool,
}

/// Signals matching the digest window, newest first.
pub async fn recent_signals(
    pool: &PgPool,
    days: Option<i64>,
    statuses: &[Status],
    limit: i64,
) -> Result<Vec<Signal>, AppError> {
    let since = days.map(|days| Utc::now() - Duration::days(days));
    let signals = sqlx::query_as(
        r#"
        SELECT
            s.*, c.connected_trends
        FROM
            signals AS s
        LEFT OUTER JOIN (
            SELECT
                signal_id, array_agg(trend_id) AS connected_trends
            FROM
                connections
            GROUP BY
                signal_id
            ) AS c
        ON
            s.id = c.signal_id
        WHERE
            s.status = ANY($1)
            AND ($2::timestamptz IS NULL OR s.created_at >= $2)
        ORDER BY
            s.created_at DESC
        LIMIT $3
        "#,
    )
    .bind(statuses)
    .bind(since)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(signals)
}

/// Renders the digest body. Kept deliberately plain; presentation lives
/// with the frontend platform.
pub fn digest_html(signals: &[Signal], intro: Option<&str>) -> String {
    if signals.is_empty() {
        return "<p>No new signals were found for this period.</p>".to_string();
    }

    let default_intro = "<p>Hello,</p>\
        <p>Here's your digest of new signals from the Futures platform. \
        Below are the latest signals that might be of interest:</p>";
    let mut html = String::from(intro.unwrap_or(default_intro));

    html.push_str("<ul>");
    for signal in signals {
        let headline = signal.headline.as_deref().unwrap_or("(no headline)");
        html.push_str("<li><strong>");
        html.push_str(headline);
        html.push_str("</strong>");
        if let Some(created_by) = &signal.created_by {
            html.push_str(&format!(" — submitted by {created_by}"));
        }
        if let Some(description) = &signal.description {
            html.push_str(&format!("<br/>{description}"));
        }
        if let Some(url) = &signal.url {
            html.push_str(&format!("<br/><a href=\"{url}\">Source</a>"));
        }
        html.push_str("</li>");
    }
    html.push_str("</ul>");
    html
}

pub fn digest_subject(count: usize, statuses: &[Status]) -> String {
    let label = if matches!(statuses, [Status::Draft]) {
        "draft signal"
    } else {
        "signal"
    };
    let plural = if count == 1 { "" } else { "s" };
    format!("Signals digest: {count} {label}{plural}")
}

/// Assembles and sends a digest to all staff users.
pub async fn send_digest(
    pool: &PgPool,
    sender: &dyn EmailSender,
    request: &DigestRequest,
) -> Result<DigestSummary, AppError> {
    let statuses = request
        .statuses
        .clone()
        .unwrap_or_else(|| vec![Status::Draft]);
    let limit = request.limit.unwrap_or(DEFAULT_LIMIT);

    let signals = recent_signals(pool, request.days, &statuses, limit).await?;
    let acclab_emails = users::get_acclab_users(pool).await?;
    let acclab_signals = signals
        .iter()
        .filter(|signal| {
            signal
                .created_by
                .as_deref()
                .is_some_and(|email| acclab_emails.iter().any(|a| a == email))
        })
        .count();
    let recipients = users::get_staff_emails(pool).await?;
    info!(
        "Prepared digest with {} signals for {} recipients",
        signals.len(),
        recipients.len()
    );

    if recipients.is_empty() {
        return Ok(DigestSummary {
            signals: signals.len(),
            acclab_signals,
            recipients: 0,
            sent: false,
        });
    }

    let html = digest_html(&signals, request.intro.as_deref());
    let subject = digest_subject(signals.len(), &statuses);
    let sent = sender
        .send(&recipients, &subject, &html, "text/html")
        .await?;

    Ok(DigestSummary {
        signals: signals.len(),
        acclab_signals,
        recipients: recipients.len(),
        sent,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn signal(headline: &str, created_by: &str, url: Option<&str>) -> Signal {
        Signal {
            id: 0,
            created_at: Utc::now(),
            status: Status::Draft,
            created_by: Some(created_by.to_string()),
            created_for: None,
            modified_at: Utc::now(),
            modified_by: None,
            headline: Some(headline.to_string()),
            description: Some("Something is changing.".to_string()),
            attachment: None,
            steep_primary: None,
            steep_secondary: None,
            signature_primary: None,
            signature_secondary: None,
            sdgs: None,
            created_unit: None,
            url: url.map(String::from),
            relevance: None,
            keywords: None,
            location: None,
            score: None,
            connected_trends: None,
            favorite: false,
        }
    }

    #[test]
    fn empty_digest_has_placeholder_body() {
        let html = digest_html(&[], None);
        assert!(html.contains("No new signals"));
    }

    #[test]
    fn digest_lists_headline_author_and_source() {
        let signals = vec![signal(
            "The cost of corruption",
            "a@undp.org",
            Some("https://example.org/article"),
        )];
        let html = digest_html(&signals, None);
        assert!(html.contains("The cost of corruption"));
        assert!(html.contains("submitted by a@undp.org"));
        assert!(html.contains("https://example.org/article"));
    }

    #[test]
    fn custom_intro_replaces_default() {
        let signals = vec![signal("Headline", "a@undp.org", None)];
        let html = digest_html(&signals, Some("<p>Weekly roundup</p>"));
        assert!(html.contains("Weekly roundup"));
        assert!(!html.contains("Here's your digest"));
    }

    #[test]
    fn subject_reflects_count_and_kind() {
        assert_eq!(
            digest_subject(3, &[Status::Draft]),
            "Signals digest: 3 draft signals"
        );
        assert_eq!(
            digest_subject(1, &[Status::Approved]),
            "Signals digest: 1 signal"
        );
    }
}
