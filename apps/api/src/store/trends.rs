//! CRUD and search operations for trend entities.

use sqlx::{FromRow, PgPool, Row};
use tracing::warn;

use crate::errors::AppError;
use crate::models::filters::{TrendFilters, TREND_SORT_COLUMNS};
use crate::models::page::Page;
use crate::models::taxonomy::Status;
use crate::models::trend::Trend;
use crate::storage::{ImageFolder, Storage};
use crate::store::total_count;

const CONNECTED_SIGNALS_JOIN: &str = r#"
    LEFT OUTER JOIN (
        SELECT
            trend_id, array_agg(signal_id) AS connected_signals
        FROM
            connections
        GROUP BY
            trend_id
        ) AS c
    ON
        t.id = c.trend_id
"#;

/// Search trends in the database using filters and pagination.
pub async fn search_trends(
    pool: &PgPool,
    filters: &TrendFilters,
) -> Result<Page<Trend>, AppError> {
    let pagination = filters.pagination();
    let order = pagination.order_column(TREND_SORT_COLUMNS)?;
    let sql = format!(
        r#"
        SELECT
            t.*, c.connected_signals, COUNT(*) OVER () AS total_count
        FROM
            trends AS t
        {CONNECTED_SIGNALS_JOIN}
        WHERE
            ($1::int4[] IS NULL OR t.id = ANY($1))
            AND t.status = ANY($2)
            AND ($3::text IS NULL OR t.created_by = $3)
            AND ($4::text IS NULL OR t.created_for = $4)
            AND ($5::text IS NULL OR t.steep_primary = $5)
            AND ($6::text[] IS NULL OR t.steep_secondary && $6)
            AND ($7::text IS NULL OR t.signature_primary = $7)
            AND ($8::text[] IS NULL OR t.signature_secondary && $8)
            AND ($9::text[] IS NULL OR t.sdgs && $9)
            AND ($10::text IS NULL OR t.assigned_to = $10)
            AND ($11::text IS NULL OR t.time_horizon = $11)
            AND ($12::text IS NULL OR t.impact_rating = $12)
            AND ($13::text IS NULL OR t.text_search_field @@ websearch_to_tsquery('english', $13))
        ORDER BY
            t.{order} {direction}
        OFFSET $14
        LIMIT $15
        "#,
        direction = pagination.direction.as_sql(),
    );

    let rows = sqlx::query(&sql)
        .bind(filters.ids.as_deref())
        .bind(&filters.statuses)
        .bind(filters.created_by.as_deref())
        .bind(filters.created_for.as_deref())
        .bind(filters.steep_primary)
        .bind(filters.steep_secondary.as_deref())
        .bind(filters.signature_primary)
        .bind(filters.signature_secondary.as_deref())
        .bind(filters.sdgs.as_deref())
        .bind(filters.assigned_to.as_deref())
        .bind(filters.time_horizon)
        .bind(filters.impact_rating)
        .bind(filters.query.as_deref())
        .bind(pagination.offset())
        .bind(pagination.limit())
        .fetch_all(pool)
        .await?;

    let total = total_count(&rows);
    let data = rows
        .iter()
        .map(Trend::from_row)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Page::from_search(data, total, &pagination))
}

/// Insert a trend into the database, connect it to signals and upload an
/// attachment if applicable.
pub async fn create_trend(
    pool: &PgPool,
    storage: &Storage,
    trend: &Trend,
) -> Result<i32, AppError> {
    let row = sqlx::query(
        r#"
        INSERT INTO trends (
            status,
            created_by,
            created_for,
            modified_by,
            headline,
            description,
            steep_primary,
            steep_secondary,
            signature_primary,
            signature_secondary,
            sdgs,
            assigned_to,
            time_horizon,
            impact_rating,
            impact_description
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
        RETURNING id
        "#,
    )
    .bind(trend.status)
    .bind(&trend.created_by)
    .bind(&trend.created_for)
    .bind(&trend.modified_by)
    .bind(&trend.headline)
    .bind(&trend.description)
    .bind(trend.steep_primary)
    .bind(trend.steep_secondary.as_deref())
    .bind(trend.signature_primary)
    .bind(trend.signature_secondary.as_deref())
    .bind(trend.sdgs.as_deref())
    .bind(&trend.assigned_to)
    .bind(trend.time_horizon)
    .bind(trend.impact_rating)
    .bind(&trend.impact_description)
    .fetch_one(pool)
    .await?;
    let trend_id: i32 = row.get("id");

    for signal_id in trend.connected_signals.iter().flatten() {
        let result = sqlx::query(
            "INSERT INTO connections (signal_id, trend_id, created_by) VALUES ($1, $2, $3)
             ON CONFLICT DO NOTHING",
        )
        .bind(signal_id)
        .bind(trend_id)
        .bind(&trend.created_by)
        .execute(pool)
        .await;
        if let Err(e) = result {
            warn!("Could not connect trend {trend_id} to signal {signal_id}: {e}");
        }
    }

    if let Some(attachment) = &trend.attachment {
        match storage
            .upload_image(trend_id, ImageFolder::Trends, attachment)
            .await
        {
            Ok(blob_url) => set_attachment(pool, trend_id, Some(&blob_url)).await,
            Err(e) => warn!("Attachment upload failed for trend {trend_id}: {e}"),
        }
    }
    Ok(trend_id)
}

async fn set_attachment(pool: &PgPool, trend_id: i32, url: Option<&str>) {
    let result = sqlx::query("UPDATE trends SET attachment = $1 WHERE id = $2")
        .bind(url)
        .bind(trend_id)
        .execute(pool)
        .await;
    if let Err(e) = result {
        warn!("Could not record attachment URL for trend {trend_id}: {e}");
    }
}

/// Read all trends from the database.
pub async fn list_trends(pool: &PgPool) -> Result<Vec<Trend>, AppError> {
    let sql = format!(
        r#"
        SELECT
            t.*, c.connected_signals
        FROM
            trends AS t
        {CONNECTED_SIGNALS_JOIN}
        ORDER BY
            t.created_at DESC
        "#
    );
    let trends = sqlx::query_as(&sql).fetch_all(pool).await?;
    Ok(trends)
}

/// Read a trend from the database using an ID.
pub async fn read_trend(pool: &PgPool, uid: i32) -> Result<Option<Trend>, AppError> {
    let sql = format!(
        r#"
        SELECT
            t.*, c.connected_signals
        FROM
            trends AS t
        {CONNECTED_SIGNALS_JOIN}
        WHERE
            t.id = $1
        "#
    );
    let trend = sqlx::query_as(&sql).bind(uid).fetch_optional(pool).await?;
    Ok(trend)
}

/// Update a trend with only-overwrite-if-provided semantics and refresh its
/// signal connections.
pub async fn update_trend(
    pool: &PgPool,
    storage: &Storage,
    trend: &Trend,
) -> Result<Option<i32>, AppError> {
    let row = sqlx::query(
        r#"
        UPDATE
            trends
        SET
            status = COALESCE($1, status),
            created_for = COALESCE($2, created_for),
            modified_at = NOW(),
            modified_by = $3,
            headline = COALESCE($4, headline),
            description = COALESCE($5, description),
            steep_primary = COALESCE($6, steep_primary),
            steep_secondary = COALESCE($7, steep_secondary),
            signature_primary = COALESCE($8, signature_primary),
            signature_secondary = COALESCE($9, signature_secondary),
            sdgs = COALESCE($10, sdgs),
            assigned_to = COALESCE($11, assigned_to),
            time_horizon = COALESCE($12, time_horizon),
            impact_rating = COALESCE($13, impact_rating),
            impact_description = COALESCE($14, impact_description)
        WHERE
            id = $15
        RETURNING id
        "#,
    )
    .bind(trend.status)
    .bind(&trend.created_for)
    .bind(&trend.modified_by)
    .bind(&trend.headline)
    .bind(&trend.description)
    .bind(trend.steep_primary)
    .bind(trend.steep_secondary.as_deref())
    .bind(trend.signature_primary)
    .bind(trend.signature_secondary.as_deref())
    .bind(trend.sdgs.as_deref())
    .bind(&trend.assigned_to)
    .bind(trend.time_horizon)
    .bind(trend.impact_rating)
    .bind(&trend.impact_description)
    .bind(trend.id)
    .fetch_optional(pool)
    .await?;
    let Some(row) = row else {
        return Ok(None);
    };
    let trend_id: i32 = row.get("id");

    sqlx::query("DELETE FROM connections WHERE trend_id = $1")
        .bind(trend_id)
        .execute(pool)
        .await?;
    for signal_id in trend.connected_signals.iter().flatten() {
        let result = sqlx::query(
            "INSERT INTO connections (signal_id, trend_id, created_by) VALUES ($1, $2, $3)
             ON CONFLICT DO NOTHING",
        )
        .bind(signal_id)
        .bind(trend_id)
        .bind(&trend.created_by)
        .execute(pool)
        .await;
        if let Err(e) = result {
            warn!("Could not connect trend {trend_id} to signal {signal_id}: {e}");
        }
    }

    match storage
        .update_image(trend_id, ImageFolder::Trends, trend.attachment.as_deref())
        .await
    {
        Ok(blob_url) => set_attachment(pool, trend_id, blob_url.as_deref()).await,
        Err(e) => warn!("Attachment update failed for trend {trend_id}: {e}"),
    }

    Ok(Some(trend_id))
}

/// Delete a trend and, if applicable, its stored image. Connections go away
/// through foreign-key cascades.
pub async fn delete_trend(
    pool: &PgPool,
    storage: &Storage,
    uid: i32,
) -> Result<Option<Trend>, AppError> {
    let row = sqlx::query("DELETE FROM trends WHERE id = $1 RETURNING *")
        .bind(uid)
        .fetch_optional(pool)
        .await?;
    let Some(row) = row else {
        return Ok(None);
    };
    let trend = Trend::from_row(&row)?;

    if trend.attachment.is_some() {
        if let Err(e) = storage.delete_image(uid, ImageFolder::Trends).await {
            warn!("Could not delete attachment for trend {uid}: {e}");
        }
    }
    Ok(Some(trend))
}

/// Read trends submitted by a user, filtered by status.
pub async fn read_user_trends(
    pool: &PgPool,
    user_email: &str,
    status: Status,
) -> Result<Vec<Trend>, AppError> {
    let sql = format!(
        r#"
        SELECT
            t.*, c.connected_signals
        FROM
            trends AS t
        {CONNECTED_SIGNALS_JOIN}
        WHERE
            t.created_by = $1 AND t.status = $2
        "#
    );
    let trends = sqlx::query_as(&sql)
        .bind(user_email)
        .bind(status)
        .fetch_all(pool)
        .await?;
    Ok(trends)
}
