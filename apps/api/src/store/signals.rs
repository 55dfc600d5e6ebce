//! CRUD, search and collaboration operations for signal entities.

use sqlx::{FromRow, PgPool, Row};
use tracing::warn;

use crate::errors::AppError;
use crate::models::filters::{SignalFilters, SIGNAL_SORT_COLUMNS};
use crate::models::group::Collaborator;
use crate::models::page::Page;
use crate::models::signal::Signal;
use crate::models::taxonomy::Status;
use crate::models::user::User;
use crate::policy::{self, EditChannels};
use crate::storage::{ImageFolder, Storage};
use crate::store::{groups, total_count};

const CONNECTED_TRENDS_JOIN: &str = r#"
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
"#;

/// Search signals in the database using filters and pagination.
///
/// `total_count` reflects the database filters only; role-based
/// sanitisation is applied by the caller after retrieval.
pub async fn search_signals(
    pool: &PgPool,
    filters: &SignalFilters,
) -> Result<Page<Signal>, AppError> {
    let pagination = filters.pagination();
    let order = pagination.order_column(SIGNAL_SORT_COLUMNS)?;
    let sql = format!(
        r#"
        SELECT
            s.*, c.connected_trends, COUNT(*) OVER () AS total_count
        FROM
            signals AS s
        {CONNECTED_TRENDS_JOIN}
        LEFT OUTER JOIN (
            SELECT
                name AS unit_name,
                region AS unit_region
            FROM
                units
            ) AS u
        ON
            s.created_unit = u.unit_name
        LEFT OUTER JOIN (
            SELECT
                name AS location_name,
                region AS location_region,
                bureau AS location_bureau
            FROM
                locations
            ) AS l
        ON
            s.location = l.location_name
        WHERE
            ($1::int4[] IS NULL OR s.id = ANY($1))
            AND s.status = ANY($2)
            AND ($3::text IS NULL OR s.created_by = $3)
            AND ($4::text IS NULL OR s.created_for = $4)
            AND ($5::text IS NULL OR s.steep_primary = $5)
            AND ($6::text[] IS NULL OR s.steep_secondary && $6)
            AND ($7::text IS NULL OR s.signature_primary = $7)
            AND ($8::text[] IS NULL OR s.signature_secondary && $8)
            AND ($9::text IS NULL OR s.location = $9 OR l.location_region = $9)
            AND ($10::text IS NULL OR l.location_bureau = $10)
            AND ($11::text[] IS NULL OR s.sdgs && $11)
            AND ($12::text IS NULL OR s.score = $12)
            AND ($13::text IS NULL OR u.unit_region = $13 OR u.unit_name = $13)
            AND ($14::text IS NULL OR s.text_search_field @@ websearch_to_tsquery('english', $14))
        ORDER BY
            s.{order} {direction}
        OFFSET $15
        LIMIT $16
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
        .bind(filters.location.as_deref())
        .bind(filters.bureau.as_deref())
        .bind(filters.sdgs.as_deref())
        .bind(filters.score)
        .bind(filters.unit.as_deref())
        .bind(filters.query.as_deref())
        .bind(pagination.offset())
        .bind(pagination.limit())
        .fetch_all(pool)
        .await?;

    let total = total_count(&rows);
    let data = rows
        .iter()
        .map(Signal::from_row)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Page::from_search(data, total, &pagination))
}

/// Insert a signal into the database, connect it to trends and upload an
/// attachment if applicable. Connections and the attachment are best-effort
/// secondary effects: their failures are logged, the signal still exists.
pub async fn create_signal(
    pool: &PgPool,
    storage: &Storage,
    signal: &Signal,
) -> Result<i32, AppError> {
    let row = sqlx::query(
        r#"
        INSERT INTO signals (
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
            created_unit,
            url,
            relevance,
            keywords,
            location,
            score
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
        RETURNING id
        "#,
    )
    .bind(signal.status)
    .bind(&signal.created_by)
    .bind(&signal.created_for)
    .bind(&signal.modified_by)
    .bind(&signal.headline)
    .bind(&signal.description)
    .bind(signal.steep_primary)
    .bind(signal.steep_secondary.as_deref())
    .bind(signal.signature_primary)
    .bind(signal.signature_secondary.as_deref())
    .bind(signal.sdgs.as_deref())
    .bind(&signal.created_unit)
    .bind(&signal.url)
    .bind(&signal.relevance)
    .bind(signal.keywords.as_deref())
    .bind(&signal.location)
    .bind(signal.score)
    .fetch_one(pool)
    .await?;
    let signal_id: i32 = row.get("id");

    for trend_id in signal.connected_trends.iter().flatten() {
        let result = sqlx::query(
            "INSERT INTO connections (signal_id, trend_id, created_by) VALUES ($1, $2, $3)
             ON CONFLICT DO NOTHING",
        )
        .bind(signal_id)
        .bind(trend_id)
        .bind(&signal.created_by)
        .execute(pool)
        .await;
        if let Err(e) = result {
            warn!("Could not connect signal {signal_id} to trend {trend_id}: {e}");
        }
    }

    if let Some(attachment) = &signal.attachment {
        match storage
            .upload_image(signal_id, ImageFolder::Signals, attachment)
            .await
        {
            Ok(blob_url) => set_attachment(pool, signal_id, Some(&blob_url)).await,
            Err(e) => warn!("Attachment upload failed for signal {signal_id}: {e}"),
        }
    }
    Ok(signal_id)
}

async fn set_attachment(pool: &PgPool, signal_id: i32, url: Option<&str>) {
    let result = sqlx::query("UPDATE signals SET attachment = $1 WHERE id = $2")
        .bind(url)
        .bind(signal_id)
        .execute(pool)
        .await;
    if let Err(e) = result {
        warn!("Could not record attachment URL for signal {signal_id}: {e}");
    }
}

/// Read a signal from the database using an ID.
pub async fn read_signal(pool: &PgPool, uid: i32) -> Result<Option<Signal>, AppError> {
    let sql = format!(
        r#"
        SELECT
            s.*, c.connected_trends
        FROM
            signals AS s
        {CONNECTED_TRENDS_JOIN}
        WHERE
            s.id = $1
        "#
    );
    let signal = sqlx::query_as(&sql).bind(uid).fetch_optional(pool).await?;
    Ok(signal)
}

/// Fetch signal details for a list of IDs.
pub async fn signals_by_ids(pool: &PgPool, ids: &[i32]) -> Result<Vec<Signal>, AppError> {
    if ids.is_empty() {
        return Ok(vec![]);
    }
    let sql = format!(
        r#"
        SELECT
            s.*, c.connected_trends
        FROM
            signals AS s
        {CONNECTED_TRENDS_JOIN}
        WHERE
            s.id = ANY($1)
        ORDER BY
            s.id
        "#
    );
    let signals = sqlx::query_as(&sql).bind(ids).fetch_all(pool).await?;
    Ok(signals)
}

/// Update a signal with only-overwrite-if-provided semantics, refresh its
/// trend connections and reconcile the attachment.
pub async fn update_signal(
    pool: &PgPool,
    storage: &Storage,
    signal: &Signal,
) -> Result<Option<i32>, AppError> {
    let row = sqlx::query(
        r#"
        UPDATE
            signals
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
            created_unit = COALESCE($11, created_unit),
            url = COALESCE($12, url),
            relevance = COALESCE($13, relevance),
            keywords = COALESCE($14, keywords),
            location = COALESCE($15, location),
            score = COALESCE($16, score)
        WHERE
            id = $17
        RETURNING id
        "#,
    )
    .bind(signal.status)
    .bind(&signal.created_for)
    .bind(&signal.modified_by)
    .bind(&signal.headline)
    .bind(&signal.description)
    .bind(signal.steep_primary)
    .bind(signal.steep_secondary.as_deref())
    .bind(signal.signature_primary)
    .bind(signal.signature_secondary.as_deref())
    .bind(signal.sdgs.as_deref())
    .bind(&signal.created_unit)
    .bind(&signal.url)
    .bind(&signal.relevance)
    .bind(signal.keywords.as_deref())
    .bind(&signal.location)
    .bind(signal.score)
    .bind(signal.id)
    .fetch_optional(pool)
    .await?;
    let Some(row) = row else {
        return Ok(None);
    };
    let signal_id: i32 = row.get("id");

    sqlx::query("DELETE FROM connections WHERE signal_id = $1")
        .bind(signal_id)
        .execute(pool)
        .await?;
    for trend_id in signal.connected_trends.iter().flatten() {
        let result = sqlx::query(
            "INSERT INTO connections (signal_id, trend_id, created_by) VALUES ($1, $2, $3)
             ON CONFLICT DO NOTHING",
        )
        .bind(signal_id)
        .bind(trend_id)
        .bind(&signal.created_by)
        .execute(pool)
        .await;
        if let Err(e) = result {
            warn!("Could not connect signal {signal_id} to trend {trend_id}: {e}");
        }
    }

    match storage
        .update_image(signal_id, ImageFolder::Signals, signal.attachment.as_deref())
        .await
    {
        Ok(blob_url) => set_attachment(pool, signal_id, blob_url.as_deref()).await,
        Err(e) => warn!("Attachment update failed for signal {signal_id}: {e}"),
    }

    Ok(Some(signal_id))
}

/// Delete a signal, purging group back-references in the same transaction,
/// then delete its stored image if there is one. Favourites, connections and
/// collaborator rows go away through foreign-key cascades.
pub async fn delete_signal(
    pool: &PgPool,
    storage: &Storage,
    uid: i32,
) -> Result<Option<Signal>, AppError> {
    let mut tx = pool.begin().await?;

    let row = sqlx::query("DELETE FROM signals WHERE id = $1 RETURNING *")
        .bind(uid)
        .fetch_optional(&mut *tx)
        .await?;
    let Some(row) = row else {
        tx.rollback().await?;
        return Ok(None);
    };
    let signal = Signal::from_row(&row)?;

    sqlx::query(
        r#"
        UPDATE user_groups
        SET signal_ids = array_remove(signal_ids, $1),
            collaborator_map = collaborator_map - $2::text
        WHERE $1 = ANY(signal_ids) OR collaborator_map ? $2::text
        "#,
    )
    .bind(uid)
    .bind(uid.to_string())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    if signal.attachment.is_some() {
        if let Err(e) = storage.delete_image(uid, ImageFolder::Signals).await {
            warn!("Could not delete attachment for signal {uid}: {e}");
        }
    }
    Ok(Some(signal))
}

/// Read signals submitted by a user, filtered by status.
pub async fn read_user_signals(
    pool: &PgPool,
    user_email: &str,
    status: Status,
) -> Result<Vec<Signal>, AppError> {
    let sql = format!(
        r#"
        SELECT
            s.*, c.connected_trends
        FROM
            signals AS s
        {CONNECTED_TRENDS_JOIN}
        WHERE
            s.created_by = $1 AND s.status = $2
        "#
    );
    let signals = sqlx::query_as(&sql)
        .bind(user_email)
        .bind(status)
        .fetch_all(pool)
        .await?;
    Ok(signals)
}

pub async fn signal_exists(pool: &PgPool, signal_id: i32) -> Result<bool, AppError> {
    let exists = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM signals WHERE id = $1)")
        .bind(signal_id)
        .fetch_one(pool)
        .await?;
    Ok(exists)
}

/// Add a collaborator to a signal. Dispatches to the group-collaborator
/// table for group references. Returns true when the collaborator is
/// present afterwards, false when the signal or user does not exist.
pub async fn add_collaborator(
    pool: &PgPool,
    signal_id: i32,
    collaborator: &Collaborator,
) -> Result<bool, AppError> {
    if !signal_exists(pool, signal_id).await? {
        return Ok(false);
    }

    match collaborator {
        Collaborator::Group(group_id) => {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM user_groups WHERE id = $1)")
                    .bind(group_id)
                    .fetch_one(pool)
                    .await?;
            if !exists {
                return Ok(false);
            }
            sqlx::query(
                "INSERT INTO signal_collaborator_groups (signal_id, group_id)
                 VALUES ($1, $2)
                 ON CONFLICT (signal_id, group_id) DO NOTHING",
            )
            .bind(signal_id)
            .bind(group_id)
            .execute(pool)
            .await?;
        }
        Collaborator::User(email) => {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
                    .bind(email)
                    .fetch_one(pool)
                    .await?;
            if !exists {
                return Ok(false);
            }
            sqlx::query(
                "INSERT INTO signal_collaborators (signal_id, user_email)
                 VALUES ($1, $2)
                 ON CONFLICT (signal_id, user_email) DO NOTHING",
            )
            .bind(signal_id)
            .bind(email)
            .execute(pool)
            .await?;
        }
    }
    Ok(true)
}

/// Remove a collaborator from a signal. Returns whether a row was removed.
pub async fn remove_collaborator(
    pool: &PgPool,
    signal_id: i32,
    collaborator: &Collaborator,
) -> Result<bool, AppError> {
    let row = match collaborator {
        Collaborator::Group(group_id) => {
            sqlx::query(
                "DELETE FROM signal_collaborator_groups
                 WHERE signal_id = $1 AND group_id = $2
                 RETURNING signal_id",
            )
            .bind(signal_id)
            .bind(group_id)
            .fetch_optional(pool)
            .await?
        }
        Collaborator::User(email) => {
            sqlx::query(
                "DELETE FROM signal_collaborators
                 WHERE signal_id = $1 AND user_email = $2
                 RETURNING signal_id",
            )
            .bind(signal_id)
            .bind(email)
            .fetch_optional(pool)
            .await?
        }
    };
    Ok(row.is_some())
}

/// All collaborators for a signal: individual users first, then groups.
pub async fn get_signal_collaborators(
    pool: &PgPool,
    signal_id: i32,
) -> Result<Vec<Collaborator>, AppError> {
    let emails: Vec<String> =
        sqlx::query_scalar("SELECT user_email FROM signal_collaborators WHERE signal_id = $1")
            .bind(signal_id)
            .fetch_all(pool)
            .await?;
    let group_ids: Vec<i32> =
        sqlx::query_scalar("SELECT group_id FROM signal_collaborator_groups WHERE signal_id = $1")
            .bind(signal_id)
            .fetch_all(pool)
            .await?;

    let mut collaborators: Vec<Collaborator> =
        emails.into_iter().map(Collaborator::User).collect();
    collaborators.extend(group_ids.into_iter().map(Collaborator::Group));
    Ok(collaborators)
}

/// Edit gate for a signal: staff, creator, direct collaborator, member of a
/// collaborating group, or listed in an owning group's collaborator map.
/// Cheap checks run first; any one grant suffices.
pub async fn can_user_edit_signal(
    pool: &PgPool,
    signal_id: i32,
    user: &User,
) -> Result<bool, AppError> {
    if user.is_staff() {
        return Ok(true);
    }

    let creator: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM signals WHERE id = $1 AND created_by = $2)",
    )
    .bind(signal_id)
    .bind(&user.email)
    .fetch_one(pool)
    .await?;
    if creator {
        return Ok(true);
    }

    let direct: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM signal_collaborators WHERE signal_id = $1 AND user_email = $2)",
    )
    .bind(signal_id)
    .bind(&user.email)
    .fetch_one(pool)
    .await?;
    if direct {
        return Ok(true);
    }

    let group = group_collaborator_channel(pool, signal_id, user).await?;
    Ok(policy::can_edit_signal(
        user,
        EditChannels {
            creator,
            direct_collaborator: direct,
            group_collaborator: group,
        },
    ))
}

/// Whether any group grants the user edit access to the signal, either by
/// being attached to the signal as a collaborator group or through its
/// per-signal collaborator map.
async fn group_collaborator_channel(
    pool: &PgPool,
    signal_id: i32,
    user: &User,
) -> Result<bool, AppError> {
    if user.id == 0 {
        return Ok(false);
    }

    let attached: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1
            FROM signal_collaborator_groups scg
            JOIN user_groups g ON scg.group_id = g.id
            WHERE scg.signal_id = $1
              AND ($2 = ANY(g.user_ids) OR $2 = ANY(g.admin_ids))
        )
        "#,
    )
    .bind(signal_id)
    .bind(user.id)
    .fetch_one(pool)
    .await?;
    if attached {
        return Ok(true);
    }

    let owning = groups::groups_owning_signal(pool, signal_id).await?;
    Ok(owning.iter().any(|g| g.grants_edit(signal_id, user.id)))
}
