//! CRUD and consistency-preserving mutation helpers for user groups.
//!
//! Every multi-step mutation locks the group row, applies the pure cascade
//! from `models::group` and writes the result back inside one transaction,
//! so a crash can never leave the collaborator map referencing a removed
//! member or signal. Missing references are reported as `false`, never as
//! errors: callers check return values for these idempotent operations.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use tracing::debug;

use crate::errors::AppError;
use crate::models::group::{
    collaborator_map_from_json, collaborator_map_to_json, GroupSignalView, GroupWithSignals,
    UserGroup,
};
use crate::models::user::User;
use crate::store::{signals, users};

#[derive(Debug, FromRow)]
struct GroupRow {
    id: i32,
    name: String,
    created_at: DateTime<Utc>,
    signal_ids: Option<Vec<i32>>,
    user_ids: Option<Vec<i32>>,
    admin_ids: Option<Vec<i32>>,
    collaborator_map: Value,
}

impl From<GroupRow> for UserGroup {
    fn from(row: GroupRow) -> Self {
        UserGroup {
            id: row.id,
            name: row.name,
            created_at: row.created_at,
            signal_ids: row.signal_ids.unwrap_or_default(),
            user_ids: row.user_ids.unwrap_or_default(),
            admin_ids: row.admin_ids.unwrap_or_default(),
            collaborator_map: collaborator_map_from_json(&row.collaborator_map),
        }
    }
}

/// Create a user group. The creator implicitly becomes a member and an
/// admin; additional emails resolve to user IDs, silently skipping unknown
/// addresses.
pub async fn create_group(
    pool: &PgPool,
    name: &str,
    creator: &User,
    member_emails: &[String],
) -> Result<i32, AppError> {
    let mut group = UserGroup {
        name: name.to_string(),
        ..UserGroup::default()
    };
    group.add_admin(creator.id);
    for user_id in users::resolve_email_ids(pool, member_emails).await? {
        group.add_member(user_id);
    }

    let group_id = sqlx::query_scalar(
        r#"
        INSERT INTO user_groups (name, signal_ids, user_ids, admin_ids, collaborator_map)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
        "#,
    )
    .bind(&group.name)
    .bind(&group.signal_ids)
    .bind(&group.user_ids)
    .bind(&group.admin_ids)
    .bind(collaborator_map_to_json(&group.collaborator_map))
    .fetch_one(pool)
    .await?;
    Ok(group_id)
}

pub async fn read_group(pool: &PgPool, group_id: i32) -> Result<Option<UserGroup>, AppError> {
    let row: Option<GroupRow> = sqlx::query_as("SELECT * FROM user_groups WHERE id = $1")
        .bind(group_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(UserGroup::from))
}

pub async fn list_groups(pool: &PgPool) -> Result<Vec<UserGroup>, AppError> {
    let rows: Vec<GroupRow> = sqlx::query_as("SELECT * FROM user_groups ORDER BY name")
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(UserGroup::from).collect())
}

/// Wholesale group update. The intended invariants are re-established
/// before writing: admins are members, the collaborator map only references
/// associated signals and current members.
pub async fn update_group(pool: &PgPool, group: &UserGroup) -> Result<Option<i32>, AppError> {
    let mut normalised = group.clone();
    normalised.normalise();

    let row = sqlx::query_scalar(
        r#"
        UPDATE user_groups
        SET name = $1,
            signal_ids = $2,
            user_ids = $3,
            admin_ids = $4,
            collaborator_map = $5
        WHERE id = $6
        RETURNING id
        "#,
    )
    .bind(&normalised.name)
    .bind(&normalised.signal_ids)
    .bind(&normalised.user_ids)
    .bind(&normalised.admin_ids)
    .bind(collaborator_map_to_json(&normalised.collaborator_map))
    .bind(normalised.id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Delete a group, cleaning up its collaborator-group references to signals
/// in the same transaction.
pub async fn delete_group(pool: &PgPool, group_id: i32) -> Result<bool, AppError> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM signal_collaborator_groups WHERE group_id = $1")
        .bind(group_id)
        .execute(&mut *tx)
        .await?;
    let row: Option<i32> = sqlx::query_scalar("DELETE FROM user_groups WHERE id = $1 RETURNING id")
        .bind(group_id)
        .fetch_optional(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(row.is_some())
}

/// Locks the group row, applies a pure mutation and persists the outcome in
/// one transaction. Returns false without writing when the group is absent
/// or the mutation reports failure.
async fn with_group<F>(pool: &PgPool, group_id: i32, mutate: F) -> Result<bool, AppError>
where
    F: FnOnce(&mut UserGroup) -> bool,
{
    let mut tx = pool.begin().await?;

    let row: Option<GroupRow> =
        sqlx::query_as("SELECT * FROM user_groups WHERE id = $1 FOR UPDATE")
            .bind(group_id)
            .fetch_optional(&mut *tx)
            .await?;
    let Some(row) = row else {
        return Ok(false);
    };
    let mut group = UserGroup::from(row);

    if !mutate(&mut group) {
        return Ok(false);
    }

    sqlx::query(
        r#"
        UPDATE user_groups
        SET signal_ids = $1, user_ids = $2, admin_ids = $3, collaborator_map = $4
        WHERE id = $5
        "#,
    )
    .bind(&group.signal_ids)
    .bind(&group.user_ids)
    .bind(&group.admin_ids)
    .bind(collaborator_map_to_json(&group.collaborator_map))
    .bind(group_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(true)
}

/// Add a user to a group. Idempotent: true as long as the user ends up a
/// member; false when the group or user does not exist.
pub async fn add_user(pool: &PgPool, group_id: i32, user_id: i32) -> Result<bool, AppError> {
    if !users::user_exists(pool, user_id).await? {
        return Ok(false);
    }
    with_group(pool, group_id, |group| group.add_member(user_id)).await
}

/// Remove a user from a group, cascading into the collaborator map.
/// Returns false if the user was not a member.
pub async fn remove_user(pool: &PgPool, group_id: i32, user_id: i32) -> Result<bool, AppError> {
    with_group(pool, group_id, |group| group.remove_member(user_id)).await
}

/// Associate a signal with a group.
pub async fn add_signal(pool: &PgPool, group_id: i32, signal_id: i32) -> Result<bool, AppError> {
    if !signals::signal_exists(pool, signal_id).await? {
        return Ok(false);
    }
    with_group(pool, group_id, |group| group.add_signal(signal_id)).await
}

/// Dissociate a signal from a group, deleting its collaborator-map entry.
pub async fn remove_signal(
    pool: &PgPool,
    group_id: i32,
    signal_id: i32,
) -> Result<bool, AppError> {
    with_group(pool, group_id, |group| group.remove_signal(signal_id)).await
}

/// Mark a group member as a collaborator on one of the group's signals.
/// Fails when the signal is not associated or the user is not a member.
pub async fn add_collaborator(
    pool: &PgPool,
    group_id: i32,
    signal_id: i32,
    user_id: i32,
) -> Result<bool, AppError> {
    with_group(pool, group_id, |group| {
        group.add_collaborator(signal_id, user_id)
    })
    .await
}

/// Remove a collaborator entry, pruning empty per-signal lists.
pub async fn remove_collaborator(
    pool: &PgPool,
    group_id: i32,
    signal_id: i32,
    user_id: i32,
) -> Result<bool, AppError> {
    with_group(pool, group_id, |group| {
        group.remove_collaborator(signal_id, user_id)
    })
    .await
}

/// Every group where the user is a member or an admin, most recent first.
pub async fn groups_for_user(pool: &PgPool, user_id: i32) -> Result<Vec<UserGroup>, AppError> {
    let rows: Vec<GroupRow> = sqlx::query_as(
        r#"
        SELECT *
        FROM user_groups
        WHERE $1 = ANY(user_ids) OR $1 = ANY(admin_ids)
        ORDER BY created_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    debug!("Found {} groups for user {user_id}", rows.len());
    Ok(rows.into_iter().map(UserGroup::from).collect())
}

/// Every group that has the signal associated.
pub async fn groups_owning_signal(
    pool: &PgPool,
    signal_id: i32,
) -> Result<Vec<UserGroup>, AppError> {
    let rows: Vec<GroupRow> =
        sqlx::query_as("SELECT * FROM user_groups WHERE $1 = ANY(signal_ids)")
            .bind(signal_id)
            .fetch_all(pool)
            .await?;
    Ok(rows.into_iter().map(UserGroup::from).collect())
}

/// Union of collaborators for a signal across all groups that own it.
pub async fn signal_group_collaborators(
    pool: &PgPool,
    signal_id: i32,
) -> Result<std::collections::BTreeSet<i32>, AppError> {
    let groups = groups_owning_signal(pool, signal_id).await?;
    let collaborators = groups
        .iter()
        .filter_map(|group| group.collaborators_for(signal_id))
        .flatten()
        .copied()
        .collect();
    Ok(collaborators)
}

/// A user's groups expanded with signals and member details. Each signal
/// carries a per-viewer edit flag resolved from the collaborator map.
pub async fn groups_with_signals_for_user(
    pool: &PgPool,
    user_id: i32,
) -> Result<Vec<GroupWithSignals>, AppError> {
    let groups = groups_for_user(pool, user_id).await?;
    let mut result = Vec::with_capacity(groups.len());
    for group in groups {
        let group_signals = signals::signals_by_ids(pool, &group.signal_ids).await?;
        let views = group_signals
            .into_iter()
            .map(|signal| {
                let can_edit = group.grants_edit(signal.id, user_id);
                GroupSignalView { signal, can_edit }
            })
            .collect();
        let members = users::users_by_ids(pool, &group.user_ids).await?;
        result.push(GroupWithSignals {
            group,
            signals: views,
            users: members,
        });
    }
    Ok(result)
}
