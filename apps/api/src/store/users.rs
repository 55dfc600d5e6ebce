//! CRUD operations for user entities.

use sqlx::{FromRow, PgPool, Row};

use crate::errors::AppError;
use crate::models::filters::{UserFilters, USER_SORT_COLUMNS};
use crate::models::page::Page;
use crate::models::user::User;
use crate::store::total_count;

/// Search users in the database using filters and pagination.
pub async fn search_users(pool: &PgPool, filters: &UserFilters) -> Result<Page<User>, AppError> {
    let pagination = filters.pagination();
    let order = pagination.order_column(USER_SORT_COLUMNS)?;
    let sql = format!(
        r#"
        SELECT
            *, COUNT(*) OVER () AS total_count
        FROM
            users
        WHERE
            ($1::text[] IS NULL OR role = ANY($1))
            AND ($2::text IS NULL OR name ~* $2)
        ORDER BY
            {order} {direction}
        OFFSET $3
        LIMIT $4
        "#,
        direction = pagination.direction.as_sql(),
    );

    let rows = sqlx::query(&sql)
        .bind(filters.roles.as_deref())
        .bind(filters.query.as_deref())
        .bind(pagination.offset())
        .bind(pagination.limit())
        .fetch_all(pool)
        .await?;

    let total = total_count(&rows);
    let data = rows
        .iter()
        .map(User::from_row)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Page::from_search(data, total, &pagination))
}

/// Insert a user into the database, returning its ID.
pub async fn create_user(pool: &PgPool, user: &User) -> Result<i32, AppError> {
    let row = sqlx::query(
        r#"
        INSERT INTO users (created_at, email, role, name, unit, acclab)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id
        "#,
    )
    .bind(user.created_at)
    .bind(&user.email)
    .bind(user.role)
    .bind(&user.name)
    .bind(&user.unit)
    .bind(user.acclab)
    .fetch_one(pool)
    .await?;
    Ok(row.get("id"))
}

pub async fn read_user(pool: &PgPool, uid: i32) -> Result<Option<User>, AppError> {
    let user = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(uid)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

pub async fn read_user_by_email(pool: &PgPool, email: &str) -> Result<Option<User>, AppError> {
    let user = sqlx::query_as("SELECT * FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

/// Update a user's mutable fields, returning the ID when the user exists.
pub async fn update_user(pool: &PgPool, user: &User) -> Result<Option<i32>, AppError> {
    let row = sqlx::query(
        r#"
        UPDATE users
        SET role = $1, name = $2, unit = $3, acclab = $4
        WHERE email = $5
        RETURNING id
        "#,
    )
    .bind(user.role)
    .bind(&user.name)
    .bind(&user.unit)
    .bind(user.acclab)
    .bind(&user.email)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|r| r.get("id")))
}

/// Fetch user details for a list of IDs, ordered by name.
pub async fn users_by_ids(pool: &PgPool, ids: &[i32]) -> Result<Vec<User>, AppError> {
    if ids.is_empty() {
        return Ok(vec![]);
    }
    let users = sqlx::query_as("SELECT * FROM users WHERE id = ANY($1) ORDER BY name")
        .bind(ids)
        .fetch_all(pool)
        .await?;
    Ok(users)
}

/// Resolve emails to user IDs, silently skipping unknown addresses.
pub async fn resolve_email_ids(pool: &PgPool, emails: &[String]) -> Result<Vec<i32>, AppError> {
    if emails.is_empty() {
        return Ok(vec![]);
    }
    let ids = sqlx::query_scalar("SELECT id FROM users WHERE email = ANY($1)")
        .bind(emails)
        .fetch_all(pool)
        .await?;
    Ok(ids)
}

pub async fn user_exists(pool: &PgPool, uid: i32) -> Result<bool, AppError> {
    let exists = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
        .bind(uid)
        .fetch_one(pool)
        .await?;
    Ok(exists)
}

/// Emails of users who are part of the Accelerator Labs.
pub async fn get_acclab_users(pool: &PgPool) -> Result<Vec<String>, AppError> {
    let emails = sqlx::query_scalar("SELECT email FROM users WHERE acclab = TRUE")
        .fetch_all(pool)
        .await?;
    Ok(emails)
}

/// Emails of curators and admins, the default digest audience.
pub async fn get_staff_emails(pool: &PgPool) -> Result<Vec<String>, AppError> {
    let emails =
        sqlx::query_scalar("SELECT email FROM users WHERE role = ANY($1) ORDER BY email")
            .bind(vec!["Admin", "Curator"])
            .fetch_all(pool)
            .await?;
    Ok(emails)
}
