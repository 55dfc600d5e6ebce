//! Reading choice lists for form fields.

use sqlx::PgPool;

use crate::errors::AppError;

/// Unit names from a predefined list.
pub async fn get_unit_names(pool: &PgPool) -> Result<Vec<String>, AppError> {
    let names = sqlx::query_scalar("SELECT name FROM units ORDER BY name")
        .fetch_all(pool)
        .await?;
    Ok(names)
}

/// Distinct unit regions.
pub async fn get_unit_regions(pool: &PgPool) -> Result<Vec<String>, AppError> {
    let regions = sqlx::query_scalar("SELECT DISTINCT region FROM units ORDER BY region")
        .fetch_all(pool)
        .await?;
    Ok(regions)
}

/// Location names covering geographic regions, countries and territories.
/// Not ordered so that regions appear first.
pub async fn get_location_names(pool: &PgPool) -> Result<Vec<String>, AppError> {
    let names = sqlx::query_scalar("SELECT name FROM locations")
        .fetch_all(pool)
        .await?;
    Ok(names)
}
