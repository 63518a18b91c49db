//! Read operations for the `locations` table.

use sqlx::PgPool;

use super::types::{LocationRow, PendingLocationRow};
use crate::DbError;

/// Returns all locations for an organization, ordered by `location_index`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_locations(
    pool: &PgPool,
    organization_id: i64,
) -> Result<Vec<LocationRow>, DbError> {
    let rows = sqlx::query_as::<_, LocationRow>(
        "SELECT id, organization_id, location_index, brand_name, location_type, \
                country, state, city, city_region, street, house_number, \
                is_paid_for, verification_status, decided_by, review_notes, decided_at, \
                created_at, updated_at \
         FROM locations \
         WHERE organization_id = $1 \
         ORDER BY location_index",
    )
    .bind(organization_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Returns a single location by its composite business key.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_location(
    pool: &PgPool,
    organization_id: i64,
    location_index: i32,
) -> Result<Option<LocationRow>, DbError> {
    let row = sqlx::query_as::<_, LocationRow>(
        "SELECT id, organization_id, location_index, brand_name, location_type, \
                country, state, city, city_region, street, house_number, \
                is_paid_for, verification_status, decided_by, review_notes, decided_at, \
                created_at, updated_at \
         FROM locations \
         WHERE organization_id = $1 AND location_index = $2",
    )
    .bind(organization_id)
    .bind(location_index)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Returns the verification queue: paid locations with no terminal decision.
///
/// Ordered by `created_at ASC, id ASC` so repeated reads are stable absent
/// mutation. Rejected locations never reappear here — they are tracked by the
/// rejections listing instead.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_pending_locations(pool: &PgPool) -> Result<Vec<PendingLocationRow>, DbError> {
    let rows = sqlx::query_as::<_, PendingLocationRow>(
        "SELECT l.id, o.public_id AS organization_public_id, o.name AS organization_name, \
                l.location_index, l.brand_name, l.city, l.state, l.country, \
                l.verification_status, l.created_at \
         FROM locations l \
         JOIN organizations o ON o.id = l.organization_id \
         WHERE l.is_paid_for = TRUE \
           AND (l.verification_status IS NULL OR l.verification_status = 'pending') \
         ORDER BY l.created_at ASC, l.id ASC",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
