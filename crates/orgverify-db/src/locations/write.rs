//! Write operations for the `locations` table: intake and the approve/reject
//! decision transitions.
//!
//! Both decisions are single compare-and-swap `UPDATE` statements gated on
//! the location still being undecided. Concurrent decisions on the same
//! location serialize through the row update: the loser's predicate matches
//! zero rows and surfaces as [`DbError::InvalidLocationTransition`].

use sqlx::PgPool;

use super::read::get_location;
use super::types::{LocationRow, NewLocation};
use crate::organizations::OrganizationRow;
use crate::rejections::RejectionRow;
use crate::DbError;

/// Adds a location to the end of an organization's location list.
///
/// The location index is the next free slot
/// (`MAX(location_index) + 1`, starting at 0). A new location always starts
/// unpaid with no verification status, regardless of how far its siblings
/// have progressed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails (including the unique
/// violation when two concurrent inserts race for the same index).
pub async fn insert_location(
    pool: &PgPool,
    organization_id: i64,
    location: &NewLocation,
) -> Result<LocationRow, DbError> {
    let row = sqlx::query_as::<_, LocationRow>(
        "INSERT INTO locations \
           (organization_id, location_index, brand_name, location_type, \
            country, state, city, city_region, street, house_number) \
         VALUES ($1, \
                 (SELECT COALESCE(MAX(location_index) + 1, 0) \
                  FROM locations WHERE organization_id = $1), \
                 $2, $3, $4, $5, $6, $7, $8, $9) \
         RETURNING id, organization_id, location_index, brand_name, location_type, \
                   country, state, city, city_region, street, house_number, \
                   is_paid_for, verification_status, decided_by, review_notes, decided_at, \
                   created_at, updated_at",
    )
    .bind(organization_id)
    .bind(&location.brand_name)
    .bind(&location.location_type)
    .bind(&location.country)
    .bind(&location.state)
    .bind(&location.city)
    .bind(&location.city_region)
    .bind(&location.street)
    .bind(&location.house_number)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Marks a pending location as verified.
///
/// Precondition: the location is paid for and has no terminal decision.
/// Records the acting admin and optional review notes.
///
/// # Errors
///
/// - [`DbError::LocationNotFound`] if no such location exists.
/// - [`DbError::InvalidLocationTransition`] if the location is unpaid or
///   already decided.
/// - [`DbError::Sqlx`] if the query fails.
pub async fn approve_location(
    pool: &PgPool,
    org: &OrganizationRow,
    location_index: i32,
    approved_by: &str,
    notes: Option<&str>,
) -> Result<LocationRow, DbError> {
    let row = sqlx::query_as::<_, LocationRow>(
        "UPDATE locations \
         SET verification_status = 'verified', \
             decided_by = $3, \
             review_notes = $4, \
             decided_at = NOW(), \
             updated_at = NOW() \
         WHERE organization_id = $1 \
           AND location_index = $2 \
           AND is_paid_for = TRUE \
           AND (verification_status IS NULL OR verification_status = 'pending') \
         RETURNING id, organization_id, location_index, brand_name, location_type, \
                   country, state, city, city_region, street, house_number, \
                   is_paid_for, verification_status, decided_by, review_notes, decided_at, \
                   created_at, updated_at",
    )
    .bind(org.id)
    .bind(location_index)
    .bind(approved_by)
    .bind(notes)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => Ok(row),
        None => Err(transition_failure(pool, org, location_index).await),
    }
}

/// Marks a pending location as rejected and opens its rejection record.
///
/// The status flip and the `location_rejections` insert land in one database
/// transaction; a lost decision race rolls back both. The rejection record
/// starts with `email_sent = FALSE` so the notification dispatcher can pick
/// it up.
///
/// The rejection reason is validated (non-blank) at the API boundary before
/// this is called.
///
/// # Errors
///
/// - [`DbError::LocationNotFound`] if no such location exists.
/// - [`DbError::InvalidLocationTransition`] if the location is unpaid or
///   already decided.
/// - [`DbError::Sqlx`] if any statement fails.
pub async fn reject_location(
    pool: &PgPool,
    org: &OrganizationRow,
    location_index: i32,
    rejected_by: &str,
    rejection_reason: &str,
    notes: Option<&str>,
) -> Result<(LocationRow, RejectionRow), DbError> {
    let mut tx = pool.begin().await?;

    let row = sqlx::query_as::<_, LocationRow>(
        "UPDATE locations \
         SET verification_status = 'rejected', \
             decided_by = $3, \
             review_notes = $4, \
             decided_at = NOW(), \
             updated_at = NOW() \
         WHERE organization_id = $1 \
           AND location_index = $2 \
           AND is_paid_for = TRUE \
           AND (verification_status IS NULL OR verification_status = 'pending') \
         RETURNING id, organization_id, location_index, brand_name, location_type, \
                   country, state, city, city_region, street, house_number, \
                   is_paid_for, verification_status, decided_by, review_notes, decided_at, \
                   created_at, updated_at",
    )
    .bind(org.id)
    .bind(location_index)
    .bind(rejected_by)
    .bind(notes)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(location) = row else {
        // Dropping the transaction rolls it back.
        drop(tx);
        return Err(transition_failure(pool, org, location_index).await);
    };

    let rejection = sqlx::query_as::<_, RejectionRow>(
        "INSERT INTO location_rejections \
           (organization_id, location_index, rejected_by, rejection_reason, notes) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING id, organization_id, location_index, rejected_by, rejection_reason, \
                   notes, rejected_at, email_sent, email_sent_at",
    )
    .bind(org.id)
    .bind(location_index)
    .bind(rejected_by)
    .bind(rejection_reason)
    .bind(notes)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok((location, rejection))
}

/// Re-reads the row after a failed compare-and-swap to report why the
/// transition was refused.
async fn transition_failure(
    pool: &PgPool,
    org: &OrganizationRow,
    location_index: i32,
) -> DbError {
    match get_location(pool, org.id, location_index).await {
        Ok(None) => DbError::LocationNotFound {
            organization_id: org.public_id,
            location_index,
        },
        Ok(Some(row)) => {
            let current = if row.is_paid_for {
                row.verification_status
                    .unwrap_or_else(|| "pending".to_string())
            } else {
                "unpaid".to_string()
            };
            DbError::InvalidLocationTransition {
                location_index,
                current,
            }
        }
        Err(e) => e,
    }
}
