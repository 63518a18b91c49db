//! Database operations for `location_rejections`: the rejected-locations
//! listing and the single-send email guard.
//!
//! The send guard works as claim/release: claiming flips `email_sent` with a
//! compare-and-swap so two concurrent senders cannot both win, and a failed
//! provider send releases the claim so the record stays retryable.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `location_rejections` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RejectionRow {
    pub id: i64,
    pub organization_id: i64,
    pub location_index: i32,
    pub rejected_by: String,
    pub rejection_reason: String,
    pub notes: Option<String>,
    pub rejected_at: DateTime<Utc>,
    pub email_sent: bool,
    pub email_sent_at: Option<DateTime<Utc>>,
}

/// A rejection joined with organization and location details for display.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RejectedLocationRow {
    pub organization_public_id: Uuid,
    pub organization_name: String,
    pub contact_email: String,
    pub location_index: i32,
    pub brand_name: String,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub rejected_by: String,
    pub rejection_reason: String,
    pub notes: Option<String>,
    pub rejected_at: DateTime<Utc>,
    pub email_sent: bool,
    pub email_sent_at: Option<DateTime<Utc>>,
}

/// A successfully claimed email send: everything the dispatcher needs to
/// compose the rejection notice.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RejectionEmailClaim {
    pub rejection_id: i64,
    pub recipient_email: String,
    pub organization_name: String,
    pub brand_name: String,
    pub rejection_reason: String,
    pub notes: Option<String>,
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Returns all rejection records with denormalized organization and location
/// info, newest first. Reflects the latest `email_sent` / `email_sent_at`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_rejected_locations(pool: &PgPool) -> Result<Vec<RejectedLocationRow>, DbError> {
    let rows = sqlx::query_as::<_, RejectedLocationRow>(
        "SELECT o.public_id AS organization_public_id, o.name AS organization_name, \
                o.contact_email, r.location_index, l.brand_name, l.city, l.state, l.country, \
                r.rejected_by, r.rejection_reason, r.notes, r.rejected_at, \
                r.email_sent, r.email_sent_at \
         FROM location_rejections r \
         JOIN organizations o ON o.id = r.organization_id \
         JOIN locations l ON l.organization_id = r.organization_id \
                         AND l.location_index = r.location_index \
         ORDER BY r.rejected_at DESC, r.id DESC",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Fetches a single rejection record by the composite business key.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_rejection(
    pool: &PgPool,
    organization_id: i64,
    location_index: i32,
) -> Result<Option<RejectionRow>, DbError> {
    let row = sqlx::query_as::<_, RejectionRow>(
        "SELECT id, organization_id, location_index, rejected_by, rejection_reason, \
                notes, rejected_at, email_sent, email_sent_at \
         FROM location_rejections \
         WHERE organization_id = $1 AND location_index = $2",
    )
    .bind(organization_id)
    .bind(location_index)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Claims the rejection email for a location: atomically flips `email_sent`
/// and returns the recipient and message fields.
///
/// Exactly one concurrent caller wins the claim; the rest get
/// [`DbError::RejectionAlreadySent`].
///
/// # Errors
///
/// - [`DbError::RejectionNotFound`] if no rejection record exists for the pair.
/// - [`DbError::RejectionAlreadySent`] if the email was already sent (or
///   claimed by a concurrent caller).
/// - [`DbError::Sqlx`] if the query fails.
pub async fn claim_rejection_email(
    pool: &PgPool,
    organization_id: i64,
    location_index: i32,
) -> Result<RejectionEmailClaim, DbError> {
    let claim = sqlx::query_as::<_, RejectionEmailClaim>(
        "UPDATE location_rejections r \
         SET email_sent = TRUE, email_sent_at = NOW() \
         FROM organizations o, locations l \
         WHERE o.id = r.organization_id \
           AND l.organization_id = r.organization_id \
           AND l.location_index = r.location_index \
           AND r.organization_id = $1 \
           AND r.location_index = $2 \
           AND r.email_sent = FALSE \
         RETURNING r.id AS rejection_id, o.contact_email AS recipient_email, \
                   o.name AS organization_name, l.brand_name, \
                   r.rejection_reason, r.notes",
    )
    .bind(organization_id)
    .bind(location_index)
    .fetch_optional(pool)
    .await?;

    match claim {
        Some(claim) => Ok(claim),
        None => match get_rejection(pool, organization_id, location_index).await? {
            None => Err(DbError::RejectionNotFound { location_index }),
            Some(_) => Err(DbError::RejectionAlreadySent { location_index }),
        },
    }
}

/// Releases a claim after the provider send failed, so the record can be
/// retried. Resets both `email_sent` and `email_sent_at`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn release_rejection_email_claim(
    pool: &PgPool,
    rejection_id: i64,
) -> Result<(), DbError> {
    sqlx::query(
        "UPDATE location_rejections \
         SET email_sent = FALSE, email_sent_at = NULL \
         WHERE id = $1",
    )
    .bind(rejection_id)
    .execute(pool)
    .await?;

    Ok(())
}
