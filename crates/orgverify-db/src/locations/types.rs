//! Row types for the `locations` table.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Input record for adding a location to an organization's list.
///
/// The location index is assigned by the insert itself (next free slot in the
/// organization's list), so it is not part of the input.
#[derive(Debug, Clone)]
pub struct NewLocation {
    pub brand_name: String,
    /// `headquarters` or `branch`.
    pub location_type: String,
    pub country: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
    pub city_region: Option<String>,
    pub street: Option<String>,
    pub house_number: Option<String>,
}

/// A row from the `locations` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LocationRow {
    pub id: i64,
    pub organization_id: i64,
    pub location_index: i32,
    pub brand_name: String,
    pub location_type: String,
    pub country: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
    pub city_region: Option<String>,
    pub street: Option<String>,
    pub house_number: Option<String>,
    pub is_paid_for: bool,
    /// `pending`, `verified`, `rejected`, or NULL before payment settles.
    pub verification_status: Option<String>,
    pub decided_by: Option<String>,
    pub review_notes: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A verification-queue entry: a paid, undecided location joined with its
/// organization for display.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PendingLocationRow {
    pub id: i64,
    pub organization_public_id: Uuid,
    pub organization_name: String,
    pub location_index: i32,
    pub brand_name: String,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub verification_status: Option<String>,
    pub created_at: DateTime<Utc>,
}
