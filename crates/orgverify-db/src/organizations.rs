//! Database operations for the `organizations` table.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// A row from the `organizations` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrganizationRow {
    pub id: i64,
    pub public_id: Uuid,
    pub name: String,
    pub contact_email: String,
    pub business_type: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Creates a new organization and returns the full inserted row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_organization(
    pool: &PgPool,
    name: &str,
    contact_email: &str,
    business_type: Option<&str>,
) -> Result<OrganizationRow, DbError> {
    let public_id = Uuid::new_v4();

    let row = sqlx::query_as::<_, OrganizationRow>(
        "INSERT INTO organizations (public_id, name, contact_email, business_type) \
         VALUES ($1, $2, $3, $4) \
         RETURNING id, public_id, name, contact_email, business_type, created_at, updated_at",
    )
    .bind(public_id)
    .bind(name)
    .bind(contact_email)
    .bind(business_type)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Returns an organization by its public UUID, or `None` if not found.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_organization_by_public_id(
    pool: &PgPool,
    public_id: Uuid,
) -> Result<Option<OrganizationRow>, DbError> {
    let row = sqlx::query_as::<_, OrganizationRow>(
        "SELECT id, public_id, name, contact_email, business_type, created_at, updated_at \
         FROM organizations \
         WHERE public_id = $1",
    )
    .bind(public_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}
