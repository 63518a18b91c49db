//! Database operations for `payment_transactions` and their location batches.
//!
//! A transaction snapshots the set of unpaid locations it covers at
//! initialization time (`payment_transaction_locations`), so settling it later
//! flips exactly that batch — locations added afterwards belong to the next
//! batch.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// Payment-gate check: does this organization owe anything before its
/// locations can enter verification?
#[derive(Debug, Clone, Copy, sqlx::FromRow)]
pub struct PaymentCheckResult {
    pub unpaid_locations: i64,
    pub total_locations: i64,
}

impl PaymentCheckResult {
    #[must_use]
    pub fn payment_required(&self) -> bool {
        self.unpaid_locations > 0
    }
}

/// A row from the `payment_transactions` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PaymentTransactionRow {
    pub id: i64,
    pub public_id: Uuid,
    pub organization_id: i64,
    pub provider_reference: String,
    pub payer_email: String,
    pub amount: Decimal,
    pub currency: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}

/// Result of [`settle_payment_transaction`].
#[derive(Debug, Clone, Copy)]
pub struct SettleOutcome {
    /// `true` when the transaction was already settled and nothing was
    /// re-mutated (idempotent repeat).
    pub already_settled: bool,
    /// Locations flipped to paid by this call. Zero on an idempotent repeat.
    pub locations_paid: u64,
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Counts an organization's unpaid and total locations. Read-only.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn check_payment_required(
    pool: &PgPool,
    organization_id: i64,
) -> Result<PaymentCheckResult, DbError> {
    let row = sqlx::query_as::<_, PaymentCheckResult>(
        "SELECT COUNT(*) FILTER (WHERE is_paid_for = FALSE) AS unpaid_locations, \
                COUNT(*) AS total_locations \
         FROM locations \
         WHERE organization_id = $1",
    )
    .bind(organization_id)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Records an initialized payment transaction and snapshots its batch: every
/// currently-unpaid location of the organization.
///
/// The insert and the batch snapshot land in one database transaction.
///
/// # Errors
///
/// - [`DbError::NothingToPay`] if the organization has no unpaid locations
///   (the whole transaction is rolled back).
/// - [`DbError::Sqlx`] if any statement fails.
pub async fn create_payment_transaction(
    pool: &PgPool,
    organization_id: i64,
    provider_reference: &str,
    payer_email: &str,
    amount: Decimal,
    currency: &str,
) -> Result<(PaymentTransactionRow, u64), DbError> {
    let public_id = Uuid::new_v4();
    let mut tx = pool.begin().await?;

    let row = sqlx::query_as::<_, PaymentTransactionRow>(
        "INSERT INTO payment_transactions \
           (public_id, organization_id, provider_reference, payer_email, amount, currency) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         RETURNING id, public_id, organization_id, provider_reference, payer_email, \
                   amount, currency, status, created_at, settled_at",
    )
    .bind(public_id)
    .bind(organization_id)
    .bind(provider_reference)
    .bind(payer_email)
    .bind(amount)
    .bind(currency)
    .fetch_one(&mut *tx)
    .await?;

    let covered = sqlx::query(
        "INSERT INTO payment_transaction_locations (transaction_id, location_id) \
         SELECT $1, id FROM locations \
         WHERE organization_id = $2 AND is_paid_for = FALSE",
    )
    .bind(row.id)
    .bind(organization_id)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if covered == 0 {
        drop(tx);
        return Err(DbError::NothingToPay);
    }

    tx.commit().await?;

    Ok((row, covered))
}

/// Fetches a transaction by its provider reference.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_transaction_by_reference(
    pool: &PgPool,
    provider_reference: &str,
) -> Result<Option<PaymentTransactionRow>, DbError> {
    let row = sqlx::query_as::<_, PaymentTransactionRow>(
        "SELECT id, public_id, organization_id, provider_reference, payer_email, \
                amount, currency, status, created_at, settled_at \
         FROM payment_transactions \
         WHERE provider_reference = $1",
    )
    .bind(provider_reference)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Settles a transaction and flips `is_paid_for` for its batch.
///
/// Idempotent: the status flip is a compare-and-swap on
/// `status = 'initialized'`, so a repeated call with an already-settled
/// reference re-mutates nothing and reports `already_settled`. Locations are
/// only ever flipped unpaid → paid; the entering batch gets
/// `verification_status = 'pending'`.
///
/// # Errors
///
/// - [`DbError::TransactionNotFound`] if no transaction has this reference.
/// - [`DbError::InvalidTransactionState`] if the transaction previously
///   failed and cannot settle.
/// - [`DbError::Sqlx`] if any statement fails.
pub async fn settle_payment_transaction(
    pool: &PgPool,
    provider_reference: &str,
) -> Result<SettleOutcome, DbError> {
    let mut tx = pool.begin().await?;

    let settled_id: Option<i64> = sqlx::query_scalar(
        "UPDATE payment_transactions \
         SET status = 'settled', settled_at = NOW() \
         WHERE provider_reference = $1 AND status = 'initialized' \
         RETURNING id",
    )
    .bind(provider_reference)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(transaction_id) = settled_id else {
        drop(tx);
        let existing = get_transaction_by_reference(pool, provider_reference)
            .await?
            .ok_or_else(|| DbError::TransactionNotFound(provider_reference.to_string()))?;
        if existing.status == "settled" {
            return Ok(SettleOutcome {
                already_settled: true,
                locations_paid: 0,
            });
        }
        return Err(DbError::InvalidTransactionState {
            reference: provider_reference.to_string(),
            current: existing.status,
        });
    };

    let locations_paid = sqlx::query(
        "UPDATE locations \
         SET is_paid_for = TRUE, \
             verification_status = COALESCE(verification_status, 'pending'), \
             updated_at = NOW() \
         WHERE id IN (SELECT location_id FROM payment_transaction_locations \
                      WHERE transaction_id = $1) \
           AND is_paid_for = FALSE",
    )
    .bind(transaction_id)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    tx.commit().await?;

    Ok(SettleOutcome {
        already_settled: false,
        locations_paid,
    })
}

/// Marks a transaction as failed after the provider reported a terminal
/// failure. Leaves every location untouched.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn mark_payment_failed(pool: &PgPool, provider_reference: &str) -> Result<(), DbError> {
    sqlx::query(
        "UPDATE payment_transactions \
         SET status = 'failed' \
         WHERE provider_reference = $1 AND status = 'initialized'",
    )
    .bind(provider_reference)
    .execute(pool)
    .await?;

    Ok(())
}
