//! Request/response types for the payment provider API.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Body for creating a checkout session covering one batch of locations.
#[derive(Debug, Clone, Serialize)]
pub struct NewCheckoutSession {
    /// Our reference for the transaction, generated before the provider call
    /// so verification is idempotent on our side.
    pub reference: String,
    pub email: String,
    pub amount: Decimal,
    pub currency: String,
}

/// A created checkout session: the hosted payment link the payer is sent to.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub reference: String,
    pub checkout_url: String,
}

/// Provider-side state of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionState {
    Pending,
    Settled,
    Failed,
}

/// Result of verifying a transaction by reference.
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionStatus {
    pub reference: String,
    pub state: TransactionState,
}

/// Top-level JSON envelope every provider response uses.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiEnvelope<T> {
    pub data: T,
}
