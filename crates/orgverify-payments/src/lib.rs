//! HTTP client for the hosted payment provider.
//!
//! The provider exposes two operations this core needs: creating a checkout
//! session for a batch of unpaid locations (returns a hosted payment link)
//! and verifying a transaction by reference. The verify path is the only one
//! retried on transient failures — initialization must never be retried
//! blindly, to avoid duplicate charges.

mod client;
mod error;
mod retry;
mod types;

pub use client::PaymentClient;
pub use error::PaymentError;
pub use types::{CheckoutSession, NewCheckoutSession, TransactionState, TransactionStatus};
