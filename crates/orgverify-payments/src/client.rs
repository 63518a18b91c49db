//! HTTP client for the payment provider's REST API.
//!
//! Wraps `reqwest` with provider-specific error handling, bearer-key auth,
//! and typed response deserialization. Every endpoint checks the `"status"`
//! field in the JSON envelope and surfaces API-level errors as
//! [`PaymentError::ApiError`].

use std::time::Duration;

use reqwest::{Client, Url};

use crate::error::PaymentError;
use crate::retry::retry_with_backoff;
use crate::types::{ApiEnvelope, CheckoutSession, NewCheckoutSession, TransactionStatus};

/// Client for the hosted payment provider.
///
/// Use [`PaymentClient::new`] with the configured base URL; tests point it at
/// a wiremock server.
pub struct PaymentClient {
    client: Client,
    secret_key: String,
    base_url: Url,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl PaymentClient {
    /// Creates a new client for the provider at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`PaymentError::ApiError`] if `base_url`
    /// is not a valid URL.
    pub fn new(
        base_url: &str,
        secret_key: &str,
        timeout_secs: u64,
        max_retries: u32,
        backoff_base_ms: u64,
    ) -> Result<Self, PaymentError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("orgverify/0.1 (location-verification)")
            .build()?;

        // Normalise: ensure the base URL ends with exactly one slash so that
        // Url::join appends path segments instead of replacing the last one.
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised)
            .map_err(|e| PaymentError::ApiError(format!("invalid base URL '{base_url}': {e}")))?;

        Ok(Self {
            client,
            secret_key: secret_key.to_owned(),
            base_url,
            max_retries,
            backoff_base_ms,
        })
    }

    /// Creates a hosted checkout session for one batch of unpaid locations.
    ///
    /// Never retried: a duplicate create could charge the payer twice.
    ///
    /// # Errors
    ///
    /// - [`PaymentError::ApiError`] if the provider rejects the session.
    /// - [`PaymentError::Http`] on network failure or non-2xx HTTP status.
    /// - [`PaymentError::Deserialize`] if the response does not match the
    ///   expected shape.
    pub async fn create_checkout_session(
        &self,
        session: &NewCheckoutSession,
    ) -> Result<CheckoutSession, PaymentError> {
        let url = self.endpoint("checkout/sessions")?;
        let response = self
            .client
            .post(url.clone())
            .bearer_auth(&self.secret_key)
            .json(session)
            .send()
            .await?;
        let body = Self::parse_body(url.as_str(), response).await?;
        Self::check_api_error(&body)?;

        let envelope: ApiEnvelope<CheckoutSession> =
            serde_json::from_value(body).map_err(|e| PaymentError::Deserialize {
                context: format!("create_checkout_session(reference={})", session.reference),
                source: e,
            })?;

        Ok(envelope.data)
    }

    /// Verifies a transaction by reference.
    ///
    /// Retried with back-off on transient failures — this path is idempotent
    /// on the provider side and ours.
    ///
    /// # Errors
    ///
    /// - [`PaymentError::ApiError`] if the provider returns an error status.
    /// - [`PaymentError::Http`] on network failure or non-2xx HTTP status.
    /// - [`PaymentError::Deserialize`] if the response does not match the
    ///   expected shape.
    pub async fn verify_transaction(
        &self,
        reference: &str,
    ) -> Result<TransactionStatus, PaymentError> {
        retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            self.verify_transaction_once(reference)
        })
        .await
    }

    async fn verify_transaction_once(
        &self,
        reference: &str,
    ) -> Result<TransactionStatus, PaymentError> {
        let url = self.endpoint(&format!("checkout/sessions/{reference}"))?;
        let response = self
            .client
            .get(url.clone())
            .bearer_auth(&self.secret_key)
            .send()
            .await?;
        let body = Self::parse_body(url.as_str(), response).await?;
        Self::check_api_error(&body)?;

        let envelope: ApiEnvelope<TransactionStatus> =
            serde_json::from_value(body).map_err(|e| PaymentError::Deserialize {
                context: format!("verify_transaction(reference={reference})"),
                source: e,
            })?;

        Ok(envelope.data)
    }

    fn endpoint(&self, path: &str) -> Result<Url, PaymentError> {
        self.base_url
            .join(path)
            .map_err(|e| PaymentError::ApiError(format!("invalid endpoint path '{path}': {e}")))
    }

    /// Asserts a 2xx HTTP status and parses the response body as JSON.
    async fn parse_body(
        context: &str,
        response: reqwest::Response,
    ) -> Result<serde_json::Value, PaymentError> {
        let response = response.error_for_status()?;
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| PaymentError::Deserialize {
            context: context.to_string(),
            source: e,
        })
    }

    /// Checks the top-level `"status"` field and returns an error if it
    /// indicates failure.
    fn check_api_error(body: &serde_json::Value) -> Result<(), PaymentError> {
        if body.get("status").and_then(serde_json::Value::as_str) == Some("error") {
            let msg = body
                .get("message")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            return Err(PaymentError::ApiError(msg));
        }
        Ok(())
    }
}
