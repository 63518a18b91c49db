//! HTTP client for the transactional mail provider.
//!
//! One endpoint matters here: posting a rejection notice. The provider uses
//! the same JSON envelope conventions as the payment provider (`"status"`
//! field on every response), so the error handling mirrors it.

use std::time::Duration;

use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};

use crate::error::MailError;

/// Body for a rejection notice email.
///
/// The template lives on the provider side; we only supply the variables.
#[derive(Debug, Clone, Serialize)]
pub struct RejectionNotice {
    pub from: String,
    pub to: String,
    pub organization_name: String,
    pub brand_name: String,
    pub rejection_reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// The provider's receipt for an accepted message.
#[derive(Debug, Clone, Deserialize)]
pub struct SentMessage {
    pub message_id: String,
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    data: T,
}

/// Client for the transactional mail provider.
pub struct MailClient {
    client: Client,
    api_key: String,
    base_url: Url,
}

impl MailClient {
    /// Creates a new client for the provider at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`MailError::Http`] if the underlying `reqwest::Client` cannot
    /// be constructed, or [`MailError::ApiError`] if `base_url` is not a
    /// valid URL.
    pub fn new(base_url: &str, api_key: &str, timeout_secs: u64) -> Result<Self, MailError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("orgverify/0.1 (location-verification)")
            .build()?;

        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised)
            .map_err(|e| MailError::ApiError(format!("invalid base URL '{base_url}': {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.to_owned(),
            base_url,
        })
    }

    /// Sends one rejection notice.
    ///
    /// Not retried here: the caller tracks send state in the database and
    /// decides whether a failed send may be attempted again.
    ///
    /// # Errors
    ///
    /// - [`MailError::ApiError`] if the provider rejects the message.
    /// - [`MailError::Http`] on network failure or non-2xx HTTP status.
    /// - [`MailError::Deserialize`] if the response does not match the
    ///   expected shape.
    pub async fn send_rejection_notice(
        &self,
        notice: &RejectionNotice,
    ) -> Result<SentMessage, MailError> {
        let url = self.endpoint("messages")?;
        let response = self
            .client
            .post(url.clone())
            .bearer_auth(&self.api_key)
            .json(notice)
            .send()
            .await?;
        let body = Self::parse_body(url.as_str(), response).await?;
        Self::check_api_error(&body)?;

        let envelope: ApiEnvelope<SentMessage> =
            serde_json::from_value(body).map_err(|e| MailError::Deserialize {
                context: format!("send_rejection_notice(to={})", notice.to),
                source: e,
            })?;

        tracing::info!(
            message_id = %envelope.data.message_id,
            to = %notice.to,
            "rejection notice accepted by mail provider"
        );
        Ok(envelope.data)
    }

    fn endpoint(&self, path: &str) -> Result<Url, MailError> {
        self.base_url
            .join(path)
            .map_err(|e| MailError::ApiError(format!("invalid endpoint path '{path}': {e}")))
    }

    /// Asserts a 2xx HTTP status and parses the response body as JSON.
    async fn parse_body(
        context: &str,
        response: reqwest::Response,
    ) -> Result<serde_json::Value, MailError> {
        let response = response.error_for_status()?;
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| MailError::Deserialize {
            context: context.to_string(),
            source: e,
        })
    }

    /// Checks the top-level `"status"` field and returns an error if it
    /// indicates failure.
    fn check_api_error(body: &serde_json::Value) -> Result<(), MailError> {
        if body.get("status").and_then(serde_json::Value::as_str) == Some("error") {
            let msg = body
                .get("message")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            return Err(MailError::ApiError(msg));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_appends_to_base_url() {
        let client = MailClient::new("https://mail.example.com", "mk-test", 30).expect("client");
        let url = client.endpoint("messages").expect("endpoint");
        assert_eq!(url.as_str(), "https://mail.example.com/messages");
    }

    #[test]
    fn check_api_error_surfaces_provider_message() {
        let body = serde_json::json!({ "status": "error", "message": "suppressed recipient" });
        let err = MailClient::check_api_error(&body).unwrap_err();
        assert!(matches!(err, MailError::ApiError(ref m) if m == "suppressed recipient"));
    }

    #[test]
    fn rejection_notice_omits_empty_notes() {
        let notice = RejectionNotice {
            from: "no-reply@orgverify.example".to_owned(),
            to: "owner@example.com".to_owned(),
            organization_name: "Acme".to_owned(),
            brand_name: "Acme Cafe".to_owned(),
            rejection_reason: "Address could not be confirmed".to_owned(),
            notes: None,
        };
        let json = serde_json::to_value(&notice).expect("serialize");
        assert!(json.get("notes").is_none());
        assert_eq!(json["to"], "owner@example.com");
    }
}
