//! Integration tests for `PaymentClient` using wiremock HTTP mocks.

use orgverify_payments::{NewCheckoutSession, PaymentClient, PaymentError, TransactionState};
use rust_decimal::Decimal;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_client(base_url: &str) -> PaymentClient {
    PaymentClient::new(base_url, "sk-test", 30, 3, 0)
        .expect("client construction should not fail")
}

#[tokio::test]
async fn create_checkout_session_returns_hosted_link() {
    let server = MockServer::start().await;

    let body = serde_json::json!({
        "status": "ok",
        "data": {
            "reference": "ref-123",
            "checkout_url": "https://pay.example.com/c/ref-123"
        }
    });

    Mock::given(method("POST"))
        .and(path("/checkout/sessions"))
        .and(header("authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let session = client
        .create_checkout_session(&NewCheckoutSession {
            reference: "ref-123".to_string(),
            email: "owner@example.com".to_string(),
            amount: Decimal::new(20000, 2),
            currency: "USD".to_string(),
        })
        .await
        .expect("should parse session");

    assert_eq!(session.reference, "ref-123");
    assert_eq!(session.checkout_url, "https://pay.example.com/c/ref-123");
}

#[tokio::test]
async fn create_checkout_session_surfaces_provider_error() {
    let server = MockServer::start().await;

    let body = serde_json::json!({
        "status": "error",
        "message": "invalid secret key"
    });

    Mock::given(method("POST"))
        .and(path("/checkout/sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let err = client
        .create_checkout_session(&NewCheckoutSession {
            reference: "ref-err".to_string(),
            email: "owner@example.com".to_string(),
            amount: Decimal::new(10000, 2),
            currency: "USD".to_string(),
        })
        .await
        .unwrap_err();

    assert!(
        matches!(err, PaymentError::ApiError(ref m) if m == "invalid secret key"),
        "expected ApiError, got: {err:?}"
    );
}

#[tokio::test]
async fn verify_transaction_parses_settled_state() {
    let server = MockServer::start().await;

    let body = serde_json::json!({
        "status": "ok",
        "data": { "reference": "ref-42", "state": "settled" }
    });

    Mock::given(method("GET"))
        .and(path("/checkout/sessions/ref-42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let status = client
        .verify_transaction("ref-42")
        .await
        .expect("should parse status");

    assert_eq!(status.reference, "ref-42");
    assert_eq!(status.state, TransactionState::Settled);
}

#[tokio::test]
async fn verify_transaction_retries_transient_server_errors() {
    let server = MockServer::start().await;

    // First two attempts fail with 503, then the provider recovers.
    Mock::given(method("GET"))
        .and(path("/checkout/sessions/ref-retry"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;

    let body = serde_json::json!({
        "status": "ok",
        "data": { "reference": "ref-retry", "state": "pending" }
    });
    Mock::given(method("GET"))
        .and(path("/checkout/sessions/ref-retry"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let status = client
        .verify_transaction("ref-retry")
        .await
        .expect("should succeed after retries");

    assert_eq!(status.state, TransactionState::Pending);
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn verify_transaction_maps_failed_state() {
    let server = MockServer::start().await;

    let body = serde_json::json!({
        "status": "ok",
        "data": { "reference": "ref-f", "state": "failed" }
    });

    Mock::given(method("GET"))
        .and(path("/checkout/sessions/ref-f"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let status = client.verify_transaction("ref-f").await.expect("parse");
    assert_eq!(status.state, TransactionState::Failed);
}
