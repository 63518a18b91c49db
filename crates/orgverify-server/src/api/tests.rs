use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::response::IntoResponse;
use axum::Router;
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::*;

// ---------------------------------------------------------------------------
// Wire-format unit tests (no DB)
// ---------------------------------------------------------------------------

#[test]
fn api_error_state_transition_codes_map_to_conflict() {
    for code in ["invalid_state_transition", "nothing_to_pay", "already_sent"] {
        let response = ApiError::new("req-1", code, "refused").into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT, "code {code}");
    }
}

#[test]
fn api_error_provider_codes_map_to_bad_gateway() {
    for code in ["payment_provider_error", "mail_provider_error"] {
        let response = ApiError::new("req-1", code, "upstream failed").into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY, "code {code}");
    }
}

#[test]
fn api_error_validation_error_maps_to_bad_request() {
    let response = ApiError::new("req-1", "validation_error", "invalid input").into_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[test]
fn map_db_error_carries_state_machine_codes() {
    let err = orgverify_db::DbError::InvalidLocationTransition {
        location_index: 2,
        current: "verified".to_string(),
    };
    let api_err = map_db_error("req-1".to_string(), &err);
    assert_eq!(api_err.error.code, "invalid_state_transition");

    let err = orgverify_db::DbError::RejectionAlreadySent { location_index: 0 };
    let api_err = map_db_error("req-1".to_string(), &err);
    assert_eq!(api_err.error.code, "already_sent");

    let err = orgverify_db::DbError::NothingToPay;
    let api_err = map_db_error("req-1".to_string(), &err);
    assert_eq!(api_err.error.code, "nothing_to_pay");

    let org_id = Uuid::new_v4();
    let err = orgverify_db::DbError::OrganizationNotFound(org_id);
    let api_err = map_db_error("req-1".to_string(), &err);
    assert_eq!(api_err.error.code, "not_found");
    assert!(api_err.error.message.contains(&org_id.to_string()));
}

#[test]
fn require_non_blank_trims_and_rejects_whitespace() {
    assert_eq!(require_non_blank("r", "f", "  ok  ").expect("valid"), "ok");
    assert!(require_non_blank("r", "f", "   ").is_err());
    assert!(require_non_blank("r", "f", "").is_err());
}

// ---------------------------------------------------------------------------
// Route test harness
// ---------------------------------------------------------------------------

fn test_state(pool: sqlx::PgPool, payment_url: &str, mail_url: &str) -> AppState {
    let payments = orgverify_payments::PaymentClient::new(payment_url, "sk-test", 5, 0, 0)
        .expect("payment client");
    let mailer = orgverify_mailer::MailClient::new(mail_url, "mk-test", 5).expect("mail client");
    AppState {
        pool,
        payments: Arc::new(payments),
        mailer: Arc::new(mailer),
        location_fee: Decimal::new(10000, 2), // 100.00
        currency: "USD".to_string(),
        mail_sender: "no-reply@orgverify.example".to_string(),
    }
}

fn test_app(state: AppState) -> Router {
    std::env::remove_var("ORGVERIFY_API_KEYS");
    let auth = crate::middleware::AuthState::from_env(true).expect("auth");
    build_app(state, auth, default_rate_limit_state())
}

/// App wired to unreachable providers, for routes that never call out.
fn offline_app(pool: sqlx::PgPool) -> Router {
    test_app(test_state(pool, "http://127.0.0.1:9", "http://127.0.0.1:9"))
}

async fn send_get(app: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(uri)
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    let json = serde_json::from_slice(&bytes).expect("json parse");
    (status, json)
}

async fn send_post(
    app: &Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .expect("request"),
        )
        .await
        .expect("response");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    let json = serde_json::from_slice(&bytes).expect("json parse");
    (status, json)
}

// ---------------------------------------------------------------------------
// Seeding helpers
// ---------------------------------------------------------------------------

async fn seed_organization(pool: &sqlx::PgPool, name: &str) -> orgverify_db::OrganizationRow {
    orgverify_db::create_organization(pool, name, "owner@example.com", Some("retail"))
        .await
        .expect("seed organization")
}

async fn seed_location(
    pool: &sqlx::PgPool,
    org: &orgverify_db::OrganizationRow,
    brand: &str,
) -> orgverify_db::LocationRow {
    orgverify_db::insert_location(
        pool,
        org.id,
        &orgverify_db::NewLocation {
            brand_name: brand.to_string(),
            location_type: "branch".to_string(),
            country: Some("DE".to_string()),
            state: None,
            city: Some("Berlin".to_string()),
            city_region: None,
            street: Some("Unter den Linden".to_string()),
            house_number: Some("1".to_string()),
        },
    )
    .await
    .expect("seed location")
}

/// Shortcut past the payment flow: flip a location straight to paid/pending.
async fn mark_paid(pool: &sqlx::PgPool, location_id: i64) {
    sqlx::query(
        "UPDATE locations \
         SET is_paid_for = TRUE, verification_status = 'pending' \
         WHERE id = $1",
    )
    .bind(location_id)
    .execute(pool)
    .await
    .expect("mark paid");
}

// ---------------------------------------------------------------------------
// Intake and projection
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn create_organization_returns_created(pool: sqlx::PgPool) {
    let app = offline_app(pool);
    let (status, json) = send_post(
        &app,
        "/api/v1/organizations",
        &serde_json::json!({
            "name": "Acme Holdings",
            "contact_email": "owner@acme.example",
            "business_type": "retail"
        }),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["data"]["name"].as_str(), Some("Acme Holdings"));
    assert!(Uuid::parse_str(json["data"]["id"].as_str().expect("id")).is_ok());
}

#[sqlx::test(migrations = "../../migrations")]
async fn create_organization_rejects_blank_name(pool: sqlx::PgPool) {
    let app = offline_app(pool);
    let (status, json) = send_post(
        &app,
        "/api/v1/organizations",
        &serde_json::json!({ "name": "   ", "contact_email": "owner@acme.example" }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"].as_str(), Some("validation_error"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn new_location_projects_pending_payment(pool: sqlx::PgPool) {
    let org = seed_organization(&pool, "Projection Org").await;
    let app = offline_app(pool);

    let (status, json) = send_post(
        &app,
        &format!("/api/v1/organizations/{}/locations", org.public_id),
        &serde_json::json!({ "brand_name": "Acme Cafe", "location_type": "branch" }),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["data"]["location_index"].as_i64(), Some(0));
    assert_eq!(json["data"]["is_paid_for"].as_bool(), Some(false));
    assert_eq!(
        json["data"]["display_status"].as_str(),
        Some("Pending Payment")
    );
}

#[sqlx::test(migrations = "../../migrations")]
async fn list_locations_projects_every_stage(pool: sqlx::PgPool) {
    let org = seed_organization(&pool, "Stages Org").await;
    let unpaid = seed_location(&pool, &org, "Unpaid Branch").await;
    let pending = seed_location(&pool, &org, "Pending Branch").await;
    let verified = seed_location(&pool, &org, "Verified Branch").await;
    let rejected = seed_location(&pool, &org, "Rejected Branch").await;

    mark_paid(&pool, pending.id).await;
    mark_paid(&pool, verified.id).await;
    mark_paid(&pool, rejected.id).await;
    orgverify_db::approve_location(&pool, &org, verified.location_index, "admin", None)
        .await
        .expect("approve");
    orgverify_db::reject_location(
        &pool,
        &org,
        rejected.location_index,
        "admin",
        "bad address",
        None,
    )
    .await
    .expect("reject");

    let app = offline_app(pool);
    let (status, json) = send_get(
        &app,
        &format!("/api/v1/organizations/{}/locations", org.public_id),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let data = json["data"].as_array().expect("data array");
    assert_eq!(data.len(), 4);
    let status_of = |index: i64| {
        data.iter()
            .find(|r| r["location_index"].as_i64() == Some(index))
            .and_then(|r| r["display_status"].as_str())
            .map(ToOwned::to_owned)
    };
    assert_eq!(
        status_of(i64::from(unpaid.location_index)).as_deref(),
        Some("Pending Payment")
    );
    assert_eq!(
        status_of(i64::from(pending.location_index)).as_deref(),
        Some("Pending Verification")
    );
    assert_eq!(
        status_of(i64::from(verified.location_index)).as_deref(),
        Some("Verified")
    );
    assert_eq!(
        status_of(i64::from(rejected.location_index)).as_deref(),
        Some("Rejected")
    );
}

#[sqlx::test(migrations = "../../migrations")]
async fn location_index_unique_violation_maps_to_conflict(pool: sqlx::PgPool) {
    let org = seed_organization(&pool, "Race Org").await;
    seed_location(&pool, &org, "Branch A").await; // takes index 0

    // Force the collision the index-assignment insert can lose under
    // concurrency.
    let err = sqlx::query(
        "INSERT INTO locations (organization_id, location_index, brand_name, location_type) \
         VALUES ($1, 0, 'Duplicate Branch', 'branch')",
    )
    .bind(org.id)
    .execute(&pool)
    .await
    .expect_err("duplicate index must violate the unique constraint");

    let api_err = super::organizations::map_location_conflict(
        "req-1",
        &orgverify_db::DbError::Sqlx(err),
    );
    assert_eq!(api_err.error.code, "conflict");
    assert_eq!(
        api_err.into_response().status(),
        StatusCode::CONFLICT
    );
}

// ---------------------------------------------------------------------------
// Payment gate
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn payment_status_counts_unpaid_locations(pool: sqlx::PgPool) {
    let org = seed_organization(&pool, "Gate Org").await;
    seed_location(&pool, &org, "Branch A").await;
    let paid = seed_location(&pool, &org, "Branch B").await;
    mark_paid(&pool, paid.id).await;

    let app = offline_app(pool);
    let (status, json) = send_get(
        &app,
        &format!("/api/v1/organizations/{}/payment-status", org.public_id),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["payment_required"].as_bool(), Some(true));
    assert_eq!(json["data"]["unpaid_locations"].as_i64(), Some(1));
    assert_eq!(json["data"]["total_locations"].as_i64(), Some(2));
}

#[sqlx::test(migrations = "../../migrations")]
async fn initialize_payment_with_nothing_unpaid_conflicts(pool: sqlx::PgPool) {
    let org = seed_organization(&pool, "Paid-Up Org").await;
    let location = seed_location(&pool, &org, "Paid Branch").await;
    mark_paid(&pool, location.id).await;

    let app = offline_app(pool);
    let (status, json) = send_post(
        &app,
        &format!("/api/v1/organizations/{}/payments", org.public_id),
        &serde_json::json!({}),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"]["code"].as_str(), Some("nothing_to_pay"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn payment_flow_settles_batch_and_is_idempotent(pool: sqlx::PgPool) {
    let payment_server = MockServer::start().await;
    let org = seed_organization(&pool, "Flow Org").await;
    seed_location(&pool, &org, "Branch A").await;
    seed_location(&pool, &org, "Branch B").await;

    Mock::given(method("POST"))
        .and(path("/checkout/sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "ok",
            "data": { "reference": "ignored", "checkout_url": "https://pay.example/c/1" }
        })))
        .mount(&payment_server)
        .await;

    let app = test_app(test_state(
        pool.clone(),
        &payment_server.uri(),
        "http://127.0.0.1:9",
    ));

    let (status, json) = send_post(
        &app,
        &format!("/api/v1/organizations/{}/payments", org.public_id),
        &serde_json::json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["data"]["locations_covered"].as_u64(), Some(2));
    assert_eq!(json["data"]["amount"].as_str(), Some("200.00"));
    let reference = json["data"]["provider_reference"]
        .as_str()
        .expect("reference")
        .to_owned();

    Mock::given(method("GET"))
        .and(path_regex(r"^/checkout/sessions/.+$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "ok",
            "data": { "reference": reference, "state": "settled" }
        })))
        .mount(&payment_server)
        .await;

    let (status, json) = send_post(
        &app,
        "/api/v1/payments/verify",
        &serde_json::json!({ "provider_reference": reference }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["status"].as_str(), Some("settled"));
    assert_eq!(json["data"]["already_settled"].as_bool(), Some(false));
    assert_eq!(json["data"]["locations_paid"].as_u64(), Some(2));

    // Re-verifying the same reference re-mutates nothing.
    let (status, json) = send_post(
        &app,
        "/api/v1/payments/verify",
        &serde_json::json!({ "provider_reference": reference }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["already_settled"].as_bool(), Some(true));
    assert_eq!(json["data"]["locations_paid"].as_u64(), Some(0));

    // Both locations now await verification.
    let (_, json) = send_get(
        &app,
        &format!("/api/v1/organizations/{}/locations", org.public_id),
    )
    .await;
    for row in json["data"].as_array().expect("data array") {
        assert_eq!(row["display_status"].as_str(), Some("Pending Verification"));
    }
}

#[sqlx::test(migrations = "../../migrations")]
async fn initialize_payment_provider_failure_names_the_operation(pool: sqlx::PgPool) {
    let org = seed_organization(&pool, "Outage Org").await;
    seed_location(&pool, &org, "Branch A").await;

    // Provider is unreachable, so session creation fails after the
    // transaction row is recorded.
    let app = offline_app(pool.clone());
    let (status, json) = send_post(
        &app,
        &format!("/api/v1/organizations/{}/payments", org.public_id),
        &serde_json::json!({}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(
        json["error"]["code"].as_str(),
        Some("payment_provider_error")
    );
    let message = json["error"]["message"].as_str().expect("message");
    assert!(
        message.contains(&org.public_id.to_string()),
        "message must name the organization, got: {message}"
    );

    // The dangling transaction is closed out so a later initialize starts
    // fresh.
    let dangling: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM payment_transactions \
         WHERE organization_id = $1 AND status = 'initialized'",
    )
    .bind(org.id)
    .fetch_one(&pool)
    .await
    .expect("count");
    assert_eq!(dangling, 0);
}

#[sqlx::test(migrations = "../../migrations")]
async fn verify_unknown_reference_returns_404(pool: sqlx::PgPool) {
    let app = offline_app(pool);
    let (status, json) = send_post(
        &app,
        "/api/v1/payments/verify",
        &serde_json::json!({ "provider_reference": "no-such-ref" }),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["code"].as_str(), Some("not_found"));
}

// ---------------------------------------------------------------------------
// Verification queue and decisions
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn pending_queue_is_oldest_first_and_stable(pool: sqlx::PgPool) {
    let org = seed_organization(&pool, "Queue Org").await;
    let first = seed_location(&pool, &org, "Oldest").await;
    let second = seed_location(&pool, &org, "Middle").await;
    let third = seed_location(&pool, &org, "Newest").await;
    for location in [&first, &second, &third] {
        mark_paid(&pool, location.id).await;
    }
    // Spread created_at so the ordering is unambiguous.
    for (location, offset) in [(&first, 3), (&second, 2), (&third, 1)] {
        sqlx::query("UPDATE locations SET created_at = NOW() - make_interval(hours => $2) WHERE id = $1")
            .bind(location.id)
            .bind(offset)
            .execute(&pool)
            .await
            .expect("backdate");
    }

    let app = offline_app(pool);
    let (status, first_pass) = send_get(&app, "/api/v1/verification/pending").await;
    assert_eq!(status, StatusCode::OK);
    let brands: Vec<&str> = first_pass["data"]
        .as_array()
        .expect("data array")
        .iter()
        .map(|r| r["brand_name"].as_str().expect("brand"))
        .collect();
    assert_eq!(brands, vec!["Oldest", "Middle", "Newest"]);

    let (_, second_pass) = send_get(&app, "/api/v1/verification/pending").await;
    assert_eq!(first_pass["data"], second_pass["data"], "order must be stable");
}

#[sqlx::test(migrations = "../../migrations")]
async fn unpaid_locations_never_enter_the_queue(pool: sqlx::PgPool) {
    let org = seed_organization(&pool, "Unpaid Org").await;
    seed_location(&pool, &org, "Unpaid Branch").await;

    let app = offline_app(pool);
    let (status, json) = send_get(&app, "/api/v1/verification/pending").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"].as_array().map(Vec::len), Some(0));
}

#[sqlx::test(migrations = "../../migrations")]
async fn approve_then_reject_refuses_second_decision(pool: sqlx::PgPool) {
    let org = seed_organization(&pool, "Decision Org").await;
    let location = seed_location(&pool, &org, "Contested Branch").await;
    mark_paid(&pool, location.id).await;

    let app = offline_app(pool);
    let approve_uri = format!(
        "/api/v1/organizations/{}/locations/{}/approve",
        org.public_id, location.location_index
    );
    let reject_uri = format!(
        "/api/v1/organizations/{}/locations/{}/reject",
        org.public_id, location.location_index
    );

    let (status, json) = send_post(
        &app,
        &approve_uri,
        &serde_json::json!({ "approved_by": "admin@orgverify.example" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["display_status"].as_str(), Some("Verified"));

    let (status, json) = send_post(
        &app,
        &reject_uri,
        &serde_json::json!({
            "rejected_by": "admin@orgverify.example",
            "rejection_reason": "changed my mind"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(
        json["error"]["code"].as_str(),
        Some("invalid_state_transition")
    );
}

#[sqlx::test(migrations = "../../migrations")]
async fn approve_of_unpaid_location_is_refused(pool: sqlx::PgPool) {
    let org = seed_organization(&pool, "Early Org").await;
    let location = seed_location(&pool, &org, "Unpaid Branch").await;

    let app = offline_app(pool);
    let (status, json) = send_post(
        &app,
        &format!(
            "/api/v1/organizations/{}/locations/{}/approve",
            org.public_id, location.location_index
        ),
        &serde_json::json!({ "approved_by": "admin" }),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(
        json["error"]["code"].as_str(),
        Some("invalid_state_transition")
    );
}

#[sqlx::test(migrations = "../../migrations")]
async fn reject_requires_non_blank_reason(pool: sqlx::PgPool) {
    let org = seed_organization(&pool, "Reason Org").await;
    let location = seed_location(&pool, &org, "Pending Branch").await;
    mark_paid(&pool, location.id).await;

    let app = offline_app(pool.clone());
    let (status, json) = send_post(
        &app,
        &format!(
            "/api/v1/organizations/{}/locations/{}/reject",
            org.public_id, location.location_index
        ),
        &serde_json::json!({ "rejected_by": "admin", "rejection_reason": "   " }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"].as_str(), Some("validation_error"));

    // The blank reason must not have consumed the decision.
    let row = orgverify_db::get_location(&pool, org.id, location.location_index)
        .await
        .expect("query")
        .expect("location exists");
    assert_eq!(row.verification_status.as_deref(), Some("pending"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn decision_on_missing_location_returns_404(pool: sqlx::PgPool) {
    let org = seed_organization(&pool, "Missing Org").await;

    let app = offline_app(pool);
    let (status, json) = send_post(
        &app,
        &format!(
            "/api/v1/organizations/{}/locations/7/approve",
            org.public_id
        ),
        &serde_json::json!({ "approved_by": "admin" }),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["code"].as_str(), Some("not_found"));
}

// ---------------------------------------------------------------------------
// Rejection notifications
// ---------------------------------------------------------------------------

async fn seed_rejected(
    pool: &sqlx::PgPool,
    org: &orgverify_db::OrganizationRow,
    brand: &str,
) -> orgverify_db::LocationRow {
    let location = seed_location(pool, org, brand).await;
    mark_paid(pool, location.id).await;
    let (location, _) = orgverify_db::reject_location(
        pool,
        org,
        location.location_index,
        "admin@orgverify.example",
        "Street address could not be confirmed",
        None,
    )
    .await
    .expect("reject");
    location
}

#[sqlx::test(migrations = "../../migrations")]
async fn rejections_listing_is_newest_first(pool: sqlx::PgPool) {
    let org = seed_organization(&pool, "Listing Org").await;
    seed_rejected(&pool, &org, "First Rejected").await;
    seed_rejected(&pool, &org, "Second Rejected").await;

    let app = offline_app(pool);
    let (status, json) = send_get(&app, "/api/v1/rejections").await;
    assert_eq!(status, StatusCode::OK);
    let data = json["data"].as_array().expect("data array");
    assert_eq!(data.len(), 2);
    assert_eq!(data[0]["brand_name"].as_str(), Some("Second Rejected"));
    assert_eq!(data[0]["email_sent"].as_bool(), Some(false));
    assert_eq!(data[0]["contact_email"].as_str(), Some("owner@example.com"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn rejection_email_sends_exactly_once(pool: sqlx::PgPool) {
    let mail_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "ok",
            "data": { "message_id": "msg-1" }
        })))
        .mount(&mail_server)
        .await;

    let org = seed_organization(&pool, "Notify Org").await;
    let location = seed_rejected(&pool, &org, "Rejected Branch").await;

    let app = test_app(test_state(
        pool,
        "http://127.0.0.1:9",
        &mail_server.uri(),
    ));
    let uri = format!(
        "/api/v1/rejections/{}/{}/send-email",
        org.public_id, location.location_index
    );

    let (status, json) = send_post(&app, &uri, &serde_json::json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json["data"]["recipient_email"].as_str(),
        Some("owner@example.com")
    );
    assert_eq!(json["data"]["message_id"].as_str(), Some("msg-1"));

    let (status, json) = send_post(&app, &uri, &serde_json::json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"]["code"].as_str(), Some("already_sent"));

    let requests = mail_server.received_requests().await.expect("requests");
    assert_eq!(requests.len(), 1, "provider must be called exactly once");
}

#[sqlx::test(migrations = "../../migrations")]
async fn failed_email_send_stays_retryable(pool: sqlx::PgPool) {
    let mail_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&mail_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "ok",
            "data": { "message_id": "msg-2" }
        })))
        .mount(&mail_server)
        .await;

    let org = seed_organization(&pool, "Retry Org").await;
    let location = seed_rejected(&pool, &org, "Retry Branch").await;

    let app = test_app(test_state(
        pool,
        "http://127.0.0.1:9",
        &mail_server.uri(),
    ));
    let uri = format!(
        "/api/v1/rejections/{}/{}/send-email",
        org.public_id, location.location_index
    );

    let (status, json) = send_post(&app, &uri, &serde_json::json!({})).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(json["error"]["code"].as_str(), Some("mail_provider_error"));
    let message = json["error"]["message"].as_str().expect("message");
    assert!(
        message.contains(&org.public_id.to_string()),
        "message must name the organization, got: {message}"
    );

    // The failed send released its claim, so a retry goes through.
    let (status, json) = send_post(&app, &uri, &serde_json::json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["message_id"].as_str(), Some("msg-2"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn send_email_without_rejection_returns_404(pool: sqlx::PgPool) {
    let org = seed_organization(&pool, "No Rejection Org").await;
    let location = seed_location(&pool, &org, "Pending Branch").await;
    mark_paid(&pool, location.id).await;

    let app = offline_app(pool);
    let (status, json) = send_post(
        &app,
        &format!(
            "/api/v1/rejections/{}/{}/send-email",
            org.public_id, location.location_index
        ),
        &serde_json::json!({}),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["code"].as_str(), Some("not_found"));
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn health_is_public_and_reports_database(pool: sqlx::PgPool) {
    let app = offline_app(pool);
    let (status, json) = send_get(&app, "/api/v1/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["status"].as_str(), Some("ok"));
    assert_eq!(json["data"]["database"].as_str(), Some("ok"));
}
