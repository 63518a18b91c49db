mod organizations;
mod payments;
mod rejections;
mod verification;

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use crate::middleware::{
    enforce_rate_limit, request_id, require_bearer_auth, AuthState, RateLimitState, RequestId,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub payments: Arc<orgverify_payments::PaymentClient>,
    pub mailer: Arc<orgverify_mailer::MailClient>,
    pub location_fee: Decimal,
    pub currency: String,
    pub mail_sender: String,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            "conflict" | "invalid_state_transition" | "nothing_to_pay" | "already_sent" => {
                StatusCode::CONFLICT
            }
            "rate_limited" => StatusCode::TOO_MANY_REQUESTS,
            "payment_provider_error" | "mail_provider_error" => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

/// Maps database-layer errors to wire errors. State-machine refusals carry
/// their own codes; everything else is an opaque internal error.
pub(super) fn map_db_error(request_id: String, error: &orgverify_db::DbError) -> ApiError {
    use orgverify_db::DbError;

    match error {
        DbError::OrganizationNotFound(_) | DbError::LocationNotFound { .. } => {
            ApiError::new(request_id, "not_found", error.to_string())
        }
        DbError::InvalidLocationTransition { .. } | DbError::InvalidTransactionState { .. } => {
            ApiError::new(request_id, "invalid_state_transition", error.to_string())
        }
        DbError::NothingToPay => ApiError::new(request_id, "nothing_to_pay", error.to_string()),
        DbError::TransactionNotFound(_) | DbError::RejectionNotFound { .. } => {
            ApiError::new(request_id, "not_found", error.to_string())
        }
        DbError::RejectionAlreadySent { .. } => {
            ApiError::new(request_id, "already_sent", error.to_string())
        }
        _ => {
            tracing::error!(error = %error, "database query failed");
            ApiError::new(request_id, "internal_error", "database query failed")
        }
    }
}

/// Looks up an organization by its public UUID or returns a 404 wire error.
pub(super) async fn resolve_organization(
    pool: &PgPool,
    org_id: Uuid,
    request_id: &str,
) -> Result<orgverify_db::OrganizationRow, ApiError> {
    orgverify_db::get_organization_by_public_id(pool, org_id)
        .await
        .map_err(|e| map_db_error(request_id.to_owned(), &e))?
        .ok_or_else(|| {
            map_db_error(
                request_id.to_owned(),
                &orgverify_db::DbError::OrganizationNotFound(org_id),
            )
        })
}

/// Rejects blank or whitespace-only required string fields.
pub(super) fn require_non_blank<'a>(
    request_id: &str,
    field: &str,
    value: &'a str,
) -> Result<&'a str, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::new(
            request_id,
            "validation_error",
            format!("'{field}' must be a non-empty string"),
        ));
    }
    Ok(trimmed)
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
        ])
}

fn protected_router(auth: AuthState, rate_limit: RateLimitState) -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/organizations",
            post(organizations::create_organization),
        )
        .route(
            "/api/v1/organizations/{org_id}/locations",
            get(organizations::list_locations).post(organizations::add_location),
        )
        .route(
            "/api/v1/organizations/{org_id}/payment-status",
            get(payments::payment_status),
        )
        .route(
            "/api/v1/organizations/{org_id}/payments",
            post(payments::initialize_payment),
        )
        .route("/api/v1/payments/verify", post(payments::verify_payment))
        .route(
            "/api/v1/verification/pending",
            get(verification::list_pending),
        )
        .route(
            "/api/v1/organizations/{org_id}/locations/{index}/approve",
            post(verification::approve_location),
        )
        .route(
            "/api/v1/organizations/{org_id}/locations/{index}/reject",
            post(verification::reject_location),
        )
        .route("/api/v1/rejections", get(rejections::list_rejections))
        .route(
            "/api/v1/rejections/{org_id}/{index}/send-email",
            post(rejections::send_rejection_email),
        )
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn_with_state(
                    rate_limit,
                    enforce_rate_limit,
                ))
                .layer(axum::middleware::from_fn_with_state(
                    auth,
                    require_bearer_auth,
                )),
        )
}

pub fn build_app(state: AppState, auth: AuthState, rate_limit: RateLimitState) -> Router {
    let public_routes = Router::new().route("/api/v1/health", get(health));

    Router::new()
        .merge(public_routes)
        .merge(protected_router(auth, rate_limit))
        .layer(
            ServiceBuilder::new()
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let meta = ResponseMeta::new(req_id.0);

    match orgverify_db::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse {
                data: HealthData {
                    status: "ok",
                    database: "ok",
                },
                meta,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    data: HealthData {
                        status: "degraded",
                        database: "unavailable",
                    },
                    meta,
                }),
            )
        }
    }
}

pub fn default_rate_limit_state() -> RateLimitState {
    RateLimitState::new(120, Duration::from_secs(60))
}

#[cfg(test)]
mod tests;
