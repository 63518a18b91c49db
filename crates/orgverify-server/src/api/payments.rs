//! Payment-gate handlers: the payment-required check, initializing a checkout
//! session for the unpaid batch, and the idempotent verify step that flips
//! locations to paid.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{
    map_db_error, require_non_blank, resolve_organization, ApiError, ApiResponse, AppState,
    ResponseMeta,
};

// ---------------------------------------------------------------------------
// Request / response bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(in crate::api) struct VerifyPaymentRequest {
    pub provider_reference: String,
}

#[derive(Debug, Serialize)]
pub(in crate::api) struct PaymentStatusResponse {
    pub payment_required: bool,
    pub unpaid_locations: i64,
    pub total_locations: i64,
}

#[derive(Debug, Serialize)]
pub(in crate::api) struct InitializePaymentResponse {
    pub provider_reference: String,
    pub checkout_url: String,
    pub amount: Decimal,
    pub currency: String,
    pub locations_covered: u64,
}

#[derive(Debug, Serialize)]
pub(in crate::api) struct VerifyPaymentResponse {
    pub provider_reference: String,
    /// `settled`, `pending`, or `failed`.
    pub status: &'static str,
    /// `true` when this reference had already settled and nothing was
    /// re-mutated.
    pub already_settled: bool,
    pub locations_paid: u64,
}

fn map_payment_error(
    request_id: &str,
    operation: &str,
    error: &orgverify_payments::PaymentError,
) -> ApiError {
    tracing::error!(error = %error, operation, "payment provider call failed");
    ApiError::new(
        request_id,
        "payment_provider_error",
        format!("payment provider request failed while {operation}"),
    )
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/v1/organizations/:org_id/payment-status — does this organization
/// owe anything before verification can start?
pub(in crate::api) async fn payment_status(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(org_id): Path<Uuid>,
) -> Result<Json<ApiResponse<PaymentStatusResponse>>, ApiError> {
    let rid = &req_id.0;
    let org = resolve_organization(&state.pool, org_id, rid).await?;

    let check = orgverify_db::check_payment_required(&state.pool, org.id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: PaymentStatusResponse {
            payment_required: check.payment_required(),
            unpaid_locations: check.unpaid_locations,
            total_locations: check.total_locations,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// POST /api/v1/organizations/:org_id/payments — initialize a payment for
/// every currently-unpaid location.
///
/// The transaction row and its batch snapshot are recorded before the
/// provider call; a failed provider call marks the transaction failed so a
/// later initialize starts fresh.
pub(in crate::api) async fn initialize_payment(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(org_id): Path<Uuid>,
) -> Result<(StatusCode, Json<ApiResponse<InitializePaymentResponse>>), ApiError> {
    let rid = &req_id.0;
    let org = resolve_organization(&state.pool, org_id, rid).await?;

    let check = orgverify_db::check_payment_required(&state.pool, org.id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    if !check.payment_required() {
        return Err(ApiError::new(
            rid,
            "nothing_to_pay",
            "organization has no unpaid locations; nothing to charge",
        ));
    }

    let amount = state.location_fee * Decimal::from(check.unpaid_locations);
    let reference = Uuid::new_v4().to_string();

    let (transaction, covered) = orgverify_db::create_payment_transaction(
        &state.pool,
        org.id,
        &reference,
        &org.contact_email,
        amount,
        &state.currency,
    )
    .await
    .map_err(|e| map_db_error(rid.clone(), &e))?;

    let session = match state
        .payments
        .create_checkout_session(&orgverify_payments::NewCheckoutSession {
            reference: reference.clone(),
            email: org.contact_email.clone(),
            amount,
            currency: state.currency.clone(),
        })
        .await
    {
        Ok(session) => session,
        Err(e) => {
            if let Err(mark_err) =
                orgverify_db::mark_payment_failed(&state.pool, &reference).await
            {
                tracing::error!(error = %mark_err, reference, "failed to mark payment failed");
            }
            return Err(map_payment_error(
                rid,
                &format!("initializing payment for organization {}", org.public_id),
                &e,
            ));
        }
    };

    tracing::info!(
        organization = %org.public_id,
        reference = %transaction.provider_reference,
        locations = covered,
        %amount,
        "payment initialized"
    );

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse {
            data: InitializePaymentResponse {
                provider_reference: transaction.provider_reference,
                checkout_url: session.checkout_url,
                amount,
                currency: state.currency.clone(),
                locations_covered: covered,
            },
            meta: ResponseMeta::new(req_id.0),
        }),
    ))
}

/// POST /api/v1/payments/verify — verify a transaction with the provider and
/// settle it.
///
/// Idempotent: re-verifying an already-settled reference reports
/// `already_settled` without touching the provider or re-flipping any
/// location.
pub(in crate::api) async fn verify_payment(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<VerifyPaymentRequest>,
) -> Result<Json<ApiResponse<VerifyPaymentResponse>>, ApiError> {
    let rid = &req_id.0;
    let reference = require_non_blank(rid, "provider_reference", &body.provider_reference)?;

    let transaction = orgverify_db::get_transaction_by_reference(&state.pool, reference)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .ok_or_else(|| {
            ApiError::new(
                rid,
                "not_found",
                format!("payment transaction '{reference}' not found"),
            )
        })?;

    if transaction.status == "settled" {
        return Ok(Json(ApiResponse {
            data: VerifyPaymentResponse {
                provider_reference: transaction.provider_reference,
                status: "settled",
                already_settled: true,
                locations_paid: 0,
            },
            meta: ResponseMeta::new(req_id.0),
        }));
    }

    let provider_status = state
        .payments
        .verify_transaction(reference)
        .await
        .map_err(|e| map_payment_error(rid, &format!("verifying transaction '{reference}'"), &e))?;

    let data = match provider_status.state {
        orgverify_payments::TransactionState::Settled => {
            let outcome = orgverify_db::settle_payment_transaction(&state.pool, reference)
                .await
                .map_err(|e| map_db_error(rid.clone(), &e))?;
            tracing::info!(
                reference,
                locations_paid = outcome.locations_paid,
                already_settled = outcome.already_settled,
                "payment settled"
            );
            VerifyPaymentResponse {
                provider_reference: transaction.provider_reference,
                status: "settled",
                already_settled: outcome.already_settled,
                locations_paid: outcome.locations_paid,
            }
        }
        orgverify_payments::TransactionState::Failed => {
            orgverify_db::mark_payment_failed(&state.pool, reference)
                .await
                .map_err(|e| map_db_error(rid.clone(), &e))?;
            VerifyPaymentResponse {
                provider_reference: transaction.provider_reference,
                status: "failed",
                already_settled: false,
                locations_paid: 0,
            }
        }
        orgverify_payments::TransactionState::Pending => VerifyPaymentResponse {
            provider_reference: transaction.provider_reference,
            status: "pending",
            already_settled: false,
            locations_paid: 0,
        },
    };

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}
