//! Rejection-notification handlers: the rejected-locations listing and the
//! single-send email dispatch.
//!
//! The send works as claim → provider call → release-on-failure, so the
//! database never waits on the mail provider and a failed send stays
//! retryable.

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{map_db_error, resolve_organization, ApiError, ApiResponse, AppState, ResponseMeta};

// ---------------------------------------------------------------------------
// Response bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub(in crate::api) struct RejectedLocationResponse {
    pub organization_id: Uuid,
    pub organization_name: String,
    pub contact_email: String,
    pub location_index: i32,
    pub brand_name: String,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub rejected_by: String,
    pub rejection_reason: String,
    pub notes: Option<String>,
    pub rejected_at: DateTime<Utc>,
    pub email_sent: bool,
    pub email_sent_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub(in crate::api) struct SendEmailResponse {
    pub recipient_email: String,
    pub message_id: String,
}

fn map_mail_error(
    request_id: &str,
    operation: &str,
    error: &orgverify_mailer::MailError,
) -> ApiError {
    tracing::error!(error = %error, operation, "mail provider call failed");
    ApiError::new(
        request_id,
        "mail_provider_error",
        format!("mail provider request failed while {operation}"),
    )
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/v1/rejections — every rejected location with its rejection
/// record, newest first.
pub(in crate::api) async fn list_rejections(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<RejectedLocationResponse>>>, ApiError> {
    let rid = &req_id.0;

    let rows = orgverify_db::list_rejected_locations(&state.pool)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    let data = rows
        .into_iter()
        .map(|row| RejectedLocationResponse {
            organization_id: row.organization_public_id,
            organization_name: row.organization_name,
            contact_email: row.contact_email,
            location_index: row.location_index,
            brand_name: row.brand_name,
            city: row.city,
            state: row.state,
            country: row.country,
            rejected_by: row.rejected_by,
            rejection_reason: row.rejection_reason,
            notes: row.notes,
            rejected_at: row.rejected_at,
            email_sent: row.email_sent,
            email_sent_at: row.email_sent_at,
        })
        .collect();

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// POST /api/v1/rejections/:org_id/:index/send-email — dispatch the
/// rejection notice for one location, at most once ever.
///
/// A repeat call (or a concurrent loser) gets `already_sent`; a provider
/// failure releases the claim and reports `mail_provider_error` so the send
/// can be retried.
pub(in crate::api) async fn send_rejection_email(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path((org_id, index)): Path<(Uuid, i32)>,
) -> Result<Json<ApiResponse<SendEmailResponse>>, ApiError> {
    let rid = &req_id.0;
    let org = resolve_organization(&state.pool, org_id, rid).await?;

    let claim = orgverify_db::claim_rejection_email(&state.pool, org.id, index)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    let notice = orgverify_mailer::RejectionNotice {
        from: state.mail_sender.clone(),
        to: claim.recipient_email.clone(),
        organization_name: claim.organization_name.clone(),
        brand_name: claim.brand_name.clone(),
        rejection_reason: claim.rejection_reason.clone(),
        notes: claim.notes.clone(),
    };

    let sent = match state.mailer.send_rejection_notice(&notice).await {
        Ok(sent) => sent,
        Err(e) => {
            if let Err(release_err) =
                orgverify_db::release_rejection_email_claim(&state.pool, claim.rejection_id).await
            {
                tracing::error!(
                    error = %release_err,
                    rejection_id = claim.rejection_id,
                    "failed to release rejection email claim"
                );
            }
            return Err(map_mail_error(
                rid,
                &format!(
                    "sending rejection notice for organization {} location {index}",
                    org.public_id
                ),
                &e,
            ));
        }
    };

    tracing::info!(
        organization = %org.public_id,
        location_index = index,
        recipient = %claim.recipient_email,
        message_id = %sent.message_id,
        "rejection email sent"
    );

    Ok(Json(ApiResponse {
        data: SendEmailResponse {
            recipient_email: claim.recipient_email,
            message_id: sent.message_id,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}
