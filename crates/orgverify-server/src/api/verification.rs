//! Verification-queue handlers: the pending listing and the approve/reject
//! decisions.
//!
//! Decisions are gated in the database with compare-and-swap updates; these
//! handlers validate the request and translate refusals to wire errors.

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::RequestId;

use super::organizations::LocationResponse;
use super::{
    map_db_error, require_non_blank, resolve_organization, ApiError, ApiResponse, AppState,
    ResponseMeta,
};

// ---------------------------------------------------------------------------
// Request / response bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(in crate::api) struct ApproveLocationRequest {
    pub approved_by: String,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(in crate::api) struct RejectLocationRequest {
    pub rejected_by: String,
    pub rejection_reason: String,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub(in crate::api) struct PendingLocationResponse {
    pub organization_id: Uuid,
    pub organization_name: String,
    pub location_index: i32,
    pub brand_name: String,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/v1/verification/pending — every paid, undecided location across
/// all organizations, oldest first. The order is stable across calls so
/// reviewers can work the queue top-down.
pub(in crate::api) async fn list_pending(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<PendingLocationResponse>>>, ApiError> {
    let rid = &req_id.0;

    let rows = orgverify_db::list_pending_locations(&state.pool)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    let data = rows
        .into_iter()
        .map(|row| PendingLocationResponse {
            organization_id: row.organization_public_id,
            organization_name: row.organization_name,
            location_index: row.location_index,
            brand_name: row.brand_name,
            city: row.city,
            state: row.state,
            country: row.country,
            created_at: row.created_at,
        })
        .collect();

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// POST /api/v1/organizations/:org_id/locations/:index/approve — mark a
/// pending location as verified.
pub(in crate::api) async fn approve_location(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path((org_id, index)): Path<(Uuid, i32)>,
    Json(body): Json<ApproveLocationRequest>,
) -> Result<Json<ApiResponse<LocationResponse>>, ApiError> {
    let rid = &req_id.0;
    let approved_by = require_non_blank(rid, "approved_by", &body.approved_by)?;

    let org = resolve_organization(&state.pool, org_id, rid).await?;

    let row = orgverify_db::approve_location(
        &state.pool,
        &org,
        index,
        approved_by,
        body.notes.as_deref(),
    )
    .await
    .map_err(|e| map_db_error(rid.clone(), &e))?;

    tracing::info!(
        organization = %org.public_id,
        location_index = index,
        approved_by,
        "location approved"
    );

    Ok(Json(ApiResponse {
        data: LocationResponse::from_row(row),
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// POST /api/v1/organizations/:org_id/locations/:index/reject — mark a
/// pending location as rejected.
///
/// A non-blank `rejection_reason` is required and is checked before any
/// database write, so a blank reason never consumes the decision.
pub(in crate::api) async fn reject_location(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path((org_id, index)): Path<(Uuid, i32)>,
    Json(body): Json<RejectLocationRequest>,
) -> Result<Json<ApiResponse<LocationResponse>>, ApiError> {
    let rid = &req_id.0;
    let rejected_by = require_non_blank(rid, "rejected_by", &body.rejected_by)?;
    let rejection_reason = require_non_blank(rid, "rejection_reason", &body.rejection_reason)?;

    let org = resolve_organization(&state.pool, org_id, rid).await?;

    let (row, _rejection) = orgverify_db::reject_location(
        &state.pool,
        &org,
        index,
        rejected_by,
        rejection_reason,
        body.notes.as_deref(),
    )
    .await
    .map_err(|e| map_db_error(rid.clone(), &e))?;

    tracing::info!(
        organization = %org.public_id,
        location_index = index,
        rejected_by,
        "location rejected"
    );

    Ok(Json(ApiResponse {
        data: LocationResponse::from_row(row),
        meta: ResponseMeta::new(req_id.0),
    }))
}
