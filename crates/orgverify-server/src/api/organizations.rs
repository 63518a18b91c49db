//! Organization intake handlers: create an organization, add locations, and
//! list locations with their projected display status.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{
    map_db_error, require_non_blank, resolve_organization, ApiError, ApiResponse, AppState,
    ResponseMeta,
};

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(in crate::api) struct CreateOrganizationRequest {
    pub name: String,
    pub contact_email: String,
    pub business_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(in crate::api) struct AddLocationRequest {
    pub brand_name: String,
    pub location_type: String,
    pub country: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
    pub city_region: Option<String>,
    pub street: Option<String>,
    pub house_number: Option<String>,
}

// ---------------------------------------------------------------------------
// Response bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub(in crate::api) struct OrganizationResponse {
    pub id: Uuid,
    pub name: String,
    pub contact_email: String,
    pub business_type: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub(in crate::api) struct LocationResponse {
    pub location_index: i32,
    pub brand_name: String,
    pub location_type: String,
    pub country: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
    pub city_region: Option<String>,
    pub street: Option<String>,
    pub house_number: Option<String>,
    pub is_paid_for: bool,
    pub display_status: String,
    pub created_at: DateTime<Utc>,
}

impl LocationResponse {
    /// The display status is always derived from the two persisted flags via
    /// the projection in `orgverify-core`; handlers never compose it inline.
    pub(in crate::api) fn from_row(row: orgverify_db::LocationRow) -> Self {
        let display_status =
            orgverify_core::project(row.is_paid_for, row.verification_status.as_deref());
        Self {
            location_index: row.location_index,
            brand_name: row.brand_name,
            location_type: row.location_type,
            country: row.country,
            state: row.state,
            city: row.city,
            city_region: row.city_region,
            street: row.street,
            house_number: row.house_number,
            is_paid_for: row.is_paid_for,
            display_status: display_status.label().to_string(),
            created_at: row.created_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Validation helpers
// ---------------------------------------------------------------------------

/// Two concurrent inserts can race for the same location index; the loser's
/// unique violation is a retryable conflict, not a server fault.
pub(in crate::api) fn map_location_conflict(
    req_id: &str,
    error: &orgverify_db::DbError,
) -> ApiError {
    if let orgverify_db::DbError::Sqlx(sqlx::Error::Database(db_err)) = error {
        if db_err.code().as_deref() == Some("23505") {
            return ApiError::new(
                req_id,
                "conflict",
                "location list changed concurrently; retry the request",
            );
        }
    }
    map_db_error(req_id.to_owned(), error)
}

fn validate_location_type(req_id: &str, value: &str) -> Result<(), ApiError> {
    match value {
        "headquarters" | "branch" => Ok(()),
        _ => Err(ApiError::new(
            req_id,
            "validation_error",
            format!("location_type must be 'headquarters' or 'branch', got '{value}'"),
        )),
    }
}

fn validate_contact_email(req_id: &str, value: &str) -> Result<(), ApiError> {
    // Minimal shape check; deliverability is the mail provider's problem.
    if value.contains('@') && !value.starts_with('@') && !value.ends_with('@') {
        Ok(())
    } else {
        Err(ApiError::new(
            req_id,
            "validation_error",
            format!("'contact_email' must be an email address, got '{value}'"),
        ))
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/organizations — register a new organization.
pub(in crate::api) async fn create_organization(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<CreateOrganizationRequest>,
) -> Result<(StatusCode, Json<ApiResponse<OrganizationResponse>>), ApiError> {
    let rid = &req_id.0;

    let name = require_non_blank(rid, "name", &body.name)?;
    let contact_email = require_non_blank(rid, "contact_email", &body.contact_email)?;
    validate_contact_email(rid, contact_email)?;

    let row = orgverify_db::create_organization(
        &state.pool,
        name,
        contact_email,
        body.business_type.as_deref(),
    )
    .await
    .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse {
            data: OrganizationResponse {
                id: row.public_id,
                name: row.name,
                contact_email: row.contact_email,
                business_type: row.business_type,
                created_at: row.created_at,
            },
            meta: ResponseMeta::new(req_id.0),
        }),
    ))
}

/// POST /api/v1/organizations/:org_id/locations — append a location.
///
/// The new location always enters unpaid, regardless of how far its siblings
/// have progressed, so adding one re-opens the organization's payment gate.
pub(in crate::api) async fn add_location(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(org_id): Path<Uuid>,
    Json(body): Json<AddLocationRequest>,
) -> Result<(StatusCode, Json<ApiResponse<LocationResponse>>), ApiError> {
    let rid = &req_id.0;

    let brand_name = require_non_blank(rid, "brand_name", &body.brand_name)?;
    validate_location_type(rid, &body.location_type)?;

    let org = resolve_organization(&state.pool, org_id, rid).await?;

    let row = orgverify_db::insert_location(
        &state.pool,
        org.id,
        &orgverify_db::NewLocation {
            brand_name: brand_name.to_owned(),
            location_type: body.location_type,
            country: body.country,
            state: body.state,
            city: body.city,
            city_region: body.city_region,
            street: body.street,
            house_number: body.house_number,
        },
    )
    .await
    .map_err(|e| map_location_conflict(rid, &e))?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse {
            data: LocationResponse::from_row(row),
            meta: ResponseMeta::new(req_id.0),
        }),
    ))
}

/// GET /api/v1/organizations/:org_id/locations — the organization's location
/// list in index order, each with its projected display status.
pub(in crate::api) async fn list_locations(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(org_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<LocationResponse>>>, ApiError> {
    let rid = &req_id.0;
    let org = resolve_organization(&state.pool, org_id, rid).await?;

    let rows = orgverify_db::list_locations(&state.pool, org.id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: rows.into_iter().map(LocationResponse::from_row).collect(),
        meta: ResponseMeta::new(req_id.0),
    }))
}
