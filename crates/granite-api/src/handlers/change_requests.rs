//! Change-request endpoints.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use granite_core::change::{AttributeEdit, ResolutionEdits};
use granite_core::models::{AllocationChangeRequest, AttributeChangeRequest};

use crate::auth::ActingUser;
use crate::error::{HttpAppError, ValidatedJson};
use crate::handlers::allocations::MessageResponse;
use crate::handlers::resource_for_allocation;
use crate::state::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct ChangeRequestResponse {
    pub id: Uuid,
    pub allocation_id: Uuid,
    pub status: String,
    pub end_date_extension: i32,
    pub justification: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<AllocationChangeRequest> for ChangeRequestResponse {
    fn from(r: AllocationChangeRequest) -> Self {
        Self {
            id: r.id,
            allocation_id: r.allocation_id,
            status: r.status.to_string(),
            end_date_extension: r.end_date_extension,
            justification: r.justification,
            notes: r.notes,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AttributeChangeResponse {
    pub id: Uuid,
    pub allocation_attribute_id: Uuid,
    pub old_value: String,
    pub new_value: String,
}

impl From<AttributeChangeRequest> for AttributeChangeResponse {
    fn from(c: AttributeChangeRequest) -> Self {
        Self {
            id: c.id,
            allocation_attribute_id: c.allocation_attribute_id,
            old_value: c.old_value,
            new_value: c.new_value,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ChangeRequestDetailResponse {
    #[serde(flatten)]
    pub request: ChangeRequestResponse,
    pub attribute_changes: Vec<AttributeChangeResponse>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AttributeEditRequest {
    pub allocation_attribute_id: Uuid,
    pub new_value: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateChangeRequest {
    #[serde(default)]
    pub end_date_extension: i32,
    #[validate(length(min = 1, message = "Justification must not be empty"))]
    pub justification: String,
    #[serde(default)]
    pub attribute_changes: Vec<AttributeEditRequest>,
}

#[utoipa::path(
    post,
    path = "/api/v0/allocations/{allocation_id}/change-requests",
    tag = "change-requests",
    params(("allocation_id" = Uuid, Path, description = "Allocation id")),
    request_body = CreateChangeRequest,
    responses(
        (status = 201, description = "Change request filed", body = ChangeRequestResponse),
        (status = 409, description = "Rejected by guard", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_change_request(
    acting: ActingUser,
    State(state): State<Arc<AppState>>,
    Path(allocation_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<CreateChangeRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let edits: Vec<AttributeEdit> = req
        .attribute_changes
        .into_iter()
        .map(|e| AttributeEdit {
            allocation_attribute_id: e.allocation_attribute_id,
            new_value: e.new_value,
        })
        .collect();
    let request = state
        .change_requests
        .create(
            &acting.username,
            allocation_id,
            req.end_date_extension,
            &req.justification,
            &edits,
        )
        .await?;
    Ok((
        axum::http::StatusCode::CREATED,
        Json(ChangeRequestResponse::from(request)),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v0/allocations/{allocation_id}/change-requests",
    tag = "change-requests",
    params(("allocation_id" = Uuid, Path, description = "Allocation id")),
    responses(
        (status = 200, description = "Change requests, newest first", body = [ChangeRequestResponse])
    )
)]
pub async fn list_change_requests(
    _acting: ActingUser,
    State(state): State<Arc<AppState>>,
    Path(allocation_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    let requests = state.change_requests.list_for_allocation(allocation_id).await?;
    let body: Vec<ChangeRequestResponse> = requests.into_iter().map(Into::into).collect();
    Ok(Json(body))
}

/// The review queue across all allocations, oldest first.
#[utoipa::path(
    get,
    path = "/api/v0/change-requests/pending",
    tag = "change-requests",
    responses(
        (status = 200, description = "Pending change requests", body = [ChangeRequestResponse]),
        (status = 403, description = "Not an administrator", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_pending_change_requests(
    acting: ActingUser,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpAppError> {
    acting.require_superuser()?;
    let requests = state.change_requests.list_pending().await?;
    let body: Vec<ChangeRequestResponse> = requests.into_iter().map(Into::into).collect();
    Ok(Json(body))
}

#[utoipa::path(
    get,
    path = "/api/v0/change-requests/{request_id}",
    tag = "change-requests",
    params(("request_id" = Uuid, Path, description = "Change request id")),
    responses(
        (status = 200, description = "Change request with proposed changes", body = ChangeRequestDetailResponse),
        (status = 404, description = "Change request not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_change_request(
    _acting: ActingUser,
    State(state): State<Arc<AppState>>,
    Path(request_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    let (request, changes) = state.change_requests.get(request_id).await?;
    Ok(Json(ChangeRequestDetailResponse {
        request: request.into(),
        attribute_changes: changes.into_iter().map(Into::into).collect(),
    }))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct NewValueRequest {
    pub attribute_change_id: Uuid,
    pub new_value: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ResolveChangeRequest {
    /// One of `update`, `approve`, `deny`.
    pub action: String,
    pub end_date_extension: Option<i32>,
    #[serde(default)]
    pub new_values: Vec<NewValueRequest>,
    pub notes: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/v0/change-requests/{request_id}/resolve",
    tag = "change-requests",
    params(("request_id" = Uuid, Path, description = "Change request id")),
    request_body = ResolveChangeRequest,
    responses(
        (status = 200, description = "Resolution outcome", body = MessageResponse),
        (status = 400, description = "Unknown action", body = crate::error::ErrorResponse),
        (status = 403, description = "Not a reviewer of this resource", body = crate::error::ErrorResponse),
        (status = 409, description = "Rejected by guard", body = crate::error::ErrorResponse)
    )
)]
pub async fn resolve_change_request(
    acting: ActingUser,
    State(state): State<Arc<AppState>>,
    Path(request_id): Path<Uuid>,
    Json(req): Json<ResolveChangeRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let (request, _) = state.change_requests.get(request_id).await?;
    let resource = resource_for_allocation(&state, request.allocation_id).await?;
    acting.require_reviewer(&resource)?;

    let edits = ResolutionEdits {
        end_date_extension: req.end_date_extension,
        new_values: req
            .new_values
            .into_iter()
            .map(|v| (v.attribute_change_id, v.new_value))
            .collect(),
        notes: req.notes,
    };
    let message = state
        .change_requests
        .resolve(&acting.username, request_id, &req.action, edits)
        .await?;
    Ok(Json(MessageResponse { message }))
}

#[utoipa::path(
    delete,
    path = "/api/v0/change-requests/{request_id}/changes/{change_id}",
    tag = "change-requests",
    params(
        ("request_id" = Uuid, Path, description = "Change request id"),
        ("change_id" = Uuid, Path, description = "Attribute change id")
    ),
    responses(
        (status = 204, description = "Attribute change deleted"),
        (status = 403, description = "Not a reviewer of this resource", body = crate::error::ErrorResponse),
        (status = 409, description = "Request is no longer pending", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_attribute_change(
    acting: ActingUser,
    State(state): State<Arc<AppState>>,
    Path((request_id, change_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, HttpAppError> {
    let (request, _) = state.change_requests.get(request_id).await?;
    let resource = resource_for_allocation(&state, request.allocation_id).await?;
    acting.require_reviewer(&resource)?;

    state
        .change_requests
        .delete_attribute_change(&acting.username, request_id, change_id)
        .await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}
