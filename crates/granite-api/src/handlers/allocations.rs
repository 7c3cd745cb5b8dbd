//! Allocation request, detail, review, and renewal endpoints.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use granite_core::lifecycle::StatusUpdateForm;
use granite_core::models::{Allocation, AllocationStatus, AllocationUser, AttributeDetail};
use granite_core::validation::UsageGauge;
use granite_services::CreateAllocationInput;

use crate::auth::ActingUser;
use crate::error::{HttpAppError, ValidatedJson};
use crate::handlers::resource_for_allocation;
use crate::state::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct AllocationResponse {
    pub id: Uuid,
    pub project_id: Uuid,
    pub resource_id: Uuid,
    #[schema(value_type = String)]
    pub status: AllocationStatus,
    pub quantity: i32,
    pub justification: String,
    pub description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub is_locked: bool,
    pub is_changeable: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Allocation> for AllocationResponse {
    fn from(a: Allocation) -> Self {
        Self {
            id: a.id,
            project_id: a.project_id,
            resource_id: a.resource_id,
            status: a.status,
            quantity: a.quantity,
            justification: a.justification,
            description: a.description,
            start_date: a.start_date,
            end_date: a.end_date,
            is_locked: a.is_locked,
            is_changeable: a.is_changeable,
            created_at: a.created_at,
            updated_at: a.updated_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AllocationUserResponse {
    pub user_id: Uuid,
    pub username: String,
    pub status: String,
    pub role: Option<String>,
}

impl From<AllocationUser> for AllocationUserResponse {
    fn from(u: AllocationUser) -> Self {
        Self {
            user_id: u.user_id,
            username: u.username,
            status: u.status.label().to_string(),
            role: u.role,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AttributeResponse {
    pub id: Uuid,
    pub attribute_type_id: Uuid,
    pub type_name: String,
    pub kind: String,
    pub is_changeable: bool,
    pub value: String,
    pub usage: Option<f64>,
}

impl From<AttributeDetail> for AttributeResponse {
    fn from(d: AttributeDetail) -> Self {
        Self {
            id: d.id,
            attribute_type_id: d.attribute_type_id,
            type_name: d.type_name,
            kind: d.kind.label().to_string(),
            is_changeable: d.is_changeable,
            value: d.value,
            usage: d.usage,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UsageGaugeResponse {
    pub attribute_id: Uuid,
    pub label: String,
    pub value: f64,
    pub usage: f64,
    pub percent: f64,
    pub color: String,
}

impl From<UsageGauge> for UsageGaugeResponse {
    fn from(g: UsageGauge) -> Self {
        Self {
            attribute_id: g.attribute_id,
            label: g.label,
            value: g.value,
            usage: g.usage,
            percent: g.percent,
            color: g.color,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AllocationDetailResponse {
    #[serde(flatten)]
    pub allocation: AllocationResponse,
    pub users: Vec<AllocationUserResponse>,
    pub attributes: Vec<AttributeResponse>,
    pub usage_gauges: Vec<UsageGaugeResponse>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserRef {
    pub user_id: Uuid,
    pub username: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateAllocationRequest {
    pub project_id: Uuid,
    pub resource_id: Uuid,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
    #[validate(length(min = 1, message = "Justification must not be empty"))]
    pub justification: String,
    pub account_name: Option<String>,
    #[serde(default)]
    pub users: Vec<UserRef>,
}

fn default_quantity() -> i32 {
    1
}

#[utoipa::path(
    post,
    path = "/api/v0/allocations",
    tag = "allocations",
    request_body = CreateAllocationRequest,
    responses(
        (status = 201, description = "Allocation requested", body = AllocationResponse),
        (status = 404, description = "Project or resource not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Rejected by policy", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_allocation(
    acting: ActingUser,
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<CreateAllocationRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let input = CreateAllocationInput {
        project_id: req.project_id,
        resource_id: req.resource_id,
        quantity: req.quantity,
        justification: req.justification,
        account_name: req.account_name,
        users: req.users.into_iter().map(|u| (u.user_id, u.username)).collect(),
    };
    let allocation = state.allocations.create(&acting.username, input).await?;
    Ok((
        axum::http::StatusCode::CREATED,
        Json(AllocationResponse::from(allocation)),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v0/allocations/{allocation_id}",
    tag = "allocations",
    params(("allocation_id" = Uuid, Path, description = "Allocation id")),
    responses(
        (status = 200, description = "Allocation detail", body = AllocationDetailResponse),
        (status = 404, description = "Allocation not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_allocation(
    _acting: ActingUser,
    State(state): State<Arc<AppState>>,
    Path(allocation_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    let allocation = state.allocations.load_allocation(allocation_id).await?;
    let users = state.allocation_users.list_for_allocation(allocation_id).await?;
    let attributes = state.attributes.list(allocation_id).await?;
    let gauges = state.attributes.gauges(allocation_id).await?;

    Ok(Json(AllocationDetailResponse {
        allocation: allocation.into(),
        users: users.into_iter().map(Into::into).collect(),
        attributes: attributes.into_iter().map(Into::into).collect(),
        usage_gauges: gauges.into_iter().map(Into::into).collect(),
    }))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateStatusRequest {
    /// One of `update`, `approve`, `auto-approve`, `deny`.
    pub action: String,
    #[schema(value_type = Option<String>)]
    pub status: Option<AllocationStatus>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub description: Option<String>,
    pub is_locked: Option<bool>,
    pub is_changeable: Option<bool>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UpdateStatusResponse {
    #[serde(flatten)]
    pub allocation: AllocationResponse,
    pub message: String,
}

#[utoipa::path(
    put,
    path = "/api/v0/allocations/{allocation_id}/status",
    tag = "allocations",
    params(("allocation_id" = Uuid, Path, description = "Allocation id")),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Status reviewed", body = UpdateStatusResponse),
        (status = 400, description = "Unknown review action", body = crate::error::ErrorResponse),
        (status = 403, description = "Not a reviewer of this resource", body = crate::error::ErrorResponse),
        (status = 409, description = "Transition rejected", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_allocation_status(
    acting: ActingUser,
    State(state): State<Arc<AppState>>,
    Path(allocation_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateStatusRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let resource = resource_for_allocation(&state, allocation_id).await?;
    acting.require_reviewer(&resource)?;

    // Unsubmitted form fields fall back to the allocation's current values.
    let allocation = state.allocations.load_allocation(allocation_id).await?;
    let mut form = StatusUpdateForm::from_allocation(&allocation);
    if let Some(status) = req.status {
        form.status = status;
    }
    if req.start_date.is_some() {
        form.start_date = req.start_date;
    }
    if req.end_date.is_some() {
        form.end_date = req.end_date;
    }
    if req.description.is_some() {
        form.description = req.description.clone();
    }
    if let Some(is_locked) = req.is_locked {
        form.is_locked = is_locked;
    }
    if let Some(is_changeable) = req.is_changeable {
        form.is_changeable = is_changeable;
    }

    let (saved, message) = state
        .allocations
        .update_status(&acting.username, allocation_id, form, &req.action)
        .await?;
    Ok(Json(UpdateStatusResponse {
        allocation: saved.into(),
        message,
    }))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RenewalDisposition {
    pub user_id: Uuid,
    /// One of `keep_in_allocation`, `keep_in_project_only`,
    /// `remove_from_project`.
    pub disposition: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RenewAllocationRequest {
    #[serde(default)]
    pub dispositions: Vec<RenewalDisposition>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

#[utoipa::path(
    post,
    path = "/api/v0/allocations/{allocation_id}/renew",
    tag = "allocations",
    params(("allocation_id" = Uuid, Path, description = "Allocation id")),
    request_body = RenewAllocationRequest,
    responses(
        (status = 200, description = "Renewal requested", body = MessageResponse),
        (status = 400, description = "Unknown disposition", body = crate::error::ErrorResponse),
        (status = 409, description = "Allocation not eligible for renewal", body = crate::error::ErrorResponse)
    )
)]
pub async fn renew_allocation(
    acting: ActingUser,
    State(state): State<Arc<AppState>>,
    Path(allocation_id): Path<Uuid>,
    Json(req): Json<RenewAllocationRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let dispositions: Vec<(Uuid, String)> = req
        .dispositions
        .into_iter()
        .map(|d| (d.user_id, d.disposition))
        .collect();
    state
        .renewals
        .renew(&acting.username, allocation_id, &dispositions)
        .await?;
    Ok(Json(MessageResponse {
        message: "Allocation renewal requested.".to_string(),
    }))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AdminActionResponse {
    pub id: Uuid,
    pub actor: String,
    pub action: String,
    pub created_at: DateTime<Utc>,
}

#[utoipa::path(
    get,
    path = "/api/v0/allocations/{allocation_id}/admin-actions",
    tag = "allocations",
    params(("allocation_id" = Uuid, Path, description = "Allocation id")),
    responses(
        (status = 200, description = "Audit trail, newest first", body = [AdminActionResponse]),
        (status = 403, description = "Not a reviewer of this resource", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_admin_actions(
    acting: ActingUser,
    State(state): State<Arc<AppState>>,
    Path(allocation_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    let resource = resource_for_allocation(&state, allocation_id).await?;
    acting.require_reviewer(&resource)?;

    let actions = state.admin_actions.list_for_allocation(allocation_id).await?;
    let body: Vec<AdminActionResponse> = actions
        .into_iter()
        .map(|a| AdminActionResponse {
            id: a.id,
            actor: a.actor,
            action: a.action,
            created_at: a.created_at,
        })
        .collect();
    Ok(Json(body))
}
