//! Direct attribute administration endpoints. Reviewer-only.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::auth::ActingUser;
use crate::error::{HttpAppError, ValidatedJson};
use crate::handlers::allocations::{AttributeResponse, UsageGaugeResponse};
use crate::handlers::resource_for_allocation;
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateAttributeRequest {
    pub attribute_type_id: Uuid,
    #[validate(length(min = 1, message = "Value must not be empty"))]
    pub value: String,
}

#[utoipa::path(
    post,
    path = "/api/v0/allocations/{allocation_id}/attributes",
    tag = "attributes",
    params(("allocation_id" = Uuid, Path, description = "Allocation id")),
    request_body = CreateAttributeRequest,
    responses(
        (status = 201, description = "Attribute created", body = AttributeResponse),
        (status = 400, description = "Value does not fit the attribute kind", body = crate::error::ErrorResponse),
        (status = 403, description = "Not a reviewer of this resource", body = crate::error::ErrorResponse),
        (status = 409, description = "Unique attribute type already present", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_attribute(
    acting: ActingUser,
    State(state): State<Arc<AppState>>,
    Path(allocation_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<CreateAttributeRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let resource = resource_for_allocation(&state, allocation_id).await?;
    acting.require_reviewer(&resource)?;

    let detail = state
        .attributes
        .create(&acting.username, allocation_id, req.attribute_type_id, &req.value)
        .await?;
    Ok((
        axum::http::StatusCode::CREATED,
        Json(AttributeResponse::from(detail)),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v0/allocations/{allocation_id}/usage",
    tag = "attributes",
    params(("allocation_id" = Uuid, Path, description = "Allocation id")),
    responses(
        (status = 200, description = "Usage gauges for metered attributes", body = [UsageGaugeResponse])
    )
)]
pub async fn list_usage_gauges(
    _acting: ActingUser,
    State(state): State<Arc<AppState>>,
    Path(allocation_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    let gauges = state.attributes.gauges(allocation_id).await?;
    let body: Vec<UsageGaugeResponse> = gauges.into_iter().map(Into::into).collect();
    Ok(Json(body))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateAttributeRequest {
    #[validate(length(min = 1, message = "Value must not be empty"))]
    pub value: String,
}

#[utoipa::path(
    put,
    path = "/api/v0/attributes/{attribute_id}",
    tag = "attributes",
    params(("attribute_id" = Uuid, Path, description = "Allocation attribute id")),
    request_body = UpdateAttributeRequest,
    responses(
        (status = 200, description = "Attribute updated", body = AttributeResponse),
        (status = 400, description = "Value does not fit the attribute kind", body = crate::error::ErrorResponse),
        (status = 403, description = "Not a reviewer of this resource", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_attribute(
    acting: ActingUser,
    State(state): State<Arc<AppState>>,
    Path(attribute_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateAttributeRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let allocation_id = allocation_of_attribute(&state, attribute_id).await?;
    let resource = resource_for_allocation(&state, allocation_id).await?;
    acting.require_reviewer(&resource)?;

    let detail = state
        .attributes
        .update(&acting.username, attribute_id, &req.value)
        .await?;
    Ok(Json(AttributeResponse::from(detail)))
}

#[utoipa::path(
    delete,
    path = "/api/v0/attributes/{attribute_id}",
    tag = "attributes",
    params(("attribute_id" = Uuid, Path, description = "Allocation attribute id")),
    responses(
        (status = 204, description = "Attribute deleted"),
        (status = 403, description = "Not a reviewer of this resource", body = crate::error::ErrorResponse),
        (status = 404, description = "Attribute not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_attribute(
    acting: ActingUser,
    State(state): State<Arc<AppState>>,
    Path(attribute_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    let allocation_id = allocation_of_attribute(&state, attribute_id).await?;
    let resource = resource_for_allocation(&state, allocation_id).await?;
    acting.require_reviewer(&resource)?;

    state.attributes.delete(&acting.username, attribute_id).await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

async fn allocation_of_attribute(
    state: &Arc<AppState>,
    attribute_id: Uuid,
) -> Result<Uuid, granite_core::AppError> {
    Ok(state.attributes.get(attribute_id).await?.allocation_id)
}
