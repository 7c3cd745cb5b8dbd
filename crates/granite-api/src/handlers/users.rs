//! Allocation membership endpoints.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use granite_core::AppError;

use crate::auth::ActingUser;
use crate::error::{HttpAppError, ValidatedJson};
use crate::handlers::allocations::UserRef;
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AddUsersRequest {
    #[validate(length(min = 1, message = "Select at least one user to add"))]
    pub users: Vec<UserRef>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AddUsersResponse {
    pub added: Vec<String>,
    /// Usernames skipped for lacking a cluster account.
    pub missing_account: Vec<String>,
    /// Usernames skipped for lacking an account on this resource.
    pub missing_resource_account: Vec<String>,
}

#[utoipa::path(
    post,
    path = "/api/v0/allocations/{allocation_id}/users",
    tag = "allocation-users",
    params(("allocation_id" = Uuid, Path, description = "Allocation id")),
    request_body = AddUsersRequest,
    responses(
        (status = 200, description = "Batch outcome", body = AddUsersResponse),
        (status = 409, description = "Allocation does not accept additions", body = crate::error::ErrorResponse)
    )
)]
pub async fn add_users(
    acting: ActingUser,
    State(state): State<Arc<AppState>>,
    Path(allocation_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<AddUsersRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let candidates: Vec<(Uuid, String)> = req
        .users
        .into_iter()
        .map(|u| (u.user_id, u.username))
        .collect();
    let report = state
        .membership
        .add_users(&acting.username, allocation_id, &candidates)
        .await?;
    Ok(Json(AddUsersResponse {
        added: report.added,
        missing_account: report.missing_account,
        missing_resource_account: report.missing_resource_account,
    }))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RemoveUsersRequest {
    #[validate(length(min = 1, message = "Select at least one user to remove"))]
    pub user_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RemoveUsersResponse {
    pub removed: Vec<String>,
}

#[utoipa::path(
    delete,
    path = "/api/v0/allocations/{allocation_id}/users",
    tag = "allocation-users",
    params(("allocation_id" = Uuid, Path, description = "Allocation id")),
    request_body = RemoveUsersRequest,
    responses(
        (status = 200, description = "Removed usernames", body = RemoveUsersResponse),
        (status = 409, description = "Allocation does not accept removals", body = crate::error::ErrorResponse)
    )
)]
pub async fn remove_users(
    acting: ActingUser,
    State(state): State<Arc<AppState>>,
    Path(allocation_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<RemoveUsersRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let removed = state
        .membership
        .remove_users(&acting.username, allocation_id, &req.user_ids)
        .await?;
    Ok(Json(RemoveUsersResponse { removed }))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct EulaReviewRequest {
    /// One of `accept`, `decline`.
    pub answer: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EulaReviewResponse {
    pub status: String,
}

/// The acting user answers the EULA for their own membership.
#[utoipa::path(
    put,
    path = "/api/v0/allocations/{allocation_id}/eula",
    tag = "allocation-users",
    params(("allocation_id" = Uuid, Path, description = "Allocation id")),
    request_body = EulaReviewRequest,
    responses(
        (status = 200, description = "New membership status", body = EulaReviewResponse),
        (status = 409, description = "No EULA pending for this user", body = crate::error::ErrorResponse)
    )
)]
pub async fn review_eula(
    acting: ActingUser,
    State(state): State<Arc<AppState>>,
    Path(allocation_id): Path<Uuid>,
    Json(req): Json<EulaReviewRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let user_id = acting.user_id.ok_or_else(|| {
        AppError::Unauthorized("Missing authenticated user id header".into())
    })?;
    let status = state
        .membership
        .review_eula(allocation_id, user_id, &req.answer)
        .await?;
    Ok(Json(EulaReviewResponse {
        status: status.label().to_string(),
    }))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateRoleRequest {
    pub role: Option<String>,
}

#[utoipa::path(
    put,
    path = "/api/v0/allocations/{allocation_id}/users/{user_id}/role",
    tag = "allocation-users",
    params(
        ("allocation_id" = Uuid, Path, description = "Allocation id"),
        ("user_id" = Uuid, Path, description = "User id")
    ),
    request_body = UpdateRoleRequest,
    responses(
        (status = 204, description = "Role updated or unchanged"),
        (status = 409, description = "The PI's role cannot change", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_role(
    acting: ActingUser,
    State(state): State<Arc<AppState>>,
    Path((allocation_id, user_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<UpdateRoleRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    state
        .membership
        .update_role(
            &acting.username,
            allocation_id,
            user_id,
            req.role.as_deref(),
        )
        .await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}
