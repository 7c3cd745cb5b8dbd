//! HTTP handlers.

pub mod allocations;
pub mod attributes;
pub mod change_requests;
pub mod notes;
pub mod users;

use std::sync::Arc;

use granite_core::models::Resource;
use granite_core::AppError;
use uuid::Uuid;

use crate::state::AppState;

/// Resolve the parent resource of an allocation, for permission checks.
pub(crate) async fn resource_for_allocation(
    state: &Arc<AppState>,
    allocation_id: Uuid,
) -> Result<Resource, AppError> {
    let allocation = state.allocations.load_allocation(allocation_id).await?;
    state
        .resources
        .get(allocation.resource_id)
        .await?
        .ok_or_else(|| {
            AppError::not_found(format!("Resource {} not found", allocation.resource_id))
        })
}
