//! OpenAPI documentation.

use utoipa::OpenApi;

use crate::error;
use crate::handlers;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Granite API",
        version = "0.1.0",
        description = "HPC allocation lifecycle service: allocation requests, status review, \
                       change requests, membership, renewals, attributes, and notes. All \
                       endpoints are versioned under /api/v0/."
    ),
    paths(
        // Allocations
        handlers::allocations::create_allocation,
        handlers::allocations::get_allocation,
        handlers::allocations::update_allocation_status,
        handlers::allocations::renew_allocation,
        handlers::allocations::list_admin_actions,
        // Membership
        handlers::users::add_users,
        handlers::users::remove_users,
        handlers::users::review_eula,
        handlers::users::update_role,
        // Change requests
        handlers::change_requests::create_change_request,
        handlers::change_requests::list_change_requests,
        handlers::change_requests::list_pending_change_requests,
        handlers::change_requests::get_change_request,
        handlers::change_requests::resolve_change_request,
        handlers::change_requests::delete_attribute_change,
        // Attributes
        handlers::attributes::create_attribute,
        handlers::attributes::list_usage_gauges,
        handlers::attributes::update_attribute,
        handlers::attributes::delete_attribute,
        // Notes
        handlers::notes::create_note,
        handlers::notes::list_notes,
        handlers::notes::update_note,
        handlers::notes::delete_note,
    ),
    components(schemas(
        error::ErrorResponse,
        handlers::allocations::AllocationResponse,
        handlers::allocations::AllocationDetailResponse,
        handlers::allocations::AllocationUserResponse,
        handlers::allocations::AttributeResponse,
        handlers::allocations::UsageGaugeResponse,
        handlers::allocations::CreateAllocationRequest,
        handlers::allocations::UpdateStatusRequest,
        handlers::allocations::UpdateStatusResponse,
        handlers::allocations::RenewAllocationRequest,
        handlers::allocations::MessageResponse,
        handlers::allocations::AdminActionResponse,
        handlers::users::AddUsersRequest,
        handlers::users::AddUsersResponse,
        handlers::users::RemoveUsersRequest,
        handlers::users::RemoveUsersResponse,
        handlers::users::EulaReviewRequest,
        handlers::users::EulaReviewResponse,
        handlers::users::UpdateRoleRequest,
        handlers::change_requests::ChangeRequestResponse,
        handlers::change_requests::ChangeRequestDetailResponse,
        handlers::change_requests::AttributeChangeResponse,
        handlers::change_requests::CreateChangeRequest,
        handlers::change_requests::ResolveChangeRequest,
        handlers::attributes::CreateAttributeRequest,
        handlers::attributes::UpdateAttributeRequest,
        handlers::notes::NoteResponse,
        handlers::notes::CreateNoteRequest,
        handlers::notes::UpdateNoteRequest,
    )),
    tags(
        (name = "allocations", description = "Allocation request, detail, review, renewal"),
        (name = "allocation-users", description = "Allocation membership"),
        (name = "change-requests", description = "End-date extensions and attribute changes"),
        (name = "attributes", description = "Attribute administration and usage"),
        (name = "notes", description = "Allocation notes")
    )
)]
pub struct ApiDoc;

pub fn get_openapi_spec() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}
