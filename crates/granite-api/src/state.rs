//! Shared application state.

use std::sync::Arc;

use granite_core::Config;
use granite_db::{
    AdminActionRepository, AllocationUserRepository, ProjectRepository, ResourceRepository,
};
use granite_services::{
    AllocationService, AttributeService, ChangeRequestService, MembershipService, NoteService,
    RenewalService,
};
use sqlx::PgPool;

pub struct AppState {
    pub config: Config,
    pub pool: PgPool,
    pub allocations: AllocationService,
    pub change_requests: ChangeRequestService,
    pub membership: Arc<MembershipService>,
    pub renewals: RenewalService,
    pub attributes: AttributeService,
    pub notes: NoteService,
    // Direct repository access for read-side handler needs.
    pub resources: ResourceRepository,
    pub projects: ProjectRepository,
    pub allocation_users: AllocationUserRepository,
    pub admin_actions: AdminActionRepository,
}
