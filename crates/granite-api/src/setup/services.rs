//! Repository and service wiring.

use std::sync::Arc;

use anyhow::Result;
use sqlx::PgPool;

use granite_core::hooks::PermissiveEligibility;
use granite_core::Config;
use granite_db::{
    AdminActionRepository, AllocationRepository, AllocationUserRepository, AttributeRepository,
    ChangeRequestRepository, NoteRepository, ProjectRepository, ResourceRepository,
};
use granite_services::{
    AllocationService, AttributeService, ChangeRequestService, EmailNotifier, MembershipService,
    NoteService, Notifier, NullNotifier, RenewalService,
};

use crate::state::AppState;

pub fn initialize_services(config: &Config, pool: PgPool) -> Result<Arc<AppState>> {
    let allocations = AllocationRepository::new(pool.clone());
    let allocation_users = AllocationUserRepository::new(pool.clone());
    let attributes = AttributeRepository::new(pool.clone());
    let change_requests = ChangeRequestRepository::new(pool.clone());
    let projects = ProjectRepository::new(pool.clone());
    let resources = ResourceRepository::new(pool.clone());
    let notes = NoteRepository::new(pool.clone());
    let admin_actions = AdminActionRepository::new(pool.clone());

    let notifier: Arc<dyn Notifier> = match EmailNotifier::from_config(&config.email) {
        Some(mailer) => Arc::new(mailer),
        None => {
            tracing::info!("Email notifications disabled");
            Arc::new(NullNotifier)
        }
    };
    let eligibility = Arc::new(PermissiveEligibility);

    let membership = Arc::new(MembershipService::new(
        allocations.clone(),
        allocation_users.clone(),
        projects.clone(),
        resources.clone(),
        admin_actions.clone(),
        eligibility,
        notifier.clone(),
        config.policy.clone(),
        config.email.clone(),
    ));
    let allocation_service = AllocationService::new(
        allocations.clone(),
        allocation_users.clone(),
        attributes.clone(),
        projects.clone(),
        resources.clone(),
        admin_actions.clone(),
        membership.clone(),
        notifier.clone(),
        config.policy.clone(),
        config.email.clone(),
    );
    let change_request_service = ChangeRequestService::new(
        allocations.clone(),
        attributes.clone(),
        change_requests,
        projects.clone(),
        resources.clone(),
        admin_actions.clone(),
        notifier.clone(),
        config.email.clone(),
    );
    let renewal_service = RenewalService::new(
        allocations,
        allocation_users.clone(),
        projects.clone(),
        resources.clone(),
        admin_actions.clone(),
        notifier,
        config.policy.clone(),
        config.email.clone(),
    );
    let attribute_service = AttributeService::new(attributes, admin_actions.clone());
    let note_service = NoteService::new(notes, admin_actions.clone());

    Ok(Arc::new(AppState {
        config: config.clone(),
        pool,
        allocations: allocation_service,
        change_requests: change_request_service,
        membership,
        renewals: renewal_service,
        attributes: attribute_service,
        notes: note_service,
        resources,
        projects,
        allocation_users,
        admin_actions,
    }))
}
