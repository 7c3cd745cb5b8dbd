//! Renewal orchestration.
//!
//! The status flip to RenewalRequested is persisted before dispositions are
//! processed; a disposition failure surfaces to the caller but leaves the
//! flip in place.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use granite_core::models::{AllocationStatus, AllocationUserStatus, ProjectUserStatus};
use granite_core::renewal::{plan_renewal, Disposition};
use granite_core::{AllocationPolicy, AppError, EmailConfig};
use granite_db::{
    AdminActionRepository, AllocationRepository, AllocationUserRepository, ProjectRepository,
    ResourceRepository,
};

use crate::log_events;
use crate::notification::{dispatch, templates, Notifier};

pub struct RenewalService {
    allocations: AllocationRepository,
    members: AllocationUserRepository,
    projects: ProjectRepository,
    resources: ResourceRepository,
    audit: AdminActionRepository,
    notifier: Arc<dyn Notifier>,
    policy: AllocationPolicy,
    email_config: EmailConfig,
}

impl RenewalService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        allocations: AllocationRepository,
        members: AllocationUserRepository,
        projects: ProjectRepository,
        resources: ResourceRepository,
        audit: AdminActionRepository,
        notifier: Arc<dyn Notifier>,
        policy: AllocationPolicy,
        email_config: EmailConfig,
    ) -> Self {
        Self {
            allocations,
            members,
            projects,
            resources,
            audit,
            notifier,
            policy,
            email_config,
        }
    }

    /// Request a renewal with per-user dispositions given as
    /// (user id, disposition token) pairs.
    pub async fn renew(
        &self,
        actor: &str,
        allocation_id: Uuid,
        dispositions: &[(Uuid, String)],
    ) -> Result<(), AppError> {
        let mut parsed = Vec::with_capacity(dispositions.len());
        for (user_id, token) in dispositions {
            parsed.push((*user_id, Disposition::parse(token)?));
        }

        let allocation = self
            .allocations
            .get(allocation_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Allocation {allocation_id} not found")))?;
        let project = self
            .projects
            .get(allocation.project_id)
            .await?
            .ok_or_else(|| {
                AppError::not_found(format!("Project {} not found", allocation.project_id))
            })?;
        let resource = self
            .resources
            .get(allocation.resource_id)
            .await?
            .ok_or_else(|| {
                AppError::not_found(format!("Resource {} not found", allocation.resource_id))
            })?;
        let members = self.members.list_for_allocation(allocation_id).await?;
        let today = Utc::now().date_naive();

        let outcome = plan_renewal(
            &allocation,
            &project,
            &members,
            &self.policy,
            &parsed,
            today,
        )?;

        // The flip precedes disposition handling and survives its failure.
        self.allocations.set_status(allocation_id, outcome.new_status).await?;
        self.audit
            .record(
                allocation_id,
                actor,
                &format!(
                    "Changed \"status\" from \"{}\" to \"{}\"",
                    allocation.status,
                    AllocationStatus::RenewalRequested
                ),
            )
            .await?;

        let plan = outcome.dispositions?;
        self.members
            .set_status_many(&plan.remove_member_ids, AllocationUserStatus::Removed)
            .await?;
        for user_id in &plan.remove_from_project_user_ids {
            self.members
                .remove_across_project(project.id, *user_id, &AllocationStatus::active_set())
                .await?;
            self.projects
                .set_member_status(project.id, *user_id, ProjectUserStatus::Removed)
                .await?;
        }

        log_events(&plan.events);
        tracing::info!(
            actor = %actor,
            allocation_id = %allocation_id,
            project_id = %project.id,
            removed_members = plan.remove_member_ids.len(),
            "Allocation renewal requested"
        );
        dispatch(
            self.notifier.as_ref(),
            templates::renewal_requested(
                &self.email_config,
                allocation_id,
                &resource.name,
                &project.title,
            ),
        )
        .await;
        Ok(())
    }
}
