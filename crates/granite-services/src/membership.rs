//! Allocation membership orchestration.

use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;

use granite_core::hooks::EligibilityChecker;
use granite_core::membership::{
    plan_add_users, plan_eula_response, plan_remove_users, plan_role_update, AddCandidate,
    EulaAnswer,
};
use granite_core::models::{Allocation, AllocationUserStatus, Project, Resource};
use granite_core::{AllocationPolicy, AppError, EmailConfig};
use granite_db::{
    AdminActionRepository, AllocationRepository, AllocationUserRepository, ProjectRepository,
    ResourceRepository,
};

use crate::log_events;
use crate::notification::{dispatch, templates, Notifier};

pub struct MembershipService {
    allocations: AllocationRepository,
    members: AllocationUserRepository,
    projects: ProjectRepository,
    resources: ResourceRepository,
    audit: AdminActionRepository,
    eligibility: Arc<dyn EligibilityChecker>,
    notifier: Arc<dyn Notifier>,
    policy: AllocationPolicy,
    email_config: EmailConfig,
}

/// What happened to a batch addition.
#[derive(Debug, Clone, Default)]
pub struct AddUsersReport {
    pub added: Vec<String>,
    pub missing_account: Vec<String>,
    pub missing_resource_account: Vec<String>,
}

impl MembershipService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        allocations: AllocationRepository,
        members: AllocationUserRepository,
        projects: ProjectRepository,
        resources: ResourceRepository,
        audit: AdminActionRepository,
        eligibility: Arc<dyn EligibilityChecker>,
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
            eligibility,
            notifier,
            policy,
            email_config,
        }
    }

    async fn load(&self, allocation_id: Uuid) -> Result<(Allocation, Project, Resource), AppError> {
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
        Ok((allocation, project, resource))
    }

    /// Account check with fail-open semantics: when the checker is
    /// unreachable, everyone passes.
    async fn account_standings(
        &self,
        usernames: &[String],
        resource: &Resource,
    ) -> HashMap<String, granite_core::hooks::AccountStanding> {
        match self.eligibility.check(usernames, resource).await {
            Ok(standings) => standings,
            Err(err) => {
                tracing::warn!(
                    resource = %resource.name,
                    error = %err,
                    "Eligibility checker unavailable, treating all users as eligible"
                );
                HashMap::new()
            }
        }
    }

    /// Add users with context already loaded. Used by allocation creation.
    pub(crate) async fn add_users_internal(
        &self,
        allocation: &Allocation,
        project: &Project,
        resource: &Resource,
        candidates: &[(Uuid, String)],
    ) -> Result<AddUsersReport, AppError> {
        let candidates: Vec<AddCandidate> = candidates
            .iter()
            .map(|(user_id, username)| AddCandidate {
                user_id: *user_id,
                username: username.clone(),
                role: None,
            })
            .collect();
        let usernames: Vec<String> = candidates.iter().map(|c| c.username.clone()).collect();
        let standings = self.account_standings(&usernames, resource).await;
        let existing = self.members.list_for_allocation(allocation.id).await?;

        let plan = plan_add_users(
            allocation,
            resource,
            project.pi_user_id,
            &existing,
            &candidates,
            &standings,
            self.policy.enable_eula,
        )?;

        let added = self.members.apply_batch(allocation.id, &plan.writes).await?;
        log_events(&plan.events);

        let project_emails: HashMap<String, String> = self
            .projects
            .list_members(project.id)
            .await?
            .into_iter()
            .map(|m| (m.username, m.email))
            .collect();
        if !plan.eula_pending.is_empty() {
            let recipients: Vec<String> = plan
                .eula_pending
                .iter()
                .filter_map(|u| project_emails.get(u).cloned())
                .collect();
            dispatch(
                self.notifier.as_ref(),
                templates::eula_pending(
                    &self.email_config,
                    recipients,
                    allocation.id,
                    &resource.name,
                ),
            )
            .await;
        }

        Ok(AddUsersReport {
            added: added.into_iter().map(|m| m.username).collect(),
            missing_account: plan.missing_account,
            missing_resource_account: plan.missing_resource_account,
        })
    }

    /// Add users to an allocation, with audit and a batched notification.
    pub async fn add_users(
        &self,
        actor: &str,
        allocation_id: Uuid,
        candidates: &[(Uuid, String)],
    ) -> Result<AddUsersReport, AppError> {
        let (allocation, project, resource) = self.load(allocation_id).await?;
        let report = self
            .add_users_internal(&allocation, &project, &resource, candidates)
            .await?;

        for username in &report.added {
            self.audit
                .record(
                    allocation_id,
                    actor,
                    &format!("Added user \"{username}\" to the allocation"),
                )
                .await?;
        }
        tracing::info!(
            actor = %actor,
            allocation_id = %allocation_id,
            added = report.added.len(),
            "Users added to allocation"
        );
        if !report.added.is_empty() {
            let recipients = self.recipients(project.id).await?;
            dispatch(
                self.notifier.as_ref(),
                templates::users_added(
                    &self.email_config,
                    recipients,
                    allocation_id,
                    &resource.name,
                    &report.added,
                ),
            )
            .await;
        }
        Ok(report)
    }

    /// Remove users. The PI and already-removed users are skipped silently.
    pub async fn remove_users(
        &self,
        actor: &str,
        allocation_id: Uuid,
        user_ids: &[Uuid],
    ) -> Result<Vec<String>, AppError> {
        let (allocation, project, resource) = self.load(allocation_id).await?;
        let existing = self.members.list_for_allocation(allocation_id).await?;
        let plan = plan_remove_users(&allocation, project.pi_user_id, &existing, user_ids)?;

        self.members
            .set_status_many(&plan.member_ids, AllocationUserStatus::Removed)
            .await?;
        log_events(&plan.events);
        for username in &plan.usernames {
            self.audit
                .record(
                    allocation_id,
                    actor,
                    &format!("Removed user \"{username}\" from the allocation"),
                )
                .await?;
        }
        tracing::info!(
            actor = %actor,
            allocation_id = %allocation_id,
            removed = plan.usernames.len(),
            "Users removed from allocation"
        );
        if !plan.usernames.is_empty() {
            let recipients = self.recipients(project.id).await?;
            dispatch(
                self.notifier.as_ref(),
                templates::users_removed(
                    &self.email_config,
                    recipients,
                    allocation_id,
                    &resource.name,
                    &plan.usernames,
                ),
            )
            .await;
        }
        Ok(plan.usernames)
    }

    /// A member answers their pending EULA.
    pub async fn review_eula(
        &self,
        allocation_id: Uuid,
        user_id: Uuid,
        answer_token: &str,
    ) -> Result<AllocationUserStatus, AppError> {
        let answer = EulaAnswer::parse(answer_token)?;
        let (allocation, _project, resource) = self.load(allocation_id).await?;
        let member = self
            .members
            .get(allocation_id, user_id)
            .await?
            .ok_or_else(|| {
                AppError::not_found(format!("User {user_id} is not on this allocation"))
            })?;

        let plan = plan_eula_response(&allocation, &member, answer)?;
        self.members.set_status(plan.member_id, plan.new_status).await?;
        log_events(&plan.events);
        tracing::info!(
            allocation_id = %allocation_id,
            username = %member.username,
            status = %plan.new_status,
            "EULA reviewed"
        );
        dispatch(
            self.notifier.as_ref(),
            templates::eula_reviewed(
                &self.email_config,
                allocation_id,
                &resource.name,
                &member.username,
                answer == EulaAnswer::Accept,
            ),
        )
        .await;
        Ok(plan.new_status)
    }

    /// Change a member's role. Unchanged roles are a silent no-op.
    pub async fn update_role(
        &self,
        actor: &str,
        allocation_id: Uuid,
        user_id: Uuid,
        role: Option<&str>,
    ) -> Result<(), AppError> {
        let (allocation, project, _resource) = self.load(allocation_id).await?;
        let member = self
            .members
            .get(allocation_id, user_id)
            .await?
            .ok_or_else(|| {
                AppError::not_found(format!("User {user_id} is not on this allocation"))
            })?;

        if let Some(new_role) =
            plan_role_update(&allocation, &member, project.pi_user_id, role)?
        {
            self.members.set_role(member.id, &new_role).await?;
            self.audit
                .record(
                    allocation_id,
                    actor,
                    &format!(
                        "Changed role of user \"{}\" from \"{}\" to \"{new_role}\"",
                        member.username,
                        member.role.as_deref().unwrap_or("None")
                    ),
                )
                .await?;
            tracing::info!(
                actor = %actor,
                allocation_id = %allocation_id,
                username = %member.username,
                role = %new_role,
                "Allocation user role updated"
            );
        }
        Ok(())
    }

    async fn recipients(&self, project_id: Uuid) -> Result<Vec<String>, AppError> {
        Ok(self
            .projects
            .list_notification_recipients(project_id)
            .await?
            .into_iter()
            .map(|m| m.email)
            .collect())
    }
}
