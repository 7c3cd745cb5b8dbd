//! Allocation creation and status review orchestration.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use granite_core::creation::plan_create_allocation;
use granite_core::lifecycle::{plan_status_update, ReviewAction, StatusUpdateForm, TransitionEmail};
use granite_core::models::{Allocation, Project, Resource};
use granite_core::{AllocationPolicy, AppError, EmailConfig};
use granite_db::{
    AdminActionRepository, AllocationRepository, AllocationUserRepository, AttributeRepository,
    ProjectRepository, ResourceRepository,
};

use crate::audit::allocation_diff;
use crate::log_events;
use crate::membership::MembershipService;
use crate::notification::{dispatch, templates, Notifier};

pub struct AllocationService {
    allocations: AllocationRepository,
    members: AllocationUserRepository,
    attributes: AttributeRepository,
    projects: ProjectRepository,
    resources: ResourceRepository,
    audit: AdminActionRepository,
    membership: Arc<MembershipService>,
    notifier: Arc<dyn Notifier>,
    policy: AllocationPolicy,
    email_config: EmailConfig,
}

/// Input for a new allocation request.
#[derive(Debug, Clone)]
pub struct CreateAllocationInput {
    pub project_id: Uuid,
    pub resource_id: Uuid,
    pub quantity: i32,
    pub justification: String,
    pub account_name: Option<String>,
    /// Users to add alongside the PI: (user id, username).
    pub users: Vec<(Uuid, String)>,
}

impl AllocationService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        allocations: AllocationRepository,
        members: AllocationUserRepository,
        attributes: AttributeRepository,
        projects: ProjectRepository,
        resources: ResourceRepository,
        audit: AdminActionRepository,
        membership: Arc<MembershipService>,
        notifier: Arc<dyn Notifier>,
        policy: AllocationPolicy,
        email_config: EmailConfig,
    ) -> Self {
        Self {
            allocations,
            members,
            attributes,
            projects,
            resources,
            audit,
            membership,
            notifier,
            policy,
            email_config,
        }
    }

    pub async fn load_allocation(&self, id: Uuid) -> Result<Allocation, AppError> {
        self.allocations
            .get(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Allocation {id} not found")))
    }

    async fn load_context(&self, allocation: &Allocation) -> Result<(Project, Resource), AppError> {
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
        Ok((project, resource))
    }

    /// Request a new allocation: validate against policy, persist it, attach
    /// the account attribute, add the PI and the requested users, and notify
    /// the admin queue.
    pub async fn create(
        &self,
        actor: &str,
        input: CreateAllocationInput,
    ) -> Result<Allocation, AppError> {
        let project = self.projects.get(input.project_id).await?.ok_or_else(|| {
            AppError::not_found(format!("Project {} not found", input.project_id))
        })?;
        let resource = self.resources.get(input.resource_id).await?.ok_or_else(|| {
            AppError::not_found(format!("Resource {} not found", input.resource_id))
        })?;
        let active_count = self
            .allocations
            .count_active_for_project_resource(project.id, resource.id)
            .await?;

        let draft = plan_create_allocation(
            &project,
            &resource,
            &self.policy,
            active_count,
            input.quantity,
            &input.justification,
            input.account_name.as_deref(),
        )?;
        let allocation = self.allocations.create(&draft).await?;

        if let Some((type_name, value)) = &draft.account_attribute {
            let attr_type = self
                .attributes
                .get_type_by_name(type_name)
                .await?
                .ok_or_else(|| {
                    AppError::Config(format!(
                        "Account mapping points at unknown attribute type '{type_name}'"
                    ))
                })?;
            let attribute = self.attributes.create(allocation.id, attr_type.id, value).await?;
            if attr_type.has_usage {
                self.attributes.ensure_usage_row(attribute.id).await?;
            }
        }

        let mut candidates = vec![(project.pi_user_id, project.pi_username.clone())];
        candidates.extend(
            input
                .users
                .iter()
                .filter(|(id, _)| *id != project.pi_user_id)
                .cloned(),
        );
        self.membership
            .add_users_internal(&allocation, &project, &resource, &candidates)
            .await?;

        log_events(&[granite_core::creation::requested_event(allocation.id)]);
        tracing::info!(
            actor = %actor,
            allocation_id = %allocation.id,
            project_id = %project.id,
            resource = %resource.name,
            "Allocation requested"
        );
        dispatch(
            self.notifier.as_ref(),
            templates::new_allocation_request(
                &self.email_config,
                allocation.id,
                &resource.name,
                &project.title,
                &project.pi_username,
            ),
        )
        .await;

        Ok(allocation)
    }

    /// Review an allocation: apply the reviewer's form under the transition
    /// guard, audit the field changes, and notify the project.
    pub async fn update_status(
        &self,
        actor: &str,
        allocation_id: Uuid,
        form: StatusUpdateForm,
        action_token: &str,
    ) -> Result<(Allocation, String), AppError> {
        let action = ReviewAction::parse(action_token)?;
        let allocation = self.load_allocation(allocation_id).await?;
        let (project, resource) = self.load_context(&allocation).await?;
        let members = self.members.list_for_allocation(allocation_id).await?;
        let today = Utc::now().date_naive();

        let plan = plan_status_update(&allocation, &project, &members, &form, action, today)?;
        let saved = self.allocations.save(&plan.allocation).await?;

        let audit_lines = allocation_diff(&allocation, &saved);
        self.audit
            .record_all(allocation_id, actor, &audit_lines)
            .await?;
        log_events(&plan.events);
        tracing::info!(
            actor = %actor,
            allocation_id = %allocation_id,
            action = %action_token,
            status = %saved.status,
            "Allocation status reviewed"
        );

        if let Some(email) = plan.email {
            let recipients = self
                .projects
                .list_notification_recipients(project.id)
                .await?
                .into_iter()
                .map(|m| m.email)
                .collect();
            let rendered = match email {
                TransitionEmail::Activated => templates::allocation_activated(
                    &self.email_config,
                    recipients,
                    allocation_id,
                    &resource.name,
                    &project.title,
                ),
                TransitionEmail::Denied
                | TransitionEmail::Revoked
                | TransitionEmail::Removed => templates::allocation_status_changed(
                    &self.email_config,
                    recipients,
                    allocation_id,
                    &resource.name,
                    &project.title,
                    saved.status.label(),
                ),
            };
            dispatch(self.notifier.as_ref(), rendered).await;
        }

        Ok((saved, plan.message))
    }
}
