//! Change-request orchestration.

use std::sync::Arc;

use uuid::Uuid;

use granite_core::change::{
    plan_create_change_request, plan_resolve_change_request, AttributeEdit, ChangeAction,
    ChangeEmail, ResolutionEdits,
};
use granite_core::models::{
    Allocation, AllocationChangeRequest, AttributeChangeRequest, Project, Resource,
};
use granite_core::{AppError, EmailConfig};
use granite_db::{
    AdminActionRepository, AllocationRepository, AttributeRepository, ChangeRequestRepository,
    ProjectRepository, ResourceRepository,
};

use crate::log_events;
use crate::notification::{dispatch, templates, Notifier};

pub struct ChangeRequestService {
    allocations: AllocationRepository,
    attributes: AttributeRepository,
    requests: ChangeRequestRepository,
    projects: ProjectRepository,
    resources: ResourceRepository,
    audit: AdminActionRepository,
    notifier: Arc<dyn Notifier>,
    email_config: EmailConfig,
}

impl ChangeRequestService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        allocations: AllocationRepository,
        attributes: AttributeRepository,
        requests: ChangeRequestRepository,
        projects: ProjectRepository,
        resources: ResourceRepository,
        audit: AdminActionRepository,
        notifier: Arc<dyn Notifier>,
        email_config: EmailConfig,
    ) -> Self {
        Self {
            allocations,
            attributes,
            requests,
            projects,
            resources,
            audit,
            notifier,
            email_config,
        }
    }

    async fn load_context(
        &self,
        allocation: &Allocation,
    ) -> Result<(Project, Resource), AppError> {
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

    /// File a new change request against an allocation.
    pub async fn create(
        &self,
        actor: &str,
        allocation_id: Uuid,
        end_date_extension: i32,
        justification: &str,
        edits: &[AttributeEdit],
    ) -> Result<AllocationChangeRequest, AppError> {
        let allocation = self
            .allocations
            .get(allocation_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Allocation {allocation_id} not found")))?;
        let (project, resource) = self.load_context(&allocation).await?;
        let attributes = self.attributes.list_details(allocation_id).await?;
        let has_pending = self.requests.has_pending(allocation_id).await?;

        let draft = plan_create_change_request(
            &allocation,
            &project,
            &attributes,
            has_pending,
            end_date_extension,
            justification,
            edits,
        )?;
        let request = self.requests.create_from_draft(&draft).await?;

        log_events(&[granite_core::DomainEvent::ChangeRequestCreated {
            allocation_id,
            change_request_id: request.id,
        }]);
        tracing::info!(
            actor = %actor,
            allocation_id = %allocation_id,
            change_request_id = %request.id,
            "Change request filed"
        );
        dispatch(
            self.notifier.as_ref(),
            templates::change_request_created(
                &self.email_config,
                allocation_id,
                &resource.name,
                &project.title,
            ),
        )
        .await;
        Ok(request)
    }

    pub async fn get(
        &self,
        request_id: Uuid,
    ) -> Result<(AllocationChangeRequest, Vec<AttributeChangeRequest>), AppError> {
        let request = self
            .requests
            .get(request_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Change request {request_id} not found")))?;
        let changes = self.requests.list_changes(request_id).await?;
        Ok((request, changes))
    }

    pub async fn list_for_allocation(
        &self,
        allocation_id: Uuid,
    ) -> Result<Vec<AllocationChangeRequest>, AppError> {
        self.requests.list_for_allocation(allocation_id).await
    }

    pub async fn list_pending(&self) -> Result<Vec<AllocationChangeRequest>, AppError> {
        self.requests.list_pending()
            .await
    }

    /// Resolve (or edit) a change request: approve, deny, or update.
    pub async fn resolve(
        &self,
        actor: &str,
        request_id: Uuid,
        action_token: &str,
        edits: ResolutionEdits,
    ) -> Result<String, AppError> {
        let action = ChangeAction::parse(action_token)?;
        let (request, changes) = self.get(request_id).await?;
        let allocation = self
            .allocations
            .get(request.allocation_id)
            .await?
            .ok_or_else(|| {
                AppError::not_found(format!("Allocation {} not found", request.allocation_id))
            })?;
        let (project, resource) = self.load_context(&allocation).await?;
        let attributes = self.attributes.list_details(allocation.id).await?;

        let plan = plan_resolve_change_request(
            &allocation,
            &request,
            &changes,
            &attributes,
            action,
            &edits,
        )?;

        self.requests
            .save_resolution(
                &plan.request,
                &plan.attribute_changes,
                &plan.apply_values,
                plan.new_end_date,
            )
            .await?;

        self.audit.record_all(allocation.id, actor, &plan.audit).await?;
        if action != ChangeAction::Update {
            self.audit
                .record(
                    allocation.id,
                    actor,
                    &format!("Change request {}: {}", request.id, plan.request.status),
                )
                .await?;
        }
        log_events(&plan.events);
        tracing::info!(
            actor = %actor,
            allocation_id = %allocation.id,
            change_request_id = %request_id,
            action = %action_token,
            "Change request resolved"
        );

        if let Some(email) = plan.email {
            let recipients = self
                .projects
                .list_notification_recipients(project.id)
                .await?
                .into_iter()
                .map(|m| m.email)
                .collect();
            dispatch(
                self.notifier.as_ref(),
                templates::change_request_resolved(
                    &self.email_config,
                    recipients,
                    allocation.id,
                    &resource.name,
                    &project.title,
                    email == ChangeEmail::Approved,
                ),
            )
            .await;
        }
        Ok(plan.message)
    }

    /// Drop one proposed attribute change from a pending request.
    pub async fn delete_attribute_change(
        &self,
        actor: &str,
        request_id: Uuid,
        change_id: Uuid,
    ) -> Result<(), AppError> {
        let (request, changes) = self.get(request_id).await?;
        if !changes.iter().any(|c| c.id == change_id) {
            return Err(AppError::not_found(format!(
                "Attribute change {change_id} not found on request {request_id}"
            )));
        }
        if !self.requests.delete_change(change_id).await? {
            return Err(AppError::guard(
                "Only pending change requests can be edited.",
            ));
        }
        self.audit
            .record(
                request.allocation_id,
                actor,
                &format!("Deleted a requested attribute change from change request {request_id}"),
            )
            .await?;
        Ok(())
    }
}
