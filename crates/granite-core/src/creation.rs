//! New allocation request planning.

use crate::config::AllocationPolicy;
use crate::error::AppError;
use crate::events::DomainEvent;
use crate::models::{AllocationStatus, Project, Resource};
use uuid::Uuid;

/// A validated new allocation, ready to persist. The service adds the PI
/// and requested users through the membership planner.
#[derive(Debug, Clone)]
pub struct AllocationDraft {
    pub project_id: Uuid,
    pub resource_id: Uuid,
    pub status: AllocationStatus,
    pub quantity: i32,
    pub justification: String,
    pub is_changeable: bool,
    /// Auto-created account attribute: (attribute type name, value).
    pub account_attribute: Option<(String, String)>,
}

/// Validate a new allocation request against the project, the resource, and
/// policy.
pub fn plan_create_allocation(
    project: &Project,
    resource: &Resource,
    policy: &AllocationPolicy,
    active_allocation_count: i64,
    quantity: i32,
    justification: &str,
    account_name: Option<&str>,
) -> Result<AllocationDraft, AppError> {
    if project.status.is_terminal() {
        return Err(AppError::guard(format!(
            "You cannot request an allocation in a project with status {}.",
            project.status
        )));
    }
    if project.needs_review {
        return Err(AppError::guard(
            "You cannot request a new allocation while the project review is pending.",
        ));
    }
    if justification.trim().is_empty() {
        return Err(AppError::validation("Justification must not be empty."));
    }
    if quantity < 1 {
        return Err(AppError::validation("Quantity must be at least 1."));
    }
    if let Some(limit) = resource.allocation_limit {
        if active_allocation_count >= i64::from(limit) {
            return Err(AppError::guard(format!(
                "The project already has {active_allocation_count} allocations of resource '{}'; the limit is {limit}.",
                resource.name
            )));
        }
    }

    let account_attribute = match policy.account_mapping.get(&resource.name) {
        Some(type_name) => {
            let value = account_name.ok_or_else(|| {
                AppError::validation(format!(
                    "Resource '{}' requires an account name.",
                    resource.name
                ))
            })?;
            Some((type_name.clone(), value.to_string()))
        }
        None => None,
    };

    let status = if resource.requires_payment {
        policy.invoice_default_status
    } else {
        AllocationStatus::New
    };

    Ok(AllocationDraft {
        project_id: project.id,
        resource_id: resource.id,
        status,
        quantity,
        justification: justification.to_string(),
        is_changeable: policy.default_changeable,
        account_attribute,
    })
}

/// The event announcing a persisted new request.
pub fn requested_event(allocation_id: Uuid) -> DomainEvent {
    DomainEvent::AllocationRequested { allocation_id }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProjectStatus;
    use chrono::Utc;

    fn project(status: ProjectStatus) -> Project {
        Project {
            id: Uuid::new_v4(),
            title: "Materials".into(),
            status,
            pi_user_id: Uuid::new_v4(),
            pi_username: "pi_omar".into(),
            end_date: None,
            needs_review: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn resource(requires_payment: bool, allocation_limit: Option<i32>) -> Resource {
        Resource {
            id: Uuid::new_v4(),
            name: "cluster".into(),
            description: None,
            user_limit: None,
            eula: None,
            requires_eula: false,
            requires_account: true,
            requires_resource_account: false,
            requires_payment,
            allocation_limit,
            review_groups: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_payment_resource_uses_invoice_status() {
        let policy = AllocationPolicy::default();
        let draft = plan_create_allocation(
            &project(ProjectStatus::Active),
            &resource(true, None),
            &policy,
            0,
            1,
            "benchmarking",
            None,
        )
        .unwrap();
        assert_eq!(draft.status, AllocationStatus::PaymentPending);

        let draft = plan_create_allocation(
            &project(ProjectStatus::Active),
            &resource(false, None),
            &policy,
            0,
            1,
            "benchmarking",
            None,
        )
        .unwrap();
        assert_eq!(draft.status, AllocationStatus::New);
    }

    #[test]
    fn test_allocation_limit_enforced() {
        let policy = AllocationPolicy::default();
        let err = plan_create_allocation(
            &project(ProjectStatus::Active),
            &resource(false, Some(2)),
            &policy,
            2,
            1,
            "more",
            None,
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Guard(_)));
    }

    #[test]
    fn test_account_mapping_creates_attribute() {
        let mut policy = AllocationPolicy::default();
        policy
            .account_mapping
            .insert("cluster".into(), "slurm_account_name".into());
        let draft = plan_create_allocation(
            &project(ProjectStatus::Active),
            &resource(false, None),
            &policy,
            0,
            1,
            "simulations",
            Some("matsci"),
        )
        .unwrap();
        assert_eq!(
            draft.account_attribute,
            Some(("slurm_account_name".into(), "matsci".into()))
        );

        let err = plan_create_allocation(
            &project(ProjectStatus::Active),
            &resource(false, None),
            &policy,
            0,
            1,
            "simulations",
            None,
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_terminal_project_rejected() {
        let err = plan_create_allocation(
            &project(ProjectStatus::Expired),
            &resource(false, None),
            &AllocationPolicy::default(),
            0,
            1,
            "why",
            None,
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Guard(_)));
    }
}
