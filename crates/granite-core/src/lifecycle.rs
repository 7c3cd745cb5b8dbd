//! Status transition guard.
//!
//! `plan_status_update` is a pure function from the current state and the
//! reviewer's form to a `TransitionPlan`. Nothing here touches storage; the
//! service layer persists the plan and drains its events.

use chrono::NaiveDate;
use uuid::Uuid;

use crate::error::AppError;
use crate::events::DomainEvent;
use crate::models::{Allocation, AllocationStatus, AllocationUser, Project, ProjectStatus};

/// Reviewer action accompanying a status update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewAction {
    /// Persist the form fields as-is.
    Update,
    /// Approve: force status Active and reset the end date from the project.
    Approve,
    /// Approve without applying the rest of the form.
    AutoApprove,
    /// Deny: force status Denied.
    Deny,
}

impl ReviewAction {
    /// Parse the wire token. Unknown tokens are a `BadRequest`, distinct
    /// from guard failures.
    pub fn parse(token: &str) -> Result<Self, AppError> {
        match token {
            "update" => Ok(Self::Update),
            "approve" => Ok(Self::Approve),
            "auto-approve" => Ok(Self::AutoApprove),
            "deny" => Ok(Self::Deny),
            other => Err(AppError::bad_request(format!(
                "Unknown review action '{other}'"
            ))),
        }
    }

    pub fn is_approval(self) -> bool {
        matches!(self, Self::Approve | Self::AutoApprove)
    }

    /// Whether the form fields are applied before the status override.
    fn applies_form(self) -> bool {
        !matches!(self, Self::AutoApprove)
    }
}

/// The reviewer's submitted fields.
#[derive(Debug, Clone)]
pub struct StatusUpdateForm {
    pub status: AllocationStatus,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub description: Option<String>,
    pub is_locked: bool,
    pub is_changeable: bool,
}

impl StatusUpdateForm {
    /// A form pre-filled from the allocation, for actions that only flip
    /// the status.
    pub fn from_allocation(allocation: &Allocation) -> Self {
        Self {
            status: allocation.status,
            start_date: allocation.start_date,
            end_date: allocation.end_date,
            description: allocation.description.clone(),
            is_locked: allocation.is_locked,
            is_changeable: allocation.is_changeable,
        }
    }
}

/// Which customer-facing email template the transition triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionEmail {
    Activated,
    Denied,
    Revoked,
    Removed,
}

#[derive(Debug, Clone)]
pub struct TransitionPlan {
    /// The allocation with the transition applied.
    pub allocation: Allocation,
    /// Ordered events: the allocation-level event first, then one per
    /// cascaded member in input order.
    pub events: Vec<DomainEvent>,
    pub email: Option<TransitionEmail>,
    /// Flash-style message describing the outcome.
    pub message: String,
}

/// Decide the outcome of a reviewer's status update.
///
/// Same-status resubmission is a plain update: fields persist, no events,
/// no email.
pub fn plan_status_update(
    allocation: &Allocation,
    project: &Project,
    members: &[AllocationUser],
    form: &StatusUpdateForm,
    action: ReviewAction,
    today: NaiveDate,
) -> Result<TransitionPlan, AppError> {
    let mut next = allocation.clone();
    if action.applies_form() {
        next.status = form.status;
        next.start_date = form.start_date;
        next.end_date = form.end_date;
        next.description = form.description.clone();
        next.is_locked = form.is_locked;
        next.is_changeable = form.is_changeable;
    }
    if action.is_approval() {
        next.status = AllocationStatus::Active;
    } else if action == ReviewAction::Deny {
        next.status = AllocationStatus::Denied;
    }

    let old_status = allocation.status;
    let mut events = Vec::new();
    let mut email = None;
    let message;

    if old_status != AllocationStatus::Active && next.status == AllocationStatus::Active {
        if project.status != ProjectStatus::Active {
            return Err(AppError::guard(format!(
                "Project '{}' must be approved before the allocation can be activated.",
                project.title
            )));
        }
        if next.start_date.is_none() {
            next.start_date = Some(today);
        }
        if action.is_approval() || next.end_date.is_none() {
            next.end_date = project.end_date;
        }
        events.push(DomainEvent::AllocationActivated {
            allocation_id: next.id,
        });
        events.extend(activation_cascade(next.id, members));
        email = Some(TransitionEmail::Activated);
        message = format!("Allocation activated for project '{}'.", project.title);
    } else if old_status != next.status
        && matches!(
            next.status,
            AllocationStatus::Denied
                | AllocationStatus::New
                | AllocationStatus::Revoked
                | AllocationStatus::Removed
        )
    {
        if next.status == AllocationStatus::New {
            next.end_date = None;
        } else {
            next.end_date = Some(today);
        }
        if next.status.is_disabling() {
            events.push(DomainEvent::AllocationDisabled {
                allocation_id: next.id,
            });
            events.extend(disable_cascade(next.id, members));
            email = Some(match next.status {
                AllocationStatus::Denied => TransitionEmail::Denied,
                AllocationStatus::Revoked => TransitionEmail::Revoked,
                _ => TransitionEmail::Removed,
            });
        }
        message = format!(
            "Allocation status changed to {} for project '{}'.",
            next.status, project.title
        );
    } else {
        message = "Allocation updated.".to_string();
    }

    Ok(TransitionPlan {
        allocation: next,
        events,
        email,
        message,
    })
}

fn activation_cascade(allocation_id: Uuid, members: &[AllocationUser]) -> Vec<DomainEvent> {
    members
        .iter()
        .filter(|m| m.status.cascades_on_activate())
        .map(|m| DomainEvent::UserActivated {
            allocation_id,
            user_id: m.user_id,
        })
        .collect()
}

fn disable_cascade(allocation_id: Uuid, members: &[AllocationUser]) -> Vec<DomainEvent> {
    members
        .iter()
        .filter(|m| m.status.cascades_on_disable())
        .map(|m| DomainEvent::UserRemoved {
            allocation_id,
            user_id: m.user_id,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AllocationUserStatus;
    use chrono::Utc;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn project(status: ProjectStatus) -> Project {
        Project {
            id: Uuid::new_v4(),
            title: "Protein Folding".into(),
            status,
            pi_user_id: Uuid::new_v4(),
            pi_username: "pi_carol".into(),
            end_date: NaiveDate::from_ymd_opt(2025, 6, 1),
            needs_review: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn allocation(status: AllocationStatus) -> Allocation {
        Allocation {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            resource_id: Uuid::new_v4(),
            status,
            quantity: 1,
            justification: "simulation campaign".into(),
            description: None,
            start_date: None,
            end_date: None,
            is_locked: false,
            is_changeable: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn member(alloc: &Allocation, status: AllocationUserStatus) -> AllocationUser {
        AllocationUser {
            id: Uuid::new_v4(),
            allocation_id: alloc.id,
            user_id: Uuid::new_v4(),
            username: "user".into(),
            status,
            role: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_unknown_action_token_is_bad_request() {
        let err = ReviewAction::parse("escalate").unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert_eq!(ReviewAction::parse("auto-approve").unwrap(), ReviewAction::AutoApprove);
    }

    #[test]
    fn test_activation_requires_active_project() {
        let alloc = allocation(AllocationStatus::New);
        let form = StatusUpdateForm::from_allocation(&alloc);
        let err = plan_status_update(
            &alloc,
            &project(ProjectStatus::ReviewPending),
            &[],
            &form,
            ReviewAction::Approve,
            today(),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Guard(_)));
    }

    #[test]
    fn test_first_activation_defaults_dates() {
        let alloc = allocation(AllocationStatus::New);
        let proj = project(ProjectStatus::Active);
        let form = StatusUpdateForm::from_allocation(&alloc);
        let plan =
            plan_status_update(&alloc, &proj, &[], &form, ReviewAction::Approve, today()).unwrap();
        assert_eq!(plan.allocation.status, AllocationStatus::Active);
        assert_eq!(plan.allocation.start_date, Some(today()));
        assert_eq!(plan.allocation.end_date, proj.end_date);
        assert_eq!(plan.email, Some(TransitionEmail::Activated));
    }

    #[test]
    fn test_activation_cascade_excludes_eula_and_errored_members() {
        let alloc = allocation(AllocationStatus::New);
        let members = vec![
            member(&alloc, AllocationUserStatus::Active),
            member(&alloc, AllocationUserStatus::Invited),
            member(&alloc, AllocationUserStatus::PendingEula),
            member(&alloc, AllocationUserStatus::DeclinedEula),
            member(&alloc, AllocationUserStatus::Removed),
            member(&alloc, AllocationUserStatus::Error),
        ];
        let form = StatusUpdateForm::from_allocation(&alloc);
        let plan = plan_status_update(
            &alloc,
            &project(ProjectStatus::Active),
            &members,
            &form,
            ReviewAction::Approve,
            today(),
        )
        .unwrap();

        let user_events: Vec<_> = plan
            .events
            .iter()
            .filter(|e| matches!(e, DomainEvent::UserActivated { .. }))
            .collect();
        assert_eq!(user_events.len(), 2);
        assert!(matches!(
            plan.events[0],
            DomainEvent::AllocationActivated { .. }
        ));
    }

    #[test]
    fn test_denial_sets_end_date_and_cascades_removal() {
        let mut alloc = allocation(AllocationStatus::Active);
        alloc.end_date = NaiveDate::from_ymd_opt(2025, 1, 1);
        let members = vec![
            member(&alloc, AllocationUserStatus::Active),
            member(&alloc, AllocationUserStatus::PendingEula),
            member(&alloc, AllocationUserStatus::Removed),
            member(&alloc, AllocationUserStatus::Error),
        ];
        let mut form = StatusUpdateForm::from_allocation(&alloc);
        form.status = AllocationStatus::Denied;
        let plan = plan_status_update(
            &alloc,
            &project(ProjectStatus::Active),
            &members,
            &form,
            ReviewAction::Deny,
            today(),
        )
        .unwrap();

        assert_eq!(plan.allocation.status, AllocationStatus::Denied);
        assert_eq!(plan.allocation.end_date, Some(today()));
        assert_eq!(plan.email, Some(TransitionEmail::Denied));
        let removals: Vec<_> = plan
            .events
            .iter()
            .filter(|e| matches!(e, DomainEvent::UserRemoved { .. }))
            .collect();
        assert_eq!(removals.len(), 2);
    }

    #[test]
    fn test_reset_to_new_clears_end_date_keeps_start_date() {
        let mut alloc = allocation(AllocationStatus::Active);
        alloc.start_date = NaiveDate::from_ymd_opt(2024, 1, 1);
        alloc.end_date = NaiveDate::from_ymd_opt(2025, 1, 1);
        let mut form = StatusUpdateForm::from_allocation(&alloc);
        form.status = AllocationStatus::New;
        let plan = plan_status_update(
            &alloc,
            &project(ProjectStatus::Active),
            &[member(&alloc, AllocationUserStatus::Active)],
            &form,
            ReviewAction::Update,
            today(),
        )
        .unwrap();

        assert_eq!(plan.allocation.status, AllocationStatus::New);
        assert_eq!(
            plan.allocation.start_date,
            NaiveDate::from_ymd_opt(2024, 1, 1)
        );
        assert_eq!(plan.allocation.end_date, None);
        assert!(plan.events.is_empty());
        assert!(plan.email.is_none());
    }

    #[test]
    fn test_same_status_resubmission_is_plain_update() {
        let mut alloc = allocation(AllocationStatus::Active);
        alloc.start_date = NaiveDate::from_ymd_opt(2024, 1, 1);
        alloc.end_date = NaiveDate::from_ymd_opt(2025, 1, 1);
        let mut form = StatusUpdateForm::from_allocation(&alloc);
        form.description = Some("quota bumped".into());
        let plan = plan_status_update(
            &alloc,
            &project(ProjectStatus::Active),
            &[member(&alloc, AllocationUserStatus::Active)],
            &form,
            ReviewAction::Update,
            today(),
        )
        .unwrap();

        assert_eq!(plan.allocation.status, AllocationStatus::Active);
        assert_eq!(plan.allocation.description.as_deref(), Some("quota bumped"));
        assert!(plan.events.is_empty());
        assert!(plan.email.is_none());
        assert_eq!(plan.message, "Allocation updated.");
    }

    #[test]
    fn test_approve_resets_end_date_from_project() {
        let mut alloc = allocation(AllocationStatus::Expired);
        alloc.start_date = NaiveDate::from_ymd_opt(2023, 1, 1);
        alloc.end_date = NaiveDate::from_ymd_opt(2024, 1, 1);
        let proj = project(ProjectStatus::Active);
        let form = StatusUpdateForm::from_allocation(&alloc);
        let plan =
            plan_status_update(&alloc, &proj, &[], &form, ReviewAction::Approve, today()).unwrap();
        assert_eq!(plan.allocation.end_date, proj.end_date);
        assert_eq!(plan.allocation.start_date, NaiveDate::from_ymd_opt(2023, 1, 1));
    }

    #[test]
    fn test_auto_approve_ignores_form_fields() {
        let alloc = allocation(AllocationStatus::New);
        let proj = project(ProjectStatus::Active);
        let mut form = StatusUpdateForm::from_allocation(&alloc);
        form.is_locked = true;
        form.description = Some("should not land".into());
        let plan = plan_status_update(
            &alloc,
            &proj,
            &[],
            &form,
            ReviewAction::AutoApprove,
            today(),
        )
        .unwrap();
        assert_eq!(plan.allocation.status, AllocationStatus::Active);
        assert!(!plan.allocation.is_locked);
        assert_eq!(plan.allocation.description, None);
    }
}
