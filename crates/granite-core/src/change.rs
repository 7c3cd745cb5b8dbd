//! Change-request planning: creation preconditions and resolution.

use chrono::{Duration, NaiveDate};
use uuid::Uuid;

use crate::error::AppError;
use crate::events::DomainEvent;
use crate::models::{
    Allocation, AllocationChangeRequest, AttributeChangeRequest, AttributeDetail,
    ChangeRequestStatus, Project,
};
use crate::validation::validate_attribute_value;

/// A proposed new value for one attribute, keyed by the attribute row.
#[derive(Debug, Clone)]
pub struct AttributeEdit {
    pub allocation_attribute_id: Uuid,
    pub new_value: String,
}

/// The validated contents of a new change request, ready to persist.
#[derive(Debug, Clone)]
pub struct ChangeRequestDraft {
    pub allocation_id: Uuid,
    pub end_date_extension: i32,
    pub justification: String,
    /// (attribute id, old value, new value), in submission order.
    pub attribute_changes: Vec<(Uuid, String, String)>,
}

/// Validate a new change request against the allocation's current state.
///
/// Empty proposed values mean "no change" for that attribute; a proposed
/// value equal to the current one still counts as a change (approving it is
/// a data-level no-op).
pub fn plan_create_change_request(
    allocation: &Allocation,
    project: &Project,
    attributes: &[AttributeDetail],
    has_pending_request: bool,
    end_date_extension: i32,
    justification: &str,
    edits: &[AttributeEdit],
) -> Result<ChangeRequestDraft, AppError> {
    if allocation.is_locked {
        return Err(AppError::guard(
            "You cannot request a change on a locked allocation.",
        ));
    }
    if !allocation.is_changeable {
        return Err(AppError::guard(
            "This allocation does not accept change requests.",
        ));
    }
    if !allocation.status.allows_change_requests() {
        return Err(AppError::guard(format!(
            "You cannot request a change on an allocation with status {}.",
            allocation.status
        )));
    }
    if project.status.is_terminal() {
        return Err(AppError::guard(format!(
            "You cannot request a change on an allocation in a project with status {}.",
            project.status
        )));
    }
    if project.needs_review {
        return Err(AppError::guard(
            "You cannot request a change on an allocation while the project review is pending.",
        ));
    }
    if has_pending_request {
        return Err(AppError::guard(
            "You already have a pending change request for this allocation.",
        ));
    }
    if end_date_extension < 0 {
        return Err(AppError::validation(
            "End date extension must not be negative.",
        ));
    }

    let mut attribute_changes = Vec::new();
    for edit in edits {
        if edit.new_value.is_empty() {
            continue;
        }
        let attr = attributes
            .iter()
            .find(|a| a.id == edit.allocation_attribute_id)
            .ok_or_else(|| {
                AppError::not_found(format!(
                    "Allocation attribute {} not found",
                    edit.allocation_attribute_id
                ))
            })?;
        if !attr.is_changeable {
            return Err(AppError::guard(format!(
                "Attribute '{}' is not changeable.",
                attr.type_name
            )));
        }
        validate_attribute_value(attr.kind, &attr.type_name, &edit.new_value)?;
        attribute_changes.push((attr.id, attr.value.clone(), edit.new_value.clone()));
    }

    if end_date_extension == 0 && attribute_changes.is_empty() {
        return Err(AppError::validation(
            "You must request a new end date or a change to at least one attribute.",
        ));
    }

    Ok(ChangeRequestDraft {
        allocation_id: allocation.id,
        end_date_extension,
        justification: justification.to_string(),
        attribute_changes,
    })
}

/// Reviewer action on a pending change request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeAction {
    Update,
    Approve,
    Deny,
}

impl ChangeAction {
    pub fn parse(token: &str) -> Result<Self, AppError> {
        match token {
            "update" => Ok(Self::Update),
            "approve" => Ok(Self::Approve),
            "deny" => Ok(Self::Deny),
            other => Err(AppError::bad_request(format!(
                "Unknown change request action '{other}'"
            ))),
        }
    }
}

/// Reviewer edits accompanying a resolution.
#[derive(Debug, Clone, Default)]
pub struct ResolutionEdits {
    pub end_date_extension: Option<i32>,
    /// (attribute change request id, new proposed value)
    pub new_values: Vec<(Uuid, String)>,
    pub notes: Option<String>,
}

/// Which customer email a resolution triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeEmail {
    Approved,
    Denied,
}

#[derive(Debug, Clone)]
pub struct ResolutionPlan {
    /// The change request with the resolution applied.
    pub request: AllocationChangeRequest,
    /// Attribute change rows with reviewer edits applied.
    pub attribute_changes: Vec<AttributeChangeRequest>,
    /// Attribute value writes to apply on approval: (attribute id, value).
    pub apply_values: Vec<(Uuid, String)>,
    /// New allocation end date, set on approval with a positive extension.
    pub new_end_date: Option<NaiveDate>,
    pub events: Vec<DomainEvent>,
    pub email: Option<ChangeEmail>,
    /// Audit lines for reviewer edits to the requested changes.
    pub audit: Vec<String>,
    pub message: String,
}

/// Decide the outcome of a reviewer's action on a change request.
///
/// Once resolved, only `notes` remains editable; approve and deny require a
/// Pending request.
pub fn plan_resolve_change_request(
    allocation: &Allocation,
    request: &AllocationChangeRequest,
    attribute_changes: &[AttributeChangeRequest],
    attributes: &[AttributeDetail],
    action: ChangeAction,
    edits: &ResolutionEdits,
) -> Result<ResolutionPlan, AppError> {
    let mut next = request.clone();
    if let Some(notes) = &edits.notes {
        next.notes = Some(notes.clone());
    }

    match action {
        ChangeAction::Update => {
            if request.status != ChangeRequestStatus::Pending {
                // Resolved requests only take note edits.
                return Ok(ResolutionPlan {
                    request: next,
                    attribute_changes: attribute_changes.to_vec(),
                    apply_values: Vec::new(),
                    new_end_date: None,
                    events: Vec::new(),
                    email: None,
                    audit: Vec::new(),
                    message: "Change request notes updated.".to_string(),
                });
            }
            let (changes, audit) =
                apply_reviewer_edits(&mut next, request, attribute_changes, attributes, edits)?;
            Ok(ResolutionPlan {
                request: next,
                attribute_changes: changes,
                apply_values: Vec::new(),
                new_end_date: None,
                events: Vec::new(),
                email: None,
                audit,
                message: "Change request updated.".to_string(),
            })
        }
        ChangeAction::Deny => {
            require_pending(request)?;
            next.status = ChangeRequestStatus::Denied;
            Ok(ResolutionPlan {
                request: next,
                attribute_changes: attribute_changes.to_vec(),
                apply_values: Vec::new(),
                new_end_date: None,
                events: Vec::new(),
                email: Some(ChangeEmail::Denied),
                audit: Vec::new(),
                message: "Change request denied.".to_string(),
            })
        }
        ChangeAction::Approve => {
            require_pending(request)?;
            let (changes, audit) =
                apply_reviewer_edits(&mut next, request, attribute_changes, attributes, edits)?;
            next.status = ChangeRequestStatus::Approved;

            let new_end_date = if next.end_date_extension > 0 {
                let end = allocation.end_date.ok_or_else(|| {
                    AppError::guard(
                        "Cannot extend the end date of an allocation without one.",
                    )
                })?;
                Some(end + Duration::days(i64::from(next.end_date_extension)))
            } else {
                None
            };

            let mut apply_values = Vec::new();
            let mut events = vec![DomainEvent::ChangeRequestApproved {
                allocation_id: allocation.id,
                change_request_id: request.id,
            }];
            for change in &changes {
                let attr = attributes
                    .iter()
                    .find(|a| a.id == change.allocation_attribute_id)
                    .ok_or_else(|| {
                        AppError::not_found(format!(
                            "Allocation attribute {} not found",
                            change.allocation_attribute_id
                        ))
                    })?;
                validate_attribute_value(attr.kind, &attr.type_name, &change.new_value)?;
                apply_values.push((attr.id, change.new_value.clone()));
                events.push(DomainEvent::AttributeChanged {
                    allocation_id: allocation.id,
                    allocation_attribute_id: attr.id,
                });
            }

            Ok(ResolutionPlan {
                request: next,
                attribute_changes: changes,
                apply_values,
                new_end_date,
                events,
                email: Some(ChangeEmail::Approved),
                audit,
                message: "Change request approved.".to_string(),
            })
        }
    }
}

fn require_pending(request: &AllocationChangeRequest) -> Result<(), AppError> {
    if request.status != ChangeRequestStatus::Pending {
        return Err(AppError::guard(format!(
            "This change request has already been resolved ({}).",
            request.status
        )));
    }
    Ok(())
}

/// Apply the reviewer's edits to the pending request, returning the edited
/// attribute change rows and the audit lines describing each edit.
fn apply_reviewer_edits(
    next: &mut AllocationChangeRequest,
    request: &AllocationChangeRequest,
    attribute_changes: &[AttributeChangeRequest],
    attributes: &[AttributeDetail],
    edits: &ResolutionEdits,
) -> Result<(Vec<AttributeChangeRequest>, Vec<String>), AppError> {
    let mut audit = Vec::new();

    if let Some(extension) = edits.end_date_extension {
        if extension < 0 {
            return Err(AppError::validation(
                "End date extension must not be negative.",
            ));
        }
        if extension != request.end_date_extension {
            audit.push(format!(
                "Changed end date extension from {} to {} days",
                request.end_date_extension, extension
            ));
            next.end_date_extension = extension;
        }
    }

    let mut changes = attribute_changes.to_vec();
    for (change_id, new_value) in &edits.new_values {
        let change = changes
            .iter_mut()
            .find(|c| c.id == *change_id)
            .ok_or_else(|| {
                AppError::not_found(format!("Attribute change request {change_id} not found"))
            })?;
        if *new_value != change.new_value {
            let attr = attributes
                .iter()
                .find(|a| a.id == change.allocation_attribute_id)
                .ok_or_else(|| {
                    AppError::not_found(format!(
                        "Allocation attribute {} not found",
                        change.allocation_attribute_id
                    ))
                })?;
            validate_attribute_value(attr.kind, &attr.type_name, new_value)?;
            audit.push(format!(
                "Changed requested value of '{}' from \"{}\" to \"{}\"",
                attr.type_name, change.new_value, new_value
            ));
            change.new_value = new_value.clone();
        }
    }

    Ok((changes, audit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        AllocationStatus, AttributeKind, ProjectStatus,
    };
    use chrono::Utc;

    fn allocation(status: AllocationStatus) -> Allocation {
        Allocation {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            resource_id: Uuid::new_v4(),
            status,
            quantity: 1,
            justification: "more storage".into(),
            description: None,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1),
            end_date: NaiveDate::from_ymd_opt(2024, 12, 31),
            is_locked: false,
            is_changeable: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn project(status: ProjectStatus) -> Project {
        Project {
            id: Uuid::new_v4(),
            title: "Genomics".into(),
            status,
            pi_user_id: Uuid::new_v4(),
            pi_username: "pi_dana".into(),
            end_date: NaiveDate::from_ymd_opt(2025, 6, 1),
            needs_review: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn attribute(alloc: &Allocation, kind: AttributeKind, value: &str, changeable: bool) -> AttributeDetail {
        AttributeDetail {
            id: Uuid::new_v4(),
            allocation_id: alloc.id,
            attribute_type_id: Uuid::new_v4(),
            type_name: "Storage Quota (GB)".into(),
            kind,
            is_unique: false,
            is_changeable: changeable,
            has_usage: false,
            value: value.into(),
            usage: None,
        }
    }

    fn pending_request(alloc: &Allocation, extension: i32) -> AllocationChangeRequest {
        AllocationChangeRequest {
            id: Uuid::new_v4(),
            allocation_id: alloc.id,
            status: ChangeRequestStatus::Pending,
            end_date_extension: extension,
            justification: "need more time".into(),
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn attr_change(
        request: &AllocationChangeRequest,
        attr: &AttributeDetail,
        new_value: &str,
    ) -> AttributeChangeRequest {
        AttributeChangeRequest {
            id: Uuid::new_v4(),
            change_request_id: request.id,
            allocation_attribute_id: attr.id,
            old_value: attr.value.clone(),
            new_value: new_value.into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_create_rejects_locked_allocation() {
        let mut alloc = allocation(AllocationStatus::Active);
        alloc.is_locked = true;
        let err = plan_create_change_request(
            &alloc,
            &project(ProjectStatus::Active),
            &[],
            false,
            30,
            "why",
            &[],
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Guard(_)));
    }

    #[test]
    fn test_create_rejects_ineligible_statuses() {
        for status in [
            AllocationStatus::New,
            AllocationStatus::Expired,
            AllocationStatus::Denied,
        ] {
            let err = plan_create_change_request(
                &allocation(status),
                &project(ProjectStatus::Active),
                &[],
                false,
                30,
                "why",
                &[],
            )
            .unwrap_err();
            assert!(matches!(err, AppError::Guard(_)), "status {status}");
        }
    }

    #[test]
    fn test_create_rejects_double_pending() {
        let err = plan_create_change_request(
            &allocation(AllocationStatus::Active),
            &project(ProjectStatus::Active),
            &[],
            true,
            30,
            "why",
            &[],
        )
        .unwrap_err();
        assert!(err.to_string().contains("pending change request"));
    }

    #[test]
    fn test_create_requires_at_least_one_change() {
        let alloc = allocation(AllocationStatus::Active);
        let attr = attribute(&alloc, AttributeKind::Int, "100", true);
        // Empty proposed values do not count as changes.
        let edits = vec![AttributeEdit {
            allocation_attribute_id: attr.id,
            new_value: String::new(),
        }];
        let err = plan_create_change_request(
            &alloc,
            &project(ProjectStatus::Active),
            &[attr],
            false,
            0,
            "why",
            &edits,
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_create_captures_old_and_new_values() {
        let alloc = allocation(AllocationStatus::Active);
        let attr = attribute(&alloc, AttributeKind::Int, "100", true);
        let edits = vec![AttributeEdit {
            allocation_attribute_id: attr.id,
            new_value: "250".into(),
        }];
        let draft = plan_create_change_request(
            &alloc,
            &project(ProjectStatus::Active),
            &[attr.clone()],
            false,
            0,
            "quota bump",
            &edits,
        )
        .unwrap();
        assert_eq!(draft.attribute_changes, vec![(attr.id, "100".into(), "250".into())]);
        assert_eq!(draft.end_date_extension, 0);
    }

    #[test]
    fn test_create_rejects_unchangeable_attribute_and_bad_value() {
        let alloc = allocation(AllocationStatus::Active);
        let frozen = attribute(&alloc, AttributeKind::Int, "100", false);
        let err = plan_create_change_request(
            &alloc,
            &project(ProjectStatus::Active),
            &[frozen.clone()],
            false,
            0,
            "why",
            &[AttributeEdit {
                allocation_attribute_id: frozen.id,
                new_value: "200".into(),
            }],
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Guard(_)));

        let typed = attribute(&alloc, AttributeKind::Int, "100", true);
        let err = plan_create_change_request(
            &alloc,
            &project(ProjectStatus::Active),
            &[typed.clone()],
            false,
            0,
            "why",
            &[AttributeEdit {
                allocation_attribute_id: typed.id,
                new_value: "lots".into(),
            }],
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_deny_mutates_nothing_but_status() {
        let alloc = allocation(AllocationStatus::Active);
        let attr = attribute(&alloc, AttributeKind::Int, "100", true);
        let request = pending_request(&alloc, 30);
        let changes = vec![attr_change(&request, &attr, "250")];
        let plan = plan_resolve_change_request(
            &alloc,
            &request,
            &changes,
            &[attr],
            ChangeAction::Deny,
            &ResolutionEdits {
                notes: Some("insufficient justification".into()),
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(plan.request.status, ChangeRequestStatus::Denied);
        assert!(plan.apply_values.is_empty());
        assert_eq!(plan.new_end_date, None);
        assert_eq!(plan.email, Some(ChangeEmail::Denied));
        assert_eq!(
            plan.request.notes.as_deref(),
            Some("insufficient justification")
        );
    }

    #[test]
    fn test_approve_extends_end_date_and_applies_attributes() {
        let alloc = allocation(AllocationStatus::Active);
        let attr = attribute(&alloc, AttributeKind::Int, "100", true);
        let request = pending_request(&alloc, 30);
        let changes = vec![attr_change(&request, &attr, "250")];
        let plan = plan_resolve_change_request(
            &alloc,
            &request,
            &changes,
            &[attr.clone()],
            ChangeAction::Approve,
            &ResolutionEdits::default(),
        )
        .unwrap();

        assert_eq!(plan.request.status, ChangeRequestStatus::Approved);
        assert_eq!(
            plan.new_end_date,
            NaiveDate::from_ymd_opt(2025, 1, 30)
        );
        assert_eq!(plan.apply_values, vec![(attr.id, "250".into())]);
        assert_eq!(plan.email, Some(ChangeEmail::Approved));
        assert!(matches!(
            plan.events[0],
            DomainEvent::ChangeRequestApproved { .. }
        ));
        assert!(matches!(
            plan.events[1],
            DomainEvent::AttributeChanged { .. }
        ));
    }

    #[test]
    fn test_approve_without_extension_keeps_end_date() {
        let alloc = allocation(AllocationStatus::Active);
        let attr = attribute(&alloc, AttributeKind::Int, "100", true);
        let request = pending_request(&alloc, 0);
        let changes = vec![attr_change(&request, &attr, "250")];
        let plan = plan_resolve_change_request(
            &alloc,
            &request,
            &changes,
            &[attr],
            ChangeAction::Approve,
            &ResolutionEdits::default(),
        )
        .unwrap();
        assert_eq!(plan.new_end_date, None);
    }

    #[test]
    fn test_approve_same_value_is_data_noop_but_marks_approved() {
        let alloc = allocation(AllocationStatus::Active);
        let attr = attribute(&alloc, AttributeKind::Int, "100", true);
        let request = pending_request(&alloc, 0);
        let changes = vec![attr_change(&request, &attr, "100")];
        let plan = plan_resolve_change_request(
            &alloc,
            &request,
            &changes,
            &[attr.clone()],
            ChangeAction::Approve,
            &ResolutionEdits::default(),
        )
        .unwrap();
        assert_eq!(plan.request.status, ChangeRequestStatus::Approved);
        assert_eq!(plan.apply_values, vec![(attr.id, "100".into())]);
    }

    #[test]
    fn test_reviewer_edits_are_audited() {
        let alloc = allocation(AllocationStatus::Active);
        let attr = attribute(&alloc, AttributeKind::Int, "100", true);
        let request = pending_request(&alloc, 30);
        let change = attr_change(&request, &attr, "250");
        let plan = plan_resolve_change_request(
            &alloc,
            &request,
            &[change.clone()],
            &[attr],
            ChangeAction::Approve,
            &ResolutionEdits {
                end_date_extension: Some(60),
                new_values: vec![(change.id, "300".into())],
                notes: None,
            },
        )
        .unwrap();

        assert_eq!(plan.request.end_date_extension, 60);
        assert_eq!(plan.attribute_changes[0].new_value, "300");
        assert_eq!(plan.audit.len(), 2);
        assert_eq!(
            plan.new_end_date,
            NaiveDate::from_ymd_opt(2025, 3, 1)
        );
    }

    #[test]
    fn test_resolved_request_only_takes_note_edits() {
        let alloc = allocation(AllocationStatus::Active);
        let mut request = pending_request(&alloc, 30);
        request.status = ChangeRequestStatus::Approved;
        let plan = plan_resolve_change_request(
            &alloc,
            &request,
            &[],
            &[],
            ChangeAction::Update,
            &ResolutionEdits {
                end_date_extension: Some(90),
                notes: Some("archived".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(plan.request.end_date_extension, 30);
        assert_eq!(plan.request.notes.as_deref(), Some("archived"));

        let err = plan_resolve_change_request(
            &alloc,
            &request,
            &[],
            &[],
            ChangeAction::Approve,
            &ResolutionEdits::default(),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Guard(_)));
    }

    #[test]
    fn test_approve_extension_without_end_date_is_guarded() {
        let mut alloc = allocation(AllocationStatus::Active);
        alloc.end_date = None;
        let request = pending_request(&alloc, 30);
        let err = plan_resolve_change_request(
            &alloc,
            &request,
            &[],
            &[],
            ChangeAction::Approve,
            &ResolutionEdits::default(),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Guard(_)));
    }
}
