//! Renewal planning: eligibility window and per-user dispositions.

use chrono::NaiveDate;
use uuid::Uuid;

use crate::config::AllocationPolicy;
use crate::error::AppError;
use crate::events::DomainEvent;
use crate::models::{Allocation, AllocationStatus, AllocationUser, AllocationUserStatus, Project};

/// What to do with a member when the allocation is renewed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    KeepInAllocation,
    KeepInProjectOnly,
    RemoveFromProject,
}

impl Disposition {
    pub fn parse(token: &str) -> Result<Self, AppError> {
        match token {
            "keep_in_allocation" => Ok(Self::KeepInAllocation),
            "keep_in_project_only" => Ok(Self::KeepInProjectOnly),
            "remove_from_project" => Ok(Self::RemoveFromProject),
            other => Err(AppError::bad_request(format!(
                "Unknown renewal disposition '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DispositionPlan {
    /// Membership rows on this allocation to flip to Removed.
    pub remove_member_ids: Vec<Uuid>,
    /// Users to remove from the whole project: from every active-ish
    /// allocation of the project and from the project itself.
    pub remove_from_project_user_ids: Vec<Uuid>,
    pub events: Vec<DomainEvent>,
}

/// The outcome of a renewal request.
///
/// The status flip to RenewalRequested is decided by eligibility alone and
/// is persisted before dispositions are examined; a disposition failure
/// surfaces as the inner `Err` and leaves that write in place.
#[derive(Debug)]
pub struct RenewalOutcome {
    pub new_status: AllocationStatus,
    pub dispositions: Result<DispositionPlan, AppError>,
}

/// Check whether the allocation may be renewed at all.
pub fn check_eligibility(
    allocation: &Allocation,
    project: &Project,
    policy: &AllocationPolicy,
    today: NaiveDate,
) -> Result<(), AppError> {
    if !policy.enable_renewal {
        return Err(AppError::guard("Allocation renewal is not enabled."));
    }
    if allocation.is_locked {
        return Err(AppError::guard("You cannot renew a locked allocation."));
    }
    if !allocation.status.is_renewable() {
        return Err(AppError::guard(format!(
            "You cannot renew an allocation with status {}.",
            allocation.status
        )));
    }
    if project.status.is_terminal() {
        return Err(AppError::guard(format!(
            "You cannot renew an allocation in a project with status {}.",
            project.status
        )));
    }
    if project.needs_review {
        return Err(AppError::guard(
            "You cannot renew an allocation while the project review is pending.",
        ));
    }
    let Some(expires_in) = allocation.expires_in(today) else {
        return Err(AppError::guard(
            "You cannot renew an allocation without an end date.",
        ));
    };
    if expires_in > policy.days_to_review_before_expiring {
        return Err(AppError::guard(format!(
            "It is too early to renew: the allocation expires in {expires_in} days and renewal opens {} days before expiry.",
            policy.days_to_review_before_expiring
        )));
    }
    if expires_in < -policy.days_to_review_after_expiring {
        return Err(AppError::guard(format!(
            "It is too late to renew: the allocation expired {} days ago and the grace period is {} days.",
            -expires_in, policy.days_to_review_after_expiring
        )));
    }
    Ok(())
}

/// Plan a renewal. The outer `Err` is an eligibility failure with nothing
/// written; on `Ok`, the status write always happens and the inner result
/// carries the validated dispositions. Members without an explicit
/// disposition are kept in the allocation.
pub fn plan_renewal(
    allocation: &Allocation,
    project: &Project,
    members: &[AllocationUser],
    policy: &AllocationPolicy,
    requested: &[(Uuid, Disposition)],
    today: NaiveDate,
) -> Result<RenewalOutcome, AppError> {
    check_eligibility(allocation, project, policy, today)?;
    Ok(RenewalOutcome {
        new_status: AllocationStatus::RenewalRequested,
        dispositions: plan_dispositions(allocation, members, requested),
    })
}

fn plan_dispositions(
    allocation: &Allocation,
    members: &[AllocationUser],
    requested: &[(Uuid, Disposition)],
) -> Result<DispositionPlan, AppError> {
    let mut remove_member_ids = Vec::new();
    let mut remove_from_project_user_ids = Vec::new();
    let mut events = vec![DomainEvent::AllocationRenewalRequested {
        allocation_id: allocation.id,
    }];

    for (user_id, disposition) in requested {
        let member = members
            .iter()
            .find(|m| m.user_id == *user_id)
            .ok_or_else(|| {
                AppError::validation(format!(
                    "User {user_id} is not a member of this allocation."
                ))
            })?;
        if member.status == AllocationUserStatus::Removed {
            return Err(AppError::validation(format!(
                "User '{}' has already been removed from this allocation.",
                member.username
            )));
        }
        match disposition {
            Disposition::KeepInAllocation => {}
            Disposition::KeepInProjectOnly => {
                remove_member_ids.push(member.id);
                events.push(DomainEvent::UserRemoved {
                    allocation_id: allocation.id,
                    user_id: member.user_id,
                });
            }
            Disposition::RemoveFromProject => {
                remove_member_ids.push(member.id);
                remove_from_project_user_ids.push(member.user_id);
                events.push(DomainEvent::UserRemoved {
                    allocation_id: allocation.id,
                    user_id: member.user_id,
                });
            }
        }
    }

    Ok(DispositionPlan {
        remove_member_ids,
        remove_from_project_user_ids,
        events,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn policy() -> AllocationPolicy {
        AllocationPolicy {
            days_to_review_before_expiring: 60,
            days_to_review_after_expiring: 10,
            ..Default::default()
        }
    }

    fn project() -> Project {
        Project {
            id: Uuid::new_v4(),
            title: "Climate".into(),
            status: crate::models::ProjectStatus::Active,
            pi_user_id: Uuid::new_v4(),
            pi_username: "pi_lena".into(),
            end_date: None,
            needs_review: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn allocation_expiring_in(days: i64) -> Allocation {
        Allocation {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            resource_id: Uuid::new_v4(),
            status: AllocationStatus::Active,
            quantity: 1,
            justification: "ongoing".into(),
            description: None,
            start_date: None,
            end_date: Some(today() + chrono::Duration::days(days)),
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
            username: "member".into(),
            status,
            role: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_window_boundaries_accepted() {
        let policy = policy();
        let proj = project();

        // Exactly at the opening boundary.
        assert!(check_eligibility(&allocation_expiring_in(60), &proj, &policy, today()).is_ok());
        // One day too early.
        let err =
            check_eligibility(&allocation_expiring_in(61), &proj, &policy, today()).unwrap_err();
        assert!(err.to_string().contains("too early"));
        // Exactly at the grace boundary.
        assert!(check_eligibility(&allocation_expiring_in(-10), &proj, &policy, today()).is_ok());
        // One day past grace.
        let err =
            check_eligibility(&allocation_expiring_in(-11), &proj, &policy, today()).unwrap_err();
        assert!(err.to_string().contains("too late"));
    }

    #[test]
    fn test_zero_grace_rejects_day_after_expiry() {
        let mut policy = policy();
        policy.days_to_review_after_expiring = 0;
        let proj = project();
        assert!(check_eligibility(&allocation_expiring_in(0), &proj, &policy, today()).is_ok());
        assert!(check_eligibility(&allocation_expiring_in(-1), &proj, &policy, today()).is_err());
    }

    #[test]
    fn test_eligibility_guards() {
        let proj = project();
        let pol = policy();

        let mut disabled = policy();
        disabled.enable_renewal = false;
        assert!(
            check_eligibility(&allocation_expiring_in(10), &proj, &disabled, today()).is_err()
        );

        let mut locked = allocation_expiring_in(10);
        locked.is_locked = true;
        assert!(check_eligibility(&locked, &proj, &pol, today()).is_err());

        let mut new = allocation_expiring_in(10);
        new.status = AllocationStatus::New;
        assert!(check_eligibility(&new, &proj, &pol, today()).is_err());

        let mut expired = allocation_expiring_in(-5);
        expired.status = AllocationStatus::Expired;
        assert!(check_eligibility(&expired, &proj, &pol, today()).is_ok());

        let mut archived = project();
        archived.status = crate::models::ProjectStatus::Archived;
        assert!(
            check_eligibility(&allocation_expiring_in(10), &archived, &pol, today()).is_err()
        );
    }

    #[test]
    fn test_status_write_survives_disposition_failure() {
        let alloc = allocation_expiring_in(10);
        let outcome = plan_renewal(
            &alloc,
            &project(),
            &[],
            &policy(),
            &[(Uuid::new_v4(), Disposition::KeepInProjectOnly)],
            today(),
        )
        .unwrap();

        // Eligible, so the status flip is decided even though the
        // disposition references an unknown user.
        assert_eq!(outcome.new_status, AllocationStatus::RenewalRequested);
        assert!(outcome.dispositions.is_err());
    }

    #[test]
    fn test_dispositions_sorted_into_buckets() {
        let alloc = allocation_expiring_in(10);
        let keep = member(&alloc, AllocationUserStatus::Active);
        let project_only = member(&alloc, AllocationUserStatus::Active);
        let gone = member(&alloc, AllocationUserStatus::Active);
        let members = vec![keep.clone(), project_only.clone(), gone.clone()];

        let outcome = plan_renewal(
            &alloc,
            &project(),
            &members,
            &policy(),
            &[
                (keep.user_id, Disposition::KeepInAllocation),
                (project_only.user_id, Disposition::KeepInProjectOnly),
                (gone.user_id, Disposition::RemoveFromProject),
            ],
            today(),
        )
        .unwrap();

        let plan = outcome.dispositions.unwrap();
        assert_eq!(plan.remove_member_ids, vec![project_only.id, gone.id]);
        assert_eq!(plan.remove_from_project_user_ids, vec![gone.user_id]);
        assert!(matches!(
            plan.events[0],
            DomainEvent::AllocationRenewalRequested { .. }
        ));
        assert_eq!(plan.events.len(), 3);
    }

    #[test]
    fn test_members_without_disposition_are_kept() {
        let alloc = allocation_expiring_in(10);
        let members = vec![member(&alloc, AllocationUserStatus::Active)];
        let outcome =
            plan_renewal(&alloc, &project(), &members, &policy(), &[], today()).unwrap();
        let plan = outcome.dispositions.unwrap();
        assert!(plan.remove_member_ids.is_empty());
    }

    #[test]
    fn test_disposition_token_parse() {
        assert_eq!(
            Disposition::parse("keep_in_project_only").unwrap(),
            Disposition::KeepInProjectOnly
        );
        assert!(matches!(
            Disposition::parse("banish").unwrap_err(),
            AppError::BadRequest(_)
        ));
    }
}
