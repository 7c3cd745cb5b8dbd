//! Membership planning: adding and removing allocation users, EULA review,
//! and member role updates.

use std::collections::HashMap;

use uuid::Uuid;

use crate::error::AppError;
use crate::events::DomainEvent;
use crate::hooks::{AccountGap, AccountStanding};
use crate::models::{Allocation, AllocationStatus, AllocationUser, AllocationUserStatus, Resource};

/// A user selected for addition.
#[derive(Debug, Clone)]
pub struct AddCandidate {
    pub user_id: Uuid,
    pub username: String,
    pub role: Option<String>,
}

/// One membership write: an insert for new users, an in-place update
/// (resurrection) when a row for the user already exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberWrite {
    /// Existing row id when resurrecting, `None` for a fresh insert.
    pub existing_id: Option<Uuid>,
    pub user_id: Uuid,
    pub username: String,
    pub status: AllocationUserStatus,
    pub role: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AddUsersPlan {
    pub writes: Vec<MemberWrite>,
    /// Usernames filtered out for lacking any account.
    pub missing_account: Vec<String>,
    /// Usernames filtered out for lacking a resource-specific account.
    pub missing_resource_account: Vec<String>,
    /// Usernames placed in PendingEula, each owed an agree-to-EULA email.
    pub eula_pending: Vec<String>,
    pub events: Vec<DomainEvent>,
}

/// Plan a batch user addition.
///
/// The user limit is all-or-nothing: if current non-removed members plus the
/// surviving candidates needing a new seat exceed the resource limit, the
/// whole batch is rejected. Candidates with an existing row (any status,
/// including Removed) are resurrected rather than duplicated.
pub fn plan_add_users(
    allocation: &Allocation,
    resource: &Resource,
    pi_user_id: Uuid,
    existing: &[AllocationUser],
    candidates: &[AddCandidate],
    standings: &HashMap<String, AccountStanding>,
    eula_enabled: bool,
) -> Result<AddUsersPlan, AppError> {
    if allocation.is_locked {
        return Err(AppError::guard(
            "You cannot add users to a locked allocation.",
        ));
    }
    if !allocation.status.allows_user_additions() {
        return Err(AppError::guard(format!(
            "You cannot add users to an allocation with status {}.",
            allocation.status
        )));
    }

    let mut missing_account = Vec::new();
    let mut missing_resource_account = Vec::new();
    let mut surviving = Vec::new();
    for candidate in candidates {
        match standings.get(&candidate.username) {
            Some(standing) if !standing.eligible => match standing.gap {
                Some(AccountGap::NoAccount) | None => {
                    missing_account.push(candidate.username.clone())
                }
                Some(AccountGap::NoResourceAccount) => {
                    missing_resource_account.push(candidate.username.clone())
                }
            },
            _ => surviving.push(candidate),
        }
    }

    if let Some(limit) = resource.user_limit {
        let current = existing
            .iter()
            .filter(|m| m.status.counts_toward_limit())
            .count();
        // Candidates whose existing row is already counted are upserts, not
        // new seats.
        let newcomers = surviving
            .iter()
            .filter(|c| {
                !existing
                    .iter()
                    .any(|m| m.user_id == c.user_id && m.status.counts_toward_limit())
            })
            .count();
        let total = current + newcomers;
        if total > limit as usize {
            return Err(AppError::guard(format!(
                "Only {limit} users are allowed on allocations of resource '{}'. Total users after this addition: {total}.",
                resource.name
            )));
        }
    }

    let eula_gate = eula_enabled && resource.eula_gate();
    let mut writes = Vec::new();
    let mut eula_pending = Vec::new();
    let mut events = Vec::new();
    for candidate in surviving {
        let status = if eula_gate && candidate.user_id != pi_user_id {
            eula_pending.push(candidate.username.clone());
            AllocationUserStatus::PendingEula
        } else {
            AllocationUserStatus::Active
        };
        let existing_id = existing
            .iter()
            .find(|m| m.user_id == candidate.user_id)
            .map(|m| m.id);
        writes.push(MemberWrite {
            existing_id,
            user_id: candidate.user_id,
            username: candidate.username.clone(),
            status,
            role: candidate.role.clone(),
        });
        events.push(DomainEvent::UserActivated {
            allocation_id: allocation.id,
            user_id: candidate.user_id,
        });
    }

    Ok(AddUsersPlan {
        writes,
        missing_account,
        missing_resource_account,
        eula_pending,
        events,
    })
}

#[derive(Debug, Clone)]
pub struct RemoveUsersPlan {
    /// Ids of the membership rows to flip to Removed.
    pub member_ids: Vec<Uuid>,
    pub usernames: Vec<String>,
    pub events: Vec<DomainEvent>,
}

/// Plan a batch user removal. The PI is silently skipped, as are users with
/// no row or already in Removed/Error.
pub fn plan_remove_users(
    allocation: &Allocation,
    pi_user_id: Uuid,
    existing: &[AllocationUser],
    selected_user_ids: &[Uuid],
) -> Result<RemoveUsersPlan, AppError> {
    if allocation.is_locked {
        return Err(AppError::guard(
            "You cannot remove users from a locked allocation.",
        ));
    }
    if !allocation.status.allows_user_removals() {
        return Err(AppError::guard(format!(
            "You cannot remove users from an allocation with status {}.",
            allocation.status
        )));
    }

    let mut member_ids = Vec::new();
    let mut usernames = Vec::new();
    let mut events = Vec::new();
    for user_id in selected_user_ids {
        if *user_id == pi_user_id {
            continue;
        }
        let Some(member) = existing.iter().find(|m| m.user_id == *user_id) else {
            continue;
        };
        if matches!(
            member.status,
            AllocationUserStatus::Removed | AllocationUserStatus::Error
        ) {
            continue;
        }
        member_ids.push(member.id);
        usernames.push(member.username.clone());
        events.push(DomainEvent::UserRemoved {
            allocation_id: allocation.id,
            user_id: member.user_id,
        });
    }

    Ok(RemoveUsersPlan {
        member_ids,
        usernames,
        events,
    })
}

/// A member's answer to a pending EULA.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EulaAnswer {
    Accept,
    Decline,
}

impl EulaAnswer {
    pub fn parse(token: &str) -> Result<Self, AppError> {
        match token {
            "accept" => Ok(Self::Accept),
            "decline" => Ok(Self::Decline),
            other => Err(AppError::bad_request(format!(
                "Unknown EULA response '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EulaPlan {
    pub member_id: Uuid,
    pub new_status: AllocationUserStatus,
    pub events: Vec<DomainEvent>,
}

/// Plan a member's EULA response. Acceptance activates the member (with an
/// activation event when the allocation itself is Active); declining parks
/// them in DeclinedEula.
pub fn plan_eula_response(
    allocation: &Allocation,
    member: &AllocationUser,
    answer: EulaAnswer,
) -> Result<EulaPlan, AppError> {
    if member.status != AllocationUserStatus::PendingEula {
        return Err(AppError::guard(format!(
            "User '{}' has no pending EULA on this allocation.",
            member.username
        )));
    }
    match answer {
        EulaAnswer::Accept => {
            let events = if allocation.status == AllocationStatus::Active {
                vec![DomainEvent::UserActivated {
                    allocation_id: allocation.id,
                    user_id: member.user_id,
                }]
            } else {
                Vec::new()
            };
            Ok(EulaPlan {
                member_id: member.id,
                new_status: AllocationUserStatus::Active,
                events,
            })
        }
        EulaAnswer::Decline => Ok(EulaPlan {
            member_id: member.id,
            new_status: AllocationUserStatus::DeclinedEula,
            events: Vec::new(),
        }),
    }
}

/// Plan a member role change. Returns `Ok(None)` when the role is unchanged.
/// The PI's role is immutable.
pub fn plan_role_update(
    allocation: &Allocation,
    member: &AllocationUser,
    pi_user_id: Uuid,
    new_role: Option<&str>,
) -> Result<Option<String>, AppError> {
    if !allocation.status.allows_user_removals() {
        return Err(AppError::guard(format!(
            "You cannot change user roles on an allocation with status {}.",
            allocation.status
        )));
    }
    if member.user_id == pi_user_id {
        return Err(AppError::guard(
            "The PI's role on an allocation cannot be changed.",
        ));
    }
    if member.role.as_deref() == new_role {
        return Ok(None);
    }
    Ok(Some(new_role.unwrap_or_default().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn allocation(status: AllocationStatus) -> Allocation {
        Allocation {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            resource_id: Uuid::new_v4(),
            status,
            quantity: 1,
            justification: "gpu time".into(),
            description: None,
            start_date: None,
            end_date: None,
            is_locked: false,
            is_changeable: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn resource(user_limit: Option<i32>, eula: Option<&str>) -> Resource {
        Resource {
            id: Uuid::new_v4(),
            name: "gpu-cluster".into(),
            description: None,
            user_limit,
            eula: eula.map(String::from),
            requires_eula: eula.is_some(),
            requires_account: true,
            requires_resource_account: false,
            requires_payment: false,
            allocation_limit: None,
            review_groups: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn member(alloc: &Allocation, status: AllocationUserStatus) -> AllocationUser {
        AllocationUser {
            id: Uuid::new_v4(),
            allocation_id: alloc.id,
            user_id: Uuid::new_v4(),
            username: format!("user-{}", Uuid::new_v4().simple()),
            status,
            role: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn candidate(name: &str) -> AddCandidate {
        AddCandidate {
            user_id: Uuid::new_v4(),
            username: name.into(),
            role: None,
        }
    }

    #[test]
    fn test_account_gaps_reported_separately() {
        let alloc = allocation(AllocationStatus::Active);
        let res = resource(None, None);
        let mut standings = HashMap::new();
        standings.insert("alice".to_string(), AccountStanding::eligible());
        standings.insert(
            "bob".to_string(),
            AccountStanding::missing(AccountGap::NoAccount),
        );
        standings.insert(
            "carla".to_string(),
            AccountStanding::missing(AccountGap::NoResourceAccount),
        );
        let plan = plan_add_users(
            &alloc,
            &res,
            Uuid::new_v4(),
            &[],
            &[candidate("alice"), candidate("bob"), candidate("carla")],
            &standings,
            true,
        )
        .unwrap();

        assert_eq!(plan.writes.len(), 1);
        assert_eq!(plan.writes[0].username, "alice");
        assert_eq!(plan.missing_account, vec!["bob"]);
        assert_eq!(plan.missing_resource_account, vec!["carla"]);
    }

    #[test]
    fn test_unqueried_usernames_default_to_eligible() {
        let alloc = allocation(AllocationStatus::Active);
        let plan = plan_add_users(
            &alloc,
            &resource(None, None),
            Uuid::new_v4(),
            &[],
            &[candidate("dora")],
            &HashMap::new(),
            true,
        )
        .unwrap();
        assert_eq!(plan.writes.len(), 1);
    }

    #[test]
    fn test_user_limit_rejects_whole_batch() {
        let alloc = allocation(AllocationStatus::Active);
        let res = resource(Some(3), None);
        let existing = vec![
            member(&alloc, AllocationUserStatus::Active),
            member(&alloc, AllocationUserStatus::PendingEula),
            member(&alloc, AllocationUserStatus::Removed),
        ];
        // 2 counted + 2 candidates > 3
        let err = plan_add_users(
            &alloc,
            &res,
            Uuid::new_v4(),
            &existing,
            &[candidate("eve"), candidate("frank")],
            &HashMap::new(),
            true,
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Guard(_)));
        assert!(err.to_string().contains("Only 3 users"));

        // 2 counted + 1 candidate == 3: allowed
        let plan = plan_add_users(
            &alloc,
            &res,
            Uuid::new_v4(),
            &existing,
            &[candidate("eve")],
            &HashMap::new(),
            true,
        )
        .unwrap();
        assert_eq!(plan.writes.len(), 1);
    }

    #[test]
    fn test_readding_counted_member_takes_no_new_seat() {
        let alloc = allocation(AllocationStatus::Active);
        let res = resource(Some(2), None);
        let active = member(&alloc, AllocationUserStatus::Active);
        let other = member(&alloc, AllocationUserStatus::Active);
        let existing = vec![active.clone(), other];

        // At the limit already; re-adding an existing Active member is an
        // upsert and must pass.
        let readd = AddCandidate {
            user_id: active.user_id,
            username: active.username.clone(),
            role: Some("operator".into()),
        };
        let plan = plan_add_users(
            &alloc,
            &res,
            Uuid::new_v4(),
            &existing,
            &[readd],
            &HashMap::new(),
            true,
        )
        .unwrap();
        assert_eq!(plan.writes.len(), 1);
        assert_eq!(plan.writes[0].existing_id, Some(active.id));

        // A genuinely new user still trips the limit.
        let err = plan_add_users(
            &alloc,
            &res,
            Uuid::new_v4(),
            &existing,
            &[candidate("newcomer")],
            &HashMap::new(),
            true,
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Guard(_)));
    }

    #[test]
    fn test_existing_rows_resurrected_not_duplicated() {
        let alloc = allocation(AllocationStatus::Active);
        let removed = member(&alloc, AllocationUserStatus::Removed);
        let cand = AddCandidate {
            user_id: removed.user_id,
            username: removed.username.clone(),
            role: Some("operator".into()),
        };
        let plan = plan_add_users(
            &alloc,
            &resource(None, None),
            Uuid::new_v4(),
            &[removed.clone()],
            &[cand],
            &HashMap::new(),
            true,
        )
        .unwrap();
        assert_eq!(plan.writes.len(), 1);
        assert_eq!(plan.writes[0].existing_id, Some(removed.id));
        assert_eq!(plan.writes[0].status, AllocationUserStatus::Active);
        assert_eq!(plan.writes[0].role.as_deref(), Some("operator"));
    }

    #[test]
    fn test_eula_gate_spares_the_pi() {
        let alloc = allocation(AllocationStatus::Active);
        let res = resource(None, Some("terms apply"));
        let pi = candidate("pi_gail");
        let pi_id = pi.user_id;
        let plan = plan_add_users(
            &alloc,
            &res,
            pi_id,
            &[],
            &[pi, candidate("harry")],
            &HashMap::new(),
            true,
        )
        .unwrap();

        assert_eq!(plan.writes[0].status, AllocationUserStatus::Active);
        assert_eq!(plan.writes[1].status, AllocationUserStatus::PendingEula);
        assert_eq!(plan.eula_pending, vec!["harry"]);
    }

    #[test]
    fn test_eula_gate_disabled_by_policy() {
        let alloc = allocation(AllocationStatus::Active);
        let res = resource(None, Some("terms apply"));
        let plan = plan_add_users(
            &alloc,
            &res,
            Uuid::new_v4(),
            &[],
            &[candidate("iris")],
            &HashMap::new(),
            false,
        )
        .unwrap();
        assert_eq!(plan.writes[0].status, AllocationUserStatus::Active);
        assert!(plan.eula_pending.is_empty());
    }

    #[test]
    fn test_remove_skips_pi_silently() {
        let alloc = allocation(AllocationStatus::Active);
        let pi_row = member(&alloc, AllocationUserStatus::Active);
        let other = member(&alloc, AllocationUserStatus::Active);
        let plan = plan_remove_users(
            &alloc,
            pi_row.user_id,
            &[pi_row.clone(), other.clone()],
            &[pi_row.user_id, other.user_id],
        )
        .unwrap();
        assert_eq!(plan.member_ids, vec![other.id]);
        assert_eq!(plan.events.len(), 1);
    }

    #[test]
    fn test_remove_skips_already_removed_and_errored() {
        let alloc = allocation(AllocationStatus::Active);
        let removed = member(&alloc, AllocationUserStatus::Removed);
        let errored = member(&alloc, AllocationUserStatus::Error);
        let active = member(&alloc, AllocationUserStatus::Active);
        let plan = plan_remove_users(
            &alloc,
            Uuid::new_v4(),
            &[removed.clone(), errored.clone(), active.clone()],
            &[removed.user_id, errored.user_id, active.user_id],
        )
        .unwrap();
        assert_eq!(plan.member_ids, vec![active.id]);
    }

    #[test]
    fn test_remove_guarded_by_status() {
        let alloc = allocation(AllocationStatus::Expired);
        let err = plan_remove_users(&alloc, Uuid::new_v4(), &[], &[]).unwrap_err();
        assert!(matches!(err, AppError::Guard(_)));
    }

    #[test]
    fn test_eula_accept_activates_member() {
        let alloc = allocation(AllocationStatus::Active);
        let pending = member(&alloc, AllocationUserStatus::PendingEula);
        let plan = plan_eula_response(&alloc, &pending, EulaAnswer::Accept).unwrap();
        assert_eq!(plan.new_status, AllocationUserStatus::Active);
        assert_eq!(plan.events.len(), 1);

        // No activation event when the allocation is not Active yet.
        let new_alloc = allocation(AllocationStatus::New);
        let pending = member(&new_alloc, AllocationUserStatus::PendingEula);
        let plan = plan_eula_response(&new_alloc, &pending, EulaAnswer::Accept).unwrap();
        assert!(plan.events.is_empty());
    }

    #[test]
    fn test_eula_decline_and_bad_token() {
        let alloc = allocation(AllocationStatus::Active);
        let pending = member(&alloc, AllocationUserStatus::PendingEula);
        let plan = plan_eula_response(&alloc, &pending, EulaAnswer::Decline).unwrap();
        assert_eq!(plan.new_status, AllocationUserStatus::DeclinedEula);

        assert!(matches!(
            EulaAnswer::parse("shrug").unwrap_err(),
            AppError::BadRequest(_)
        ));

        let active = member(&alloc, AllocationUserStatus::Active);
        assert!(plan_eula_response(&alloc, &active, EulaAnswer::Accept).is_err());
    }

    #[test]
    fn test_role_update_rules() {
        let alloc = allocation(AllocationStatus::Active);
        let mut m = member(&alloc, AllocationUserStatus::Active);
        m.role = Some("viewer".into());

        // PI is immutable.
        let err = plan_role_update(&alloc, &m, m.user_id, Some("operator")).unwrap_err();
        assert!(matches!(err, AppError::Guard(_)));

        // Unchanged role is a silent no-op.
        let unchanged = plan_role_update(&alloc, &m, Uuid::new_v4(), Some("viewer")).unwrap();
        assert_eq!(unchanged, None);

        let changed = plan_role_update(&alloc, &m, Uuid::new_v4(), Some("operator")).unwrap();
        assert_eq!(changed.as_deref(), Some("operator"));
    }
}
