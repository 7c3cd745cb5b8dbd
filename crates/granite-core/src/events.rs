//! Domain events emitted by the planners.
//!
//! Planners return events in the order the corresponding state changes are
//! applied. The service layer drains them to the notifier and to integration
//! hooks after the owning transaction commits.

use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DomainEvent {
    AllocationRequested {
        allocation_id: Uuid,
    },
    AllocationActivated {
        allocation_id: Uuid,
    },
    AllocationDisabled {
        allocation_id: Uuid,
    },
    AllocationRenewalRequested {
        allocation_id: Uuid,
    },
    UserActivated {
        allocation_id: Uuid,
        user_id: Uuid,
    },
    UserRemoved {
        allocation_id: Uuid,
        user_id: Uuid,
    },
    AttributeChanged {
        allocation_id: Uuid,
        allocation_attribute_id: Uuid,
    },
    ChangeRequestCreated {
        allocation_id: Uuid,
        change_request_id: Uuid,
    },
    ChangeRequestApproved {
        allocation_id: Uuid,
        change_request_id: Uuid,
    },
}
