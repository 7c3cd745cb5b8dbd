//! Granite service layer.
//!
//! Each service loads state through the repositories, asks granite-core for
//! a plan, persists it, writes the audit trail, and hands notifications to
//! the notifier. Keep orchestration here; keep thin HTTP handling in
//! granite-api.

pub mod allocation;
pub mod attributes;
pub mod audit;
pub mod change_request;
pub mod membership;
pub mod notes;
pub mod notification;
pub mod renewal;

pub use allocation::{AllocationService, CreateAllocationInput};
pub use attributes::AttributeService;
pub use change_request::ChangeRequestService;
pub use membership::{AddUsersReport, MembershipService};
pub use notes::NoteService;
pub use notification::{EmailNotifier, Notifier, NullNotifier, OutboundEmail};
pub use renewal::RenewalService;

use granite_core::DomainEvent;

/// Log the domain events an operation produced, in order.
pub(crate) fn log_events(events: &[DomainEvent]) {
    for event in events {
        tracing::info!(event = ?event, "Domain event");
    }
}
