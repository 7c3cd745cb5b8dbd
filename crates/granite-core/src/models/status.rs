//! Status vocabularies for allocations, members, change requests, and projects.
//!
//! Each vocabulary is a closed enum stored as a Postgres enum type. Guard
//! logic works against these enums directly instead of string comparisons.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of an allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "allocation_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AllocationStatus {
    New,
    Active,
    Denied,
    Revoked,
    Removed,
    Expired,
    RenewalRequested,
    PaymentPending,
    PaymentRequested,
    PaymentDeclined,
    Paid,
    Unpaid,
}

impl AllocationStatus {
    /// Statuses that admit change requests.
    pub fn allows_change_requests(self) -> bool {
        matches!(
            self,
            Self::Active
                | Self::RenewalRequested
                | Self::PaymentPending
                | Self::PaymentRequested
                | Self::Paid
        )
    }

    /// Statuses on which users may be added.
    pub fn allows_user_additions(self) -> bool {
        matches!(
            self,
            Self::Active
                | Self::New
                | Self::RenewalRequested
                | Self::PaymentPending
                | Self::PaymentRequested
                | Self::Paid
        )
    }

    /// Statuses on which users may be removed or have their role changed.
    pub fn allows_user_removals(self) -> bool {
        matches!(self, Self::Active | Self::New | Self::RenewalRequested)
    }

    /// Statuses from which a renewal may be requested.
    pub fn is_renewable(self) -> bool {
        matches!(self, Self::Active | Self::Expired | Self::Revoked)
    }

    /// Entering one of these disables the allocation and cascades a removal
    /// over its members.
    pub fn is_disabling(self) -> bool {
        matches!(self, Self::Denied | Self::Revoked | Self::Removed)
    }

    /// The "active-ish" set: statuses counted against per-resource
    /// allocation limits and swept by project-wide user removal during a
    /// renewal.
    pub fn active_set() -> Vec<Self> {
        vec![
            Self::Active,
            Self::Denied,
            Self::New,
            Self::Paid,
            Self::PaymentPending,
            Self::PaymentRequested,
            Self::PaymentDeclined,
            Self::RenewalRequested,
            Self::Unpaid,
        ]
    }

    /// Human-readable label used in messages, audit rows, and emails.
    pub fn label(self) -> &'static str {
        match self {
            Self::New => "New",
            Self::Active => "Active",
            Self::Denied => "Denied",
            Self::Revoked => "Revoked",
            Self::Removed => "Removed",
            Self::Expired => "Expired",
            Self::RenewalRequested => "Renewal Requested",
            Self::PaymentPending => "Payment Pending",
            Self::PaymentRequested => "Payment Requested",
            Self::PaymentDeclined => "Payment Declined",
            Self::Paid => "Paid",
            Self::Unpaid => "Unpaid",
        }
    }
}

impl fmt::Display for AllocationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Status of a user's membership on an allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "allocation_user_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AllocationUserStatus {
    Active,
    Pending,
    PendingEula,
    DeclinedEula,
    Invited,
    Disabled,
    Retired,
    Removed,
    Error,
}

impl AllocationUserStatus {
    /// Members activated when the allocation transitions to Active.
    pub fn cascades_on_activate(self) -> bool {
        !matches!(
            self,
            Self::Removed | Self::Error | Self::DeclinedEula | Self::PendingEula
        )
    }

    /// Members removed when the allocation is denied, revoked, or removed.
    pub fn cascades_on_disable(self) -> bool {
        !matches!(self, Self::Removed | Self::Error)
    }

    /// Members counted against a resource user limit.
    pub fn counts_toward_limit(self) -> bool {
        !matches!(self, Self::Removed)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Pending => "Pending",
            Self::PendingEula => "Pending - EULA",
            Self::DeclinedEula => "Declined - EULA",
            Self::Invited => "Invited",
            Self::Disabled => "Disabled",
            Self::Retired => "Retired",
            Self::Removed => "Removed",
            Self::Error => "Error",
        }
    }
}

impl fmt::Display for AllocationUserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Status of an allocation change request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "change_request_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ChangeRequestStatus {
    Pending,
    Approved,
    Denied,
}

impl ChangeRequestStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Approved => "Approved",
            Self::Denied => "Denied",
        }
    }
}

impl fmt::Display for ChangeRequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Status of the project owning an allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "project_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    New,
    Active,
    Archived,
    Denied,
    Expired,
    ReviewPending,
    RenewalDenied,
}

impl ProjectStatus {
    /// Projects in a terminal state reject new change requests and renewals.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Archived | Self::Denied | Self::Expired | Self::RenewalDenied
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::New => "New",
            Self::Active => "Active",
            Self::Archived => "Archived",
            Self::Denied => "Denied",
            Self::Expired => "Expired",
            Self::ReviewPending => "Review Pending",
            Self::RenewalDenied => "Renewal Denied",
        }
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Status of a user's membership on a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "project_user_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ProjectUserStatus {
    Active,
    Removed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_request_statuses() {
        assert!(AllocationStatus::Active.allows_change_requests());
        assert!(AllocationStatus::Paid.allows_change_requests());
        assert!(AllocationStatus::RenewalRequested.allows_change_requests());
        assert!(!AllocationStatus::New.allows_change_requests());
        assert!(!AllocationStatus::Expired.allows_change_requests());
        assert!(!AllocationStatus::Denied.allows_change_requests());
    }

    #[test]
    fn test_disabling_statuses() {
        assert!(AllocationStatus::Denied.is_disabling());
        assert!(AllocationStatus::Revoked.is_disabling());
        assert!(AllocationStatus::Removed.is_disabling());
        assert!(!AllocationStatus::Expired.is_disabling());
        assert!(!AllocationStatus::New.is_disabling());
    }

    #[test]
    fn test_member_cascade_sets() {
        assert!(AllocationUserStatus::Active.cascades_on_activate());
        assert!(AllocationUserStatus::Invited.cascades_on_activate());
        assert!(!AllocationUserStatus::PendingEula.cascades_on_activate());
        assert!(!AllocationUserStatus::DeclinedEula.cascades_on_activate());
        assert!(!AllocationUserStatus::Removed.cascades_on_activate());
        assert!(!AllocationUserStatus::Error.cascades_on_activate());

        assert!(AllocationUserStatus::PendingEula.cascades_on_disable());
        assert!(AllocationUserStatus::DeclinedEula.cascades_on_disable());
        assert!(!AllocationUserStatus::Removed.cascades_on_disable());
        assert!(!AllocationUserStatus::Error.cascades_on_disable());
    }

    #[test]
    fn test_labels() {
        assert_eq!(AllocationStatus::RenewalRequested.label(), "Renewal Requested");
        assert_eq!(AllocationUserStatus::PendingEula.label(), "Pending - EULA");
        assert_eq!(ProjectStatus::RenewalDenied.label(), "Renewal Denied");
    }
}
