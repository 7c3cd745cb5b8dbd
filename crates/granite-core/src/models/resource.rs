//! Resource model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// An allocatable resource (cluster, storage pool, software license, ...).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Resource {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// Maximum number of non-removed users per allocation. `None` = unlimited.
    pub user_limit: Option<i32>,
    /// EULA text users must accept before becoming Active. Empty/None means
    /// no EULA gate even when the flag below is set.
    pub eula: Option<String>,
    pub requires_eula: bool,
    /// Whether users need an account with the identity provider at all.
    pub requires_account: bool,
    /// Whether users additionally need a resource-specific account.
    pub requires_resource_account: bool,
    pub requires_payment: bool,
    /// Maximum number of active-ish allocations per project on this resource.
    pub allocation_limit: Option<i32>,
    /// Reviewer groups allowed to administer allocations of this resource.
    pub review_groups: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Resource {
    /// True when non-PI users must accept the EULA before activation.
    pub fn eula_gate(&self) -> bool {
        self.requires_eula && self.eula.as_deref().is_some_and(|t| !t.trim().is_empty())
    }
}
