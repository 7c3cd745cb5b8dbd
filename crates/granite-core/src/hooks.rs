//! Integration hooks for external systems.
//!
//! The identity provider that knows which users hold accounts is injected as
//! an `EligibilityChecker`. The default implementation treats every user as
//! eligible, so deployments without an identity integration work out of the
//! box and checker outages fail open.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::models::Resource;

/// Why a candidate cannot be added to an allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountGap {
    /// No account with the identity provider at all.
    NoAccount,
    /// Holds an account, but not one on this resource.
    NoResourceAccount,
}

/// Account standing of a single candidate for a given resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountStanding {
    pub eligible: bool,
    pub gap: Option<AccountGap>,
}

impl AccountStanding {
    pub fn eligible() -> Self {
        Self {
            eligible: true,
            gap: None,
        }
    }

    pub fn missing(gap: AccountGap) -> Self {
        Self {
            eligible: false,
            gap: Some(gap),
        }
    }
}

/// Checks candidate usernames against the identity provider for a resource.
///
/// Implementations must return an entry per queried username; a missing
/// entry is treated as eligible.
#[async_trait]
pub trait EligibilityChecker: Send + Sync {
    async fn check(
        &self,
        usernames: &[String],
        resource: &Resource,
    ) -> Result<HashMap<String, AccountStanding>, String>;
}

/// Default checker: everyone is eligible.
pub struct PermissiveEligibility;

#[async_trait]
impl EligibilityChecker for PermissiveEligibility {
    async fn check(
        &self,
        usernames: &[String],
        _resource: &Resource,
    ) -> Result<HashMap<String, AccountStanding>, String> {
        Ok(usernames
            .iter()
            .map(|u| (u.clone(), AccountStanding::eligible()))
            .collect())
    }
}
