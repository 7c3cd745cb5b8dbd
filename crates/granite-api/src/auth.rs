//! Acting-user extraction.
//!
//! Granite sits behind an authenticating reverse proxy that injects the
//! caller's identity as headers. `ActingUser` reads them; review capability
//! is the superuser flag or membership in one of a resource's review
//! groups.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use granite_core::models::Resource;
use granite_core::AppError;

use crate::error::HttpAppError;

pub const USER_HEADER: &str = "x-remote-user";
pub const USER_ID_HEADER: &str = "x-remote-user-id";
pub const GROUPS_HEADER: &str = "x-remote-groups";

const SUPERUSER_GROUP: &str = "granite-admins";

#[derive(Debug, Clone)]
pub struct ActingUser {
    pub username: String,
    pub user_id: Option<Uuid>,
    pub groups: Vec<String>,
}

impl ActingUser {
    pub fn is_superuser(&self) -> bool {
        self.groups.iter().any(|g| g == SUPERUSER_GROUP)
    }

    /// Whether this user may review allocations of the resource.
    pub fn can_review(&self, resource: &Resource) -> bool {
        self.is_superuser()
            || resource
                .review_groups
                .iter()
                .any(|rg| self.groups.iter().any(|g| g == rg))
    }

    pub fn require_reviewer(&self, resource: &Resource) -> Result<(), AppError> {
        if self.can_review(resource) {
            Ok(())
        } else {
            Err(AppError::forbidden(
                "You do not have permission to review this allocation.",
            ))
        }
    }

    pub fn require_superuser(&self) -> Result<(), AppError> {
        if self.is_superuser() {
            Ok(())
        } else {
            Err(AppError::forbidden(
                "You do not have permission to perform this action.",
            ))
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for ActingUser {
    type Rejection = HttpAppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let username = parts
            .headers
            .get(USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                HttpAppError(AppError::Unauthorized(
                    "Missing authenticated user header".into(),
                ))
            })?
            .to_string();

        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Uuid::parse_str(v).ok());

        let groups = parts
            .headers
            .get(GROUPS_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|v| {
                v.split(',')
                    .map(|g| g.trim().to_string())
                    .filter(|g| !g.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            username,
            user_id,
            groups,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn resource(review_groups: Vec<String>) -> Resource {
        Resource {
            id: Uuid::new_v4(),
            name: "cluster".into(),
            description: None,
            user_limit: None,
            eula: None,
            requires_eula: false,
            requires_account: false,
            requires_resource_account: false,
            requires_payment: false,
            allocation_limit: None,
            review_groups,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn user(groups: &[&str]) -> ActingUser {
        ActingUser {
            username: "reviewer".into(),
            user_id: None,
            groups: groups.iter().map(|g| g.to_string()).collect(),
        }
    }

    #[test]
    fn test_superuser_reviews_everything() {
        let u = user(&["granite-admins"]);
        assert!(u.can_review(&resource(vec![])));
    }

    #[test]
    fn test_review_group_intersection() {
        let res = resource(vec!["hpc-ops".into()]);
        assert!(user(&["hpc-ops", "staff"]).can_review(&res));
        assert!(!user(&["staff"]).can_review(&res));
        assert!(user(&["staff"]).require_reviewer(&res).is_err());
    }
}
