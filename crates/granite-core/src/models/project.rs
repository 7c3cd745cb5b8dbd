//! Project and project-membership models (the subset the allocation guards
//! and notifications need).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::status::{ProjectStatus, ProjectUserStatus};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Project {
    pub id: Uuid,
    pub title: String,
    pub status: ProjectStatus,
    pub pi_user_id: Uuid,
    pub pi_username: String,
    /// Project end date, inherited by allocations on approval.
    pub end_date: Option<NaiveDate>,
    /// Set when a pending project review blocks new requests.
    pub needs_review: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "project_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ProjectRole {
    Manager,
    User,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProjectUser {
    pub id: Uuid,
    pub project_id: Uuid,
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
    pub role: ProjectRole,
    pub status: ProjectUserStatus,
    pub enable_notifications: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
