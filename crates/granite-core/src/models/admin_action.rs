//! Append-only audit log of privileged allocation mutations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AdminAction {
    pub id: Uuid,
    pub allocation_id: Uuid,
    /// Username of the administrator who performed the action.
    pub actor: String,
    /// Human-readable description of what changed.
    pub action: String,
    pub created_at: DateTime<Utc>,
}
