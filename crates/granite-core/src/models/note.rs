//! Allocation notes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A free-text note on an allocation. Private notes are only shown to
/// reviewers.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AllocationNote {
    pub id: Uuid,
    pub allocation_id: Uuid,
    pub author: String,
    pub note: String,
    pub is_private: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
