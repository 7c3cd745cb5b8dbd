//! Change request models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::status::ChangeRequestStatus;

/// A request to extend an allocation's end date and/or change attribute
/// values, reviewed by an administrator.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AllocationChangeRequest {
    pub id: Uuid,
    pub allocation_id: Uuid,
    pub status: ChangeRequestStatus,
    /// Requested end-date extension in days. Zero means no extension.
    pub end_date_extension: i32,
    pub justification: String,
    /// Reviewer notes, editable at any point in the request's life.
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A proposed value change for a single attribute, captured with the value
/// it had when the request was filed.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AttributeChangeRequest {
    pub id: Uuid,
    pub change_request_id: Uuid,
    pub allocation_attribute_id: Uuid,
    pub old_value: String,
    pub new_value: String,
    pub created_at: DateTime<Utc>,
}
