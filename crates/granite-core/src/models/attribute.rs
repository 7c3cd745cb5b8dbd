//! Attribute types and allocation attribute values.
//!
//! Attribute values are stored as strings but must parse according to the
//! kind declared on their type. Validation lives in `crate::validation`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// The value domain of an attribute type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "attribute_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AttributeKind {
    Int,
    Float,
    Text,
    Date,
    YesNo,
}

impl AttributeKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Int => "Int",
            Self::Float => "Float",
            Self::Text => "Text",
            Self::Date => "Date",
            Self::YesNo => "Yes/No",
        }
    }
}

/// A named, typed attribute definition.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AttributeType {
    pub id: Uuid,
    pub name: String,
    pub kind: AttributeKind,
    /// At most one attribute of this type per allocation.
    pub is_unique: bool,
    /// Whether change requests may propose new values for this type.
    pub is_changeable: bool,
    /// Whether a usage counter is tracked alongside the value.
    pub has_usage: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An attribute value attached to an allocation.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AllocationAttribute {
    pub id: Uuid,
    pub allocation_id: Uuid,
    pub attribute_type_id: Uuid,
    pub value: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An attribute value joined with its type definition and usage counter.
/// This is the read model planners and views work against.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AttributeDetail {
    pub id: Uuid,
    pub allocation_id: Uuid,
    pub attribute_type_id: Uuid,
    pub type_name: String,
    pub kind: AttributeKind,
    pub is_unique: bool,
    pub is_changeable: bool,
    pub has_usage: bool,
    pub value: String,
    pub usage: Option<f64>,
}
