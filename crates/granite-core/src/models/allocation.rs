//! Allocation and allocation-membership models.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::status::{AllocationStatus, AllocationUserStatus};

/// A grant of a resource to a project for a period of time.
///
/// `resource_id` is the parent resource; additional linked resources are
/// attached through the `allocation_resources` join table.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Allocation {
    pub id: Uuid,
    pub project_id: Uuid,
    pub resource_id: Uuid,
    pub status: AllocationStatus,
    pub quantity: i32,
    pub justification: String,
    pub description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub is_locked: bool,
    pub is_changeable: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Allocation {
    /// Days from `today` until the end date. Negative once expired, `None`
    /// when no end date is set.
    pub fn expires_in(&self, today: NaiveDate) -> Option<i64> {
        self.end_date.map(|end| (end - today).num_days())
    }
}

/// A user's membership on an allocation. One row per (allocation, user);
/// removal is a status flip, never a delete.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AllocationUser {
    pub id: Uuid,
    pub allocation_id: Uuid,
    pub user_id: Uuid,
    pub username: String,
    pub status: AllocationUserStatus,
    pub role: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn allocation_ending(end: Option<NaiveDate>) -> Allocation {
        Allocation {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            resource_id: Uuid::new_v4(),
            status: AllocationStatus::Active,
            quantity: 1,
            justification: "compute time".into(),
            description: None,
            start_date: None,
            end_date: end,
            is_locked: false,
            is_changeable: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_expires_in() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let alloc = allocation_ending(NaiveDate::from_ymd_opt(2024, 6, 11));
        assert_eq!(alloc.expires_in(today), Some(10));

        let expired = allocation_ending(NaiveDate::from_ymd_opt(2024, 5, 29));
        assert_eq!(expired.expires_in(today), Some(-3));

        assert_eq!(allocation_ending(None).expires_in(today), None);
    }
}
