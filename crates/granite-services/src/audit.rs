//! Audit line rendering for admin mutations.

use chrono::NaiveDate;
use granite_core::models::Allocation;

fn fmt_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.to_string()).unwrap_or_else(|| "None".into())
}

fn fmt_text(text: &Option<String>) -> String {
    text.clone().unwrap_or_else(|| "None".into())
}

/// One line per changed field, in a fixed field order.
pub fn allocation_diff(old: &Allocation, new: &Allocation) -> Vec<String> {
    let mut lines = Vec::new();
    if old.status != new.status {
        lines.push(format!(
            "Changed \"status\" from \"{}\" to \"{}\"",
            old.status, new.status
        ));
    }
    if old.start_date != new.start_date {
        lines.push(format!(
            "Changed \"start_date\" from \"{}\" to \"{}\"",
            fmt_date(old.start_date),
            fmt_date(new.start_date)
        ));
    }
    if old.end_date != new.end_date {
        lines.push(format!(
            "Changed \"end_date\" from \"{}\" to \"{}\"",
            fmt_date(old.end_date),
            fmt_date(new.end_date)
        ));
    }
    if old.description != new.description {
        lines.push(format!(
            "Changed \"description\" from \"{}\" to \"{}\"",
            fmt_text(&old.description),
            fmt_text(&new.description)
        ));
    }
    if old.is_locked != new.is_locked {
        lines.push(format!(
            "Changed \"is_locked\" from \"{}\" to \"{}\"",
            old.is_locked, new.is_locked
        ));
    }
    if old.is_changeable != new.is_changeable {
        lines.push(format!(
            "Changed \"is_changeable\" from \"{}\" to \"{}\"",
            old.is_changeable, new.is_changeable
        ));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use granite_core::models::AllocationStatus;
    use uuid::Uuid;

    fn allocation() -> Allocation {
        Allocation {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            resource_id: Uuid::new_v4(),
            status: AllocationStatus::Active,
            quantity: 1,
            justification: "compute".into(),
            description: None,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1),
            end_date: NaiveDate::from_ymd_opt(2025, 1, 1),
            is_locked: false,
            is_changeable: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_diff_lists_only_changed_fields() {
        let old = allocation();
        let mut new = old.clone();
        new.status = AllocationStatus::Revoked;
        new.end_date = NaiveDate::from_ymd_opt(2024, 6, 1);

        let lines = allocation_diff(&old, &new);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "Changed \"status\" from \"Active\" to \"Revoked\"");
        assert_eq!(
            lines[1],
            "Changed \"end_date\" from \"2025-01-01\" to \"2024-06-01\""
        );
    }

    #[test]
    fn test_identical_allocations_diff_empty() {
        let old = allocation();
        assert!(allocation_diff(&old, &old.clone()).is_empty());
    }
}
