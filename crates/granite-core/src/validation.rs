//! Typed attribute-value validation and usage gauges.

use chrono::NaiveDate;

use crate::error::AppError;
use crate::models::{AttributeDetail, AttributeKind};
use uuid::Uuid;

/// Check that `value` parses under the attribute kind. Returns the guard
/// message style used throughout attribute forms.
pub fn validate_attribute_value(
    kind: AttributeKind,
    type_name: &str,
    value: &str,
) -> Result<(), AppError> {
    let ok = match kind {
        AttributeKind::Int => value.trim().parse::<i64>().is_ok(),
        AttributeKind::Float => value.trim().parse::<f64>().is_ok(),
        AttributeKind::Text => true,
        AttributeKind::Date => NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").is_ok(),
        AttributeKind::YesNo => matches!(value.trim().to_lowercase().as_str(), "yes" | "no"),
    };
    if ok {
        Ok(())
    } else {
        Err(AppError::validation(format!(
            "Invalid Value {value}. {type_name} attribute values must be of type {}.",
            kind.label()
        )))
    }
}

/// A rendered usage bar for an attribute with usage tracking.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct UsageGauge {
    pub attribute_id: Uuid,
    pub label: String,
    pub value: f64,
    pub usage: f64,
    pub percent: f64,
    pub color: String,
}

fn gauge_color(percent: f64) -> &'static str {
    if percent < 80.0 {
        "#6da04b"
    } else if percent < 90.0 {
        "#ffc72c"
    } else {
        "#e56a54"
    }
}

/// Build usage gauges for the attributes that track usage.
///
/// Attributes whose stored value does not parse as a number are logged and
/// skipped; one bad row must not take down the whole detail view.
pub fn build_usage_gauges(attributes: &[AttributeDetail]) -> Vec<UsageGauge> {
    let mut gauges = Vec::new();
    for attr in attributes.iter().filter(|a| a.has_usage) {
        let Some(usage) = attr.usage else { continue };
        let value: f64 = match attr.value.trim().parse() {
            Ok(v) => v,
            Err(_) => {
                tracing::error!(
                    allocation_attribute_id = %attr.id,
                    type_name = %attr.type_name,
                    value = %attr.value,
                    "Allocation attribute with usage has a non-numeric value"
                );
                continue;
            }
        };
        let percent = if value == 0.0 {
            100.0
        } else {
            (usage / value * 10_000.0).round() / 100.0
        };
        gauges.push(UsageGauge {
            attribute_id: attr.id,
            label: format!("{}: {} of {}", attr.type_name, usage, attr.value),
            value,
            usage,
            percent,
            color: gauge_color(percent).to_string(),
        });
    }
    gauges
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detail(kind: AttributeKind, value: &str, usage: Option<f64>, has_usage: bool) -> AttributeDetail {
        AttributeDetail {
            id: Uuid::new_v4(),
            allocation_id: Uuid::new_v4(),
            attribute_type_id: Uuid::new_v4(),
            type_name: "Storage Quota (GB)".into(),
            kind,
            is_unique: false,
            is_changeable: true,
            has_usage,
            value: value.into(),
            usage,
        }
    }

    #[test]
    fn test_int_validation() {
        assert!(validate_attribute_value(AttributeKind::Int, "Core Hours", "1000").is_ok());
        assert!(validate_attribute_value(AttributeKind::Int, "Core Hours", " 42 ").is_ok());
        assert!(validate_attribute_value(AttributeKind::Int, "Core Hours", "10.5").is_err());
        assert!(validate_attribute_value(AttributeKind::Int, "Core Hours", "lots").is_err());
    }

    #[test]
    fn test_float_validation() {
        assert!(validate_attribute_value(AttributeKind::Float, "Quota", "10.5").is_ok());
        assert!(validate_attribute_value(AttributeKind::Float, "Quota", "10").is_ok());
        assert!(validate_attribute_value(AttributeKind::Float, "Quota", "ten").is_err());
    }

    #[test]
    fn test_date_validation() {
        assert!(validate_attribute_value(AttributeKind::Date, "Expiry", "2024-06-01").is_ok());
        assert!(validate_attribute_value(AttributeKind::Date, "Expiry", "06/01/2024").is_err());
        assert!(validate_attribute_value(AttributeKind::Date, "Expiry", "2024-13-01").is_err());
    }

    #[test]
    fn test_yes_no_validation() {
        assert!(validate_attribute_value(AttributeKind::YesNo, "Purge", "Yes").is_ok());
        assert!(validate_attribute_value(AttributeKind::YesNo, "Purge", "no").is_ok());
        assert!(validate_attribute_value(AttributeKind::YesNo, "Purge", "maybe").is_err());
    }

    #[test]
    fn test_text_accepts_anything() {
        assert!(validate_attribute_value(AttributeKind::Text, "Notes", "").is_ok());
        assert!(validate_attribute_value(AttributeKind::Text, "Notes", "任意").is_ok());
    }

    #[test]
    fn test_validation_message_names_the_type() {
        let err = validate_attribute_value(AttributeKind::Int, "Core Hours", "many")
            .unwrap_err()
            .to_string();
        assert!(err.contains("Core Hours"));
        assert!(err.contains("Int"));
    }

    #[test]
    fn test_gauges_skip_unparsable_values() {
        let attrs = vec![
            detail(AttributeKind::Int, "100", Some(50.0), true),
            detail(AttributeKind::Text, "not-a-number", Some(3.0), true),
            detail(AttributeKind::Int, "200", Some(190.0), true),
            detail(AttributeKind::Int, "300", Some(10.0), false),
        ];
        let gauges = build_usage_gauges(&attrs);
        assert_eq!(gauges.len(), 2);
        assert_eq!(gauges[0].percent, 50.0);
        assert_eq!(gauges[0].color, "#6da04b");
        assert_eq!(gauges[1].percent, 95.0);
        assert_eq!(gauges[1].color, "#e56a54");
    }

    #[test]
    fn test_gauge_zero_value_pins_to_full() {
        let attrs = vec![detail(AttributeKind::Int, "0", Some(5.0), true)];
        let gauges = build_usage_gauges(&attrs);
        assert_eq!(gauges[0].percent, 100.0);
    }

    #[test]
    fn test_gauge_warning_band() {
        let attrs = vec![detail(AttributeKind::Int, "100", Some(85.0), true)];
        assert_eq!(build_usage_gauges(&attrs)[0].color, "#ffc72c");
    }
}
