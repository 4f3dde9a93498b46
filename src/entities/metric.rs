//! Metric entity - one row of a bowler scorecard

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::identity::{EntityId, EntityPrefix};

/// How monthly actuals combine over time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum Attribute {
    /// Values add up over the year (e.g. units shipped)
    Accumulative,
    /// Each month stands alone (e.g. on-time delivery %)
    #[default]
    Snapshot,
}

impl std::fmt::Display for Attribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Attribute::Accumulative => write!(f, "accumulative"),
            Attribute::Snapshot => write!(f, "snapshot"),
        }
    }
}

impl std::str::FromStr for Attribute {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "accumulative" => Ok(Attribute::Accumulative),
            "snapshot" => Ok(Attribute::Snapshot),
            _ => Err(format!("Unknown attribute: {}", s)),
        }
    }
}

/// Rule deciding whether an actual meets its target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[derive(Default)]
pub enum TargetRule {
    /// Actual must be greater than or equal to target
    #[default]
    Gte,
    /// Actual must be less than or equal to target
    Lte,
    /// Actual must fall inside the `{min, max}` target range
    WithinRange,
}

impl std::fmt::Display for TargetRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetRule::Gte => write!(f, "gte"),
            TargetRule::Lte => write!(f, "lte"),
            TargetRule::WithinRange => write!(f, "within_range"),
        }
    }
}

impl std::str::FromStr for TargetRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "gte" | ">=" => Ok(TargetRule::Gte),
            "lte" | "<=" => Ok(TargetRule::Lte),
            "within_range" | "range" => Ok(TargetRule::WithinRange),
            _ => Err(format!("Unknown target rule: {}", s)),
        }
    }
}

/// One month's cell in the bowler grid
///
/// Both fields are kept exactly as entered. Parsing happens at computation
/// time, never at rest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyEntry {
    #[serde(default)]
    pub actual: String,

    #[serde(default)]
    pub target: String,
}

impl MonthlyEntry {
    /// Neither an actual nor a target was recorded
    pub fn is_blank(&self) -> bool {
        self.actual.trim().is_empty() && self.target.trim().is_empty()
    }
}

/// A tracked metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metric {
    pub id: EntityId,

    pub name: String,

    #[serde(default)]
    pub definition: String,

    #[serde(default)]
    pub owner: String,

    #[serde(default)]
    pub scope: String,

    #[serde(default)]
    pub attribute: Attribute,

    #[serde(default)]
    pub target_meeting_rule: TargetRule,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,

    /// Month (`YYYY-MM`) to actual/target cell, ordered by month
    #[serde(default)]
    pub monthly_data: BTreeMap<String, MonthlyEntry>,
}

impl Metric {
    pub fn new(name: impl Into<String>, target_meeting_rule: TargetRule) -> Self {
        Self {
            id: EntityId::new(EntityPrefix::Met),
            name: name.into(),
            definition: String::new(),
            owner: String::new(),
            scope: String::new(),
            attribute: Attribute::default(),
            target_meeting_rule,
            unit: None,
            monthly_data: BTreeMap::new(),
        }
    }

    /// Set one month's actual and/or target, leaving the other field untouched
    pub fn set_month(&mut self, month: &str, actual: Option<&str>, target: Option<&str>) {
        let entry = self.monthly_data.entry(month.to_string()).or_default();
        if let Some(actual) = actual {
            entry.actual = actual.to_string();
        }
        if let Some(target) = target {
            entry.target = target.to_string();
        }
    }

    /// Parsed actual values in month order, skipping blank or non-numeric cells
    pub fn actual_values(&self) -> Vec<f64> {
        self.monthly_data
            .values()
            .filter_map(|entry| entry.actual.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite())
            .collect()
    }

    /// The most recent month that has any data
    pub fn latest_month(&self) -> Option<(&String, &MonthlyEntry)> {
        self.monthly_data
            .iter()
            .rev()
            .find(|(_, entry)| !entry.is_blank())
    }
}

/// Validate a `YYYY-MM` month key
pub fn validate_month(month: &str) -> Result<(), String> {
    let first_day = format!("{}-01", month);
    if month.len() != 7 || chrono::NaiveDate::parse_from_str(&first_day, "%Y-%m-%d").is_err() {
        return Err(format!("Invalid month '{}': expected YYYY-MM", month));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monthly_data_roundtrip_preserves_strings() {
        let mut metric = Metric::new("Scrap rate", TargetRule::Lte);
        metric.set_month("2024-01", Some("1.50"), Some("{0, 2}"));
        metric.set_month("2024-02", Some(" 007 "), Some("2.0"));
        metric.set_month("2024-03", Some(""), Some("n/a"));

        let json = serde_json::to_string(&metric).unwrap();
        let back: Metric = serde_json::from_str(&json).unwrap();

        assert_eq!(back.monthly_data, metric.monthly_data);
        assert_eq!(back.monthly_data["2024-01"].actual, "1.50");
        assert_eq!(back.monthly_data["2024-02"].actual, " 007 ");
        assert_eq!(back.monthly_data["2024-03"].target, "n/a");
    }

    #[test]
    fn test_serializes_camel_case() {
        let metric = Metric::new("OTD", TargetRule::WithinRange);
        let json = serde_json::to_string(&metric).unwrap();
        assert!(json.contains("\"targetMeetingRule\":\"within_range\""));
        assert!(json.contains("\"monthlyData\""));
    }

    #[test]
    fn test_set_month_keeps_other_field() {
        let mut metric = Metric::new("OTD", TargetRule::Gte);
        metric.set_month("2024-05", Some("90"), Some("95"));
        metric.set_month("2024-05", Some("92"), None);
        assert_eq!(metric.monthly_data["2024-05"].actual, "92");
        assert_eq!(metric.monthly_data["2024-05"].target, "95");
    }

    #[test]
    fn test_actual_values_skip_blank_cells() {
        let mut metric = Metric::new("OTD", TargetRule::Gte);
        metric.set_month("2024-02", Some("20"), None);
        metric.set_month("2024-01", Some("10"), None);
        metric.set_month("2024-03", Some(""), None);
        metric.set_month("2024-04", Some("abc"), None);
        assert_eq!(metric.actual_values(), vec![10.0, 20.0]);
    }

    #[test]
    fn test_latest_month_is_last_in_order() {
        let mut metric = Metric::new("OTD", TargetRule::Gte);
        metric.set_month("2024-11", Some("1"), None);
        metric.set_month("2023-12", Some("2"), None);
        assert_eq!(metric.latest_month().unwrap().0, "2024-11");
    }

    #[test]
    fn test_latest_month_skips_blank_entries() {
        let mut metric = Metric::new("OTD", TargetRule::Gte);
        metric.set_month("2024-10", None, Some("95"));
        metric.set_month("2024-11", Some(" "), Some(""));
        assert_eq!(metric.latest_month().unwrap().0, "2024-10");

        let mut empty = Metric::new("Scrap", TargetRule::Lte);
        empty.set_month("2024-01", Some(""), Some(""));
        assert!(empty.latest_month().is_none());
    }

    #[test]
    fn test_validate_month() {
        assert!(validate_month("2024-01").is_ok());
        assert!(validate_month("2024-13").is_err());
        assert!(validate_month("2024-1").is_err());
        assert!(validate_month("January").is_err());
    }

    #[test]
    fn test_target_rule_from_str() {
        assert_eq!("gte".parse::<TargetRule>().unwrap(), TargetRule::Gte);
        assert_eq!("LTE".parse::<TargetRule>().unwrap(), TargetRule::Lte);
        assert_eq!(
            "within-range".parse::<TargetRule>().unwrap(),
            TargetRule::WithinRange
        );
        assert!("between".parse::<TargetRule>().is_err());
    }
}
