//! Metric statistics - descriptive stats, target parsing and process capability
//!
//! All functions here are pure. A metric's statistics are recomputed from its
//! monthly actuals every time they are needed and never stored.

use serde::{Serialize, Serializer};

use crate::entities::metric::{Metric, TargetRule};

/// Minimum number of actuals before a capability index is reported
pub const MIN_CAPABILITY_POINTS: usize = 3;

/// Descriptive statistics over a series of actuals
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub mean: f64,

    /// Population standard deviation (divides by N)
    pub std_dev: f64,

    pub min: f64,

    pub max: f64,

    pub count: usize,
}

/// Compute mean, population standard deviation, min and max
///
/// An empty series yields all zeros.
pub fn calculate_statistics(values: &[f64]) -> Statistics {
    if values.is_empty() {
        return Statistics::default();
    }

    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

    let mut min = values[0];
    let mut max = values[0];
    for &v in &values[1..] {
        if v < min {
            min = v;
        }
        if v > max {
            max = v;
        }
    }

    Statistics {
        mean,
        std_dev: variance.sqrt(),
        min,
        max,
        count: values.len(),
    }
}

/// A target parsed out of its free-text cell
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TargetSpec {
    /// Single threshold
    Value(f64),
    /// Inclusive `{min, max}` band
    Range { min: f64, max: f64 },
    /// Nothing numeric could be read
    Unparsed,
}

impl TargetSpec {
    pub fn is_parsed(&self) -> bool {
        !matches!(self, TargetSpec::Unparsed)
    }
}

impl std::fmt::Display for TargetSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetSpec::Value(v) => write!(f, "{}", v),
            TargetSpec::Range { min, max } => write!(f, "{{{}, {}}}", min, max),
            TargetSpec::Unparsed => write!(f, "-"),
        }
    }
}

/// Parse a target cell
///
/// Accepts `"{10, 20}"`, `"[10,20]"` or `"10,20"` as a range, otherwise the
/// leading number of the text (`"95%"` reads as 95).
pub fn parse_target(text: &str) -> TargetSpec {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return TargetSpec::Unparsed;
    }

    if let Some((min, max)) = parse_range(trimmed) {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        return TargetSpec::Range { min, max };
    }

    match leading_float(trimmed) {
        Some(v) => TargetSpec::Value(v),
        None => TargetSpec::Unparsed,
    }
}

fn parse_range(text: &str) -> Option<(f64, f64)> {
    let inner = text.strip_prefix(['[', '{']).unwrap_or(text);
    let inner = inner.strip_suffix([']', '}']).unwrap_or(inner);

    let (a, b) = inner.split_once(',')?;
    let a = a.trim().parse::<f64>().ok()?;
    let b = b.trim().parse::<f64>().ok()?;
    (a.is_finite() && b.is_finite()).then_some((a, b))
}

/// Longest numeric prefix of `text`, if any
fn leading_float(text: &str) -> Option<f64> {
    let candidate: String = text
        .chars()
        .take_while(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'))
        .collect();

    (1..=candidate.len())
        .rev()
        .filter_map(|end| candidate[..end].parse::<f64>().ok())
        .find(|v| v.is_finite())
}

/// Why a capability index was not computed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotCalculatedReason {
    TooFewPoints { count: usize },
    UnparsedTarget,
    ZeroSpread,
    /// `within_range` rule with a single-value target
    RuleMismatch,
}

impl std::fmt::Display for NotCalculatedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotCalculatedReason::TooFewPoints { count } => write!(
                f,
                "need at least {} data points, have {}",
                MIN_CAPABILITY_POINTS, count
            ),
            NotCalculatedReason::UnparsedTarget => write!(f, "latest target is not numeric"),
            NotCalculatedReason::ZeroSpread => write!(f, "standard deviation is zero"),
            NotCalculatedReason::RuleMismatch => {
                write!(f, "within_range rule needs a {{min, max}} target")
            }
        }
    }
}

/// Process capability (Cpk-style) result
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Capability {
    Calculated(f64),
    NotCalculated(NotCalculatedReason),
}

impl Capability {
    pub fn value(&self) -> Option<f64> {
        match self {
            Capability::Calculated(v) => Some(*v),
            Capability::NotCalculated(_) => None,
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Capability::Calculated(v) => write!(f, "{:.2}", v),
            Capability::NotCalculated(reason) => write!(f, "not calculated ({})", reason),
        }
    }
}

impl Serialize for Capability {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Capability::Calculated(v) => serializer.serialize_f64(*v),
            Capability::NotCalculated(_) => serializer.serialize_str("not calculated"),
        }
    }
}

/// Compute the capability index of a series against a target
///
/// - `within_range`: min(CPU, CPL) against the range bounds
/// - `gte`: CPL = (mean - target) / 3σ (range targets use the lower bound)
/// - `lte`: CPU = (target - mean) / 3σ (range targets use the upper bound)
pub fn process_capability(actuals: &[f64], target: &TargetSpec, rule: TargetRule) -> Capability {
    if actuals.len() < MIN_CAPABILITY_POINTS {
        return Capability::NotCalculated(NotCalculatedReason::TooFewPoints {
            count: actuals.len(),
        });
    }
    if !target.is_parsed() {
        return Capability::NotCalculated(NotCalculatedReason::UnparsedTarget);
    }

    let stats = calculate_statistics(actuals);
    if stats.std_dev <= 0.0 {
        return Capability::NotCalculated(NotCalculatedReason::ZeroSpread);
    }
    let sigma_3 = 3.0 * stats.std_dev;

    let cpk = match (rule, *target) {
        (TargetRule::WithinRange, TargetSpec::Range { min, max }) => {
            let cpu = (max - stats.mean) / sigma_3;
            let cpl = (stats.mean - min) / sigma_3;
            cpu.min(cpl)
        }
        (TargetRule::WithinRange, _) => {
            return Capability::NotCalculated(NotCalculatedReason::RuleMismatch)
        }
        (TargetRule::Gte, TargetSpec::Value(lower))
        | (TargetRule::Gte, TargetSpec::Range { min: lower, .. }) => {
            (stats.mean - lower) / sigma_3
        }
        (TargetRule::Lte, TargetSpec::Value(upper))
        | (TargetRule::Lte, TargetSpec::Range { max: upper, .. }) => {
            (upper - stats.mean) / sigma_3
        }
        (_, TargetSpec::Unparsed) => {
            return Capability::NotCalculated(NotCalculatedReason::UnparsedTarget)
        }
    };

    Capability::Calculated(cpk)
}

/// Whether a single actual meets its target under the rule
///
/// Returns `None` when the pair can't be judged (unparsed target, or a
/// range rule given a single value).
pub fn meets_target(actual: f64, target: &TargetSpec, rule: TargetRule) -> Option<bool> {
    match (rule, *target) {
        (_, TargetSpec::Unparsed) => None,
        (TargetRule::WithinRange, TargetSpec::Range { min, max }) => {
            Some(actual >= min && actual <= max)
        }
        (TargetRule::WithinRange, TargetSpec::Value(_)) => None,
        (TargetRule::Gte, TargetSpec::Value(t)) | (TargetRule::Gte, TargetSpec::Range { min: t, .. }) => {
            Some(actual >= t)
        }
        (TargetRule::Lte, TargetSpec::Value(t)) | (TargetRule::Lte, TargetSpec::Range { max: t, .. }) => {
            Some(actual <= t)
        }
    }
}

/// Everything the bowler view shows about one metric
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSummary {
    pub name: String,

    pub rule: TargetRule,

    #[serde(flatten)]
    pub statistics: Statistics,

    /// Target text of the most recent month, as entered
    pub latest_target: Option<String>,

    pub latest_actual: Option<String>,

    pub cpk: Capability,

    /// Months whose actual met that month's target
    pub months_met: usize,

    /// Months where both actual and target could be judged
    pub months_evaluated: usize,
}

impl MetricSummary {
    pub fn from_metric(metric: &Metric) -> Self {
        let actuals = metric.actual_values();
        let statistics = calculate_statistics(&actuals);

        let latest = metric.latest_month().map(|(_, entry)| entry);
        let latest_target = latest.map(|e| e.target.clone());
        let target = latest_target
            .as_deref()
            .map(parse_target)
            .unwrap_or(TargetSpec::Unparsed);

        let cpk = process_capability(&actuals, &target, metric.target_meeting_rule);

        let mut months_met = 0;
        let mut months_evaluated = 0;
        for entry in metric.monthly_data.values() {
            let Ok(actual) = entry.actual.trim().parse::<f64>() else {
                continue;
            };
            if let Some(met) = meets_target(actual, &parse_target(&entry.target), metric.target_meeting_rule) {
                months_evaluated += 1;
                if met {
                    months_met += 1;
                }
            }
        }

        Self {
            name: metric.name.clone(),
            rule: metric.target_meeting_rule,
            statistics,
            latest_target,
            latest_actual: latest.map(|e| e.actual.clone()),
            cpk,
            months_met,
            months_evaluated,
        }
    }
}
