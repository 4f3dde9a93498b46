//! Trend labels returned by metric analysis

use serde::{Deserialize, Serialize};

/// Fixed vocabulary for a metric's trend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum TrendLabel {
    Capable,
    #[default]
    Stable,
    Improving,
    Degrading,
    Unstable,
    Incapable,
}

impl TrendLabel {
    pub fn all() -> &'static [TrendLabel] {
        &[
            TrendLabel::Capable,
            TrendLabel::Stable,
            TrendLabel::Improving,
            TrendLabel::Degrading,
            TrendLabel::Unstable,
            TrendLabel::Incapable,
        ]
    }

    /// Accept a label from an external reply; anything missing or unknown is `Stable`
    pub fn from_reply(label: Option<&str>) -> Self {
        label
            .and_then(|l| l.trim().parse().ok())
            .unwrap_or_default()
    }
}

impl std::fmt::Display for TrendLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrendLabel::Capable => write!(f, "capable"),
            TrendLabel::Stable => write!(f, "stable"),
            TrendLabel::Improving => write!(f, "improving"),
            TrendLabel::Degrading => write!(f, "degrading"),
            TrendLabel::Unstable => write!(f, "unstable"),
            TrendLabel::Incapable => write!(f, "incapable"),
        }
    }
}

impl std::str::FromStr for TrendLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "capable" => Ok(TrendLabel::Capable),
            "stable" => Ok(TrendLabel::Stable),
            "improving" => Ok(TrendLabel::Improving),
            "degrading" => Ok(TrendLabel::Degrading),
            "unstable" => Ok(TrendLabel::Unstable),
            "incapable" => Ok(TrendLabel::Incapable),
            _ => Err(format!("Unknown trend label: {}", s)),
        }
    }
}
