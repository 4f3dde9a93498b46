//! Bowler entity - a monthly scorecard of metrics

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::entity::Entity;
use crate::core::identity::{EntityId, EntityPrefix};
use crate::entities::metric::Metric;

/// A bowler scorecard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bowler {
    pub id: EntityId,

    pub user_id: String,

    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Team or department grouping, used by consolidation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    #[serde(default)]
    pub metrics: Vec<Metric>,

    pub created: DateTime<Utc>,

    pub updated: DateTime<Utc>,
}

impl Entity for Bowler {
    const PREFIX: EntityPrefix = EntityPrefix::Bwl;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn title(&self) -> &str {
        &self.name
    }

    fn user_id(&self) -> &str {
        &self.user_id
    }

    fn created(&self) -> DateTime<Utc> {
        self.created
    }

    fn touch(&mut self) {
        self.updated = Utc::now();
    }
}

impl Bowler {
    pub fn new(user_id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: EntityId::new(EntityPrefix::Bwl),
            user_id: user_id.into(),
            name: name.into(),
            description: String::new(),
            group: None,
            tags: Vec::new(),
            metrics: Vec::new(),
            created: now,
            updated: now,
        }
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Find a metric by full ID or case-insensitive name
    pub fn find_metric(&self, reference: &str) -> Option<&Metric> {
        self.metrics
            .iter()
            .find(|m| m.id.to_string() == reference || m.name.eq_ignore_ascii_case(reference))
    }

    pub fn find_metric_mut(&mut self, reference: &str) -> Option<&mut Metric> {
        self.metrics
            .iter_mut()
            .find(|m| m.id.to_string() == reference || m.name.eq_ignore_ascii_case(reference))
    }
}

/// Per-user dashboard settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    /// Free-form markdown shown above the scorecards
    #[serde(default)]
    pub markdown: String,

    /// Bowlers pinned to the top, in display order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pinned: Vec<EntityId>,
}
