//! A3 entity - one-page problem-solving case
//!
//! An A3 walks from problem statement through observations and data
//! analysis to a root cause (with its 5-Whys mind map), an action plan and
//! the results achieved.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::core::cause_tree::CauseNode;
use crate::core::entity::{Entity, Priority};
use crate::core::identity::{EntityId, EntityPrefix};

/// Case lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[derive(Default)]
pub enum A3Status {
    #[default]
    NotStarted,
    InProgress,
    OnHold,
    Completed,
}

impl std::fmt::Display for A3Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            A3Status::NotStarted => write!(f, "not_started"),
            A3Status::InProgress => write!(f, "in_progress"),
            A3Status::OnHold => write!(f, "on_hold"),
            A3Status::Completed => write!(f, "completed"),
        }
    }
}

impl std::str::FromStr for A3Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', ' '], "_").as_str() {
            "not_started" => Ok(A3Status::NotStarted),
            "in_progress" => Ok(A3Status::InProgress),
            "on_hold" => Ok(A3Status::OnHold),
            "completed" | "done" => Ok(A3Status::Completed),
            _ => Err(format!("Unknown A3 status: {}", s)),
        }
    }
}

/// Action item status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[derive(Default)]
pub enum ActionStatus {
    #[default]
    Open,
    InProgress,
    Done,
}

impl std::fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionStatus::Open => write!(f, "open"),
            ActionStatus::InProgress => write!(f, "in_progress"),
            ActionStatus::Done => write!(f, "done"),
        }
    }
}

impl std::str::FromStr for ActionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', ' '], "_").as_str() {
            "open" => Ok(ActionStatus::Open),
            "in_progress" => Ok(ActionStatus::InProgress),
            "done" => Ok(ActionStatus::Done),
            _ => Err(format!("Unknown action status: {}", s)),
        }
    }
}

/// One countermeasure in the action plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionItem {
    pub id: EntityId,

    pub task: String,

    #[serde(default)]
    pub owner: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due: Option<NaiveDate>,

    #[serde(default)]
    pub status: ActionStatus,
}

impl ActionItem {
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            id: EntityId::new(EntityPrefix::Act),
            task: task.into(),
            owner: String::new(),
            due: None,
            status: ActionStatus::default(),
        }
    }
}

/// An image attached to the data-analysis section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRef {
    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

/// An A3 problem-solving case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct A3Case {
    pub id: EntityId,

    pub user_id: String,

    pub title: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub owner: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,

    #[serde(default)]
    pub priority: Priority,

    #[serde(default)]
    pub status: A3Status,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,

    #[serde(default)]
    pub problem_statement: String,

    #[serde(default)]
    pub observations: String,

    #[serde(default)]
    pub data_analysis: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<ImageRef>,

    #[serde(default)]
    pub root_cause: String,

    /// 5-Whys mind map
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mind_map: Vec<CauseNode>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub action_plan: Vec<ActionItem>,

    #[serde(default)]
    pub results: String,

    /// Metric this case is meant to move
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_metric: Option<EntityId>,

    pub created: DateTime<Utc>,

    pub updated: DateTime<Utc>,
}

impl Entity for A3Case {
    const PREFIX: EntityPrefix = EntityPrefix::A3;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn title(&self) -> &str {
        &self.title
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

impl A3Case {
    pub fn new(user_id: impl Into<String>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: EntityId::new(EntityPrefix::A3),
            user_id: user_id.into(),
            title: title.into(),
            description: String::new(),
            owner: String::new(),
            group: None,
            priority: Priority::default(),
            status: A3Status::default(),
            start_date: None,
            end_date: None,
            problem_statement: String::new(),
            observations: String::new(),
            data_analysis: String::new(),
            images: Vec::new(),
            root_cause: String::new(),
            mind_map: Vec::new(),
            action_plan: Vec::new(),
            results: String::new(),
            linked_metric: None,
            created: now,
            updated: now,
        }
    }

    /// Fraction of action items marked done, if there are any
    pub fn action_progress(&self) -> Option<f64> {
        if self.action_plan.is_empty() {
            return None;
        }
        let done = self
            .action_plan
            .iter()
            .filter(|a| a.status == ActionStatus::Done)
            .count();
        Some(done as f64 / self.action_plan.len() as f64)
    }
}
