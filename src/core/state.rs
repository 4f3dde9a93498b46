//! Application state - a user's bowlers, A3 cases and dashboard
//!
//! State is loaded from the storage service, changed only through the
//! methods here, and written back as a whole with [`AppState::to_payload`].
//! Generated content (mind maps, action plans) goes through a
//! [`RequestTracker`] ticket so a late reply can't overwrite newer edits.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use thiserror::Error;
use ulid::Ulid;

use crate::core::cause_tree::{validate_mind_map, CauseNode, CauseTreeError};
use crate::core::entity::Entity;
use crate::core::identity::EntityId;
use crate::core::shortid::ShortIdIndex;
use crate::entities::a3::{A3Case, ActionItem};
use crate::entities::bowler::{Bowler, Dashboard};
use crate::entities::metric::{validate_month, Metric};
use crate::entities::workspace::{SavePayload, UserData};

/// Errors from state updates
#[derive(Debug, Error, PartialEq)]
pub enum StateError {
    #[error("Bowler not found: {0}")]
    BowlerNotFound(String),

    #[error("A3 case not found: {0}")]
    A3NotFound(String),

    #[error("Metric not found: {0}")]
    MetricNotFound(String),

    #[error("A metric named '{0}' already exists in this bowler")]
    DuplicateMetric(String),

    #[error("{0}")]
    InvalidMonth(String),

    #[error("Invalid mind map: {0}")]
    MindMap(#[from] CauseTreeError),

    #[error("A newer '{0}' request replaced this one; result discarded")]
    Superseded(String),

    #[error("'{0}' changed while the request was running; re-run to regenerate")]
    Conflict(String),
}

/// Handle for one in-flight generation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTicket {
    key: String,
    id: String,
    /// `updated` timestamp of the target record when the request began
    base_version: DateTime<Utc>,
}

impl RequestTicket {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

/// Tracks the newest request per action key
///
/// Starting a request for a key supersedes every earlier ticket for that key.
/// When requests can start in other processes, feed the newest ticket ID
/// recorded in storage back in with [`RequestTracker::observe`] before
/// finishing.
#[derive(Debug, Default)]
pub struct RequestTracker {
    latest: HashMap<String, String>,
}

impl RequestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self, key: impl Into<String>, base_version: DateTime<Utc>) -> RequestTicket {
        let key = key.into();
        let id = Ulid::new().to_string();
        self.latest.insert(key.clone(), id.clone());
        RequestTicket {
            key,
            id,
            base_version,
        }
    }

    /// Record the newest ticket ID known for a key; `None` means no request is live
    pub fn observe(&mut self, key: &str, latest: Option<String>) {
        match latest {
            Some(id) => {
                self.latest.insert(key.to_string(), id);
            }
            None => {
                self.latest.remove(key);
            }
        }
    }

    pub fn is_current(&self, ticket: &RequestTicket) -> bool {
        self.latest.get(&ticket.key) == Some(&ticket.id)
    }

    /// Retire a ticket, failing if it was superseded or the record moved on
    pub fn finish(
        &mut self,
        ticket: &RequestTicket,
        current_version: DateTime<Utc>,
    ) -> Result<(), StateError> {
        if !self.is_current(ticket) {
            return Err(StateError::Superseded(ticket.key.clone()));
        }
        self.latest.remove(&ticket.key);
        if current_version != ticket.base_version {
            return Err(StateError::Conflict(ticket.key.clone()));
        }
        Ok(())
    }
}

/// Request key for mind-map generation on a case
pub fn mind_map_request_key(case_id: &EntityId) -> String {
    format!("{}:why", case_id)
}

/// Request key for action-plan generation on a case
pub fn action_plan_request_key(case_id: &EntityId) -> String {
    format!("{}:plan", case_id)
}

/// In-memory workspace for one user
#[derive(Debug)]
pub struct AppState {
    user_id: String,
    bowlers: Vec<Bowler>,
    a3_cases: Vec<A3Case>,
    dashboard: Dashboard,
    requests: RequestTracker,
}

impl AppState {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            bowlers: Vec::new(),
            a3_cases: Vec::new(),
            dashboard: Dashboard::default(),
            requests: RequestTracker::new(),
        }
    }

    pub fn from_user_data(data: UserData) -> Self {
        let mut state = Self::new(data.user_id);
        state.bowlers = data.bowlers;
        state.a3_cases = data.a3_cases;
        state.dashboard = data.dashboard.unwrap_or_default();
        state.bowlers.sort_by_key(|b| b.created);
        state.a3_cases.sort_by_key(|c| c.created);
        state
    }

    /// Full replacement payload for the storage service
    pub fn to_payload(&self) -> SavePayload {
        SavePayload {
            user_id: self.user_id.clone(),
            bowlers: self.bowlers.clone(),
            a3_cases: self.a3_cases.clone(),
            dashboard: Some(self.dashboard.clone()),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn bowlers(&self) -> &[Bowler] {
        &self.bowlers
    }

    pub fn a3_cases(&self) -> &[A3Case] {
        &self.a3_cases
    }

    pub fn dashboard(&self) -> &Dashboard {
        &self.dashboard
    }

    /// Short-ID index over the current records
    pub fn short_ids(&self) -> ShortIdIndex {
        let mut index = ShortIdIndex::new();
        index.add_all(self.bowlers.iter().map(|b| (b.id(), b.title())));
        index.add_all(self.a3_cases.iter().map(|c| (c.id(), c.title())));
        index
    }

    pub fn resolve(&self, reference: &str) -> Option<EntityId> {
        self.short_ids().resolve(reference)
    }

    // =====================================================================
    // Bowlers
    // =====================================================================

    pub fn bowler(&self, id: &EntityId) -> Option<&Bowler> {
        self.bowlers.iter().find(|b| &b.id == id)
    }

    pub fn add_bowler(&mut self, mut bowler: Bowler) -> EntityId {
        bowler.user_id = self.user_id.clone();
        let id = bowler.id.clone();
        self.bowlers.push(bowler);
        id
    }

    pub fn update_bowler<F>(&mut self, id: &EntityId, f: F) -> Result<(), StateError>
    where
        F: FnOnce(&mut Bowler),
    {
        let bowler = self
            .bowlers
            .iter_mut()
            .find(|b| &b.id == id)
            .ok_or_else(|| StateError::BowlerNotFound(id.to_string()))?;
        f(bowler);
        bowler.touch();
        Ok(())
    }

    pub fn remove_bowler(&mut self, id: &EntityId) -> Result<Bowler, StateError> {
        let pos = self
            .bowlers
            .iter()
            .position(|b| &b.id == id)
            .ok_or_else(|| StateError::BowlerNotFound(id.to_string()))?;
        if let Some(p) = self.dashboard.pinned.iter().position(|p| p == id) {
            self.dashboard.pinned.remove(p);
        }
        Ok(self.bowlers.remove(pos))
    }

    pub fn add_metric(&mut self, bowler_id: &EntityId, metric: Metric) -> Result<EntityId, StateError> {
        let bowler = self
            .bowlers
            .iter_mut()
            .find(|b| &b.id == bowler_id)
            .ok_or_else(|| StateError::BowlerNotFound(bowler_id.to_string()))?;
        if bowler.find_metric(&metric.name).is_some() {
            return Err(StateError::DuplicateMetric(metric.name));
        }
        let id = metric.id.clone();
        bowler.metrics.push(metric);
        bowler.touch();
        Ok(id)
    }

    /// Record one month's actual and/or target
    pub fn set_month(
        &mut self,
        bowler_id: &EntityId,
        metric_ref: &str,
        month: &str,
        actual: Option<&str>,
        target: Option<&str>,
    ) -> Result<(), StateError> {
        validate_month(month).map_err(StateError::InvalidMonth)?;
        let bowler = self
            .bowlers
            .iter_mut()
            .find(|b| &b.id == bowler_id)
            .ok_or_else(|| StateError::BowlerNotFound(bowler_id.to_string()))?;
        let metric = bowler
            .find_metric_mut(metric_ref)
            .ok_or_else(|| StateError::MetricNotFound(metric_ref.to_string()))?;
        metric.set_month(month, actual, target);
        bowler.touch();
        Ok(())
    }

    pub fn remove_metric(&mut self, bowler_id: &EntityId, metric_ref: &str) -> Result<Metric, StateError> {
        let bowler = self
            .bowlers
            .iter_mut()
            .find(|b| &b.id == bowler_id)
            .ok_or_else(|| StateError::BowlerNotFound(bowler_id.to_string()))?;
        let pos = bowler
            .metrics
            .iter()
            .position(|m| m.id.to_string() == metric_ref || m.name.eq_ignore_ascii_case(metric_ref))
            .ok_or_else(|| StateError::MetricNotFound(metric_ref.to_string()))?;
        let removed = bowler.metrics.remove(pos);
        bowler.touch();
        Ok(removed)
    }

    // =====================================================================
    // A3 cases
    // =====================================================================

    pub fn a3(&self, id: &EntityId) -> Option<&A3Case> {
        self.a3_cases.iter().find(|c| &c.id == id)
    }

    pub fn add_a3(&mut self, mut case: A3Case) -> EntityId {
        case.user_id = self.user_id.clone();
        let id = case.id.clone();
        self.a3_cases.push(case);
        id
    }

    pub fn update_a3<F>(&mut self, id: &EntityId, f: F) -> Result<(), StateError>
    where
        F: FnOnce(&mut A3Case),
    {
        let case = self
            .a3_cases
            .iter_mut()
            .find(|c| &c.id == id)
            .ok_or_else(|| StateError::A3NotFound(id.to_string()))?;
        f(case);
        case.touch();
        Ok(())
    }

    pub fn remove_a3(&mut self, id: &EntityId) -> Result<A3Case, StateError> {
        let pos = self
            .a3_cases
            .iter()
            .position(|c| &c.id == id)
            .ok_or_else(|| StateError::A3NotFound(id.to_string()))?;
        Ok(self.a3_cases.remove(pos))
    }

    /// Replace a case's mind map after checking its invariants
    pub fn set_mind_map(&mut self, id: &EntityId, nodes: Vec<CauseNode>) -> Result<(), StateError> {
        if !nodes.is_empty() {
            validate_mind_map(&nodes)?;
        }
        self.update_a3(id, |case| case.mind_map = nodes)
    }

    // =====================================================================
    // Generated content
    // =====================================================================

    /// Start a generation request against a case
    pub fn begin_request(&mut self, key: String, case_id: &EntityId) -> Result<RequestTicket, StateError> {
        let version = self
            .a3(case_id)
            .map(|c| c.updated)
            .ok_or_else(|| StateError::A3NotFound(case_id.to_string()))?;
        Ok(self.requests.begin(key, version))
    }

    fn finish_request(&mut self, ticket: &RequestTicket, case_id: &EntityId) -> Result<(), StateError> {
        let version = self
            .a3(case_id)
            .map(|c| c.updated)
            .ok_or_else(|| StateError::A3NotFound(case_id.to_string()))?;
        self.requests.finish(ticket, version)
    }

    /// Apply a generated mind map if its ticket is still current
    ///
    /// On any error the stored node set is left untouched.
    pub fn apply_generated_mind_map(
        &mut self,
        ticket: &RequestTicket,
        case_id: &EntityId,
        nodes: Vec<CauseNode>,
    ) -> Result<(), StateError> {
        validate_mind_map(&nodes)?;
        self.finish_request(ticket, case_id)?;
        self.set_mind_map(case_id, nodes)
    }

    /// Append generated action items if the ticket is still current
    pub fn apply_generated_actions(
        &mut self,
        ticket: &RequestTicket,
        case_id: &EntityId,
        items: Vec<ActionItem>,
    ) -> Result<(), StateError> {
        self.finish_request(ticket, case_id)?;
        self.update_a3(case_id, |case| case.action_plan.extend(items))
    }

    /// Take in the newest ticket ID stored for an action key
    ///
    /// Call on a freshly reloaded state before applying a reply, so a
    /// request started elsewhere in the meantime supersedes this one.
    pub fn observe_request(&mut self, key: &str, latest: Option<String>) {
        self.requests.observe(key, latest);
    }

    // =====================================================================
    // Dashboard
    // =====================================================================

    pub fn set_dashboard(&mut self, dashboard: Dashboard) {
        self.dashboard = dashboard;
    }

    pub fn pin_bowler(&mut self, id: &EntityId) -> Result<(), StateError> {
        if self.bowler(id).is_none() {
            return Err(StateError::BowlerNotFound(id.to_string()));
        }
        if !self.dashboard.pinned.contains(id) {
            self.dashboard.pinned.push(id.clone());
        }
        Ok(())
    }

    pub fn unpin_bowler(&mut self, id: &EntityId) {
        self.dashboard.pinned.retain(|p| p != id);
    }
}
