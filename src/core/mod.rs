//! Core module - fundamental types and calculations

pub mod cause_tree;
pub mod config;
pub mod entity;
pub mod identity;
pub mod logging;
pub mod shortid;
pub mod state;
pub mod stats;
pub mod text;
pub mod trend;

pub use cause_tree::{build_cause_tree, CauseNode, CauseTreeError, NodeType};
pub use config::{Config, ConfigError};
pub use entity::{Entity, Priority};
pub use identity::{EntityId, EntityPrefix, IdParseError};
pub use shortid::ShortIdIndex;
pub use state::{AppState, RequestTicket, RequestTracker, StateError};
pub use stats::{
    calculate_statistics, parse_target, process_capability, Capability, MetricSummary,
    Statistics, TargetSpec,
};
pub use trend::TrendLabel;
