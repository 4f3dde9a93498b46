//! A user's whole workspace, as exchanged with the storage worker

use serde::{Deserialize, Serialize};

use crate::entities::a3::A3Case;
use crate::entities::bowler::{Bowler, Dashboard};

/// Everything a user owns, as written by `save`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavePayload {
    pub user_id: String,

    #[serde(default)]
    pub bowlers: Vec<Bowler>,

    #[serde(default)]
    pub a3_cases: Vec<A3Case>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dashboard: Option<Dashboard>,
}

/// Everything a user owns, as returned by `load`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserData {
    pub user_id: String,

    #[serde(default)]
    pub bowlers: Vec<Bowler>,

    #[serde(default)]
    pub a3_cases: Vec<A3Case>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dashboard: Option<Dashboard>,
}
