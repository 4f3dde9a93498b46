//! Bowler and A3 storage worker
//!
//! A save replaces the user's full set: keys that are no longer in the
//! payload are deleted, everything else is upserted. Cross-user operations
//! (consolidate, all-a3, kv-list, kv-delete) back the admin commands.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tracing::{debug, info};

use crate::core::state::RequestTicket;
use crate::entities::a3::{A3Case, A3Status};
use crate::entities::bowler::Bowler;
use crate::store::keys::{
    a3_key, bowler_key, dashboard_key, parse_user_key, record_prefix, request_key, request_prefix,
    validate_user_id, RecordKind, USER_PREFIX,
};
use crate::store::{
    get_json, list_all_keys, read_records, scan_prefix, KvPage, KvStore, StoreError, PAGE_SIZE,
    READ_BATCH,
};

pub use crate::entities::workspace::{SavePayload, UserData};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{0}")]
    InvalidUserId(String),

    #[error("No keys given")]
    NoKeys,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Outcome of a save
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveReport {
    pub written: usize,
    pub unchanged: usize,
    pub deleted: usize,
}

/// Filter for cross-user bowler consolidation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidateRequest {
    /// Match bowlers in this group (case-insensitive)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,

    /// Match bowlers carrying any of these tags (case-insensitive)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl ConsolidateRequest {
    fn matches(&self, bowler: &Bowler) -> bool {
        let group_ok = match &self.group {
            Some(group) => bowler
                .group
                .as_deref()
                .is_some_and(|g| g.eq_ignore_ascii_case(group)),
            None => true,
        };
        let tags_ok = self.tags.is_empty()
            || self
                .tags
                .iter()
                .any(|wanted| bowler.tags.iter().any(|t| t.eq_ignore_ascii_case(wanted)));
        group_ok && tags_ok
    }
}

/// Replace a user's stored bowlers, A3 cases and dashboard
///
/// Records whose stored JSON already matches are left alone.
pub fn save<S: KvStore + ?Sized>(store: &S, payload: &SavePayload) -> Result<SaveReport, StorageError> {
    let user_id = payload.user_id.as_str();
    validate_user_id(user_id).map_err(StorageError::InvalidUserId)?;

    let mut existing_keys = Vec::new();
    for kind in [RecordKind::Bowler, RecordKind::A3] {
        existing_keys.extend(list_all_keys(store, &record_prefix(user_id, kind))?);
    }
    existing_keys.push(dashboard_key(user_id));
    let mut stored: HashMap<String, String> = HashMap::with_capacity(existing_keys.len());
    for batch in existing_keys.chunks(READ_BATCH) {
        stored.extend(store.get_many(batch)?);
    }

    let mut wanted: HashSet<String> = HashSet::new();
    let mut report = SaveReport::default();
    let mut write = |key: String, raw: String| -> Result<(), StoreError> {
        if stored.get(&key) == Some(&raw) {
            report.unchanged += 1;
        } else {
            store.put(&key, &raw)?;
            report.written += 1;
        }
        wanted.insert(key);
        Ok(())
    };

    for bowler in &payload.bowlers {
        let mut record = bowler.clone();
        record.user_id = user_id.to_string();
        write(
            bowler_key(user_id, &bowler.id.to_string()),
            serde_json::to_string(&record).map_err(StoreError::from)?,
        )?;
    }

    for case in &payload.a3_cases {
        let mut record = case.clone();
        record.user_id = user_id.to_string();
        write(
            a3_key(user_id, &case.id.to_string()),
            serde_json::to_string(&record).map_err(StoreError::from)?,
        )?;
    }

    if let Some(dashboard) = &payload.dashboard {
        write(
            dashboard_key(user_id),
            serde_json::to_string(dashboard).map_err(StoreError::from)?,
        )?;
    }

    for key in existing_keys {
        if key == dashboard_key(user_id) || wanted.contains(&key) {
            continue;
        }
        if store.delete(&key)? {
            debug!("Deleted orphaned record {}", key);
            report.deleted += 1;
        }
    }

    // Tickets for cases that no longer exist
    let live_cases: HashSet<String> = payload.a3_cases.iter().map(|c| c.id.to_string()).collect();
    let tickets = request_prefix(user_id);
    for key in list_all_keys(store, &tickets)? {
        let case_id = key[tickets.len()..].split(':').next().unwrap_or_default();
        if !live_cases.contains(case_id) {
            store.delete(&key)?;
            debug!("Dropped request ticket {}", key);
        }
    }

    info!(
        user = user_id,
        written = report.written,
        unchanged = report.unchanged,
        deleted = report.deleted,
        "saved user data"
    );
    Ok(report)
}

/// Make `ticket` the newest request for its action key
///
/// A reply is applied only while its ticket is still the one recorded here,
/// so a request started later, from any process, supersedes it.
pub fn record_request<S: KvStore + ?Sized>(
    store: &S,
    user_id: &str,
    ticket: &RequestTicket,
) -> Result<(), StorageError> {
    validate_user_id(user_id).map_err(StorageError::InvalidUserId)?;
    store.put(&request_key(user_id, ticket.key()), ticket.id())?;
    debug!(user = user_id, key = ticket.key(), "recorded request");
    Ok(())
}

/// ID of the newest ticket recorded for an action key
pub fn latest_request<S: KvStore + ?Sized>(
    store: &S,
    user_id: &str,
    action_key: &str,
) -> Result<Option<String>, StorageError> {
    validate_user_id(user_id).map_err(StorageError::InvalidUserId)?;
    Ok(store.get(&request_key(user_id, action_key))?)
}

/// Load a user's bowlers, A3 cases and dashboard
pub fn load<S: KvStore + ?Sized>(store: &S, user_id: &str) -> Result<UserData, StorageError> {
    validate_user_id(user_id).map_err(StorageError::InvalidUserId)?;

    let mut bowlers: Vec<Bowler> = scan_prefix(store, &record_prefix(user_id, RecordKind::Bowler))?
        .into_iter()
        .map(|(_, b)| b)
        .collect();
    let mut a3_cases: Vec<A3Case> = scan_prefix(store, &record_prefix(user_id, RecordKind::A3))?
        .into_iter()
        .map(|(_, c)| c)
        .collect();
    bowlers.sort_by_key(|b| b.created);
    a3_cases.sort_by_key(|c| c.created);

    let dashboard = get_json(store, &dashboard_key(user_id))?;

    debug!(
        user = user_id,
        bowlers = bowlers.len(),
        a3 = a3_cases.len(),
        "loaded user data"
    );
    Ok(UserData {
        user_id: user_id.to_string(),
        bowlers,
        a3_cases,
        dashboard,
    })
}

/// Every `user:` key holding a record of the given kind
fn user_record_keys<S: KvStore + ?Sized>(store: &S, kind: RecordKind) -> Result<Vec<String>, StoreError> {
    Ok(list_all_keys(store, USER_PREFIX)?
        .into_iter()
        .filter(|key| parse_user_key(key).is_some_and(|k| k.kind == kind))
        .collect())
}

/// Bowlers across all users matching the request, by name then user
pub fn consolidate<S: KvStore + ?Sized>(
    store: &S,
    request: &ConsolidateRequest,
) -> Result<Vec<Bowler>, StorageError> {
    let keys = user_record_keys(store, RecordKind::Bowler)?;
    let mut bowlers: Vec<Bowler> = read_records(store, &keys)?
        .into_iter()
        .map(|(_, b): (String, Bowler)| b)
        .filter(|b| request.matches(b))
        .collect();

    bowlers.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.user_id.cmp(&b.user_id))
    });
    debug!(scanned = keys.len(), matched = bowlers.len(), "consolidated bowlers");
    Ok(bowlers)
}

/// A3 cases across all users, newest first
pub fn all_a3<S: KvStore + ?Sized>(store: &S, status: Option<A3Status>) -> Result<Vec<A3Case>, StorageError> {
    let keys = user_record_keys(store, RecordKind::A3)?;
    let mut cases: Vec<A3Case> = read_records(store, &keys)?
        .into_iter()
        .map(|(_, c): (String, A3Case)| c)
        .filter(|c| status.map_or(true, |s| c.status == s))
        .collect();
    cases.sort_by(|a, b| b.created.cmp(&a.created));
    Ok(cases)
}

/// One page of raw keys
pub fn kv_list<S: KvStore + ?Sized>(
    store: &S,
    prefix: &str,
    cursor: Option<&str>,
    limit: Option<usize>,
) -> Result<KvPage, StorageError> {
    let limit = limit.unwrap_or(PAGE_SIZE).clamp(1, PAGE_SIZE);
    Ok(store.list(prefix, cursor, limit)?)
}

/// Delete raw keys, returning how many existed
pub fn kv_delete<S: KvStore + ?Sized>(store: &S, keys: &[String]) -> Result<usize, StorageError> {
    if keys.is_empty() {
        return Err(StorageError::NoKeys);
    }
    let mut deleted = 0;
    for key in keys {
        if store.delete(key)? {
            deleted += 1;
        }
    }
    info!(requested = keys.len(), deleted, "deleted raw keys");
    Ok(deleted)
}
