//! Short ID system for easier record selection
//!
//! Short IDs are aliases derived from creation order within a user's
//! workspace: `BWL@1` is the oldest bowler, `A3@2` the second-oldest A3.
//! They are rebuilt every time the workspace is loaded, so they never need
//! persisting.

use std::collections::HashMap;

use crate::core::identity::{EntityId, EntityPrefix};

/// A mapping of short IDs to full entity IDs
#[derive(Debug, Default)]
pub struct ShortIdIndex {
    /// Maps "PREFIX@N" to full ID
    entries: HashMap<String, EntityId>,
    /// Maps full ID to "PREFIX@N"
    reverse: HashMap<EntityId, String>,
    /// Titles for name lookup, lowercased
    titles: Vec<(String, EntityId)>,
}

impl ShortIdIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add records of one type in display order
    pub fn add_all<'a>(&mut self, records: impl IntoIterator<Item = (&'a EntityId, &'a str)>) {
        for (id, title) in records {
            self.add(id.clone(), title);
        }
    }

    /// Add a record, returning its short ID
    pub fn add(&mut self, id: EntityId, title: &str) -> String {
        if let Some(existing) = self.reverse.get(&id) {
            return existing.clone();
        }
        let prefix = id.prefix();
        let next = self
            .entries
            .keys()
            .filter(|k| k.starts_with(&format!("{}@", prefix)))
            .count()
            + 1;
        let short = format!("{}@{}", prefix, next);
        self.entries.insert(short.clone(), id.clone());
        self.reverse.insert(id.clone(), short.clone());
        self.titles.push((title.to_lowercase(), id));
        short
    }

    /// Resolve a reference to a full ID
    ///
    /// Accepts:
    /// - `PREFIX@N` (case-insensitive), e.g. `BWL@1`, `a3@2`
    /// - a full ID, e.g. `BWL-01KDGJC92W6EBFGZ5SJW6MFGW6`
    /// - an unambiguous leading part of a full ID (at least 6 characters)
    /// - an exact title (case-insensitive), if unambiguous
    pub fn resolve(&self, reference: &str) -> Option<EntityId> {
        let reference = reference.trim();

        if let Some((prefix, num)) = reference.split_once('@') {
            let prefix: EntityPrefix = prefix.parse().ok()?;
            let num: u32 = num.parse().ok()?;
            return self.entries.get(&format!("{}@{}", prefix, num)).cloned();
        }

        if let Ok(id) = reference.parse::<EntityId>() {
            if self.reverse.contains_key(&id) {
                return Some(id);
            }
        }

        let upper = reference.to_uppercase();
        if upper.len() >= 6 {
            let mut matches = self.reverse.keys().filter(|id| id.to_string().starts_with(&upper));
            if let (Some(first), None) = (matches.next(), matches.next()) {
                return Some(first.clone());
            }
        }

        let lower = reference.to_lowercase();
        let mut by_title = self.titles.iter().filter(|(t, _)| *t == lower);
        match (by_title.next(), by_title.next()) {
            (Some((_, id)), None) => Some(id.clone()),
            _ => None,
        }
    }

    /// Short ID for a full ID
    pub fn get_short_id(&self, id: &EntityId) -> Option<String> {
        self.reverse.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
