//! Key-value persistence
//!
//! Records are stored as JSON strings under namespaced keys (see [`keys`]).
//! Listing is cursor-paginated; scans walk pages one after another and read
//! each page's keys in batches.

pub mod keys;
pub mod memory;
pub mod sqlite;

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

pub use memory::MemoryKv;
pub use sqlite::SqliteKv;

/// Default page size for `list`
pub const PAGE_SIZE: usize = 1000;

/// Keys read per `get_many` call during a scan
pub const READ_BATCH: usize = 32;

/// Errors from the KV store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Failed to encode/decode record: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One page of a key listing
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KvPage {
    pub keys: Vec<String>,

    /// Pass back to `list` to continue; `None` when the listing is complete
    pub cursor: Option<String>,

    pub list_complete: bool,
}

/// A string-keyed, string-valued store
pub trait KvStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Read several keys at once; keys that don't exist are left out
    fn get_many(&self, keys: &[String]) -> Result<Vec<(String, String)>, StoreError> {
        let mut found = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(value) = self.get(key)? {
                found.push((key.clone(), value));
            }
        }
        Ok(found)
    }

    fn put(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Delete a key, returning whether it existed
    fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// List keys starting with `prefix` in key order, after `cursor`
    fn list(&self, prefix: &str, cursor: Option<&str>, limit: usize) -> Result<KvPage, StoreError>;
}

/// Read and decode a JSON record
pub fn get_json<T, S>(store: &S, key: &str) -> Result<Option<T>, StoreError>
where
    T: DeserializeOwned,
    S: KvStore + ?Sized,
{
    match store.get(key)? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

/// Encode and write a JSON record
pub fn put_json<T, S>(store: &S, key: &str, value: &T) -> Result<(), StoreError>
where
    T: Serialize,
    S: KvStore + ?Sized,
{
    let raw = serde_json::to_string(value)?;
    store.put(key, &raw)
}

/// Every key under a prefix, following cursors to the end
pub fn list_all_keys<S: KvStore + ?Sized>(store: &S, prefix: &str) -> Result<Vec<String>, StoreError> {
    let mut keys = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let page = store.list(prefix, cursor.as_deref(), PAGE_SIZE)?;
        keys.extend(page.keys);
        match page.cursor {
            Some(next) if !page.list_complete => cursor = Some(next),
            _ => break,
        }
    }
    Ok(keys)
}

/// Read and decode the given keys in batches of [`READ_BATCH`]
///
/// Missing keys and undecodable values are skipped with a warning.
pub fn read_records<T, S>(store: &S, keys: &[String]) -> Result<Vec<(String, T)>, StoreError>
where
    T: DeserializeOwned,
    S: KvStore + ?Sized,
{
    let mut records = Vec::with_capacity(keys.len());
    for batch in keys.chunks(READ_BATCH) {
        for (key, raw) in store.get_many(batch)? {
            match serde_json::from_str::<T>(&raw) {
                Ok(record) => records.push((key, record)),
                Err(e) => tracing::warn!("Skipping undecodable record {}: {}", key, e),
            }
        }
    }
    Ok(records)
}

/// Decode every record under a prefix
///
/// Pages are walked in order and each page is read in batches of
/// [`READ_BATCH`]. Keys that vanish between listing and reading, or whose
/// value fails to decode, are skipped with a warning. Store errors abort the
/// whole scan.
pub fn scan_prefix<T, S>(store: &S, prefix: &str) -> Result<Vec<(String, T)>, StoreError>
where
    T: DeserializeOwned,
    S: KvStore + ?Sized,
{
    let mut records = Vec::new();
    let mut cursor: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let page = store.list(prefix, cursor.as_deref(), PAGE_SIZE)?;
        pages += 1;

        records.extend(read_records(store, &page.keys)?);

        match page.cursor {
            Some(next) if !page.list_complete => cursor = Some(next),
            _ => break,
        }
    }

    tracing::debug!(prefix, pages, records = records.len(), "scan complete");
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_helpers_roundtrip() {
        let store = MemoryKv::new();
        put_json(&store, "k", &vec![1, 2, 3]).unwrap();
        let back: Option<Vec<i32>> = get_json(&store, "k").unwrap();
        assert_eq!(back, Some(vec![1, 2, 3]));
        let missing: Option<Vec<i32>> = get_json(&store, "nope").unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn test_scan_prefix_skips_bad_records() {
        let store = MemoryKv::new();
        store.put("p:1", "1").unwrap();
        store.put("p:2", "not json").unwrap();
        store.put("p:3", "3").unwrap();
        store.put("q:1", "9").unwrap();

        let records: Vec<(String, i32)> = scan_prefix(&store, "p:").unwrap();
        assert_eq!(
            records,
            vec![("p:1".to_string(), 1), ("p:3".to_string(), 3)]
        );
    }

    #[test]
    fn test_scan_prefix_crosses_pages() {
        let store = MemoryKv::new();
        for i in 0..(PAGE_SIZE + 5) {
            store.put(&format!("x:{:05}", i), &i.to_string()).unwrap();
        }
        let records: Vec<(String, usize)> = scan_prefix(&store, "x:").unwrap();
        assert_eq!(records.len(), PAGE_SIZE + 5);
        assert_eq!(list_all_keys(&store, "x:").unwrap().len(), PAGE_SIZE + 5);
    }
}
