//! SQLite-backed KV store
//!
//! A single `kv` table holding JSON strings. The file is created on first
//! open, along with any missing parent directories.

use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use super::{KvPage, KvStore, StoreError};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS kv (
    key TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL,
    updated TEXT NOT NULL
);
"#;

/// File-backed KV store
pub struct SqliteKv {
    conn: Connection,
}

impl SqliteKv {
    /// Open (or create) the store at `path`
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Self::with_connection(Connection::open(path)?)
    }

    /// Fresh in-memory store
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }
}

impl KvStore for SqliteKv {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    fn get_many(&self, keys: &[String]) -> Result<Vec<(String, String)>, StoreError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; keys.len()].join(", ");
        let sql = format!("SELECT key, value FROM kv WHERE key IN ({})", placeholders);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(keys.iter()), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut found: HashMap<String, String> = HashMap::with_capacity(keys.len());
        for row in rows {
            let (key, value) = row?;
            found.insert(key, value);
        }

        // Preserve the caller's key order
        Ok(keys
            .iter()
            .filter_map(|k| found.remove(k).map(|v| (k.clone(), v)))
            .collect())
    }

    fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO kv (key, value, updated) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated = excluded.updated",
            params![key, value, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let changed = self.conn.execute("DELETE FROM kv WHERE key = ?1", [key])?;
        Ok(changed > 0)
    }

    fn list(&self, prefix: &str, cursor: Option<&str>, limit: usize) -> Result<KvPage, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT key FROM kv
             WHERE substr(key, 1, length(?1)) = ?1 AND key > ?2
             ORDER BY key
             LIMIT ?3",
        )?;
        let after = cursor.unwrap_or("");
        let fetch = (limit + 1) as i64;
        let mut keys = stmt
            .query_map(params![prefix, after, fetch], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        let list_complete = keys.len() <= limit;
        keys.truncate(limit);
        let cursor = if list_complete { None } else { keys.last().cloned() };

        Ok(KvPage {
            keys,
            cursor,
            list_complete,
        })
    }
}
