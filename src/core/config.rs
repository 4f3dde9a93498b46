//! Configuration management
//!
//! Layers, lowest first: built-in defaults, the user config file
//! (`config.yaml` in the platform config dir, or `BOWLER_CONFIG`), then
//! environment variables. Command-line flags are applied on top by the CLI.

use directories::ProjectDirs;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::yaml::{parse_yaml_file, YamlError};

pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_EMAIL_FROM: &str = "bowler@localhost";
const DB_FILE: &str = "bowler.db";
const CONFIG_FILE: &str = "config.yaml";

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Yaml(#[from] YamlError),
}

/// Chat completion settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

/// Transactional email settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite database file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db: Option<PathBuf>,

    /// User to act as when no session is active
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    pub chat: ChatConfig,

    pub email: EmailConfig,
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "bowler")
}

fn pick(target: &mut Option<String>, value: Option<String>) {
    if let Some(v) = value.filter(|v| !v.trim().is_empty()) {
        *target = Some(v);
    }
}

impl Config {
    /// Load all layers; a broken config file is reported and skipped
    pub fn load() -> Self {
        let mut config = Config::default();

        if let Some(path) = Self::config_path() {
            if path.exists() {
                match Self::from_file(&path) {
                    Ok(file) => config.merge(file),
                    Err(e) => tracing::warn!("Ignoring config file {}: {}", path.display(), e),
                }
            }
        }

        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Location of the user config file
    pub fn config_path() -> Option<PathBuf> {
        if let Some(path) = std::env::var_os("BOWLER_CONFIG") {
            return Some(PathBuf::from(path));
        }
        project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE))
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        Ok(parse_yaml_file(path)?)
    }

    /// Overlay every value set in `other`
    pub fn merge(&mut self, other: Config) {
        if other.db.is_some() {
            self.db = other.db;
        }
        pick(&mut self.user, other.user);
        pick(&mut self.chat.endpoint, other.chat.endpoint);
        pick(&mut self.chat.model, other.chat.model);
        pick(&mut self.chat.api_key, other.chat.api_key);
        pick(&mut self.email.endpoint, other.email.endpoint);
        pick(&mut self.email.api_key, other.email.api_key);
        pick(&mut self.email.from, other.email.from);
    }

    /// Overlay `BOWLER_*` variables read through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(db) = lookup("BOWLER_DB").filter(|v| !v.is_empty()) {
            self.db = Some(PathBuf::from(db));
        }
        pick(&mut self.user, lookup("BOWLER_USER"));
        pick(&mut self.chat.endpoint, lookup("BOWLER_CHAT_URL"));
        pick(&mut self.chat.model, lookup("BOWLER_CHAT_MODEL"));
        pick(&mut self.chat.api_key, lookup("BOWLER_CHAT_API_KEY"));
        pick(&mut self.email.endpoint, lookup("BOWLER_EMAIL_URL"));
        pick(&mut self.email.api_key, lookup("BOWLER_EMAIL_API_KEY"));
        pick(&mut self.email.from, lookup("BOWLER_EMAIL_FROM"));
    }

    pub fn db_path(&self) -> PathBuf {
        if let Some(db) = &self.db {
            return db.clone();
        }
        project_dirs()
            .map(|dirs| dirs.data_dir().join(DB_FILE))
            .unwrap_or_else(|| PathBuf::from(DB_FILE))
    }

    pub fn chat_model(&self) -> &str {
        self.chat.model.as_deref().unwrap_or(DEFAULT_CHAT_MODEL)
    }

    pub fn email_from(&self) -> &str {
        self.email.from.as_deref().unwrap_or(DEFAULT_EMAIL_FROM)
    }

    /// Copy with secrets masked, for display
    pub fn redacted(&self) -> Self {
        let mask = |v: &Option<String>| v.as_ref().map(|_| "********".to_string());
        let mut copy = self.clone();
        copy.chat.api_key = mask(&self.chat.api_key);
        copy.email.api_key = mask(&self.email.api_key);
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.chat_model(), DEFAULT_CHAT_MODEL);
        assert_eq!(config.email_from(), DEFAULT_EMAIL_FROM);
        assert!(config.db_path().ends_with(DB_FILE));
    }

    #[test]
    fn test_file_then_env_layering() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "user: alice\nchat:\n  endpoint: http://file/chat\n  model: file-model\n",
        )
        .unwrap();

        let mut config = Config::default();
        config.merge(Config::from_file(&path).unwrap());
        assert_eq!(config.user.as_deref(), Some("alice"));
        assert_eq!(config.chat_model(), "file-model");

        let env: HashMap<&str, &str> = [
            ("BOWLER_CHAT_MODEL", "env-model"),
            ("BOWLER_DB", "/tmp/x.db"),
            ("BOWLER_USER", ""),
        ]
        .into_iter()
        .collect();
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.chat_model(), "env-model");
        assert_eq!(config.chat.endpoint.as_deref(), Some("http://file/chat"));
        assert_eq!(config.db_path(), PathBuf::from("/tmp/x.db"));
        // Empty values don't clear lower layers
        assert_eq!(config.user.as_deref(), Some("alice"));
    }

    #[test]
    fn test_bad_file_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "chat: [1, 2\n").unwrap();
        assert!(Config::from_file(&path).is_err());
    }

    #[test]
    fn test_redacted_masks_keys() {
        let mut config = Config::default();
        config.chat.api_key = Some("sk-secret".to_string());
        let shown = config.redacted();
        assert_eq!(shown.chat.api_key.as_deref(), Some("********"));
        assert_eq!(shown.email.api_key, None);
    }
}
