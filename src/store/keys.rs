//! KV key layout
//!
//! ```text
//! user:<user>:bowler:<id>    bowler record
//! user:<user>:a3:<id>        A3 case
//! user:<user>:dashboard      dashboard settings
//! user:<user>:request:<key>  newest generation ticket for an action key
//! account:<username>         account
//! session:<token>            login session
//! email:<id>                 scheduled email job
//! ```

pub const USER_PREFIX: &str = "user:";
pub const ACCOUNT_PREFIX: &str = "account:";
pub const SESSION_PREFIX: &str = "session:";
pub const EMAIL_PREFIX: &str = "email:";

/// Token of the session the CLI is currently logged in with
pub const ACTIVE_SESSION_KEY: &str = "cli:active-session";

/// Kind of record stored under a user namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Bowler,
    A3,
    Dashboard,
}

impl RecordKind {
    pub fn segment(&self) -> &'static str {
        match self {
            RecordKind::Bowler => "bowler",
            RecordKind::A3 => "a3",
            RecordKind::Dashboard => "dashboard",
        }
    }
}

/// A parsed `user:` key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserKey {
    pub user_id: String,
    pub kind: RecordKind,
    pub record_id: Option<String>,
}

/// User IDs become key segments, so they may not contain the separator
pub fn validate_user_id(user_id: &str) -> Result<(), String> {
    if user_id.trim().is_empty() {
        return Err("User ID cannot be empty".to_string());
    }
    if user_id.contains(':') || user_id.chars().any(char::is_whitespace) {
        return Err(format!(
            "Invalid user ID '{}': must not contain ':' or whitespace",
            user_id
        ));
    }
    Ok(())
}

pub fn user_prefix(user_id: &str) -> String {
    format!("{}{}:", USER_PREFIX, user_id)
}

/// Prefix covering every record of one kind for a user
pub fn record_prefix(user_id: &str, kind: RecordKind) -> String {
    format!("{}{}:", user_prefix(user_id), kind.segment())
}

pub fn record_key(user_id: &str, kind: RecordKind, record_id: &str) -> String {
    format!("{}{}", record_prefix(user_id, kind), record_id)
}

pub fn bowler_key(user_id: &str, bowler_id: &str) -> String {
    record_key(user_id, RecordKind::Bowler, bowler_id)
}

pub fn a3_key(user_id: &str, case_id: &str) -> String {
    record_key(user_id, RecordKind::A3, case_id)
}

pub fn dashboard_key(user_id: &str) -> String {
    format!("{}{}", user_prefix(user_id), RecordKind::Dashboard.segment())
}

/// Prefix of a user's generation-ticket keys
pub fn request_prefix(user_id: &str) -> String {
    format!("{}request:", user_prefix(user_id))
}

/// Where the newest ticket for an action key (`<case id>:<action>`) is kept
pub fn request_key(user_id: &str, action_key: &str) -> String {
    format!("{}{}", request_prefix(user_id), action_key)
}

pub fn account_key(username: &str) -> String {
    format!("{}{}", ACCOUNT_PREFIX, username)
}

pub fn session_key(token: &str) -> String {
    format!("{}{}", SESSION_PREFIX, token)
}

pub fn email_key(job_id: &str) -> String {
    format!("{}{}", EMAIL_PREFIX, job_id)
}

/// Split a `user:` key into its parts
pub fn parse_user_key(key: &str) -> Option<UserKey> {
    let rest = key.strip_prefix(USER_PREFIX)?;
    let mut parts = rest.splitn(3, ':');
    let user_id = parts.next()?.to_string();
    let kind = match parts.next()? {
        "bowler" => RecordKind::Bowler,
        "a3" => RecordKind::A3,
        "dashboard" => RecordKind::Dashboard,
        _ => return None,
    };
    let record_id = parts.next().map(str::to_string);

    match (kind, &record_id) {
        (RecordKind::Dashboard, None) => {}
        (RecordKind::Dashboard, Some(_)) => return None,
        (_, Some(id)) if !id.is_empty() => {}
        _ => return None,
    }

    Some(UserKey {
        user_id,
        kind,
        record_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        assert_eq!(bowler_key("alice", "BWL-1"), "user:alice:bowler:BWL-1");
        assert_eq!(a3_key("alice", "A3-1"), "user:alice:a3:A3-1");
        assert_eq!(dashboard_key("alice"), "user:alice:dashboard");
        assert_eq!(record_prefix("alice", RecordKind::A3), "user:alice:a3:");
        assert_eq!(account_key("alice"), "account:alice");
        assert_eq!(email_key("MAIL-1"), "email:MAIL-1");
        assert_eq!(request_key("alice", "A3-1:why"), "user:alice:request:A3-1:why");
        assert!(parse_user_key("user:alice:request:A3-1:why").is_none());
    }

    #[test]
    fn test_parse_user_key() {
        let parsed = parse_user_key("user:alice:bowler:BWL-1").unwrap();
        assert_eq!(parsed.user_id, "alice");
        assert_eq!(parsed.kind, RecordKind::Bowler);
        assert_eq!(parsed.record_id.as_deref(), Some("BWL-1"));

        let dash = parse_user_key("user:bob:dashboard").unwrap();
        assert_eq!(dash.kind, RecordKind::Dashboard);
        assert!(dash.record_id.is_none());

        assert!(parse_user_key("user:bob:bowler").is_none());
        assert!(parse_user_key("user:bob:widgets:1").is_none());
        assert!(parse_user_key("account:bob").is_none());
    }

    #[test]
    fn test_validate_user_id() {
        assert!(validate_user_id("alice").is_ok());
        assert!(validate_user_id("").is_err());
        assert!(validate_user_id("a:b").is_err());
        assert!(validate_user_id("a b").is_err());
    }
}
