//! Accounts and sessions
//!
//! The username is the account key and also the user namespace for stored
//! records. Passwords are kept as PBKDF2-HMAC-SHA256 hashes in PHC string
//! form (`$pbkdf2-sha256$i=<rounds>,l=32$<salt>$<hash>`).

use chrono::Utc;
use pbkdf2::password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use pbkdf2::{Params, Pbkdf2};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::entities::account::{Account, AccountRole, PublicProfile, Session};
use crate::store::keys::{account_key, session_key, validate_user_id};
use crate::store::{get_json, put_json, KvStore, StoreError};

/// PBKDF2 rounds for new hashes
pub const DEFAULT_ROUNDS: u32 = 600_000;

/// Shortest accepted password
pub const MIN_PASSWORD_LEN: usize = 8;

const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;
const TOKEN_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("User '{0}' already exists")]
    UserExists(String),

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("User '{0}' not found")]
    UserNotFound(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("Session not found or expired; log in again")]
    SessionNotFound,

    #[error("Stored password hash for '{0}' is unreadable")]
    CorruptHash(String),

    #[error("Password hashing failed: {0}")]
    Hash(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// New account details
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

/// Profile fields to change; `None` leaves a field as it is
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

// =========================================================================
// Password hashing
// =========================================================================

/// Hash a password with a fresh random salt
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    hash_password_with(password, DEFAULT_ROUNDS)
}

pub fn hash_password_with(password: &str, rounds: u32) -> Result<String, AuthError> {
    let salt_bytes: [u8; SALT_LEN] = rand::random();
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| AuthError::Hash(e.to_string()))?;
    let params = Params {
        rounds: rounds.max(1),
        output_length: HASH_LEN,
    };
    let hash = Pbkdf2
        .hash_password_customized(password.as_bytes(), None, None, params, &salt)
        .map_err(|e| AuthError::Hash(e.to_string()))?;
    Ok(hash.to_string())
}

/// Check a password against a stored PHC hash
///
/// Returns `None` when the stored hash can't be parsed.
pub fn verify_password(password: &str, stored: &str) -> Option<bool> {
    let parsed = PasswordHash::new(stored).ok()?;
    match Pbkdf2.verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Some(true),
        Err(password_hash::Error::Password) => Some(false),
        Err(_) => None,
    }
}

// =========================================================================
// Account operations
// =========================================================================

fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::InvalidInput(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

fn normalize_optional(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn load_account<S: KvStore + ?Sized>(store: &S, username: &str) -> Result<Account, AuthError> {
    get_json(store, &account_key(username))?
        .ok_or_else(|| AuthError::UserNotFound(username.to_string()))
}

fn check_password(account: &Account, password: &str) -> Result<(), AuthError> {
    match verify_password(password, &account.password_hash) {
        Some(true) => Ok(()),
        Some(false) => Err(AuthError::InvalidCredentials),
        None => Err(AuthError::CorruptHash(account.username.clone())),
    }
}

/// Create an account
pub fn signup<S: KvStore + ?Sized>(store: &S, request: SignupRequest) -> Result<PublicProfile, AuthError> {
    let username = request.username.trim().to_string();
    validate_user_id(&username).map_err(AuthError::InvalidInput)?;
    validate_password(&request.password)?;

    let key = account_key(&username);
    if store.get(&key)?.is_some() {
        return Err(AuthError::UserExists(username));
    }

    let account = Account {
        username: username.clone(),
        password_hash: hash_password(&request.password)?,
        email: normalize_optional(request.email),
        first_name: normalize_optional(request.first_name),
        last_name: normalize_optional(request.last_name),
        role: AccountRole::User,
        created: Utc::now(),
    };
    put_json(store, &key, &account)?;
    info!(user = %username, "account created");
    Ok(PublicProfile::from(&account))
}

/// Verify credentials and open a session
pub fn login<S: KvStore + ?Sized>(store: &S, username: &str, password: &str) -> Result<Session, AuthError> {
    let username = username.trim();
    let account = match get_json::<Account, S>(store, &account_key(username))? {
        Some(account) => account,
        None => {
            warn!(user = %username, "login for unknown user");
            return Err(AuthError::InvalidCredentials);
        }
    };
    if let Err(e) = check_password(&account, password) {
        warn!(user = %username, "login failed");
        return Err(e);
    }

    let token: [u8; TOKEN_LEN] = rand::random();
    let session = Session {
        token: hex::encode(token),
        username: account.username,
        created: Utc::now(),
    };
    put_json(store, &session_key(&session.token), &session)?;
    info!(user = %session.username, "logged in");
    Ok(session)
}

/// Close a session
pub fn logout<S: KvStore + ?Sized>(store: &S, token: &str) -> Result<(), AuthError> {
    if store.delete(&session_key(token))? {
        Ok(())
    } else {
        Err(AuthError::SessionNotFound)
    }
}

/// Look up the session for a token
pub fn session<S: KvStore + ?Sized>(store: &S, token: &str) -> Result<Session, AuthError> {
    get_json(store, &session_key(token))?.ok_or(AuthError::SessionNotFound)
}

pub fn change_password<S: KvStore + ?Sized>(
    store: &S,
    username: &str,
    old_password: &str,
    new_password: &str,
) -> Result<(), AuthError> {
    let mut account = load_account(store, username)?;
    check_password(&account, old_password)?;
    validate_password(new_password)?;

    account.password_hash = hash_password(new_password)?;
    put_json(store, &account_key(username), &account)?;
    info!(user = %username, "password changed");
    Ok(())
}

pub fn update_profile<S: KvStore + ?Sized>(
    store: &S,
    username: &str,
    update: ProfileUpdate,
) -> Result<PublicProfile, AuthError> {
    let mut account = load_account(store, username)?;
    if let Some(email) = update.email {
        account.email = normalize_optional(Some(email));
    }
    if let Some(first) = update.first_name {
        account.first_name = normalize_optional(Some(first));
    }
    if let Some(last) = update.last_name {
        account.last_name = normalize_optional(Some(last));
    }
    put_json(store, &account_key(username), &account)?;
    Ok(PublicProfile::from(&account))
}

/// Public profile for a user
pub fn get_user<S: KvStore + ?Sized>(store: &S, username: &str) -> Result<PublicProfile, AuthError> {
    load_account(store, username).map(|a| PublicProfile::from(&a))
}
