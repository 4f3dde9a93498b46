//! Storage, auth and email workers
//!
//! Each service is a set of free functions over any [`KvStore`](crate::store::KvStore),
//! so the CLI can run them against SQLite and tests against memory.

pub mod auth;
pub mod email;
pub mod storage;

pub use auth::AuthError;
pub use email::{DryRunSender, EmailError, EmailSender, HttpEmailSender};
pub use storage::{ConsolidateRequest, SavePayload, SaveReport, StorageError, UserData};
