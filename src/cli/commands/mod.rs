//! CLI command implementations

pub mod a3;
pub mod admin;
pub mod ask;
pub mod auth;
pub mod bowler;
pub mod config;
pub mod dashboard;
pub mod email;
pub mod metric;

use crate::ai::AiError;

/// Turn a flow error into a report, hinting when a re-run may succeed
pub(crate) fn ai_error(e: AiError) -> miette::Report {
    if e.is_retryable() {
        miette::miette!(help = "Re-run the command to try again", "{}", e)
    } else {
        miette::miette!("{}", e)
    }
}
