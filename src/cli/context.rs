//! Per-invocation command context
//!
//! Resolves configuration, opens the store and works out which user the
//! command acts for.

use miette::{miette, IntoDiagnostic, Result};

use crate::ai::HttpChatClient;
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::config::Config;
use crate::core::identity::EntityId;
use crate::core::state::{AppState, RequestTicket};
use crate::entities::account::Session;
use crate::service::email::{DryRunSender, EmailSender, HttpEmailSender};
use crate::service::storage::{self, SaveReport};
use crate::store::keys::{session_key, validate_user_id, ACTIVE_SESSION_KEY};
use crate::store::{get_json, KvStore, SqliteKv};

pub struct Context {
    pub config: Config,
    pub store: SqliteKv,
    pub format: OutputFormat,
    pub yes: bool,
    user_flag: Option<String>,
}

impl Context {
    /// Load config, apply global flags and open the database
    pub fn open(global: &GlobalOpts) -> Result<Self> {
        let mut config = Config::load();
        if let Some(db) = &global.db {
            config.db = Some(db.clone());
        }
        let path = config.db_path();
        tracing::debug!("Opening database {}", path.display());
        let store = SqliteKv::open(&path)
            .map_err(|e| miette!("Failed to open database {}: {}", path.display(), e))?;

        Ok(Self {
            config,
            store,
            format: global.format,
            yes: global.yes,
            user_flag: global.user.clone(),
        })
    }

    /// Session the CLI is logged in with, if any
    pub fn active_session(&self) -> Result<Option<Session>> {
        let Some(token) = self.store.get(ACTIVE_SESSION_KEY).into_diagnostic()? else {
            return Ok(None);
        };
        get_json(&self.store, &session_key(&token)).into_diagnostic()
    }

    /// The user this command acts for
    ///
    /// `--user` wins, then `BOWLER_USER` / the config file, then the
    /// logged-in session.
    pub fn current_user(&self) -> Result<String> {
        let user = match self.user_flag.clone().or_else(|| self.config.user.clone()) {
            Some(user) => user,
            None => self
                .active_session()?
                .map(|s| s.username)
                .ok_or_else(|| miette!("Not logged in. Run 'bowler auth login' or pass --user"))?,
        };
        validate_user_id(&user).map_err(|e| miette!("{}", e))?;
        Ok(user)
    }

    pub fn load_state(&self) -> Result<AppState> {
        let user = self.current_user()?;
        let data = storage::load(&self.store, &user).into_diagnostic()?;
        Ok(AppState::from_user_data(data))
    }

    pub fn save_state(&self, state: &AppState) -> Result<SaveReport> {
        storage::save(&self.store, &state.to_payload()).into_diagnostic()
    }

    /// Start a generation request and record it as the newest for its key
    pub fn begin_request(&self, state: &mut AppState, key: String, case_id: &EntityId) -> Result<RequestTicket> {
        let ticket = state.begin_request(key, case_id).into_diagnostic()?;
        storage::record_request(&self.store, state.user_id(), &ticket).into_diagnostic()?;
        Ok(ticket)
    }

    /// Reload state to apply a reply, seeing requests started since `ticket`
    pub fn reload_for(&self, ticket: &RequestTicket) -> Result<AppState> {
        let mut state = self.load_state()?;
        let latest = storage::latest_request(&self.store, state.user_id(), ticket.key()).into_diagnostic()?;
        state.observe_request(ticket.key(), latest);
        Ok(state)
    }

    pub fn chat_client(&self) -> Result<HttpChatClient> {
        let chat = &self.config.chat;
        HttpChatClient::new(
            chat.endpoint.clone().unwrap_or_default(),
            self.config.chat_model(),
            chat.api_key.clone(),
        )
        .into_diagnostic()
    }

    pub fn email_sender(&self, dry_run: bool) -> Result<Box<dyn EmailSender>> {
        if dry_run {
            return Ok(Box::new(DryRunSender));
        }
        let email = &self.config.email;
        let sender = HttpEmailSender::new(
            email.endpoint.clone().unwrap_or_default(),
            email.api_key.clone().unwrap_or_default(),
            self.config.email_from(),
        )
        .into_diagnostic()?;
        Ok(Box::new(sender))
    }
}

/// Resolve a bowler reference (short ID, full ID, prefix or name)
pub fn resolve_bowler(state: &AppState, reference: &str) -> Result<EntityId> {
    state
        .resolve(reference)
        .filter(|id| state.bowler(id).is_some())
        .ok_or_else(|| miette!("No bowler found matching '{}'", reference))
}

/// Resolve an A3 case reference (short ID, full ID, prefix or title)
pub fn resolve_a3(state: &AppState, reference: &str) -> Result<EntityId> {
    state
        .resolve(reference)
        .filter(|id| state.a3(id).is_some())
        .ok_or_else(|| miette!("No A3 case found matching '{}'", reference))
}
