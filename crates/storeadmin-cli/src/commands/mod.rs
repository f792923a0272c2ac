//! Command implementations.

pub mod auth;
pub mod resources;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use storeadmin_core::auth::SESSION_EXPIRED_NOTICE;
use storeadmin_core::{ApiClient, Config, CredentialStore, SessionObserver};
use tracing::{debug, warn};

use crate::output::{self, OutputFormat};

/// Shows the expiry notice and points the user back at `login`.
pub struct CliObserver {
    format: OutputFormat,
    expired: AtomicBool,
}

impl CliObserver {
    fn new(format: OutputFormat) -> Self {
        Self {
            format,
            expired: AtomicBool::new(false),
        }
    }
}

impl SessionObserver for CliObserver {
    fn session_expired(&self, notice: &str) {
        self.expired.store(true, Ordering::SeqCst);
        output::print_error(notice, self.format);
        if matches!(self.format, OutputFormat::Text) {
            eprintln!("Run `storeadmin login` to start a new session.");
        }
    }
}

/// What `status` reports about the stored session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    LoggedIn,
    Expired,
    LoggedOut,
}

impl SessionState {
    pub fn of(store: &CredentialStore) -> Self {
        if store.is_available() {
            SessionState::LoggedIn
        } else if store.is_session_ended() {
            SessionState::Expired
        } else {
            SessionState::LoggedOut
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SessionState::LoggedIn => "logged in",
            SessionState::Expired => "session expired",
            SessionState::LoggedOut => "not logged in",
        }
    }
}

/// Error for commands that need a session when there is none
pub fn check_session(store: &CredentialStore) -> Result<()> {
    match SessionState::of(store) {
        SessionState::LoggedIn => Ok(()),
        SessionState::Expired => {
            anyhow::bail!("{} Run `storeadmin login`.", SESSION_EXPIRED_NOTICE)
        }
        SessionState::LoggedOut => anyhow::bail!("Not logged in. Run `storeadmin login` first."),
    }
}

/// Everything a command needs: config, API client and output settings.
pub struct Context {
    pub config: Config,
    pub client: ApiClient,
    pub format: OutputFormat,
    observer: Arc<CliObserver>,
}

impl Context {
    pub fn open(format: OutputFormat) -> Result<Self> {
        let mut config = match Config::load() {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "Failed to load config, using defaults");
                Config::default()
            }
        };
        config.apply_env()?;
        debug!(base_url = %config.base_url(), backend = ?config.token_backend, "Config loaded");

        let store = Arc::new(config.open_store()?);
        let observer = Arc::new(CliObserver::new(format));
        let client = ApiClient::new(&config, store, observer.clone())?;

        Ok(Self {
            config,
            client,
            format,
            observer,
        })
    }

    /// Whether this run ended the session
    pub fn session_expired(&self) -> bool {
        self.observer.expired.load(Ordering::SeqCst)
    }

    /// Fail early with a helpful message when there is no session
    pub fn require_session(&self) -> Result<()> {
        check_session(self.client.store())
    }
}
