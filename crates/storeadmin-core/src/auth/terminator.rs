use std::sync::Arc;

use tracing::{debug, warn};

use super::store::CredentialStore;

/// Notice shown once when a session cannot be recovered
pub const SESSION_EXPIRED_NOTICE: &str = "Your session has expired, please login again.";

/// UI hook invoked when the session is torn down.
pub trait SessionObserver: Send + Sync {
    /// Show `notice` to the user and send the application back to its entry
    /// point (the login screen).
    fn session_expired(&self, notice: &str);
}

/// Observer that only logs; for headless use.
pub struct LogObserver;

impl SessionObserver for LogObserver {
    fn session_expired(&self, notice: &str) {
        warn!(notice, "Session expired");
    }
}

/// Clears the store and notifies the UI when a session cannot be recovered.
pub struct SessionTerminator {
    store: Arc<CredentialStore>,
    observer: Arc<dyn SessionObserver>,
}

impl SessionTerminator {
    pub fn new(store: Arc<CredentialStore>, observer: Arc<dyn SessionObserver>) -> Self {
        Self { store, observer }
    }

    /// End the session the caller observed at `generation`.
    ///
    /// A no-op when the store has moved on since (refreshed, logged in again,
    /// or already terminated by another call), so concurrent failures produce
    /// one notice. Returns whether the session was ended here.
    pub fn terminate(&self, generation: u64) -> bool {
        if !self.store.end_session_if_current(generation) {
            debug!(generation, "Session already replaced or ended, not terminating");
            return false;
        }
        warn!("Session terminated");
        self.observer.session_expired(SESSION_EXPIRED_NOTICE);
        true
    }
}
