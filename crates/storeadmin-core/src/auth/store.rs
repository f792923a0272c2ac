use std::sync::RwLock;

use tracing::{debug, warn};

use super::persistence::{PersistedSession, TokenPersistence};
use super::tokens::{CredentialPair, TokenSnapshot};

struct StoreState {
    pair: CredentialPair,
    session_ended: bool,
    generation: u64,
}

/// Holds the current credential pair, shared by every in-flight call.
///
/// All mutations replace the whole pair under one write lock and persist the
/// full record, so readers see either the old pair or the new one.
pub struct CredentialStore {
    state: RwLock<StoreState>,
    persistence: Box<dyn TokenPersistence>,
}

impl CredentialStore {
    /// Open a store, rehydrating whatever the backend has saved.
    pub fn open(persistence: Box<dyn TokenPersistence>) -> Self {
        let (pair, session_ended) = match persistence.load() {
            Ok(Some(record)) => {
                debug!(session_ended = record.session_ended, "Session rehydrated");
                (record.pair(), record.session_ended)
            }
            Ok(None) => (CredentialPair::empty(), false),
            Err(e) => {
                warn!(error = %e, "Failed to load stored session, starting empty");
                (CredentialPair::empty(), false)
            }
        };

        Self {
            state: RwLock::new(StoreState {
                pair,
                session_ended,
                generation: 0,
            }),
            persistence,
        }
    }

    pub fn access_token(&self) -> String {
        self.read(|s| s.pair.access_token.clone())
    }

    pub fn refresh_token(&self) -> String {
        self.read(|s| s.pair.refresh_token.clone())
    }

    /// Both tokens present; recomputed on every call
    pub fn is_available(&self) -> bool {
        self.read(|s| s.pair.is_available())
    }

    /// Set when the last session was torn down after a failed refresh
    pub fn is_session_ended(&self) -> bool {
        self.read(|s| s.session_ended)
    }

    pub fn pair(&self) -> CredentialPair {
        self.read(|s| s.pair.clone())
    }

    pub fn snapshot(&self) -> TokenSnapshot {
        self.read(|s| TokenSnapshot {
            pair: s.pair.clone(),
            generation: s.generation,
        })
    }

    pub fn generation(&self) -> u64 {
        self.read(|s| s.generation)
    }

    /// Atomically replace both tokens.
    pub fn set_tokens(&self, access_token: impl Into<String>, refresh_token: impl Into<String>) {
        let pair = CredentialPair::new(access_token, refresh_token);
        let mut state = self.write();
        self.replace(&mut state, pair, false);
    }

    pub fn clear(&self) {
        self.set_tokens("", "");
    }

    /// Clear the pair and flag the session as ended, but only if nothing
    /// changed the store since `generation` and it still holds a credential.
    /// Returns whether this call ended the session.
    pub fn end_session_if_current(&self, generation: u64) -> bool {
        let mut state = self.write();
        if state.generation != generation || state.pair.is_empty() {
            return false;
        }
        self.replace(&mut state, CredentialPair::empty(), true);
        true
    }

    pub fn backend(&self) -> String {
        self.persistence.describe()
    }

    fn replace(&self, state: &mut StoreState, pair: CredentialPair, session_ended: bool) {
        // Persist under the write lock so the saved order matches the in-memory order.
        // The backend call blocks this thread and every reader until it returns;
        // move it to spawn_blocking before sharing one store across many busy tasks.
        let record = PersistedSession::new(&pair, session_ended);
        if let Err(e) = self.persistence.save(&record) {
            warn!(error = %e, "Failed to persist session");
        }
        state.pair = pair;
        state.session_ended = session_ended;
        state.generation += 1;
        debug!(
            generation = state.generation,
            available = state.pair.is_available(),
            "Credential store updated"
        );
    }

    fn read<T>(&self, f: impl FnOnce(&StoreState) -> T) -> T {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        f(&state)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }
}
