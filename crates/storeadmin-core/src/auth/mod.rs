//! Session management for the store API.
//!
//! This module provides:
//! - `CredentialStore`: the shared access/refresh pair, persisted on every change
//! - `RefreshClient`: trades a refresh token for a new pair
//! - `LoginClient`: login and logout
//! - `SessionTerminator`: tears the session down when it cannot be recovered

pub mod error;
pub mod login;
pub mod persistence;
pub mod refresh;
pub mod store;
pub mod terminator;
pub mod tokens;

pub use error::{LoginError, RefreshError};
pub use login::{LoginClient, LOGIN_PATH};
pub use persistence::{
    FilePersistence, KeyringPersistence, MemoryPersistence, PersistedSession, TokenPersistence,
    STORE_KEY,
};
pub use refresh::{RefreshClient, REFRESH_PATH};
pub use store::CredentialStore;
pub use terminator::{LogObserver, SessionObserver, SessionTerminator, SESSION_EXPIRED_NOTICE};
pub use tokens::{CredentialPair, TokenSnapshot};
