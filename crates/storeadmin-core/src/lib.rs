//! Core library for storeadmin: an authenticated client for the demo store
//! API that keeps its session alive by refreshing tokens on demand.

pub mod api;
pub mod auth;
pub mod config;
pub mod models;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{ApiClient, ApiError};
pub use auth::{CredentialStore, LoginError, SessionObserver};
pub use config::{Config, TokenBackend};
