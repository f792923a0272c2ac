use thiserror::Error;

use crate::api::TransportError;

/// Why a refresh exchange did not produce a new credential pair.
#[derive(Error, Debug)]
pub enum RefreshError {
    /// The store has no session to refresh; no request was sent
    #[error("no refresh token")]
    NoRefreshCredential,

    /// The refresh endpoint rejected the refresh credential
    #[error("expired refresh token")]
    ExpiredRefreshCredential,

    /// Anything else that went wrong talking to the refresh endpoint
    #[error("refresh failed: {0}")]
    Transport(String),
}

impl From<TransportError> for RefreshError {
    fn from(e: TransportError) -> Self {
        RefreshError::Transport(e.to_string())
    }
}

/// Login failures, with messages suitable for showing to the user.
#[derive(Error, Debug)]
pub enum LoginError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Remote-provided message
    #[error("{0}")]
    Rejected(String),

    #[error(transparent)]
    Network(#[from] TransportError),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}
