use std::fmt;

use serde::{Deserialize, Serialize};

/// Access/refresh credential pair. Both empty means "no session".
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl CredentialPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// True iff both tokens are non-empty
    pub fn is_available(&self) -> bool {
        !self.access_token.is_empty() && !self.refresh_token.is_empty()
    }

    /// True iff neither token is set
    pub fn is_empty(&self) -> bool {
        self.access_token.is_empty() && self.refresh_token.is_empty()
    }
}

// Tokens never end up in logs.
impl fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPair")
            .field("access_token", &redact(&self.access_token))
            .field("refresh_token", &redact(&self.refresh_token))
            .finish()
    }
}

fn redact(token: &str) -> &'static str {
    if token.is_empty() {
        "<empty>"
    } else {
        "<redacted>"
    }
}

/// Token pair as returned by the login and refresh endpoints.
#[derive(Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
}

impl From<TokenResponse> for CredentialPair {
    fn from(response: TokenResponse) -> Self {
        Self::new(response.access_token, response.refresh_token)
    }
}

/// A consistent read of the store: the pair plus the mutation counter it was read at.
#[derive(Debug, Clone)]
pub struct TokenSnapshot {
    pub pair: CredentialPair,
    pub generation: u64,
}
