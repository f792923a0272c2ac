use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use super::error::RefreshError;
use super::store::CredentialStore;
use super::tokens::{CredentialPair, TokenResponse};
use crate::api::error::remote_message;
use crate::api::{ApiRequest, Transport};

pub const REFRESH_PATH: &str = "/auth/refresh-token";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// Trades the stored refresh credential for a new pair.
///
/// Talks to the transport directly: a 401 from the refresh endpoint is never
/// itself intercepted and retried.
pub struct RefreshClient {
    transport: Arc<dyn Transport>,
    store: Arc<CredentialStore>,
}

impl RefreshClient {
    pub fn new(transport: Arc<dyn Transport>, store: Arc<CredentialStore>) -> Self {
        Self { transport, store }
    }

    pub async fn refresh(&self) -> Result<CredentialPair, RefreshError> {
        let current = self.store.pair();
        if !current.is_available() {
            debug!("No session to refresh");
            return Err(RefreshError::NoRefreshCredential);
        }

        let request = ApiRequest::post(REFRESH_PATH)
            .json(&RefreshRequest {
                refresh_token: &current.refresh_token,
            })
            .map_err(|e| RefreshError::Transport(e.to_string()))?;

        let response = self.transport.send(request).await?;

        if response.is_unauthorized() {
            return Err(RefreshError::ExpiredRefreshCredential);
        }
        if !response.is_success() {
            let message = remote_message(&response.body)
                .unwrap_or_else(|| format!("status {}", response.status));
            return Err(RefreshError::Transport(message));
        }

        let tokens: TokenResponse = response
            .json()
            .map_err(|e| RefreshError::Transport(format!("invalid refresh response: {}", e)))?;
        let pair = CredentialPair::from(tokens);
        if !pair.is_available() {
            return Err(RefreshError::Transport(
                "refresh response is missing a token".to_string(),
            ));
        }

        self.store
            .set_tokens(pair.access_token.clone(), pair.refresh_token.clone());
        info!("Session refreshed");
        Ok(pair)
    }
}
