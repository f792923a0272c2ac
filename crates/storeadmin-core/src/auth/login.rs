use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use super::error::LoginError;
use super::store::CredentialStore;
use super::tokens::{CredentialPair, TokenResponse};
use crate::api::error::remote_message;
use crate::api::{ApiError, ApiRequest, Transport};

pub const LOGIN_PATH: &str = "/auth/login";

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

/// Starts and ends sessions.
///
/// Login goes straight to the transport so a rejected password never
/// triggers refresh or session termination.
pub struct LoginClient {
    transport: Arc<dyn Transport>,
    store: Arc<CredentialStore>,
}

impl LoginClient {
    pub fn new(transport: Arc<dyn Transport>, store: Arc<CredentialStore>) -> Self {
        Self { transport, store }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<(), LoginError> {
        let request = ApiRequest::post(LOGIN_PATH)
            .json(&LoginRequest { email, password })
            .map_err(|e| LoginError::InvalidResponse(e.to_string()))?;

        let response = self.transport.send(request).await?;

        if response.is_unauthorized() {
            warn!("Login rejected");
            return Err(LoginError::InvalidCredentials);
        }
        if !response.is_success() {
            let message = remote_message(&response.body).unwrap_or_else(|| {
                ApiError::from_status(response.status, &response.body).to_string()
            });
            warn!(status = response.status.as_u16(), "Login failed");
            return Err(LoginError::Rejected(message));
        }

        let tokens: TokenResponse = response
            .json()
            .map_err(|e| LoginError::InvalidResponse(e.to_string()))?;
        let pair = CredentialPair::from(tokens);
        if !pair.is_available() {
            return Err(LoginError::InvalidResponse(
                "login response is missing a token".to_string(),
            ));
        }

        self.store.set_tokens(pair.access_token, pair.refresh_token);
        info!("Login successful");
        Ok(())
    }

    /// Drop the session locally; the API has no logout endpoint.
    pub fn logout(&self) {
        self.store.clear();
        info!("Logged out");
    }
}
