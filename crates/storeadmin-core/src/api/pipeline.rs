//! Request pipeline: credential attachment, 401 interception and
//! refresh-and-retry.
//!
//! Each call runs through three stages:
//!
//! 1. [`authorize`] - pure transform that attaches the current access token
//! 2. the transport send
//! 3. [`classify`] - pure decision on the response given the call's [`Attempt`]
//!
//! A 401 on the first attempt drives one refresh; the original request is
//! then resent once with the new credential. Anything unrecoverable ends the
//! session through the [`SessionTerminator`] and hands the original 401 back
//! to the caller.

use std::sync::Arc;

use reqwest::header::{self, HeaderValue};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::error::TransportError;
use super::request::{ApiRequest, ApiResponse};
use super::transport::Transport;
use crate::auth::{
    CredentialPair, CredentialStore, RefreshClient, SessionObserver, SessionTerminator,
};

/// Refresh-and-retry rounds allowed per call
const MAX_AUTH_RETRIES: u8 = 1;

/// Per-call attempt counter. Lives with the call, never on shared state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt(u8);

impl Attempt {
    pub fn first() -> Self {
        Attempt(0)
    }

    pub fn retries(self) -> u8 {
        self.0
    }

    pub fn can_retry(self) -> bool {
        self.0 < MAX_AUTH_RETRIES
    }

    pub fn next(self) -> Self {
        Attempt(self.0 + 1)
    }
}

/// Decision taken after a response comes back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Hand the response to the caller unchanged
    Deliver,
    /// 401 on a first attempt: refresh and resend
    Recover,
    /// 401 on a retry: end the session
    Terminate,
}

/// Attach the access token as a bearer credential, or send unauthenticated.
pub fn authorize(request: &ApiRequest, pair: &CredentialPair) -> ApiRequest {
    let mut outgoing = request.clone();
    outgoing.headers.remove(header::AUTHORIZATION);

    if !pair.access_token.is_empty() {
        match HeaderValue::from_str(&format!("Bearer {}", pair.access_token)) {
            Ok(mut value) => {
                value.set_sensitive(true);
                outgoing.headers.insert(header::AUTHORIZATION, value);
            }
            Err(_) => warn!("Access token is not a valid header value, sending unauthenticated"),
        }
    }
    outgoing
}

pub fn classify(response: &ApiResponse, attempt: Attempt) -> Outcome {
    if !response.is_unauthorized() {
        Outcome::Deliver
    } else if attempt.can_retry() {
        Outcome::Recover
    } else {
        Outcome::Terminate
    }
}

enum Recovery {
    Retry,
    GiveUp,
}

pub struct RequestPipeline {
    transport: Arc<dyn Transport>,
    store: Arc<CredentialStore>,
    refresher: RefreshClient,
    terminator: SessionTerminator,
    /// Serialises recovery so concurrent 401s share one refresh
    refresh_lock: Mutex<()>,
}

impl RequestPipeline {
    pub fn new(
        transport: Arc<dyn Transport>,
        store: Arc<CredentialStore>,
        observer: Arc<dyn SessionObserver>,
    ) -> Self {
        Self {
            refresher: RefreshClient::new(Arc::clone(&transport), Arc::clone(&store)),
            terminator: SessionTerminator::new(Arc::clone(&store), observer),
            transport,
            store,
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    /// Run one call through the pipeline.
    ///
    /// Non-401 responses (any status) come back unchanged; only failures to
    /// reach the server at all are errors. An unrecoverable 401 comes back as
    /// the original 401 response after the session has been ended.
    pub async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let mut attempt = Attempt::first();

        loop {
            let snapshot = self.store.snapshot();
            let outgoing = authorize(&request, &snapshot.pair);
            let response = self.transport.send(outgoing).await?;

            match classify(&response, attempt) {
                Outcome::Deliver => return Ok(response),
                Outcome::Recover => {
                    debug!(path = %request.path, "Authorization failed, attempting refresh");
                    match self.recover(snapshot.generation).await {
                        Recovery::Retry => attempt = attempt.next(),
                        Recovery::GiveUp => return Ok(response),
                    }
                }
                Outcome::Terminate => {
                    warn!(
                        path = %request.path,
                        retries = attempt.retries(),
                        "Authorization failed after refresh"
                    );
                    self.terminator.terminate(snapshot.generation);
                    return Ok(response);
                }
            }
        }
    }

    /// Refresh the credentials the failed call was sent with, or reuse the
    /// outcome of a refresh another call completed while this one waited.
    async fn recover(&self, observed_generation: u64) -> Recovery {
        let _guard = self.refresh_lock.lock().await;

        // Another call got here first
        let current = self.store.snapshot();
        if current.generation != observed_generation {
            if current.pair.is_available() {
                debug!("Credentials replaced while waiting, retrying");
                return Recovery::Retry;
            }
            debug!("Session ended while waiting for refresh");
            return Recovery::GiveUp;
        }

        match self.refresher.refresh().await {
            Ok(_) => Recovery::Retry,
            Err(e) => {
                warn!(error = %e, "Token refresh failed");
                self.terminator.terminate(observed_generation);
                Recovery::GiveUp
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{REFRESH_PATH, SESSION_EXPIRED_NOTICE};
    use crate::testing::{
        json, memory_store, network_error, ok, tokens, unauthorized, FakeTransport,
        RecordingObserver,
    };
    use reqwest::StatusCode;

    const PROTECTED: &str = "/users";

    /// Server that accepts only `valid` on protected routes and answers
    /// refreshes with `refresh_reply`
    fn server(
        valid: &'static str,
        refresh_reply: fn() -> Result<ApiResponse, TransportError>,
    ) -> impl Fn(&ApiRequest) -> Result<ApiResponse, TransportError> + Send + Sync + 'static {
        move |req: &ApiRequest| {
            if req.path == REFRESH_PATH {
                return refresh_reply();
            }
            match req.bearer_token() {
                Some(token) if token == valid => ok(serde_json::json!([{"id": 1}])),
                _ => unauthorized(),
            }
        }
    }

    fn pipeline(
        transport: Arc<FakeTransport>,
        store: Arc<CredentialStore>,
    ) -> (RequestPipeline, Arc<RecordingObserver>) {
        let observer = RecordingObserver::new();
        (
            RequestPipeline::new(transport, store, observer.clone()),
            observer,
        )
    }

    #[test]
    fn test_attempt_allows_one_retry() {
        let first = Attempt::first();
        assert!(first.can_retry());
        assert!(!first.next().can_retry());
        assert_eq!(first.next().retries(), 1);
    }

    #[test]
    fn test_classify() {
        let ok = ApiResponse::new(StatusCode::OK, "");
        let denied = ApiResponse::new(StatusCode::UNAUTHORIZED, "");
        let forbidden = ApiResponse::new(StatusCode::FORBIDDEN, "");

        assert_eq!(classify(&ok, Attempt::first()), Outcome::Deliver);
        assert_eq!(classify(&forbidden, Attempt::first()), Outcome::Deliver);
        assert_eq!(classify(&denied, Attempt::first()), Outcome::Recover);
        assert_eq!(classify(&denied, Attempt::first().next()), Outcome::Terminate);
    }

    #[test]
    fn test_authorize_attaches_bearer() {
        let request = ApiRequest::get(PROTECTED);
        let outgoing = authorize(&request, &CredentialPair::new("A1", "R1"));

        assert_eq!(outgoing.bearer_token(), Some("A1"));
        // Original request is left untouched for resending
        assert_eq!(request.bearer_token(), None);
    }

    #[test]
    fn test_authorize_replaces_stale_header() {
        let stale = authorize(&ApiRequest::get(PROTECTED), &CredentialPair::new("OLD", "R"));

        assert_eq!(
            authorize(&stale, &CredentialPair::new("A2", "R2")).bearer_token(),
            Some("A2")
        );
        assert_eq!(authorize(&stale, &CredentialPair::empty()).bearer_token(), None);
    }

    #[tokio::test]
    async fn test_sends_current_access_token() {
        let transport = FakeTransport::new(server("A1", || tokens("X", "Y")));
        let (pipeline, observer) = pipeline(transport.clone(), memory_store("A1", "R1"));

        let response = pipeline.execute(ApiRequest::get(PROTECTED)).await.expect("send");

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(transport.tokens_sent_to(PROTECTED), vec![Some("A1".to_string())]);
        assert_eq!(transport.count(REFRESH_PATH), 0);
        assert!(observer.notices().is_empty());
    }

    #[tokio::test]
    async fn test_sends_unauthenticated_without_session() {
        let transport = FakeTransport::new(|_| ok(serde_json::json!([])));
        let (pipeline, _) = pipeline(transport.clone(), memory_store("", ""));

        pipeline.execute(ApiRequest::get("/products")).await.expect("send");

        assert_eq!(transport.tokens_sent_to("/products"), vec![None]);
    }

    #[tokio::test]
    async fn test_refreshes_and_resends_once() {
        let transport = FakeTransport::new(server("A2", || tokens("A2", "R2")));
        let store = memory_store("A1", "R1");
        let (pipeline, observer) = pipeline(transport.clone(), store.clone());

        let response = pipeline.execute(ApiRequest::get(PROTECTED)).await.expect("send");

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(transport.count(REFRESH_PATH), 1);
        assert_eq!(
            transport.tokens_sent_to(PROTECTED),
            vec![Some("A1".to_string()), Some("A2".to_string())]
        );
        assert_eq!(store.pair(), CredentialPair::new("A2", "R2"));
        assert!(observer.notices().is_empty());
    }

    #[tokio::test]
    async fn test_resend_keeps_method_query_and_body() {
        let transport = FakeTransport::new(server("A2", || tokens("A2", "R2")));
        let (pipeline, _) = pipeline(transport.clone(), memory_store("A1", "R1"));
        let request = ApiRequest::put(PROTECTED)
            .query("limit", 5)
            .json(&serde_json::json!({"name": "Ann"}))
            .expect("body");

        pipeline.execute(request).await.expect("send");

        let sent: Vec<ApiRequest> = transport
            .requests()
            .into_iter()
            .filter(|r| r.path == PROTECTED)
            .collect();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].method, reqwest::Method::PUT);
        assert_eq!(sent[1].query, sent[0].query);
        assert_eq!(sent[1].body, Some(serde_json::json!({"name": "Ann"})));
    }

    #[tokio::test]
    async fn test_rejected_refresh_ends_session() {
        let transport = FakeTransport::new(server("A2", unauthorized));
        let store = memory_store("A1", "R1");
        let (pipeline, observer) = pipeline(transport.clone(), store.clone());

        let response = pipeline.execute(ApiRequest::get(PROTECTED)).await.expect("send");

        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
        assert_eq!(transport.count(PROTECTED), 1);
        assert_eq!(transport.count(REFRESH_PATH), 1);
        assert!(store.pair().is_empty());
        assert!(store.is_session_ended());
        assert_eq!(observer.notices(), vec![SESSION_EXPIRED_NOTICE.to_string()]);
    }

    #[tokio::test]
    async fn test_second_401_ends_session_without_another_refresh() {
        // Refresh succeeds but the server keeps rejecting
        let transport = FakeTransport::new(server("NEVER", || tokens("A2", "R2")));
        let store = memory_store("A1", "R1");
        let (pipeline, observer) = pipeline(transport.clone(), store.clone());

        let response = pipeline.execute(ApiRequest::get(PROTECTED)).await.expect("send");

        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
        assert_eq!(transport.count(REFRESH_PATH), 1);
        assert_eq!(transport.count(PROTECTED), 2);
        assert!(store.pair().is_empty());
        assert_eq!(observer.notices().len(), 1);
    }

    #[tokio::test]
    async fn test_refresh_server_error_ends_session() {
        let transport = FakeTransport::new(server("A2", || {
            json(StatusCode::SERVICE_UNAVAILABLE, serde_json::json!({}))
        }));
        let store = memory_store("A1", "R1");
        let (pipeline, observer) = pipeline(transport.clone(), store.clone());

        let response = pipeline.execute(ApiRequest::get(PROTECTED)).await.expect("send");

        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
        assert_eq!(transport.count(PROTECTED), 1);
        assert!(store.pair().is_empty());
        assert_eq!(observer.notices().len(), 1);
    }

    #[tokio::test]
    async fn test_401_without_session_skips_refresh_and_notice() {
        let transport = FakeTransport::new(server("A1", || tokens("A2", "R2")));
        let store = memory_store("", "");
        let (pipeline, observer) = pipeline(transport.clone(), store.clone());

        let response = pipeline.execute(ApiRequest::get(PROTECTED)).await.expect("send");

        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
        assert_eq!(transport.count(REFRESH_PATH), 0);
        assert_eq!(transport.count(PROTECTED), 1);
        assert!(observer.notices().is_empty());
        assert!(!store.is_session_ended());
    }

    #[tokio::test]
    async fn test_other_statuses_pass_through() {
        for status in [
            StatusCode::FORBIDDEN,
            StatusCode::NOT_FOUND,
            StatusCode::INTERNAL_SERVER_ERROR,
        ] {
            let transport = FakeTransport::new(move |_| json(status, serde_json::json!({})));
            let store = memory_store("A1", "R1");
            let (pipeline, observer) = pipeline(transport.clone(), store.clone());

            let response = pipeline.execute(ApiRequest::get(PROTECTED)).await.expect("send");

            assert_eq!(response.status, status);
            assert_eq!(transport.requests().len(), 1);
            assert_eq!(store.pair(), CredentialPair::new("A1", "R1"));
            assert!(observer.notices().is_empty());
        }
    }

    #[tokio::test]
    async fn test_transport_errors_pass_through() {
        let transport = FakeTransport::new(|_| network_error());
        let store = memory_store("A1", "R1");
        let (pipeline, _) = pipeline(transport, store.clone());

        let err = pipeline.execute(ApiRequest::get(PROTECTED)).await.unwrap_err();

        assert!(matches!(err, TransportError::Request(_)));
        assert!(store.is_available());
    }

    #[tokio::test]
    async fn test_concurrent_401s_share_one_refresh() {
        let transport = FakeTransport::yielding(server("A2", || tokens("A2", "R2")));
        let store = memory_store("A1", "R1");
        let (pipeline, observer) = pipeline(transport.clone(), store.clone());

        let (a, b, c) = tokio::join!(
            pipeline.execute(ApiRequest::get(PROTECTED)),
            pipeline.execute(ApiRequest::get(PROTECTED)),
            pipeline.execute(ApiRequest::get(PROTECTED)),
        );

        for response in [a, b, c] {
            assert_eq!(response.expect("send").status, StatusCode::OK);
        }
        assert_eq!(transport.count(REFRESH_PATH), 1);
        assert_eq!(transport.count(PROTECTED), 6);
        assert_eq!(store.pair(), CredentialPair::new("A2", "R2"));
        assert!(observer.notices().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_failures_notify_once_and_never_retry() {
        let transport = FakeTransport::yielding(server("A2", unauthorized));
        let store = memory_store("A1", "R1");
        let (pipeline, observer) = pipeline(transport.clone(), store.clone());

        let responses = futures::future::join_all(
            (0..4).map(|_| pipeline.execute(ApiRequest::get(PROTECTED))),
        )
        .await;

        for response in responses {
            assert_eq!(response.expect("send").status, StatusCode::UNAUTHORIZED);
        }
        assert_eq!(transport.count(REFRESH_PATH), 1);
        assert_eq!(transport.count(PROTECTED), 4);
        assert!(store.pair().is_empty());
        assert_eq!(observer.notices(), vec![SESSION_EXPIRED_NOTICE.to_string()]);
    }

    #[tokio::test]
    async fn test_call_after_termination_does_not_notify_again() {
        let transport = FakeTransport::new(server("A2", unauthorized));
        let store = memory_store("A1", "R1");
        let (pipeline, observer) = pipeline(transport.clone(), store.clone());

        pipeline.execute(ApiRequest::get(PROTECTED)).await.expect("first");
        pipeline.execute(ApiRequest::get(PROTECTED)).await.expect("second");

        assert_eq!(observer.notices().len(), 1);
        assert_eq!(transport.count(REFRESH_PATH), 1);
    }
}
