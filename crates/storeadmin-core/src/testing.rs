//! Scripted transport and observer used by unit tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::api::{ApiRequest, ApiResponse, Transport, TransportError};
use crate::auth::{CredentialStore, MemoryPersistence, SessionObserver};

pub type Reply = Result<ApiResponse, TransportError>;

type Responder = dyn Fn(&ApiRequest) -> Reply + Send + Sync;

/// Answers every request with a closure and records what was sent.
pub struct FakeTransport {
    responder: Box<Responder>,
    sent: Mutex<Vec<ApiRequest>>,
    yield_on_send: bool,
}

impl FakeTransport {
    pub fn new(responder: impl Fn(&ApiRequest) -> Reply + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            responder: Box::new(responder),
            sent: Mutex::new(Vec::new()),
            yield_on_send: false,
        })
    }

    /// Like `new`, but every send yields to the runtime first so concurrent
    /// calls interleave at each network hop
    pub fn yielding(responder: impl Fn(&ApiRequest) -> Reply + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            responder: Box::new(responder),
            sent: Mutex::new(Vec::new()),
            yield_on_send: true,
        })
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.sent.lock().unwrap().clone()
    }

    pub fn count(&self, path: &str) -> usize {
        self.requests().iter().filter(|r| r.path == path).count()
    }

    /// Bearer tokens sent to `path`, in order
    pub fn tokens_sent_to(&self, path: &str) -> Vec<Option<String>> {
        self.requests()
            .iter()
            .filter(|r| r.path == path)
            .map(|r| r.bearer_token().map(str::to_string))
            .collect()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        if self.yield_on_send {
            tokio::task::yield_now().await;
        }
        let result = (self.responder)(&request);
        self.sent.lock().unwrap().push(request);
        result
    }
}

pub fn json(status: StatusCode, value: serde_json::Value) -> Reply {
    Ok(ApiResponse::new(status, value.to_string()))
}

pub fn ok(value: serde_json::Value) -> Reply {
    json(StatusCode::OK, value)
}

pub fn unauthorized() -> Reply {
    json(
        StatusCode::UNAUTHORIZED,
        serde_json::json!({"message": "Unauthorized", "statusCode": 401}),
    )
}

pub fn tokens(access: &str, refresh: &str) -> Reply {
    json(
        StatusCode::CREATED,
        serde_json::json!({"access_token": access, "refresh_token": refresh}),
    )
}

/// A client-side failure that never reaches the network
pub fn network_error() -> Reply {
    let err = reqwest::Client::new()
        .get("not a url")
        .build()
        .expect_err("relative URL is rejected");
    Err(TransportError::Request(err))
}

pub fn memory_store(access: &str, refresh: &str) -> Arc<CredentialStore> {
    let store = CredentialStore::open(Box::new(MemoryPersistence::new()));
    if !access.is_empty() || !refresh.is_empty() {
        store.set_tokens(access, refresh);
    }
    Arc::new(store)
}

/// Counts session-expired notices.
#[derive(Default)]
pub struct RecordingObserver {
    notices: Mutex<Vec<String>>,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn notices(&self) -> Vec<String> {
        self.notices.lock().unwrap().clone()
    }
}

impl SessionObserver for RecordingObserver {
    fn session_expired(&self, notice: &str) {
        self.notices.lock().unwrap().push(notice.to_string());
    }
}
