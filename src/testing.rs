//! Test doubles shared by the unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::scheme::{Registration, Registrations};
use crate::store::RegistrationStore;

pub fn registration(id: &str, channel: &str) -> Registration {
    Registration {
        id: id.to_string(),
        channel: channel.to_string(),
        expiry: None,
        name: None,
    }
}

/// In-memory store that can be told to reject every save.
#[derive(Default)]
pub struct MemoryStore {
    saved: Mutex<Registrations>,
    fail: bool,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn saved(&self) -> Registrations {
        self.saved.lock().unwrap().clone()
    }

    pub fn save_calls(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl RegistrationStore for MemoryStore {
    fn load(&self) -> anyhow::Result<Registrations> {
        Ok(self.saved())
    }

    fn save(&self, registrations: &Registrations) -> anyhow::Result<()> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        anyhow::ensure!(!self.fail, "disk full");
        *self.saved.lock().unwrap() = registrations.clone();
        Ok(())
    }
}

/// A toast POST captured by [`FakeProvider`].
#[derive(Debug, Clone)]
pub struct RecordedPost {
    pub device: String,
    pub authorization: String,
    pub wns_type: String,
    pub content_type: String,
    pub body: String,
}

#[derive(Default)]
struct ProviderState {
    token_requests: AtomicUsize,
    token_forms: Mutex<Vec<String>>,
    posts: Mutex<Vec<RecordedPost>>,
}

/// Local stand-in for the push provider: a token endpoint at `/token`, one
/// that always refuses at `/token-denied`, one granting tokens with an
/// arbitrary lifetime at `/token-lifetime/:secs`, and channel endpoints at
/// `/channel/:device`. The `gone` device answers 410.
pub struct FakeProvider {
    addr: std::net::SocketAddr,
    state: std::sync::Arc<ProviderState>,
}

impl FakeProvider {
    pub async fn start() -> Self {
        use axum::routing::post;

        let state = std::sync::Arc::new(ProviderState::default());
        let app = axum::Router::new()
            .route("/token", post(token))
            .route("/token-denied", post(token_denied))
            .route("/token-lifetime/:secs", post(token_lifetime))
            .route("/channel/:device", post(channel))
            .with_state(state.clone());

        let server = axum::Server::bind(&std::net::SocketAddr::from(([127, 0, 0, 1], 0)))
            .serve(app.into_make_service());
        let addr = server.local_addr();
        tokio::spawn(async move {
            server.await.ok();
        });

        Self { addr, state }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn token_requests(&self) -> usize {
        self.state.token_requests.load(Ordering::SeqCst)
    }

    pub fn last_token_form(&self) -> String {
        self.state
            .token_forms
            .lock()
            .unwrap()
            .last()
            .cloned()
            .unwrap_or_default()
    }

    pub fn posts(&self) -> Vec<RecordedPost> {
        self.state.posts.lock().unwrap().clone()
    }
}

type ProviderRef = axum::extract::State<std::sync::Arc<ProviderState>>;

async fn token(
    axum::extract::State(state): ProviderRef,
    body: String,
) -> axum::Json<serde_json::Value> {
    let n = state.token_requests.fetch_add(1, Ordering::SeqCst) + 1;
    state.token_forms.lock().unwrap().push(body);
    axum::Json(serde_json::json!({
        "access_token": format!("tok-{}", n),
        "token_type": "bearer",
        "expires_in": 86400,
    }))
}

async fn token_lifetime(
    axum::extract::State(state): ProviderRef,
    axum::extract::Path(secs): axum::extract::Path<u64>,
) -> axum::Json<serde_json::Value> {
    let n = state.token_requests.fetch_add(1, Ordering::SeqCst) + 1;
    axum::Json(serde_json::json!({
        "access_token": format!("long-{}", n),
        "token_type": "bearer",
        "expires_in": secs,
    }))
}

async fn token_denied() -> (axum::http::StatusCode, &'static str) {
    (axum::http::StatusCode::BAD_REQUEST, "invalid_client")
}

async fn channel(
    axum::extract::State(state): ProviderRef,
    axum::extract::Path(device): axum::extract::Path<String>,
    headers: axum::http::HeaderMap,
    body: String,
) -> axum::http::StatusCode {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    };

    if device == "gone" {
        return axum::http::StatusCode::GONE;
    }

    state.posts.lock().unwrap().push(RecordedPost {
        device,
        authorization: header("authorization"),
        wns_type: header("x-wns-type"),
        content_type: header("content-type"),
        body,
    });
    axum::http::StatusCode::OK
}
