#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU16, AtomicUsize, Ordering};
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use serde_json::{Value, json};
use tokio::net::TcpListener;

use remini::config::{ApiConfig, Config};
use remini::device::DeviceIdentity;
use remini::session::SessionManager;
use remini::token::TokenStore;

pub const ARTIFACT_SIZE: usize = 1024 * 1024;

/// Scripted in-process stand-in for the Remini service and its storage bucket.
pub struct MockState {
    pub addr: SocketAddr,

    /// Tokens the profile endpoint accepts.
    pub valid_tokens: Mutex<HashSet<String>>,
    /// Token handed out by the setup endpoint (`None` = malformed response).
    pub issued_token: Mutex<Option<String>>,
    /// Every token presented to the profile endpoint, in order.
    pub probed_tokens: Mutex<Vec<String>>,

    pub create_response: Mutex<Option<Value>>,
    pub create_status: AtomicU16,
    pub create_bodies: Mutex<Vec<Value>>,

    pub upload_status: AtomicU16,
    pub uploaded: Mutex<Vec<u8>>,
    pub upload_headers: Mutex<Option<HeaderMap>>,

    pub trigger_status: AtomicU16,

    /// Status responses per task id; the last entry repeats forever.
    pub status_script: Mutex<HashMap<String, VecDeque<(u16, Value)>>>,

    pub reprocess_response: Mutex<Value>,
    pub reprocess_bodies: Mutex<Vec<Value>>,

    pub artifact: Vec<u8>,

    pub setup_calls: AtomicUsize,
    pub profile_calls: AtomicUsize,
    pub create_calls: AtomicUsize,
    pub upload_calls: AtomicUsize,
    pub trigger_calls: AtomicUsize,
    pub status_calls: AtomicUsize,
    pub reprocess_calls: AtomicUsize,
    pub download_calls: AtomicUsize,

    /// Endpoint hits in arrival order, e.g. `"create"`, `"status:t-1"`.
    pub events: Mutex<Vec<String>>,
}

impl MockState {
    fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            valid_tokens: Mutex::new(HashSet::new()),
            issued_token: Mutex::new(Some("fresh-token".to_string())),
            probed_tokens: Mutex::new(Vec::new()),
            create_response: Mutex::new(None),
            create_status: AtomicU16::new(200),
            create_bodies: Mutex::new(Vec::new()),
            upload_status: AtomicU16::new(200),
            uploaded: Mutex::new(Vec::new()),
            upload_headers: Mutex::new(None),
            trigger_status: AtomicU16::new(200),
            status_script: Mutex::new(HashMap::new()),
            reprocess_response: Mutex::new(json!({ "task_id": "styled-1" })),
            reprocess_bodies: Mutex::new(Vec::new()),
            artifact: (0..ARTIFACT_SIZE).map(|i| (i % 251) as u8).collect(),
            setup_calls: AtomicUsize::new(0),
            profile_calls: AtomicUsize::new(0),
            create_calls: AtomicUsize::new(0),
            upload_calls: AtomicUsize::new(0),
            trigger_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
            reprocess_calls: AtomicUsize::new(0),
            download_calls: AtomicUsize::new(0),
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn accept_token(&self, token: &str) {
        self.valid_tokens.lock().unwrap().insert(token.to_string());
    }

    pub fn script_status(&self, task_id: &str, steps: Vec<(u16, Value)>) {
        self.status_script
            .lock()
            .unwrap()
            .insert(task_id.to_string(), steps.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    fn log(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }

    fn default_create_response(&self) -> Value {
        json!({
            "task_id": "base-1",
            "upload_url": self.url("/upload/base-1"),
            "upload_headers": {
                "x-goog-custom-time": "2024-01-01T00:00:00Z",
                "content-type": "image/jpeg"
            }
        })
    }
}

/// Status body for a finished task.
pub fn completed(url: &str) -> (u16, Value) {
    (200, json!({ "status": "completed", "result": { "outputs": [{ "url": url }] } }))
}

pub fn completed_without_output() -> (u16, Value) {
    (200, json!({ "status": "completed", "result": { "outputs": [] } }))
}

pub fn processing() -> (u16, Value) {
    (200, json!({ "status": "processing" }))
}

pub fn not_found() -> (u16, Value) {
    (404, json!({ "detail": "not found" }))
}

fn token_of(headers: &HeaderMap) -> Option<String> {
    headers
        .get("identity-token")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn status(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

async fn setup(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    state.setup_calls.fetch_add(1, Ordering::SeqCst);
    state.log("setup");
    assert!(token_of(&headers).is_none(), "setup must be unauthenticated");
    assert!(headers.contains_key("backup-persistent-id"));

    match state.issued_token.lock().unwrap().clone() {
        Some(token) => Json(json!({ "settings": { "__identity__": { "token": token } } })).into_response(),
        None => Json(json!({ "settings": {} })).into_response(),
    }
}

async fn profile(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    state.profile_calls.fetch_add(1, Ordering::SeqCst);
    state.log("profile");
    let token = token_of(&headers).unwrap_or_default();
    state.probed_tokens.lock().unwrap().push(token.clone());

    if state.valid_tokens.lock().unwrap().contains(&token) {
        Json(json!({ "balance": 3 })).into_response()
    } else {
        (StatusCode::UNAUTHORIZED, "invalid identity token").into_response()
    }
}

async fn create_task(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    state.create_calls.fetch_add(1, Ordering::SeqCst);
    state.log("create");
    assert!(token_of(&headers).is_some());

    let parsed: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    state.create_bodies.lock().unwrap().push(parsed);

    let code = state.create_status.load(Ordering::SeqCst);
    if code != 200 {
        return (status(code), "creation refused").into_response();
    }
    let response = state
        .create_response
        .lock()
        .unwrap()
        .clone()
        .unwrap_or_else(|| state.default_create_response());
    Json(response).into_response()
}

async fn upload(
    State(state): State<Arc<MockState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    state.upload_calls.fetch_add(1, Ordering::SeqCst);
    state.log(format!("upload:{id}"));
    *state.uploaded.lock().unwrap() = body.to_vec();
    *state.upload_headers.lock().unwrap() = Some(headers);

    let code = state.upload_status.load(Ordering::SeqCst);
    (status(code), "").into_response()
}

async fn trigger(State(state): State<Arc<MockState>>, Path(id): Path<String>) -> Response {
    state.trigger_calls.fetch_add(1, Ordering::SeqCst);
    state.log(format!("trigger:{id}"));
    let code = state.trigger_status.load(Ordering::SeqCst);
    if code != 200 {
        return (status(code), "task cannot be processed").into_response();
    }
    Json(json!({})).into_response()
}

async fn task_status(State(state): State<Arc<MockState>>, Path(id): Path<String>) -> Response {
    state.status_calls.fetch_add(1, Ordering::SeqCst);
    state.log(format!("status:{id}"));

    let mut scripts = state.status_script.lock().unwrap();
    let step = scripts.get_mut(&id).and_then(|queue| {
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    });
    match step {
        Some((code, body)) => (status(code), Json(body)).into_response(),
        None => (StatusCode::NOT_FOUND, "unknown task").into_response(),
    }
}

async fn reprocess(
    State(state): State<Arc<MockState>>,
    Path(id): Path<String>,
    body: Bytes,
) -> Response {
    state.reprocess_calls.fetch_add(1, Ordering::SeqCst);
    state.log(format!("reprocess:{id}"));
    let parsed: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    state.reprocess_bodies.lock().unwrap().push(parsed);
    Json(state.reprocess_response.lock().unwrap().clone()).into_response()
}

async fn artifact(State(state): State<Arc<MockState>>, Path(name): Path<String>) -> Response {
    state.download_calls.fetch_add(1, Ordering::SeqCst);
    state.log(format!("download:{name}"));
    if name == "missing.jpg" {
        return (StatusCode::NOT_FOUND, "gone").into_response();
    }
    state.artifact.clone().into_response()
}

pub struct MockServer {
    pub state: Arc<MockState>,
    _handle: tokio::task::JoinHandle<()>,
}

impl MockServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(MockState::new(addr));

        let app = Router::new()
            .route("/oracle/setup", get(setup))
            .route("/v1/mobile/users/@me", get(profile))
            .route("/v1/mobile/tasks", post(create_task))
            .route("/v1/mobile/tasks/:id", get(task_status))
            .route("/v1/mobile/tasks/:id/process", post(trigger))
            .route("/v1/mobile/tasks/:id/reprocess", post(reprocess))
            .route("/upload/:id", put(upload))
            .route("/files/:name", get(artifact))
            .with_state(Arc::clone(&state));

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            state,
            _handle: handle,
        }
    }

    pub fn api(&self) -> ApiConfig {
        ApiConfig {
            base_url: self.state.url("/v1/mobile"),
            oracle_url: self.state.url("/oracle"),
        }
    }

    /// Client config pointed at this server, with fast polling.
    pub fn config(&self, token_path: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.api = self.api();
        config.token_path = Some(token_path.to_path_buf());
        config.polling.interval_ms = 10;
        config.polling.max_wait_secs = 10;
        config
    }

    pub fn session(&self, token_path: &std::path::Path) -> Arc<SessionManager> {
        Arc::new(SessionManager::new(
            reqwest::Client::new(),
            self.api(),
            test_identity(),
            TokenStore::new(token_path),
            Duration::from_secs(5),
        ))
    }
}

pub fn test_identity() -> DeviceIdentity {
    DeviceIdentity::new(
        "0123456789abcdef",
        "6f1c2a9e-0000-4000-8000-000000000001",
        "6f1c2a9e-0000-4000-8000-000000000002",
    )
}
