//! In-process fake engine for integration tests.
//!
//! Serves a small subset of the engine API over a Unix socket in a temp
//! directory, with HTTP upgrades enabled for attach. Every request is
//! recorded so tests can assert on the exact wire form.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Path, Query, Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use bytes::Bytes;
use dockwire::Docker;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper_util::rt::TokioIo;
use percent_encoding::percent_decode_str;
use serde::Deserialize;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixListener;
use tokio::sync::{Notify, RwLock};
use tokio::task::JoinHandle;
use tower::Service;

pub const MULTIPLEXED: &str = "application/vnd.docker.multiplexed-stream";

// ============================================================================
// Mock State
// ============================================================================

/// One request as the engine saw it.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
}

impl Recorded {
    /// Decoded query pairs.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.query
            .as_deref()
            .map(url_decode_pairs)
            .unwrap_or_default()
    }

    pub fn query_value(&self, key: &str) -> Option<String> {
        self.query_pairs()
            .into_iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }
}

#[derive(Debug, Clone)]
pub struct MockContainer {
    pub image: String,
    pub cmd: Vec<String>,
    pub tty: bool,
    pub running: bool,
    pub stopped: bool,
    pub body: Value,
}

impl MockContainer {
    /// Containers whose command starts with `sleep` only exit when stopped.
    fn long_running(&self) -> bool {
        self.cmd.first().is_some_and(|c| c == "sleep")
    }
}

#[derive(Debug, Clone)]
pub struct MockService {
    pub version: u64,
    pub spec: Value,
}

#[derive(Debug, Default)]
pub struct MockState {
    pub requests: Vec<Recorded>,
    pub containers: HashMap<String, MockContainer>,
    pub services: HashMap<String, MockService>,
    next_container_id: u64,
}

#[derive(Clone, Default)]
pub struct Shared {
    pub state: Arc<RwLock<MockState>>,
    stopped: Arc<Notify>,
}

// ============================================================================
// Mock API Handlers
// ============================================================================

async fn record(State(shared): State<Shared>, request: Request, next: Next) -> Response {
    let recorded = Recorded {
        method: request.method().to_string(),
        path: request.uri().path().to_string(),
        query: request.uri().query().map(str::to_string),
    };
    shared.state.write().await.requests.push(recorded);
    next.run(request).await
}

fn not_found(what: &str, id: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "message": format!("No such {what}: {id}") })),
    )
        .into_response()
}

async fn ping() -> &'static str {
    "OK"
}

async fn list_containers(State(shared): State<Shared>) -> Json<Value> {
    let state = shared.state.read().await;
    let list: Vec<Value> = state
        .containers
        .iter()
        .map(|(id, c)| json!({ "Id": id, "Image": c.image, "State": if c.running { "running" } else { "created" } }))
        .collect();
    Json(Value::Array(list))
}

#[derive(Debug, Deserialize)]
struct CreateContainerQuery {
    name: Option<String>,
}

async fn create_container(
    State(shared): State<Shared>,
    Query(query): Query<CreateContainerQuery>,
    Json(body): Json<Value>,
) -> Response {
    let mut state = shared.state.write().await;
    state.next_container_id += 1;
    let id = query
        .name
        .unwrap_or_else(|| format!("{:012x}", state.next_container_id));

    let cmd = body["Cmd"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|c| c.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();
    let container = MockContainer {
        image: body["Image"].as_str().unwrap_or_default().to_string(),
        cmd,
        tty: body["Tty"].as_bool().unwrap_or(false),
        running: false,
        stopped: false,
        body,
    };
    state.containers.insert(id.clone(), container);

    (StatusCode::CREATED, Json(json!({ "Id": id, "Warnings": [] }))).into_response()
}

async fn inspect_container(State(shared): State<Shared>, Path(id): Path<String>) -> Response {
    let state = shared.state.read().await;
    match state.containers.get(&id) {
        Some(c) => Json(json!({
            "Id": id,
            "Config": { "Image": c.image, "Tty": c.tty },
            "State": { "Running": c.running },
        }))
        .into_response(),
        None => not_found("container", &id),
    }
}

async fn start_container(State(shared): State<Shared>, Path(id): Path<String>) -> Response {
    let mut state = shared.state.write().await;
    match state.containers.get_mut(&id) {
        Some(c) if c.running => StatusCode::NOT_MODIFIED.into_response(),
        Some(c) => {
            c.running = true;
            StatusCode::NO_CONTENT.into_response()
        }
        None => not_found("container", &id),
    }
}

async fn stop_container(State(shared): State<Shared>, Path(id): Path<String>) -> Response {
    let response = {
        let mut state = shared.state.write().await;
        match state.containers.get_mut(&id) {
            Some(c) if !c.running => StatusCode::NOT_MODIFIED.into_response(),
            Some(c) => {
                c.running = false;
                c.stopped = true;
                StatusCode::NO_CONTENT.into_response()
            }
            None => not_found("container", &id),
        }
    };
    shared.stopped.notify_waiters();
    response
}

async fn wait_container(State(shared): State<Shared>, Path(id): Path<String>) -> Response {
    loop {
        let notified = shared.stopped.notified();
        {
            let state = shared.state.read().await;
            let Some(container) = state.containers.get(&id) else {
                return not_found("container", &id);
            };
            if container.stopped {
                return Json(json!({ "StatusCode": 137 })).into_response();
            }
            if !container.long_running() {
                return Json(json!({ "StatusCode": 0 })).into_response();
            }
        }
        notified.await;
    }
}

async fn remove_container(State(shared): State<Shared>, Path(id): Path<String>) -> Response {
    let mut state = shared.state.write().await;
    match state.containers.get(&id) {
        Some(c) if c.running => (
            StatusCode::CONFLICT,
            Json(json!({ "message": "cannot remove a running container" })),
        )
            .into_response(),
        Some(_) => {
            state.containers.remove(&id);
            StatusCode::NO_CONTENT.into_response()
        }
        None => not_found("container", &id),
    }
}

/// Builds one stdout/stderr frame.
pub fn frame(stream: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = vec![stream, 0, 0, 0];
    out.extend_from_slice(&u32::try_from(payload.len()).unwrap_or(u32::MAX).to_be_bytes());
    out.extend_from_slice(payload);
    out
}

async fn container_logs(State(shared): State<Shared>, Path(id): Path<String>) -> Response {
    let tty = match shared.state.read().await.containers.get(&id) {
        Some(c) => c.tty,
        None => return not_found("container", &id),
    };
    if tty {
        return Response::builder()
            .header(header::CONTENT_TYPE, "application/vnd.docker.raw-stream")
            .body(Body::from("hello\r\n"))
            .unwrap();
    }

    // Split mid-header to exercise reassembly.
    let mut body = frame(1, b"hello\n");
    body.extend(frame(2, b"oops\n"));
    let (first, second) = body.split_at(3);
    let chunks = vec![
        Ok::<_, std::io::Error>(Bytes::copy_from_slice(first)),
        Ok(Bytes::copy_from_slice(second)),
    ];
    Response::builder()
        .header(header::CONTENT_TYPE, MULTIPLEXED)
        .body(Body::from_stream(futures::stream::iter(chunks)))
        .unwrap()
}

/// Echoes stdin back as stdout frames until the client closes its side.
///
/// A plain (non-upgrade) attach streams the command line on stdout and
/// `exited` on stderr, then ends as if the container exited.
async fn attach_container(
    State(shared): State<Shared>,
    Path(id): Path<String>,
    mut request: Request,
) -> Response {
    let Some(container) = shared.state.read().await.containers.get(&id).cloned() else {
        return not_found("container", &id);
    };

    if !request.headers().contains_key(header::UPGRADE) {
        let mut body = frame(1, format!("{}\n", container.cmd.join(" ")).as_bytes());
        body.extend(frame(2, b"exited\n"));
        return Response::builder()
            .header(header::CONTENT_TYPE, MULTIPLEXED)
            .body(Body::from(body))
            .unwrap();
    }

    let on_upgrade = hyper::upgrade::on(&mut request);
    tokio::spawn(async move {
        let Ok(upgraded) = on_upgrade.await else {
            return;
        };
        let mut io = TokioIo::new(upgraded);
        let mut buf = [0u8; 1024];
        loop {
            match io.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if io.write_all(&frame(1, &buf[..n])).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    Response::builder()
        .status(StatusCode::SWITCHING_PROTOCOLS)
        .header(header::CONNECTION, "Upgrade")
        .header(header::UPGRADE, "tcp")
        .header(header::CONTENT_TYPE, MULTIPLEXED)
        .body(Body::empty())
        .unwrap()
}

async fn resize_container(State(shared): State<Shared>, Path(id): Path<String>) -> Response {
    if shared.state.read().await.containers.contains_key(&id) {
        StatusCode::OK.into_response()
    } else {
        not_found("container", &id)
    }
}

#[derive(Debug, Deserialize)]
struct EventsQuery {
    until: Option<String>,
}

fn event(action: &str, id: &str, time: i64) -> String {
    format!(
        "{}\n",
        json!({
            "Type": "container",
            "Action": action,
            "Actor": { "ID": id, "Attributes": { "image": "alpine" } },
            "scope": "local",
            "time": time,
            "timeNano": time * 1_000_000_000 + 5,
        })
    )
}

/// Two events, split across chunks. Without `until` the stream stays open.
async fn events(Query(query): Query<EventsQuery>) -> Response {
    let mut text = event("create", "c1", 1_700_000_000);
    text.push_str(&event("start", "c1", 1_700_000_001));
    let (first, second) = text.split_at(text.len() / 2 + 3);
    let chunks = futures::stream::iter(vec![
        Ok::<_, std::io::Error>(Bytes::from(first.to_string())),
        Ok(Bytes::from(second.to_string())),
    ]);

    let body = if query.until.is_some() {
        Body::from_stream(chunks)
    } else {
        use futures::StreamExt;
        Body::from_stream(chunks.chain(futures::stream::pending()))
    };
    Response::builder()
        .header(header::CONTENT_TYPE, "application/json")
        .body(body)
        .unwrap()
}

#[derive(Debug, Deserialize)]
struct CreateImageQuery {
    #[serde(rename = "fromImage")]
    from_image: Option<String>,
    tag: Option<String>,
}

async fn create_image(Query(query): Query<CreateImageQuery>) -> Response {
    let image = query.from_image.unwrap_or_default();
    let tag = query.tag.unwrap_or_else(|| "latest".to_string());
    let mut lines = vec![
        json!({ "status": format!("Pulling from library/{image}"), "id": tag }),
        json!({ "status": "Downloading", "id": "a1b2", "progressDetail": { "current": 512, "total": 1024 } }),
    ];
    if image == "missing" {
        lines.push(json!({
            "error": "manifest unknown",
            "errorDetail": { "message": "manifest unknown" }
        }));
    } else {
        lines.push(json!({ "status": format!("Status: Downloaded newer image for {image}:{tag}") }));
    }
    let body: String = lines.iter().map(|l| format!("{l}\r\n")).collect();
    Response::builder()
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap()
}

async fn inspect_service(State(shared): State<Shared>, Path(id): Path<String>) -> Response {
    let state = shared.state.read().await;
    match state.services.get(&id) {
        Some(s) => Json(json!({
            "ID": id,
            "Version": { "Index": s.version },
            "Spec": s.spec,
            "CreatedAt": "2024-01-01T00:00:00Z",
        }))
        .into_response(),
        None => not_found("service", &id),
    }
}

#[derive(Debug, Deserialize)]
struct UpdateQuery {
    version: u64,
}

async fn update_service(
    State(shared): State<Shared>,
    Path(id): Path<String>,
    Query(query): Query<UpdateQuery>,
    Json(spec): Json<Value>,
) -> Response {
    let mut state = shared.state.write().await;
    let Some(service) = state.services.get_mut(&id) else {
        return not_found("service", &id);
    };
    if service.version != query.version {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "message": "rpc error: code = Unknown desc = update out of sequence"
            })),
        )
            .into_response();
    }
    service.version += 1;
    service.spec = spec;
    Json(json!({ "Warnings": [] })).into_response()
}

async fn remove_service(State(shared): State<Shared>, Path(id): Path<String>) -> Response {
    if shared.state.write().await.services.remove(&id).is_some() {
        StatusCode::OK.into_response()
    } else {
        not_found("service", &id)
    }
}

// ============================================================================
// Mock Server Setup
// ============================================================================

fn create_mock_router(shared: Shared) -> Router {
    Router::new()
        .route("/v1.43/_ping", get(ping))
        .route("/v1.43/containers/json", get(list_containers))
        .route("/v1.43/containers/create", post(create_container))
        .route("/v1.43/containers/:id/json", get(inspect_container))
        .route("/v1.43/containers/:id/start", post(start_container))
        .route("/v1.43/containers/:id/stop", post(stop_container))
        .route("/v1.43/containers/:id/wait", post(wait_container))
        .route("/v1.43/containers/:id/logs", get(container_logs))
        .route("/v1.43/containers/:id/attach", post(attach_container))
        .route("/v1.43/containers/:id/resize", post(resize_container))
        .route("/v1.43/containers/:id", delete(remove_container))
        .route("/v1.43/events", get(events))
        .route("/v1.43/images/create", post(create_image))
        .route("/v1.43/services/:id", get(inspect_service).delete(remove_service))
        .route("/v1.43/services/:id/update", post(update_service))
        .layer(middleware::from_fn_with_state(shared.clone(), record))
        .with_state(shared)
}

/// A running fake engine. Stops when dropped.
pub struct FakeEngine {
    _dir: TempDir,
    pub socket_path: PathBuf,
    pub shared: Shared,
    task: JoinHandle<()>,
}

impl FakeEngine {
    pub async fn start() -> Self {
        let dir = TempDir::new().expect("temp dir");
        let socket_path = dir.path().join("engine.sock");
        let shared = Shared::default();
        shared.state.write().await.services.insert(
            "web".to_string(),
            MockService {
                version: 4,
                spec: json!({ "Name": "web", "Mode": { "Replicated": { "Replicas": 1 } } }),
            },
        );

        let app = create_mock_router(shared.clone());
        let listener = UnixListener::bind(&socket_path).expect("bind engine socket");

        let task = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let tower_service = app.clone();
                tokio::spawn(async move {
                    let hyper_service =
                        hyper::service::service_fn(move |request: hyper::Request<Incoming>| {
                            tower_service.clone().call(request)
                        });
                    let _ = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), hyper_service)
                        .with_upgrades()
                        .await;
                });
            }
        });

        Self {
            _dir: dir,
            socket_path,
            shared,
            task,
        }
    }

    pub fn docker(&self) -> Docker {
        Docker::unix(&self.socket_path).expect("docker client")
    }

    pub async fn requests(&self) -> Vec<Recorded> {
        self.shared.state.read().await.requests.clone()
    }

    /// Requests to paths ending with `suffix`.
    pub async fn requests_to(&self, suffix: &str) -> Vec<Recorded> {
        self.requests()
            .await
            .into_iter()
            .filter(|r| r.path.ends_with(suffix))
            .collect()
    }

    pub async fn service(&self, id: &str) -> Option<MockService> {
        self.shared.state.read().await.services.get(id).cloned()
    }

    pub async fn container(&self, id: &str) -> Option<MockContainer> {
        self.shared.state.read().await.containers.get(id).cloned()
    }
}

impl Drop for FakeEngine {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Guards a future that should complete quickly.
pub async fn within<F: std::future::Future>(future: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(5), future)
        .await
        .expect("timed out")
}

fn url_decode_pairs(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|p| !p.is_empty())
        .map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            (decode(k), decode(v))
        })
        .collect()
}

fn decode(text: &str) -> String {
    percent_decode_str(&text.replace('+', " "))
        .decode_utf8_lossy()
        .into_owned()
}
