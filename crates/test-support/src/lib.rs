//! Shared helpers for collab-mcp tests.
//!
//! - [`MockUpstream`]: an in-process scripted REST backend that records every request it sees,
//!   so tests can assert on call counts and ordering.
//! - process helpers for tests that spawn the `collab-mcp` binary.

use anyhow::Context as _;
use axum::Router;
use axum::body::Bytes;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse as _, Response};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::net::TcpListener;
use std::process::Child;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub struct KillOnDrop(pub Child);

impl Drop for KillOnDrop {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

/// Pick an unused TCP port on localhost.
///
/// Note: this does not reserve the port; it's still possible for another process to bind it
/// before you do.
///
/// # Errors
///
/// Returns an error if binding an ephemeral localhost port fails or if the bound socket's
/// local address cannot be read.
pub fn pick_unused_port() -> anyhow::Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0").context("bind ephemeral port")?;
    Ok(listener.local_addr()?.port())
}

/// Poll an HTTP URL until it returns a success status (2xx/3xx).
///
/// # Errors
///
/// Returns an error if the timeout elapses before the endpoint returns a success status.
pub async fn wait_http_ok(url: &str, timeout_dur: Duration) -> anyhow::Result<()> {
    let client = reqwest::Client::new();
    let start = Instant::now();
    loop {
        if start.elapsed() > timeout_dur {
            anyhow::bail!("timed out waiting for {url}");
        }

        match client.get(url).send().await {
            Ok(resp) if resp.status().is_success() => return Ok(()),
            _ => tokio::time::sleep(Duration::from_millis(200)).await,
        }
    }
}

/// One request observed by a [`MockUpstream`].
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: String,
    /// Raw request path, still percent-encoded.
    pub path: String,
    pub query: String,
    pub headers: HashMap<String, String>,
    /// Parsed JSON body (`None` for empty or non-JSON bodies).
    pub body: Option<Value>,
}

impl RecordedCall {
    /// `"METHOD /path"`, convenient for ordering assertions.
    #[must_use]
    pub fn line(&self) -> String {
        format!("{} {}", self.method, self.path)
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Decoded query pairs in request order.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        url::form_urlencoded::parse(self.query.as_bytes())
            .into_owned()
            .collect()
    }

    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<String> {
        self.query_pairs()
            .into_iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }
}

/// A scripted response.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: u16,
    pub body: MockBody,
}

#[derive(Debug, Clone)]
pub enum MockBody {
    Json(Value),
    Text(String),
    Empty,
}

impl MockResponse {
    #[must_use]
    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            body: MockBody::Json(body),
        }
    }

    #[must_use]
    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: MockBody::Text(body.into()),
        }
    }

    #[must_use]
    pub fn empty(status: u16) -> Self {
        Self {
            status,
            body: MockBody::Empty,
        }
    }

    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        match self.body {
            MockBody::Json(v) => (status, axum::Json(v)).into_response(),
            MockBody::Text(s) => (status, s).into_response(),
            MockBody::Empty => status.into_response(),
        }
    }
}

type Responder = Arc<dyn Fn(&RecordedCall) -> MockResponse + Send + Sync>;

#[derive(Default)]
struct MockState {
    calls: Mutex<Vec<RecordedCall>>,
    /// `(METHOD, path)` -> queued responders. The last one is sticky.
    routes: Mutex<HashMap<(String, String), VecDeque<Responder>>>,
}

impl MockState {
    fn next_response(&self, call: &RecordedCall) -> MockResponse {
        let responder = {
            let mut routes = self.routes.lock();
            let key = (call.method.clone(), call.path.clone());
            routes.get_mut(&key).and_then(|queue| {
                if queue.len() > 1 {
                    queue.pop_front()
                } else {
                    queue.front().cloned()
                }
            })
        };

        match responder {
            Some(r) => r(call),
            None => MockResponse::json(
                404,
                json!({ "message": format!("no mock route for {}", call.line()) }),
            ),
        }
    }
}

/// In-process scripted REST backend.
///
/// Responses are registered per exact `(method, path)`; the query string is ignored for
/// matching. Registering several responses for the same route queues them: each request
/// consumes one, and the last registered response keeps answering once the queue is drained.
/// Unmatched requests get a JSON 404.
pub struct MockUpstream {
    base_url: String,
    state: Arc<MockState>,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl MockUpstream {
    /// Bind to an ephemeral localhost port and start serving.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound.
    pub async fn start() -> anyhow::Result<Self> {
        let state = Arc::new(MockState::default());
        let handler_state = state.clone();
        let app = Router::new().fallback(move |method: Method, uri: Uri, headers: HeaderMap, body: Bytes| {
            let state = handler_state.clone();
            async move {
                let call = RecordedCall {
                    method: method.as_str().to_string(),
                    path: uri.path().to_string(),
                    query: uri.query().unwrap_or_default().to_string(),
                    headers: headers
                        .iter()
                        .filter_map(|(k, v)| {
                            v.to_str()
                                .ok()
                                .map(|v| (k.as_str().to_ascii_lowercase(), v.to_string()))
                        })
                        .collect(),
                    body: serde_json::from_slice(&body).ok(),
                };
                let response = state.next_response(&call);
                state.calls.lock().push(call);
                response.into_response()
            }
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .context("bind mock upstream")?;
        let addr = listener.local_addr().context("mock upstream local_addr")?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            let _ = shutdown_rx.await;
        });
        let handle = tokio::spawn(async move {
            let _ = server.await;
        });

        Ok(Self {
            base_url: format!("http://{addr}"),
            state,
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Queue a fixed response for `method path`.
    pub fn on(&self, method: &str, path: &str, response: MockResponse) {
        self.on_fn(method, path, move |_| response.clone());
    }

    /// Queue a computed response for `method path` (e.g. echoing the request body).
    pub fn on_fn(
        &self,
        method: &str,
        path: &str,
        responder: impl Fn(&RecordedCall) -> MockResponse + Send + Sync + 'static,
    ) {
        self.state
            .routes
            .lock()
            .entry((method.to_ascii_uppercase(), path.to_string()))
            .or_default()
            .push_back(Arc::new(responder));
    }

    /// Everything received so far, in arrival order.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.calls.lock().clone()
    }

    #[must_use]
    pub fn call_count(&self) -> usize {
        self.state.calls.lock().len()
    }

    /// `"METHOD /path"` for every call, in arrival order.
    #[must_use]
    pub fn call_lines(&self) -> Vec<String> {
        self.state.calls.lock().iter().map(RecordedCall::line).collect()
    }

    /// Stop serving and wait for the server task to exit.
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for MockUpstream {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}
