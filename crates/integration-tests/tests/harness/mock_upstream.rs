//! Mock upstream server for integration tests
//!
//! Records every request and answers with whatever the test's responder
//! returns, so one server can impersonate any native protocol.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use futures_util::{StreamExt, stream};
use tokio_util::sync::CancellationToken;
use url::Url;

/// Canned answer for one request
pub enum Reply {
    /// JSON body with a status code
    Json(StatusCode, serde_json::Value),
    /// Complete SSE body made of pre-rendered frames
    Sse(Vec<String>),
    /// SSE frames, then a connection that never closes
    SseThenHang(Vec<String>),
}

impl Reply {
    /// 200 with a JSON body
    pub fn ok(value: serde_json::Value) -> Self {
        Self::Json(StatusCode::OK, value)
    }
}

/// Render an unnamed SSE frame
pub fn data(value: &serde_json::Value) -> String {
    format!("data: {value}\n\n")
}

/// Render a named SSE frame
pub fn event(name: &str, value: &serde_json::Value) -> String {
    format!("event: {name}\ndata: {value}\n\n")
}

/// A request as the mock received it
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: serde_json::Value,
}

impl Recorded {
    /// Header value as a string, if present
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

type Responder = dyn Fn(&Recorded) -> Reply + Send + Sync;

struct MockState {
    responder: Box<Responder>,
    requests: Mutex<Vec<Recorded>>,
}

/// Scripted upstream bound to a random local port
pub struct MockUpstream {
    addr: SocketAddr,
    shutdown: CancellationToken,
    state: Arc<MockState>,
}

impl MockUpstream {
    /// Start the mock server, returning immediately
    pub async fn start<F>(responder: F) -> anyhow::Result<Self>
    where
        F: Fn(&Recorded) -> Reply + Send + Sync + 'static,
    {
        let state = Arc::new(MockState {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
        });

        let app = Router::new().fallback(handle).with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_clone.cancelled().await;
                })
                .await
                .ok();
        });

        Ok(Self { addr, shutdown, state })
    }

    /// URL of `path` on the mock, for use as a provider base URL
    pub fn url(&self, path: &str) -> Url {
        Url::parse(&format!("http://{}{path}", self.addr)).unwrap()
    }

    /// Every request received so far, in arrival order
    pub fn requests(&self) -> Vec<Recorded> {
        self.state.requests.lock().unwrap().clone()
    }

    /// The most recent request
    pub fn last_request(&self) -> Recorded {
        self.requests().pop().expect("no request received")
    }
}

impl Drop for MockUpstream {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn handle(
    State(state): State<Arc<MockState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let recorded = Recorded {
        method,
        path: uri.path().to_owned(),
        query: uri.query().map(str::to_owned),
        headers,
        body: serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null),
    };

    let reply = (state.responder)(&recorded);
    state.requests.lock().unwrap().push(recorded);

    match reply {
        Reply::Json(status, value) => (status, Json(value)).into_response(),
        Reply::Sse(frames) => ([(header::CONTENT_TYPE, "text/event-stream")], frames.concat()).into_response(),
        Reply::SseThenHang(frames) => {
            let frames = stream::iter(frames.into_iter().map(|f| Ok::<_, Infallible>(Bytes::from(f))));
            let body = Body::from_stream(frames.chain(stream::pending()));
            ([(header::CONTENT_TYPE, "text/event-stream")], body).into_response()
        }
    }
}
