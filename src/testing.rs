//! In-process HTTP stub server for tests.
//!
//! Replies are registered per `METHOD path` and served in order; the last
//! reply registered for a route repeats. Unregistered routes answer 404.
//! Every request is recorded with its auth headers and body.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::IntoResponse;
use axum::Router;
use reqwest::Client;
use serde_json::Value;

use crate::api::{Credentials, ZentaoClient};
use crate::notify::FeishuNotifier;

/// An HTTP client for talking to stubs that ignores any system proxy.
pub fn http_client() -> Client {
    Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

/// A request received by the stub.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: String,
    pub path: String,
    pub token: Option<String>,
    pub cookie: Option<String>,
    pub body: String,
}

#[derive(Default)]
struct StubInner {
    replies: HashMap<String, VecDeque<(u16, Value)>>,
    calls: Vec<RecordedCall>,
}

type SharedInner = Arc<Mutex<StubInner>>;

/// A running stub server bound to an ephemeral localhost port.
pub struct StubServer {
    base_url: String,
    inner: SharedInner,
}

impl StubServer {
    /// Bind to `127.0.0.1:0` and serve in a background task.
    pub async fn start() -> Self {
        let inner = SharedInner::default();
        let app = Router::new().fallback(handle).with_state(inner.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self {
            base_url: format!("http://{}", addr),
            inner,
        }
    }

    /// Credentials for `admin`/`secret` on this stub.
    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.base_url, "admin", "secret", "")
    }

    /// A ZenTao client pointed at this stub.
    pub fn zentao_client(&self, credentials: Credentials) -> ZentaoClient {
        ZentaoClient::with_http_client(credentials, http_client())
    }

    /// A notifier posting to `/hook` on this stub.
    pub fn notifier(&self) -> FeishuNotifier {
        FeishuNotifier::with_http_client(&format!("{}/hook", self.base_url), http_client())
    }

    /// Queue a JSON reply for `method path`.
    pub fn on(&self, method: &str, path: &str, status: u16, body: Value) {
        self.inner
            .lock()
            .unwrap()
            .replies
            .entry(format!("{} {}", method, path))
            .or_default()
            .push_back((status, body));
    }

    /// All recorded calls, oldest first.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.inner.lock().unwrap().calls.clone()
    }

    /// Recorded calls as `METHOD path` strings.
    pub fn requests(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .map(|call| format!("{} {}", call.method, call.path))
            .collect()
    }
}

async fn handle(
    State(inner): State<SharedInner>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> impl IntoResponse {
    let header_text = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };

    let mut inner = inner.lock().unwrap();
    inner.calls.push(RecordedCall {
        method: method.to_string(),
        path: uri.path().to_string(),
        token: header_text("token"),
        cookie: header_text("cookie"),
        body,
    });

    let key = format!("{} {}", method, uri.path());
    let reply = inner.replies.get_mut(&key).and_then(|queue| {
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    });
    let (status, body) = reply.unwrap_or((404, Value::String("not found".to_string())));

    (
        StatusCode::from_u16(status).unwrap(),
        [(header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
}
