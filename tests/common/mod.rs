//! Shared helpers for integration tests.
//!
//! Local HTTP responders run as axum routers on their own tokio runtime, so
//! the relay, warehouse, secret store and trigger paths can be exercised
//! without any external service. Every request that reaches a responder is
//! recorded and handed back to the test thread.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri},
    Router,
};
use tokio::runtime::Runtime;

use warehouse_relay::config::RelayConfig;
use warehouse_relay::server::{create_router, AppState};

/// A request as seen by the responder.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: String,
    /// Path plus query string
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[derive(Clone)]
struct Script {
    responses: Arc<Mutex<VecDeque<(u16, &'static str)>>>,
    captured: Arc<Mutex<Sender<CapturedRequest>>>,
}

/// Record the request, then answer with the next scripted response.
///
/// Requests beyond the script get a 500 so a stray call fails loudly.
async fn record(
    State(script): State<Script>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, &'static str) {
    let request = CapturedRequest {
        method: method.as_str().to_string(),
        path: uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| uri.path().to_string()),
        headers: headers
            .iter()
            .map(|(k, v)| (k.as_str().to_string(), v.to_str().unwrap_or_default().to_string()))
            .collect(),
        body: body.to_vec(),
    };
    let _ = script.captured.lock().unwrap().send(request);

    let next = script.responses.lock().unwrap().pop_front();
    match next {
        Some((status, body)) => (
            StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            body,
        ),
        None => (StatusCode::INTERNAL_SERVER_ERROR, "unexpected request"),
    }
}

/// Serve `router` on 127.0.0.1 from a dedicated runtime.
///
/// Returns `http://127.0.0.1:<port>` and the runtime; dropping the runtime
/// stops the server.
fn serve(router: Router) -> (String, Runtime) {
    let runtime = Runtime::new().expect("test runtime");
    let listener = runtime
        .block_on(tokio::net::TcpListener::bind("127.0.0.1:0"))
        .expect("bind responder");
    let base = format!("http://{}", listener.local_addr().expect("local addr"));

    runtime.spawn(async move {
        let _ = axum::serve(listener, router).await;
    });

    (base, runtime)
}

/// Answers a fixed sequence of requests in order.
pub struct ScriptedServer {
    /// `http://127.0.0.1:<port>`
    pub base: String,
    /// `base` plus `/upload`
    pub url: String,
    expected: usize,
    requests: Receiver<CapturedRequest>,
    _runtime: Runtime,
}

impl ScriptedServer {
    pub fn start(responses: Vec<(u16, &'static str)>) -> Self {
        let expected = responses.len();
        let (tx, requests) = mpsc::channel();
        let script = Script {
            responses: Arc::new(Mutex::new(responses.into())),
            captured: Arc::new(Mutex::new(tx)),
        };

        let (base, runtime) = serve(Router::new().fallback(record).with_state(script));
        let url = format!("{}/upload", base);

        Self {
            base,
            url,
            expected,
            requests,
            _runtime: runtime,
        }
    }

    /// Wait for every scripted request, in arrival order.
    pub fn requests(self) -> Vec<CapturedRequest> {
        (0..self.expected)
            .map(|_| {
                self.requests
                    .recv_timeout(Duration::from_secs(10))
                    .expect("responder received too few requests")
            })
            .collect()
    }

    /// True if any request arrived so far.
    pub fn was_contacted(&self) -> bool {
        self.requests.try_recv().is_ok()
    }
}

/// Answers exactly one request with a fixed status and body.
pub struct OneShotServer {
    pub base: String,
    pub url: String,
    inner: ScriptedServer,
}

impl OneShotServer {
    pub fn start(status: u16, body: &'static str) -> Self {
        let inner = ScriptedServer::start(vec![(status, body)]);
        Self {
            base: inner.base.clone(),
            url: inner.url.clone(),
            inner,
        }
    }

    /// Wait for the captured request.
    pub fn request(self) -> CapturedRequest {
        self.inner
            .requests()
            .pop()
            .expect("responder received no request")
    }
}

/// A responder with an empty script, for "no network call" checks.
pub struct SilentListener {
    pub url: String,
    inner: ScriptedServer,
}

impl SilentListener {
    pub fn bind() -> Self {
        let inner = ScriptedServer::start(Vec::new());
        Self {
            url: inner.url.clone(),
            inner,
        }
    }

    pub fn was_contacted(&self) -> bool {
        self.inner.was_contacted()
    }
}

/// The crate's own router, served for end-to-end tests.
pub struct AppServer {
    pub base: String,
    _runtime: Runtime,
}

impl AppServer {
    pub fn start(config: RelayConfig, service_account_key: Option<String>) -> Self {
        let router = create_router(AppState {
            config: Arc::new(config),
            service_account_key,
        });
        let (base, runtime) = serve(router);
        Self {
            base,
            _runtime: runtime,
        }
    }
}
