//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use api_gateway::config::{GatewayConfig, RouteConfig};
use api_gateway::{HttpServer, Shutdown};
use axum::{
    body::Body,
    http::{HeaderMap, Method, Request},
    response::Response,
    Router,
};
use parking_lot::Mutex;
use tokio::net::TcpListener;

/// A request as the mock backend saw it.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub uri: String,
    pub headers: HeaderMap,
}

/// Handle to a running mock backend.
#[derive(Clone)]
pub struct MockBackend {
    pub addr: SocketAddr,
    calls: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl MockBackend {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last(&self) -> Option<Recorded> {
        self.requests.lock().last().cloned()
    }
}

/// Start a programmable mock backend on an ephemeral port.
pub async fn start_backend<F>(respond: F) -> MockBackend
where
    F: Fn(&Recorded) -> Response + Send + Sync + 'static,
{
    start_delayed_backend(Duration::ZERO, respond).await
}

/// Like `start_backend`, but every answer is held back for `delay`.
pub async fn start_delayed_backend<F>(delay: Duration, respond: F) -> MockBackend
where
    F: Fn(&Recorded) -> Response + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let backend = MockBackend {
        addr: listener.local_addr().unwrap(),
        calls: Arc::new(AtomicUsize::new(0)),
        requests: Arc::new(Mutex::new(Vec::new())),
    };

    let respond = Arc::new(respond);
    let state = backend.clone();
    let app = Router::new().fallback(move |request: Request<Body>| {
        let respond = respond.clone();
        let state = state.clone();
        async move {
            let recorded = Recorded {
                method: request.method().clone(),
                uri: request.uri().to_string(),
                headers: request.headers().clone(),
            };
            state.calls.fetch_add(1, Ordering::SeqCst);
            state.requests.lock().push(recorded.clone());
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            respond(&recorded)
        }
    });

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    backend
}

/// An address nothing listens on.
pub fn dead_address() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

/// A running gateway plus the means to stop it.
pub struct TestGateway {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub client: reqwest::Client,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestGateway {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Start the gateway on an ephemeral port.
pub async fn start_gateway(config: GatewayConfig) -> TestGateway {
    let server = HttpServer::new(config).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    let client = reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap();

    TestGateway {
        addr,
        shutdown,
        client,
    }
}

/// Single-route config pointing at `downstream`.
pub fn single_route(route_id: &str, prefix: &str, downstream: String) -> GatewayConfig {
    GatewayConfig {
        routes: vec![RouteConfig::new(route_id, prefix, downstream)],
        ..GatewayConfig::default()
    }
}
