//! HTTP server setup.
//!
//! # Responsibilities
//! - Create the Axum router with a catch-all handler
//! - Wire up middleware (tracing, panic recovery)
//! - Bind the gateway pipeline to a listener
//! - Stop accepting on shutdown and drain in-flight requests

use std::any::Any;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::Response,
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};

use crate::config::{validate_config, ConfigError, GatewayConfig};
use crate::error::error_response;
use crate::http::forwarder::Forwarder;
use crate::http::pipeline::Gateway;

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Validate the configuration and build a server that forwards over HTTP.
    pub fn new(config: GatewayConfig) -> Result<Self, ConfigError> {
        validate_config(&config).map_err(ConfigError::Validation)?;
        let gateway = Gateway::from_config(&config)?;
        Ok(Self::from_gateway(gateway))
    }

    /// Build a server around a custom forwarder.
    pub fn with_forwarder(
        config: GatewayConfig,
        forwarder: Arc<dyn Forwarder>,
    ) -> Result<Self, ConfigError> {
        validate_config(&config).map_err(ConfigError::Validation)?;
        let gateway = Gateway::new(&config, forwarder)?;
        Ok(Self::from_gateway(gateway))
    }

    fn from_gateway(gateway: Gateway) -> Self {
        let gateway = Arc::new(gateway);
        tracing::info!(routes = gateway.routes().len(), "Gateway routes compiled");
        Self {
            router: Self::build_router(gateway),
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(gateway: Arc<Gateway>) -> Router {
        Router::new()
            .route("/{*path}", any(gateway_handler))
            .route("/", any(gateway_handler))
            .with_state(gateway)
            .layer(CatchPanicLayer::custom(handle_panic))
            .layer(TraceLayer::new_for_http())
    }

    /// The router, for driving the server without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until the shutdown signal fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining requests");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn gateway_handler(State(gateway): State<Arc<Gateway>>, request: Request<Body>) -> Response {
    gateway.handle(request).await
}

fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = %detail, "Request handler panicked");
    error_response(StatusCode::INTERNAL_SERVER_ERROR, "gateway error")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RouteConfig;
    use crate::error::DownstreamError;
    use async_trait::async_trait;
    use axum::body::Bytes;
    use axum::http::header;
    use tower::ServiceExt;

    struct Echo;

    #[async_trait]
    impl Forwarder for Echo {
        async fn forward(
            &self,
            _route: &RouteConfig,
            request: Request<Bytes>,
        ) -> Result<Response, DownstreamError> {
            Ok(Response::new(Body::from(request.into_body())))
        }
    }

    struct Panicking;

    #[async_trait]
    impl Forwarder for Panicking {
        async fn forward(
            &self,
            _route: &RouteConfig,
            _request: Request<Bytes>,
        ) -> Result<Response, DownstreamError> {
            panic!("forwarder blew up")
        }
    }

    fn config() -> GatewayConfig {
        GatewayConfig {
            routes: vec![RouteConfig::new("echo", "/echo", "http://localhost:9")],
            ..GatewayConfig::default()
        }
    }

    #[tokio::test]
    async fn test_router_dispatches_to_pipeline() {
        let server = HttpServer::with_forwarder(config(), Arc::new(Echo)).unwrap();
        let request = Request::builder()
            .method("POST")
            .uri("/echo/1")
            .body(Body::from("ping"))
            .unwrap();

        let response = server.router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"ping");
    }

    #[tokio::test]
    async fn test_root_path_without_route_is_not_found() {
        let server = HttpServer::with_forwarder(config(), Arc::new(Echo)).unwrap();
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = server.router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_panic_becomes_gateway_error() {
        let server = HttpServer::with_forwarder(config(), Arc::new(Panicking)).unwrap();
        let request = Request::builder().uri("/echo").body(Body::empty()).unwrap();

        let response = server.router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], br#"{"error":"gateway error"}"#);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = config();
        config.routes.push(RouteConfig::new("echo", "/other", "http://localhost:9"));
        assert!(matches!(
            HttpServer::new(config),
            Err(ConfigError::Validation(_))
        ));
    }
}
