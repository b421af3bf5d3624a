//! Downstream forwarding.
//!
//! # Responsibilities
//! - Apply the route's path rewrite
//! - Compose `downstream_base_url + path + ?query`
//! - Enforce connect timeout (connector) and socket timeout (response head,
//!   then every body read)
//! - Classify failures as `DownstreamError`
//! - Stream the response body through unbuffered

use std::collections::HashMap;

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::{Request, Response, Uri, Version};
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tower_http::timeout::TimeoutBody;

use crate::config::{GatewayConfig, RouteConfig};
use crate::error::DownstreamError;

/// Performs the outbound call for a route.
#[async_trait]
pub trait Forwarder: Send + Sync {
    /// Forward an already-sanitized request. Only 2xx responses are `Ok`;
    /// their body is handed back as a stream.
    async fn forward(
        &self,
        route: &RouteConfig,
        request: Request<Bytes>,
    ) -> Result<Response<Body>, DownstreamError>;
}

/// Build the downstream URI for an inbound path and query.
pub fn downstream_uri(route: &RouteConfig, path: &str, query: Option<&str>) -> Result<Uri, DownstreamError> {
    let path = match &route.path_rewrite {
        Some(rewrite) => rewrite.apply(path),
        None => path.to_string(),
    };
    let base = route.downstream_base_url.trim_end_matches('/');
    let target = match query {
        Some(query) => format!("{base}{path}?{query}"),
        None => format!("{base}{path}"),
    };
    target
        .parse::<Uri>()
        .map_err(|e| DownstreamError::InvalidRequest(format!("{target}: {e}")))
}

/// HTTP/1.1 forwarder with one pooled client per route.
pub struct HttpForwarder {
    clients: HashMap<String, Client<HttpConnector, Body>>,
}

impl HttpForwarder {
    pub fn from_config(config: &GatewayConfig) -> Self {
        let clients = config
            .routes
            .iter()
            .map(|route| (route.route_id.clone(), Self::client_for(route)))
            .collect();
        Self { clients }
    }

    fn client_for(route: &RouteConfig) -> Client<HttpConnector, Body> {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(route.connect_timeout()));
        connector.set_nodelay(true);
        Client::builder(TokioExecutor::new()).build(connector)
    }
}

#[async_trait]
impl Forwarder for HttpForwarder {
    async fn forward(
        &self,
        route: &RouteConfig,
        request: Request<Bytes>,
    ) -> Result<Response<Body>, DownstreamError> {
        let client = self.clients.get(&route.route_id).ok_or_else(|| {
            DownstreamError::InvalidRequest(format!("no client for route {}", route.route_id))
        })?;

        let (mut parts, body) = request.into_parts();
        parts.uri = downstream_uri(route, parts.uri.path(), parts.uri.query())?;
        parts.version = Version::HTTP_11;
        let uri = parts.uri.clone();
        let outbound = Request::from_parts(parts, Body::from(body));

        let socket_timeout = route.socket_timeout();
        let response: Response<Incoming> = tokio::time::timeout(socket_timeout, client.request(outbound))
            .await
            .map_err(|_| DownstreamError::Timeout(socket_timeout))?
            .map_err(|e| DownstreamError::Transport(e.to_string()))?;

        tracing::debug!(%uri, status = %response.status(), "Downstream responded");

        if !response.status().is_success() {
            return Err(DownstreamError::Status(response.status()));
        }

        // A stalled body is cut off after `socket_timeout` without a frame.
        let (parts, body) = response.into_parts();
        Ok(Response::from_parts(
            parts,
            Body::new(TimeoutBody::new(socket_timeout, body)),
        ))
    }
}
