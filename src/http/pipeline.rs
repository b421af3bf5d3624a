//! Per-request resilience and forwarding pipeline.
//!
//! # Stages
//! ```text
//! Received → TraceInjected → RateCheck → CircuitCheck → Forwarded
//!          → ResponseSanitized → ContextCleared → Sent
//!
//! RateCheck                → 429 too many requests
//! CircuitCheck / Forwarded → 503 service unavailable (breaker open, or this failure opened it)
//!                          → 500 gateway error (anything else)
//! ```
//!
//! The request span is attached to the pipeline future, so the log context
//! is cleared on every exit path, including cancellation.

use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::http::Request;
use axum::response::{IntoResponse, Response};
use tracing::Instrument;

use crate::config::{ConfigError, GatewayConfig};
use crate::error::GatewayError;
use crate::http::forwarder::{Forwarder, HttpForwarder};
use crate::observability::{metrics, TraceContext};
use crate::resilience::{CircuitBreaker, CircuitBreakerError, CircuitBreakers};
use crate::routing::{GatewayRoute, RouteTable};
use crate::security::RateLimiter;

/// Shared gateway state: routes plus per-route limiter and breaker registries.
pub struct Gateway {
    routes: RouteTable,
    limiter: RateLimiter,
    breakers: CircuitBreakers,
    forwarder: Arc<dyn Forwarder>,
    max_body_size: usize,
}

impl Gateway {
    /// Build the gateway with the HTTP forwarder.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, ConfigError> {
        Self::new(config, Arc::new(HttpForwarder::from_config(config)))
    }

    /// Build the gateway with a custom forwarder.
    pub fn new(config: &GatewayConfig, forwarder: Arc<dyn Forwarder>) -> Result<Self, ConfigError> {
        Ok(Self {
            routes: RouteTable::from_config(config)?,
            limiter: RateLimiter::from_config(config),
            breakers: CircuitBreakers::from_config(config),
            forwarder,
            max_body_size: config.security.max_body_size,
        })
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn breaker(&self, route_id: &str) -> Option<&CircuitBreaker> {
        self.breakers.get(route_id)
    }

    /// Handle one inbound request end to end.
    pub async fn handle(&self, request: Request<Body>) -> Response {
        let start = Instant::now();
        let method = request.method().clone();
        let path = request.uri().path().to_string();

        let Some(route) = self.routes.match_path(&path) else {
            tracing::debug!(%method, %path, "No route matched");
            metrics::record_request("none", method.as_str(), 404, start);
            return GatewayError::NoRoute(path).into_response();
        };

        let trace = TraceContext::from_headers(request.headers());
        let span = trace.span(route.id());

        let response = async {
            match self.process(route, &trace, request).await {
                Ok(response) => response,
                Err(err) => {
                    report(&err);
                    err.into_response()
                }
            }
        }
        .instrument(span)
        .await;

        metrics::record_request(route.id(), method.as_str(), response.status().as_u16(), start);
        response
    }

    async fn process(
        &self,
        route: &GatewayRoute,
        trace: &TraceContext,
        request: Request<Body>,
    ) -> Result<Response, GatewayError> {
        let route_id = route.id();
        tracing::debug!(method = %request.method(), uri = %request.uri(), "Received request");

        // 1. Rate check
        if !self.limiter.admit(route_id) {
            return Err(GatewayError::RateLimitExceeded {
                route_id: route_id.to_string(),
            });
        }

        let breaker = self.breakers.get(route_id).ok_or_else(|| {
            GatewayError::Unclassified(format!("no circuit breaker for route {route_id}"))
        })?;

        // 2. Prepare the outbound request
        let (mut parts, body) = request.into_parts();
        let body = axum::body::to_bytes(body, self.max_body_size)
            .await
            .map_err(|e| GatewayError::Unclassified(format!("failed to read request body: {e}")))?;
        route.sanitizer.sanitize_request(&mut parts.headers);
        trace.inject(&mut parts.headers);
        let outbound = Request::from_parts(parts, body);

        // 3. Circuit check + forward
        tracing::debug!(
            downstream = %route.config.downstream_base_url,
            "Forwarding to downstream service"
        );
        let response = breaker
            .call(self.forwarder.forward(&route.config, outbound))
            .await
            .map_err(|err| match err {
                CircuitBreakerError::Rejected => GatewayError::CircuitOpen {
                    route_id: route_id.to_string(),
                },
                CircuitBreakerError::Failed { source, tripped } => GatewayError::Downstream {
                    route_id: route_id.to_string(),
                    source,
                    tripped,
                },
            })?;

        // 4. Sanitize the response; the body streams through untouched
        let (mut parts, body) = response.into_parts();
        route.sanitizer.sanitize_response(&mut parts.headers);
        tracing::debug!(status = %parts.status, "Returning downstream response");

        Ok(Response::from_parts(parts, body))
    }
}

/// Log an error inside the request span and count it.
fn report(err: &GatewayError) {
    match err {
        GatewayError::RateLimitExceeded { route_id } => {
            tracing::info!("Too many requests at {route_id}");
            metrics::record_rate_limited(route_id);
        }
        GatewayError::CircuitOpen { route_id } => {
            tracing::info!("Circuit breaker triggered! Service unavailable.");
            metrics::record_circuit_rejected(route_id);
        }
        GatewayError::Downstream {
            route_id,
            source,
            tripped,
        } => {
            if *tripped {
                tracing::warn!(error = %source, kind = source.kind(), "Circuit breaker triggered! Service unavailable.");
            } else {
                tracing::error!(error = %source, kind = source.kind(), "Gateway error at {route_id}");
            }
            metrics::record_downstream_error(route_id, source.kind());
        }
        GatewayError::NoRoute(path) => tracing::debug!(%path, "No route matched"),
        GatewayError::Unclassified(detail) => tracing::error!(error = %detail, "Gateway error"),
    }
}
