//! Gateway error types and their JSON responses.
//!
//! Every failure the caller can observe maps to one of four bodies:
//! `too many requests` (429), `service unavailable` (503),
//! `gateway error` (500) or `not found` (404). Internal details are only
//! ever logged, never returned.

use std::time::Duration;

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// Failure of a downstream call.
#[derive(Debug, Error)]
pub enum DownstreamError {
    /// The call did not complete within its deadline.
    #[error("downstream timed out after {0:?}")]
    Timeout(Duration),

    /// Connection refused/reset, DNS failure, broken body stream.
    #[error("downstream transport error: {0}")]
    Transport(String),

    /// The downstream answered with a non-2xx status.
    #[error("downstream returned status {0}")]
    Status(StatusCode),

    /// The outbound request could not be composed.
    #[error("invalid downstream request: {0}")]
    InvalidRequest(String),
}

impl DownstreamError {
    /// Whether the circuit breaker counts this as a failed call.
    ///
    /// Only transport and timeout failures are tracked; a non-2xx answer
    /// means the backend is up.
    pub fn is_circuit_trackable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Transport(_))
    }

    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout(_) => "timeout",
            Self::Transport(_) => "transport",
            Self::Status(_) => "status",
            Self::InvalidRequest(_) => "invalid_request",
        }
    }
}

/// Pipeline error type that implements `IntoResponse`.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The route's request count for the current window is exhausted.
    #[error("rate limit exceeded on route {route_id}")]
    RateLimitExceeded { route_id: String },

    /// The breaker is open, or half-open with its probe already in flight.
    #[error("circuit open on route {route_id}")]
    CircuitOpen { route_id: String },

    /// The downstream call failed. `tripped` is set when this very failure
    /// moved the breaker to open.
    #[error("downstream failure on route {route_id}: {source}")]
    Downstream {
        route_id: String,
        #[source]
        source: DownstreamError,
        tripped: bool,
    },

    /// No route matches the inbound path.
    #[error("no route for path {0}")]
    NoRoute(String),

    /// Anything else.
    #[error("unclassified gateway error: {0}")]
    Unclassified(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
}

impl GatewayError {
    /// Get the HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::CircuitOpen { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Downstream { tripped: true, .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Downstream { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NoRoute(_) => StatusCode::NOT_FOUND,
            Self::Unclassified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Public message placed in the JSON body.
    #[must_use]
    pub fn public_message(&self) -> &'static str {
        match self.status_code() {
            StatusCode::TOO_MANY_REQUESTS => "too many requests",
            StatusCode::SERVICE_UNAVAILABLE => "service unavailable",
            StatusCode::NOT_FOUND => "not found",
            _ => "gateway error",
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        error_response(self.status_code(), self.public_message())
    }
}

/// Build a JSON error response carrying only a `Content-Type` header.
pub fn error_response(status: StatusCode, message: &'static str) -> Response {
    let mut response = (status, Json(ErrorBody { error: message })).into_response();
    let headers = response.headers_mut();
    headers.clear();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn downstream(source: DownstreamError, tripped: bool) -> GatewayError {
        GatewayError::Downstream {
            route_id: "r".into(),
            source,
            tripped,
        }
    }

    #[test]
    fn error_status_codes() {
        assert_eq!(
            GatewayError::RateLimitExceeded { route_id: "r".into() }.status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            GatewayError::CircuitOpen { route_id: "r".into() }.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            downstream(DownstreamError::Transport("refused".into()), true).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            downstream(DownstreamError::Timeout(Duration::from_secs(2)), false).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            downstream(DownstreamError::Status(StatusCode::NOT_FOUND), false).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            GatewayError::Unclassified("bug".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn public_messages_hide_details() {
        let err = downstream(DownstreamError::Transport("connection refused at 10.0.0.7".into()), false);
        assert_eq!(err.public_message(), "gateway error");
        assert_eq!(
            GatewayError::RateLimitExceeded { route_id: "r".into() }.public_message(),
            "too many requests"
        );
        assert_eq!(
            GatewayError::CircuitOpen { route_id: "r".into() }.public_message(),
            "service unavailable"
        );
    }

    #[test]
    fn trackable_errors() {
        assert!(DownstreamError::Timeout(Duration::from_millis(1)).is_circuit_trackable());
        assert!(DownstreamError::Transport("reset".into()).is_circuit_trackable());
        assert!(!DownstreamError::Status(StatusCode::BAD_GATEWAY).is_circuit_trackable());
        assert!(!DownstreamError::InvalidRequest("uri".into()).is_circuit_trackable());
    }

    #[tokio::test]
    async fn error_response_has_only_content_type() {
        let response = GatewayError::CircuitOpen { route_id: "r".into() }.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers().len(), 1);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");

        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], br#"{"error":"service unavailable"}"#);
    }
}
