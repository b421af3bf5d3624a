//! Distributed tracing support.
//!
//! # Responsibilities
//! - Extract the trace id from an inbound W3C `traceparent` header
//! - Generate span and request identifiers
//! - Propagate all three identifiers to the downstream request
//! - Create the request-scoped span that carries them on every log event
//!
//! # Design Decisions
//! - The context is an explicit per-request value; it only becomes ambient
//!   through the span attached to the request future, which is exited when
//!   that future finishes or is dropped
//! - Random sources are thread-local; generating ids never contends

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use rand::Rng;
use tracing::Span;
use uuid::Uuid;

pub const X_TRACE_ID: HeaderName = HeaderName::from_static("x-trace-id");
pub const X_SPAN_ID: HeaderName = HeaderName::from_static("x-span-id");
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");
pub const TRACEPARENT: HeaderName = HeaderName::from_static("traceparent");

/// Length of a generated request id.
pub const REQUEST_ID_LEN: usize = 42;

const REQUEST_ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Correlation identifiers for one inbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceContext {
    pub trace_id: String,
    pub span_id: String,
    pub request_id: String,
}

impl TraceContext {
    /// Continue the caller's trace when a valid `traceparent` is present,
    /// otherwise start a new one.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let trace_id = headers
            .get(&TRACEPARENT)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_traceparent)
            .unwrap_or_else(generate_trace_id);

        Self {
            trace_id,
            span_id: generate_span_id(),
            request_id: generate_request_id(),
        }
    }

    /// Span that carries the identifiers for the lifetime of the request.
    ///
    /// Error level, so it stays enabled for every event a filter lets through.
    pub fn span(&self, route_id: &str) -> Span {
        tracing::error_span!(
            "gateway_request",
            route = %route_id,
            trace_id = %self.trace_id,
            span_id = %self.span_id,
            request_id = %self.request_id,
        )
    }

    /// Add the propagation headers to an outbound request.
    pub fn inject(&self, headers: &mut HeaderMap) {
        for (name, value) in [
            (X_TRACE_ID, self.trace_id.clone()),
            (X_SPAN_ID, self.span_id.clone()),
            (X_REQUEST_ID, self.request_id.clone()),
            (TRACEPARENT, format!("00-{}-{}-01", self.trace_id, self.span_id)),
        ] {
            // Ids are generated or validated ASCII hex/alphanumerics.
            if let Ok(value) = HeaderValue::from_str(&value) {
                headers.insert(name, value);
            }
        }
    }
}

/// Extract the trace id from `00-<32 hex>-<16 hex>-<2 hex>`.
fn parse_traceparent(value: &str) -> Option<String> {
    let mut parts = value.trim().split('-');
    let version = parts.next()?;
    let trace_id = parts.next()?;
    let parent_id = parts.next()?;
    let flags = parts.next()?;

    let valid = version.len() == 2
        && version != "ff"
        && is_lower_hex(version, 2)
        && is_lower_hex(trace_id, 32)
        && is_lower_hex(parent_id, 16)
        && is_lower_hex(flags, 2)
        && trace_id.bytes().any(|b| b != b'0')
        && parent_id.bytes().any(|b| b != b'0');

    valid.then(|| trace_id.to_string())
}

fn is_lower_hex(value: &str, len: usize) -> bool {
    value.len() == len && value.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

fn generate_trace_id() -> String {
    Uuid::new_v4().simple().to_string()
}

fn generate_span_id() -> String {
    format!("{:016x}", fastrand::u64(1..))
}

/// 42 characters drawn uniformly from `[a-z0-9]`.
pub fn generate_request_id() -> String {
    let mut rng = rand::thread_rng();
    (0..REQUEST_ID_LEN)
        .map(|_| REQUEST_ID_ALPHABET[rng.gen_range(0..REQUEST_ID_ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_request_id_shape() {
        for _ in 0..100 {
            let id = generate_request_id();
            assert_eq!(id.len(), 42);
            assert!(id.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit()));
        }
    }

    #[test]
    fn test_request_ids_are_unique_across_threads() {
        let handles: Vec<_> = (0..4)
            .map(|_| std::thread::spawn(|| (0..250).map(|_| generate_request_id()).collect::<Vec<_>>()))
            .collect();
        let ids: HashSet<String> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_span_enabled_under_strict_filter() {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::ERROR)
            .with_writer(std::io::sink)
            .finish();
        let ctx = TraceContext::from_headers(&HeaderMap::new());
        tracing::subscriber::with_default(subscriber, || {
            assert!(!ctx.span("r").is_disabled());
        });
    }

    #[test]
    fn test_fresh_context() {
        let ctx = TraceContext::from_headers(&HeaderMap::new());
        assert_eq!(ctx.trace_id.len(), 32);
        assert_eq!(ctx.span_id.len(), 16);
        assert!(is_lower_hex(&ctx.trace_id, 32));
        assert!(is_lower_hex(&ctx.span_id, 16));
        assert_ne!(ctx.trace_id, ctx.span_id);
        assert_ne!(ctx.trace_id, ctx.request_id);
        assert_ne!(ctx.span_id, ctx.request_id);
    }

    #[test]
    fn test_continues_inbound_trace() {
        let mut headers = HeaderMap::new();
        headers.insert(
            TRACEPARENT,
            HeaderValue::from_static("00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01"),
        );
        let ctx = TraceContext::from_headers(&headers);
        assert_eq!(ctx.trace_id, "4bf92f3577b34da6a3ce929d0e0e4736");
        assert_ne!(ctx.span_id, "00f067aa0ba902b7");
    }

    #[test]
    fn test_rejects_malformed_traceparent() {
        for value in [
            "garbage",
            "00-00000000000000000000000000000000-00f067aa0ba902b7-01",
            "00-4BF92F3577B34DA6A3CE929D0E0E4736-00f067aa0ba902b7-01",
            "ff-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01",
            "00-4bf92f3577b34da6a3ce929d0e0e4736-0000000000000000-01",
        ] {
            assert_eq!(parse_traceparent(value), None, "{value}");
        }
    }

    #[test]
    fn test_inject_headers() {
        let ctx = TraceContext {
            trace_id: "4bf92f3577b34da6a3ce929d0e0e4736".into(),
            span_id: "00f067aa0ba902b7".into(),
            request_id: "a".repeat(42),
        };
        let mut headers = HeaderMap::new();
        headers.insert(X_REQUEST_ID, HeaderValue::from_static("spoofed"));
        ctx.inject(&mut headers);

        assert_eq!(headers[&X_TRACE_ID], "4bf92f3577b34da6a3ce929d0e0e4736");
        assert_eq!(headers[&X_SPAN_ID], "00f067aa0ba902b7");
        assert_eq!(headers[&X_REQUEST_ID], "a".repeat(42).as_str());
        assert_eq!(
            headers[&TRACEPARENT],
            "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01"
        );
        assert_eq!(headers.get_all(&X_REQUEST_ID).iter().count(), 1);
    }
}
