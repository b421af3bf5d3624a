//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Every request:
//!     → tracing.rs (trace/span/request ids, request-scoped span)
//!     → logging.rs (structured events carry the span's ids)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout, pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//!     → Downstream services (X-Trace-Id, X-Span-Id, X-Request-Id, traceparent)
//! ```

pub mod logging;
pub mod metrics;
pub mod tracing;

pub use self::tracing::TraceContext;
