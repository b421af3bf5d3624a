//! HTTP API gateway with per-route rate limiting, circuit breaking,
//! trace propagation and header sanitizing.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod routing;
pub mod security;

pub use config::GatewayConfig;
pub use error::{DownstreamError, GatewayError};
pub use http::{Gateway, HttpServer};
pub use lifecycle::Shutdown;
