//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, catch-all route, panic recovery)
//!     → pipeline.rs (route match, rate limit, breaker, tracing, sanitizing)
//!     → forwarder.rs (path rewrite, timeouts, downstream call)
//!     → pipeline.rs (response sanitizing)
//!     → Send to client
//! ```

pub mod forwarder;
pub mod pipeline;
pub mod server;

pub use forwarder::{Forwarder, HttpForwarder};
pub use pipeline::Gateway;
pub use server::HttpServer;
