//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → rate_limit.rs (per-route fixed window)
//!     → headers.rs (drop internal/hop-by-hop/denied headers)
//!     → forwarded downstream
//! Downstream response:
//!     → headers.rs (drop denied response headers)
//! ```
//!
//! # Design Decisions
//! - Fail closed: unknown routes are never admitted
//! - Rejections are immediate, nothing is queued

pub mod headers;
pub mod rate_limit;

pub use headers::HeaderSanitizer;
pub use rate_limit::RateLimiter;
