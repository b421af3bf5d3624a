//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to downstream:
//!     → circuit_breaker.rs (admit, or short-circuit to fallback)
//!     → hard call timeout (dropped call = failure)
//!     → outcome recorded; breaker may open
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every downstream call has a deadline
//! - No retries: a failed call is reported to the caller as-is
//! - Circuit breaker prevents cascading failures

pub mod circuit_breaker;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerError, CircuitBreakers, CircuitState};
