//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → compiled into per-route state at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; routes are never added at runtime
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    CircuitBreakerConfig, GatewayConfig, ListenerConfig, LogFormat, ObservabilityConfig,
    PathRewrite, RateLimitConfig, RouteConfig, SecurityConfig,
};
pub use validation::{validate_config, ValidationError};
