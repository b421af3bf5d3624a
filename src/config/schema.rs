//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Response headers that never leave the gateway unless a route overrides the pattern.
pub const DEFAULT_RESPONSE_HEADER_DENY_PATTERN: &str =
    "Forwarded|X-Forwarded.*|X-Envoy.*|Server|User-Agent|Accept|X-Request-Id|X-Powered-By";

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Route definitions mapping path prefixes to downstream services.
    pub routes: Vec<RouteConfig>,

    /// Rate limiting defaults, applied to routes without an override.
    pub rate_limit: RateLimitConfig,

    /// Circuit breaker defaults, applied to routes without an override.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Request limits.
    pub security: SecurityConfig,
}

impl GatewayConfig {
    /// Effective rate limit settings for a route.
    pub fn rate_limit_for(&self, route: &RouteConfig) -> RateLimitConfig {
        route.rate_limit.clone().unwrap_or_else(|| self.rate_limit.clone())
    }

    /// Effective circuit breaker settings for a route.
    pub fn circuit_breaker_for(&self, route: &RouteConfig) -> CircuitBreakerConfig {
        route
            .circuit_breaker
            .clone()
            .unwrap_or_else(|| self.circuit_breaker.clone())
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// A single gateway route: public path prefix → downstream service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Route identifier for logging, metrics and per-route state.
    pub route_id: String,

    /// Inbound path prefix to match.
    pub path_prefix: String,

    /// Downstream base URL (e.g., "http://customer-service:8080").
    pub downstream_base_url: String,

    /// Connection establishment timeout in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Wait limit for the response head and then between body reads, in milliseconds.
    #[serde(default = "default_socket_timeout_ms")]
    pub socket_timeout_ms: u64,

    /// Optional literal path rewrite applied before forwarding.
    #[serde(default)]
    pub path_rewrite: Option<PathRewrite>,

    /// Extra request headers to drop before forwarding (case-insensitive regex).
    #[serde(default)]
    pub request_header_deny_pattern: Option<String>,

    /// Response headers to drop before returning to the caller (case-insensitive regex).
    #[serde(default = "default_response_header_deny_pattern")]
    pub response_header_deny_pattern: String,

    /// Per-route rate limit override.
    #[serde(default)]
    pub rate_limit: Option<RateLimitConfig>,

    /// Per-route circuit breaker override.
    #[serde(default)]
    pub circuit_breaker: Option<CircuitBreakerConfig>,
}

impl RouteConfig {
    /// Create a route with default timeouts and header rules.
    pub fn new(
        route_id: impl Into<String>,
        path_prefix: impl Into<String>,
        downstream_base_url: impl Into<String>,
    ) -> Self {
        Self {
            route_id: route_id.into(),
            path_prefix: path_prefix.into(),
            downstream_base_url: downstream_base_url.into(),
            connect_timeout_ms: default_connect_timeout_ms(),
            socket_timeout_ms: default_socket_timeout_ms(),
            path_rewrite: None,
            request_header_deny_pattern: None,
            response_header_deny_pattern: default_response_header_deny_pattern(),
            rate_limit: None,
            circuit_breaker: None,
        }
    }

    /// Set the path rewrite rule.
    pub fn with_path_rewrite(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.path_rewrite = Some(PathRewrite {
            from: from.into(),
            to: to.into(),
        });
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn socket_timeout(&self) -> Duration {
        Duration::from_millis(self.socket_timeout_ms)
    }
}

fn default_connect_timeout_ms() -> u64 {
    1000
}

fn default_socket_timeout_ms() -> u64 {
    5000
}

fn default_response_header_deny_pattern() -> String {
    DEFAULT_RESPONSE_HEADER_DENY_PATTERN.to_string()
}

/// Literal substring substitution on the inbound path.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PathRewrite {
    pub from: String,
    pub to: String,
}

impl PathRewrite {
    /// Replace every occurrence of `from` with `to`.
    pub fn apply(&self, path: &str) -> String {
        path.replace(&self.from, &self.to)
    }
}

/// Fixed-window rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Maximum admitted requests per window.
    pub limit: u32,

    /// Window length in milliseconds.
    pub window_ms: u64,
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            limit: 10,
            window_ms: 1000,
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Number of recent calls evaluated before the breaker may open.
    pub volume_threshold: u32,

    /// Failure percentage (1-100) at which the breaker opens.
    pub failure_ratio: u32,

    /// Hard timeout for each guarded call in milliseconds.
    pub timeout_ms: u64,

    /// Time spent open before a probe is allowed, in milliseconds.
    pub reset_timeout_ms: u64,
}

impl CircuitBreakerConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn reset_timeout(&self) -> Duration {
        Duration::from_millis(self.reset_timeout_ms)
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            volume_threshold: 5,
            failure_ratio: 50,
            timeout_ms: 2000,
            reset_timeout_ms: 5000,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` takes precedence.
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Request size limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum inbound body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}
