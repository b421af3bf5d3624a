//! Configuration validation.
//!
//! Serde handles syntax; this module checks semantics. Every problem is
//! reported, not just the first one.

use std::collections::HashSet;

use regex::RegexBuilder;
use thiserror::Error;
use url::Url;

use crate::config::schema::{CircuitBreakerConfig, GatewayConfig, RateLimitConfig};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("route #{index} has an empty route_id")]
    EmptyRouteId { index: usize },

    #[error("duplicate route_id `{0}`")]
    DuplicateRouteId(String),

    #[error("route `{route}`: path_prefix `{prefix}` must start with '/'")]
    InvalidPathPrefix { route: String, prefix: String },

    #[error("path_prefix `{0}` is used by more than one route")]
    DuplicatePathPrefix(String),

    #[error("route `{route}`: invalid downstream_base_url `{url}`: {reason}")]
    InvalidDownstreamUrl {
        route: String,
        url: String,
        reason: String,
    },

    #[error("route `{route}`: invalid {field}: {reason}")]
    InvalidPattern {
        route: String,
        field: &'static str,
        reason: String,
    },

    #[error("route `{route}`: path_rewrite.from must not be empty")]
    EmptyRewrite { route: String },

    #[error("{scope}: {field} must be greater than zero")]
    Zero { scope: String, field: &'static str },

    #[error("{scope}: failure_ratio must be within 1..=100, got {value}")]
    FailureRatio { scope: String, value: u32 },

    #[error("listener bind_address `{0}` is not a socket address")]
    BindAddress(String),
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config
        .listener
        .bind_address
        .parse::<std::net::SocketAddr>()
        .is_err()
    {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    check_rate_limit("rate_limit", &config.rate_limit, &mut errors);
    check_circuit_breaker("circuit_breaker", &config.circuit_breaker, &mut errors);

    let mut ids = HashSet::new();
    let mut prefixes = HashSet::new();

    for (index, route) in config.routes.iter().enumerate() {
        let name = route.route_id.clone();
        if name.is_empty() {
            errors.push(ValidationError::EmptyRouteId { index });
        } else if !ids.insert(name.clone()) {
            errors.push(ValidationError::DuplicateRouteId(name.clone()));
        }

        if !route.path_prefix.starts_with('/') {
            errors.push(ValidationError::InvalidPathPrefix {
                route: name.clone(),
                prefix: route.path_prefix.clone(),
            });
        } else if !prefixes.insert(route.path_prefix.trim_end_matches('/').to_string()) {
            errors.push(ValidationError::DuplicatePathPrefix(route.path_prefix.clone()));
        }

        match Url::parse(&route.downstream_base_url) {
            Ok(url) if url.scheme() != "http" => {
                errors.push(ValidationError::InvalidDownstreamUrl {
                    route: name.clone(),
                    url: route.downstream_base_url.clone(),
                    reason: format!("unsupported scheme `{}`", url.scheme()),
                });
            }
            Ok(url) if url.host().is_none() => {
                errors.push(ValidationError::InvalidDownstreamUrl {
                    route: name.clone(),
                    url: route.downstream_base_url.clone(),
                    reason: "missing host".to_string(),
                });
            }
            Ok(_) => {}
            Err(e) => errors.push(ValidationError::InvalidDownstreamUrl {
                route: name.clone(),
                url: route.downstream_base_url.clone(),
                reason: e.to_string(),
            }),
        }

        if let Some(pattern) = &route.request_header_deny_pattern {
            check_pattern(&name, "request_header_deny_pattern", pattern, &mut errors);
        }
        check_pattern(
            &name,
            "response_header_deny_pattern",
            &route.response_header_deny_pattern,
            &mut errors,
        );

        if route.path_rewrite.as_ref().is_some_and(|r| r.from.is_empty()) {
            errors.push(ValidationError::EmptyRewrite { route: name.clone() });
        }

        let scope = format!("route `{name}`");
        if route.connect_timeout_ms == 0 {
            errors.push(ValidationError::Zero {
                scope: scope.clone(),
                field: "connect_timeout_ms",
            });
        }
        if route.socket_timeout_ms == 0 {
            errors.push(ValidationError::Zero {
                scope: scope.clone(),
                field: "socket_timeout_ms",
            });
        }
        if let Some(rate_limit) = &route.rate_limit {
            check_rate_limit(&scope, rate_limit, &mut errors);
        }
        if let Some(breaker) = &route.circuit_breaker {
            check_circuit_breaker(&scope, breaker, &mut errors);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_pattern(route: &str, field: &'static str, pattern: &str, errors: &mut Vec<ValidationError>) {
    if let Err(e) = RegexBuilder::new(pattern).case_insensitive(true).build() {
        errors.push(ValidationError::InvalidPattern {
            route: route.to_string(),
            field,
            reason: e.to_string(),
        });
    }
}

fn check_rate_limit(scope: &str, config: &RateLimitConfig, errors: &mut Vec<ValidationError>) {
    if config.limit == 0 {
        errors.push(ValidationError::Zero {
            scope: scope.to_string(),
            field: "limit",
        });
    }
    if config.window_ms == 0 {
        errors.push(ValidationError::Zero {
            scope: scope.to_string(),
            field: "window_ms",
        });
    }
}

fn check_circuit_breaker(scope: &str, config: &CircuitBreakerConfig, errors: &mut Vec<ValidationError>) {
    if config.volume_threshold == 0 {
        errors.push(ValidationError::Zero {
            scope: scope.to_string(),
            field: "volume_threshold",
        });
    }
    if config.timeout_ms == 0 {
        errors.push(ValidationError::Zero {
            scope: scope.to_string(),
            field: "timeout_ms",
        });
    }
    if config.reset_timeout_ms == 0 {
        errors.push(ValidationError::Zero {
            scope: scope.to_string(),
            field: "reset_timeout_ms",
        });
    }
    if !(1..=100).contains(&config.failure_ratio) {
        errors.push(ValidationError::FailureRatio {
            scope: scope.to_string(),
            value: config.failure_ratio,
        });
    }
}
