//! Route lookup.
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - Longest matching prefix wins
//! - Explicit no-match rather than silent default

use crate::config::{ConfigError, GatewayConfig, RouteConfig};
use crate::routing::matcher::PathPrefixMatcher;
use crate::security::HeaderSanitizer;

/// A route compiled for the request path.
#[derive(Debug)]
pub struct GatewayRoute {
    pub config: RouteConfig,
    pub sanitizer: HeaderSanitizer,
    matcher: PathPrefixMatcher,
}

impl GatewayRoute {
    pub fn compile(config: RouteConfig) -> Result<Self, regex::Error> {
        Ok(Self {
            sanitizer: HeaderSanitizer::for_route(&config)?,
            matcher: PathPrefixMatcher::new(config.path_prefix.clone()),
            config,
        })
    }

    pub fn id(&self) -> &str {
        &self.config.route_id
    }
}

/// All configured routes, most specific prefix first.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: Vec<GatewayRoute>,
}

impl RouteTable {
    /// Compile every route. Patterns were validated already; a failure here
    /// is reported as a validation error all the same.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, ConfigError> {
        let mut routes = Vec::with_capacity(config.routes.len());
        let mut errors = Vec::new();

        for route in &config.routes {
            match GatewayRoute::compile(route.clone()) {
                Ok(compiled) => routes.push(compiled),
                Err(e) => errors.push(crate::config::ValidationError::InvalidPattern {
                    route: route.route_id.clone(),
                    field: "header deny pattern",
                    reason: e.to_string(),
                }),
            }
        }
        if !errors.is_empty() {
            return Err(ConfigError::Validation(errors));
        }

        routes.sort_by(|a, b| b.matcher.specificity().cmp(&a.matcher.specificity()));
        Ok(Self { routes })
    }

    /// Find the route for a request path.
    pub fn match_path(&self, path: &str) -> Option<&GatewayRoute> {
        self.routes.iter().find(|route| route.matcher.matches(path))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(routes: Vec<RouteConfig>) -> RouteTable {
        RouteTable::from_config(&GatewayConfig {
            routes,
            ..GatewayConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_longest_prefix_wins() {
        let table = table(vec![
            RouteConfig::new("api", "/api", "http://localhost:1"),
            RouteConfig::new("customers", "/api/v1/customers", "http://localhost:2"),
        ]);

        assert_eq!(table.match_path("/api/v1/customers/7").map(GatewayRoute::id), Some("customers"));
        assert_eq!(table.match_path("/api/v1/products/1").map(GatewayRoute::id), Some("api"));
        assert!(table.match_path("/health").is_none());
    }

    #[test]
    fn test_bad_pattern_rejected() {
        let mut route = RouteConfig::new("r", "/r", "http://localhost:1");
        route.response_header_deny_pattern = "[".into();
        let result = RouteTable::from_config(&GatewayConfig {
            routes: vec![route],
            ..GatewayConfig::default()
        });
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }
}
