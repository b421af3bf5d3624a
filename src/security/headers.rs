//! Header sanitization on the request and response paths.
//!
//! # Responsibilities
//! - Drop internal and hop-by-hop headers before forwarding
//! - Apply the route's request/response deny patterns
//! - Strip everything for fallback and error responses
//!
//! Patterns are case-insensitive and must match the whole header name.

use axum::http::header::{self, HeaderMap, HeaderName};
use regex::{Regex, RegexBuilder};

use crate::config::RouteConfig;

/// Internal header carrying the original request URI; never forwarded.
pub const X_ORIGINAL_URI: HeaderName = HeaderName::from_static("x-original-uri");

/// Connection-scoped headers that must not cross the gateway.
const HOP_BY_HOP: [&str; 7] = [
    "connection",
    "keep-alive",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Compiled header rules for one route.
#[derive(Debug, Clone)]
pub struct HeaderSanitizer {
    request_deny: Option<Regex>,
    response_deny: Regex,
}

impl HeaderSanitizer {
    /// Compile the route's deny patterns.
    pub fn new(
        request_deny_pattern: Option<&str>,
        response_deny_pattern: &str,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            request_deny: request_deny_pattern.map(compile).transpose()?,
            response_deny: compile(response_deny_pattern)?,
        })
    }

    pub fn for_route(route: &RouteConfig) -> Result<Self, regex::Error> {
        Self::new(
            route.request_header_deny_pattern.as_deref(),
            &route.response_header_deny_pattern,
        )
    }

    /// Filter inbound headers before they are forwarded downstream.
    pub fn sanitize_request(&self, headers: &mut HeaderMap) {
        headers.remove(X_ORIGINAL_URI);
        headers.remove(header::HOST);
        remove_hop_by_hop(headers);
        if let Some(deny) = &self.request_deny {
            remove_matching(headers, deny);
        }
    }

    /// Filter downstream headers before they are returned to the caller.
    pub fn sanitize_response(&self, headers: &mut HeaderMap) {
        remove_hop_by_hop(headers);
        remove_matching(headers, &self.response_deny);
    }
}

fn compile(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(&format!("^(?:{pattern})$"))
        .case_insensitive(true)
        .build()
}

fn remove_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

fn remove_matching(headers: &mut HeaderMap, deny: &Regex) {
    let denied: Vec<HeaderName> = headers
        .keys()
        .filter(|name| deny.is_match(name.as_str()))
        .cloned()
        .collect();
    for name in denied {
        headers.remove(&name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::DEFAULT_RESPONSE_HEADER_DENY_PATTERN;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(*name, HeaderValue::from_static(value));
        }
        map
    }

    fn default_sanitizer() -> HeaderSanitizer {
        HeaderSanitizer::new(None, DEFAULT_RESPONSE_HEADER_DENY_PATTERN).unwrap()
    }

    #[test]
    fn test_response_deny_list() {
        let mut map = headers(&[
            ("Forwarded", "for=1.2.3.4"),
            ("X-Forwarded-For", "1.2.3.4"),
            ("x-forwarded-proto", "http"),
            ("X-Envoy-Upstream-Service-Time", "3"),
            ("Server", "nginx"),
            ("User-Agent", "curl"),
            ("Accept", "*/*"),
            ("X-Request-Id", "abc"),
            ("X-Powered-By", "PHP"),
            ("Transfer-Encoding", "chunked"),
            ("Content-Type", "application/json"),
            ("Accept-Language", "en"),
            ("X-Server-Region", "eu"),
        ]);

        default_sanitizer().sanitize_response(&mut map);

        let mut remaining: Vec<_> = map.keys().map(|k| k.as_str().to_string()).collect();
        remaining.sort();
        assert_eq!(remaining, vec!["accept-language", "content-type", "x-server-region"]);
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let sanitizer = default_sanitizer();
        let mut once = headers(&[("Server", "x"), ("ETag", "\"1\""), ("x-powered-by", "y")]);
        sanitizer.sanitize_response(&mut once);
        let mut twice = once.clone();
        sanitizer.sanitize_response(&mut twice);
        assert_eq!(once, twice);
        assert_eq!(once.len(), 1);
    }

    #[test]
    fn test_request_side() {
        let sanitizer =
            HeaderSanitizer::new(Some("Cookie|X-Internal-.*"), DEFAULT_RESPONSE_HEADER_DENY_PATTERN)
                .unwrap();
        let mut map = headers(&[
            ("Host", "gateway.local"),
            ("X-Original-URI", "/api/v1/customers/7"),
            ("Connection", "keep-alive"),
            ("COOKIE", "session=1"),
            ("x-internal-token", "t"),
            ("Authorization", "Bearer t"),
            ("Accept", "application/json"),
        ]);

        sanitizer.sanitize_request(&mut map);

        let mut remaining: Vec<_> = map.keys().map(|k| k.as_str().to_string()).collect();
        remaining.sort();
        assert_eq!(remaining, vec!["accept", "authorization"]);
    }

    #[test]
    fn test_duplicate_values_removed_together() {
        let mut map = headers(&[("Server", "a"), ("server", "b")]);
        default_sanitizer().sanitize_response(&mut map);
        assert!(map.is_empty());
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(HeaderSanitizer::new(Some("(oops"), "Server").is_err());
    }

    #[test]
    fn test_response_deny_is_whole_name() {
        let sanitizer = default_sanitizer();
        let mut map = HeaderMap::new();
        map.insert("x-forwarded-host", HeaderValue::from_static("internal"));
        map.insert("content-length", HeaderValue::from_static("2"));
        map.insert("server-timing", HeaderValue::from_static("db;dur=3"));
        sanitizer.sanitize_response(&mut map);
        assert!(!map.contains_key("x-forwarded-host"));
        assert!(map.contains_key("content-length"));
        assert!(map.contains_key("server-timing"));
    }
}
