//! Fixed-window rate limiting per route.
//!
//! Overflow is rejected immediately; nothing is queued or delayed.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::config::{GatewayConfig, RateLimitConfig};

/// A single fixed-window counter.
struct FixedWindow {
    window_start: Instant,
    count_in_window: u32,
}

/// Rate limiter state for one route.
pub struct RouteLimiter {
    window: Mutex<FixedWindow>,
    limit: u32,
    window_duration: Duration,
}

impl RouteLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            window: Mutex::new(FixedWindow {
                window_start: Instant::now(),
                count_in_window: 0,
            }),
            limit: config.limit,
            window_duration: config.window(),
        }
    }

    /// Admit or reject one request.
    ///
    /// Window reset and increment happen under one lock; a rejection leaves
    /// the counter untouched.
    pub fn try_admit(&self) -> bool {
        let now = Instant::now();
        let mut window = self.window.lock();

        if now.duration_since(window.window_start) >= self.window_duration {
            window.window_start = now;
            window.count_in_window = 0;
        }

        if window.count_in_window < self.limit {
            window.count_in_window += 1;
            true
        } else {
            false
        }
    }

    /// Requests admitted in the current window.
    pub fn count_in_window(&self) -> u32 {
        self.window.lock().count_in_window
    }
}

/// Process-wide limiter registry, keyed by route id.
///
/// Built once at startup and never resized afterwards.
pub struct RateLimiter {
    routes: HashMap<String, RouteLimiter>,
}

impl RateLimiter {
    pub fn from_config(config: &GatewayConfig) -> Self {
        let routes = config
            .routes
            .iter()
            .map(|route| {
                (
                    route.route_id.clone(),
                    RouteLimiter::new(&config.rate_limit_for(route)),
                )
            })
            .collect();
        Self { routes }
    }

    /// Admit a request for `route_id`. Unknown routes are rejected.
    pub fn admit(&self, route_id: &str) -> bool {
        match self.routes.get(route_id) {
            Some(limiter) => limiter.try_admit(),
            None => {
                tracing::warn!(route = %route_id, "Rate limit check for unknown route");
                false
            }
        }
    }
}
