//! Circuit breaker for downstream protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: downstream assumed down, calls fail fast
//! - Half-Open: a single probe tests whether the downstream recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure ratio >= threshold over the last `volume_threshold` calls
//! Open → Half-Open: first admission attempt after `reset_timeout`
//! Half-Open → Closed: probe succeeds
//! Half-Open → Open: probe fails
//! ```
//!
//! # Design Decisions
//! - Per-route circuit breaker (not global)
//! - Fail fast in Open state (no waiting for timeout)
//! - Single probe in Half-Open (prevents hammering a recovering backend)
//! - Only transport and timeout failures are counted

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::time::Instant;

use crate::config::{CircuitBreakerConfig, GatewayConfig};
use crate::error::DownstreamError;
use crate::observability::metrics;

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    /// Numeric encoding used by the state gauge.
    pub fn as_gauge(self) -> f64 {
        match self {
            CircuitState::Closed => 0.0,
            CircuitState::Open => 1.0,
            CircuitState::HalfOpen => 2.0,
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        };
        f.write_str(name)
    }
}

/// Outcome of a guarded call.
#[derive(Debug, Error)]
pub enum CircuitBreakerError {
    /// The call was short-circuited; nothing was sent downstream.
    #[error("circuit breaker rejected the call")]
    Rejected,

    /// The call ran and failed. `tripped` is set when this failure opened the breaker.
    #[error("guarded call failed: {source}")]
    Failed {
        #[source]
        source: DownstreamError,
        tripped: bool,
    },
}

struct BreakerState {
    state: CircuitState,
    /// Outcomes of the most recent calls, `true` = failure.
    window: VecDeque<bool>,
    opened_at: Option<Instant>,
    probe_in_flight: bool,
}

impl BreakerState {
    fn open(&mut self, now: Instant) {
        self.state = CircuitState::Open;
        self.opened_at = Some(now);
        self.window.clear();
        self.probe_in_flight = false;
    }

    fn close(&mut self) {
        self.state = CircuitState::Closed;
        self.opened_at = None;
        self.window.clear();
        self.probe_in_flight = false;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PermitKind {
    Closed,
    Probe,
}

/// Circuit breaker for one route.
pub struct CircuitBreaker {
    route_id: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(route_id: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let route_id = route_id.into();
        metrics::record_circuit_state(&route_id, CircuitState::Closed);
        Self {
            route_id,
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                window: VecDeque::with_capacity(config.volume_threshold as usize),
                opened_at: None,
                probe_in_flight: false,
            }),
            config,
        }
    }

    /// Current state, without evaluating the reset timeout.
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// `(total_calls, failed_calls)` in the rolling window.
    pub fn counters(&self) -> (usize, usize) {
        let inner = self.inner.lock();
        let failed = inner.window.iter().filter(|failed| **failed).count();
        (inner.window.len(), failed)
    }

    /// Run `call` under the breaker.
    ///
    /// The call is short-circuited when the breaker is open or a half-open
    /// probe is outstanding. Otherwise it runs under the hard timeout;
    /// exceeding the timeout drops the call and counts as a failure.
    pub async fn call<T, F>(&self, call: F) -> Result<T, CircuitBreakerError>
    where
        F: Future<Output = Result<T, DownstreamError>>,
    {
        let mut permit = self.try_acquire().ok_or(CircuitBreakerError::Rejected)?;

        let timeout = self.config.call_timeout();
        let result = match tokio::time::timeout(timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(DownstreamError::Timeout(timeout)),
        };

        match result {
            Ok(value) => {
                permit.record(false);
                Ok(value)
            }
            Err(source) => {
                let tripped = permit.record(source.is_circuit_trackable());
                Err(CircuitBreakerError::Failed { source, tripped })
            }
        }
    }

    fn try_acquire(&self) -> Option<CallPermit<'_>> {
        let now = Instant::now();
        let mut inner = self.inner.lock();

        if inner.state == CircuitState::Open {
            let elapsed = inner
                .opened_at
                .map_or(Duration::MAX, |opened| now.duration_since(opened));
            if elapsed < self.config.reset_timeout() {
                return None;
            }
            inner.state = CircuitState::HalfOpen;
            inner.probe_in_flight = false;
            self.transitioned(CircuitState::HalfOpen);
        }

        let kind = match inner.state {
            CircuitState::Closed => PermitKind::Closed,
            CircuitState::HalfOpen if !inner.probe_in_flight => {
                inner.probe_in_flight = true;
                tracing::debug!(route = %self.route_id, "Circuit breaker admitting probe");
                PermitKind::Probe
            }
            _ => return None,
        };

        Some(CallPermit {
            breaker: self,
            kind,
            recorded: false,
        })
    }

    /// Record a finished call. Returns true when this outcome opened the breaker.
    fn on_outcome(&self, kind: PermitKind, failed: bool) -> bool {
        let now = Instant::now();
        let mut inner = self.inner.lock();

        match (kind, inner.state) {
            (PermitKind::Closed, CircuitState::Closed) => {
                let volume = self.config.volume_threshold as usize;
                inner.window.push_back(failed);
                while inner.window.len() > volume {
                    inner.window.pop_front();
                }

                let total = inner.window.len();
                let failures = inner.window.iter().filter(|failed| **failed).count();
                if total >= volume
                    && failures * 100 >= self.config.failure_ratio as usize * total
                {
                    inner.open(now);
                    tracing::warn!(
                        route = %self.route_id,
                        total_calls = total,
                        failed_calls = failures,
                        "Circuit breaker opened due to failures"
                    );
                    self.transitioned(CircuitState::Open);
                    return true;
                }
                false
            }
            (PermitKind::Probe, CircuitState::HalfOpen) => {
                if failed {
                    inner.open(now);
                    tracing::warn!(route = %self.route_id, "Circuit breaker reopened after failed probe");
                    self.transitioned(CircuitState::Open);
                    true
                } else {
                    inner.close();
                    tracing::info!(route = %self.route_id, "Circuit breaker closed after successful probe");
                    self.transitioned(CircuitState::Closed);
                    false
                }
            }
            // Late outcome of a call admitted under a previous state.
            _ => false,
        }
    }

    fn release_probe(&self) {
        let mut inner = self.inner.lock();
        if inner.state == CircuitState::HalfOpen {
            inner.probe_in_flight = false;
        }
    }

    fn transitioned(&self, to: CircuitState) {
        tracing::info!(route = %self.route_id, state = %to, "Circuit breaker state change");
        metrics::record_circuit_state(&self.route_id, to);
    }
}

/// Admission to make one call. Dropping an unrecorded probe frees the probe slot.
struct CallPermit<'a> {
    breaker: &'a CircuitBreaker,
    kind: PermitKind,
    recorded: bool,
}

impl CallPermit<'_> {
    fn record(&mut self, failed: bool) -> bool {
        self.recorded = true;
        self.breaker.on_outcome(self.kind, failed)
    }
}

impl Drop for CallPermit<'_> {
    fn drop(&mut self) {
        if !self.recorded && self.kind == PermitKind::Probe {
            self.breaker.release_probe();
        }
    }
}

/// Process-wide breaker registry, keyed by route id.
pub struct CircuitBreakers {
    routes: HashMap<String, CircuitBreaker>,
}

impl CircuitBreakers {
    pub fn from_config(config: &GatewayConfig) -> Self {
        let routes = config
            .routes
            .iter()
            .map(|route| {
                (
                    route.route_id.clone(),
                    CircuitBreaker::new(route.route_id.clone(), config.circuit_breaker_for(route)),
                )
            })
            .collect();
        Self { routes }
    }

    pub fn get(&self, route_id: &str) -> Option<&CircuitBreaker> {
        self.routes.get(route_id)
    }
}
