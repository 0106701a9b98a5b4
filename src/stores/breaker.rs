//! Circuit breaker for store resilience
//!
//! Prevents cascading latency when a backing store is degraded: after
//! `failure_threshold` consecutive failures the circuit opens and calls are
//! rejected immediately for `open_duration`, then a half-open probe decides
//! whether to close again.
//!
//! # States
//! - **Closed**: Normal operation, requests pass through
//! - **Open**: Store is failing, requests are rejected immediately
//! - **HalfOpen**: Testing if the store has recovered

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use super::StoreKind;

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation - requests pass through
    Closed,
    /// Store is failing - requests rejected immediately
    Open,
    /// Testing recovery - limited requests allowed
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Circuit breaker configuration
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening the circuit
    pub failure_threshold: u32,
    /// Number of consecutive successes needed to close from half-open
    pub success_threshold: u32,
    /// Duration the circuit stays open before transitioning to half-open
    pub open_duration: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: crate::constants::BREAKER_FAILURE_THRESHOLD,
            success_threshold: crate::constants::BREAKER_SUCCESS_THRESHOLD,
            open_duration: crate::constants::BREAKER_OPEN_DURATION,
        }
    }
}

/// Internal state tracking
struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    last_state_change: Instant,
}

impl BreakerState {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            consecutive_successes: 0,
            last_state_change: Instant::now(),
        }
    }
}

/// Per-store circuit breaker.
///
/// The router composes breakers rather than store-specific conditionals, so
/// the fan-out/merge logic stays store-agnostic.
pub struct CircuitBreaker {
    store: StoreKind,
    config: CircuitBreakerConfig,
    state: Mutex<BreakerState>,
    // Atomic counters for metrics (lock-free)
    total_rejections: AtomicU64,
}

impl CircuitBreaker {
    pub fn new(store: StoreKind, config: CircuitBreakerConfig) -> Self {
        Self {
            store,
            config,
            state: Mutex::new(BreakerState::new()),
            total_rejections: AtomicU64::new(0),
        }
    }

    pub fn with_defaults(store: StoreKind) -> Self {
        Self::new(store, CircuitBreakerConfig::default())
    }

    /// Get current circuit state
    pub fn state(&self) -> CircuitState {
        self.state.lock().state
    }

    /// Total calls rejected by an open circuit
    pub fn rejections(&self) -> u64 {
        self.total_rejections.load(Ordering::Relaxed)
    }

    /// Check if the circuit allows a request, updating state if the cool-down
    /// has elapsed. Returns false when the call must be rejected.
    pub fn allow(&self) -> bool {
        let mut state = self.state.lock();

        match state.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                if state.last_state_change.elapsed() >= self.config.open_duration {
                    tracing::info!(
                        store = %self.store,
                        "Circuit breaker transitioning from Open to HalfOpen after {:?}",
                        self.config.open_duration
                    );
                    state.state = CircuitState::HalfOpen;
                    state.consecutive_successes = 0;
                    state.last_state_change = Instant::now();
                    self.record_transition(CircuitState::HalfOpen);
                    true
                } else {
                    drop(state);
                    self.total_rejections.fetch_add(1, Ordering::Relaxed);
                    crate::metrics::BREAKER_REJECTIONS_TOTAL
                        .with_label_values(&[self.store.as_str()])
                        .inc();
                    false
                }
            }
            CircuitState::HalfOpen => true,
        }
    }

    /// Record a successful call
    pub fn record_success(&self) {
        let mut state = self.state.lock();
        state.consecutive_failures = 0;
        state.consecutive_successes += 1;

        if state.state == CircuitState::HalfOpen
            && state.consecutive_successes >= self.config.success_threshold
        {
            tracing::info!(
                store = %self.store,
                "Circuit breaker closing after {} consecutive successes",
                state.consecutive_successes
            );
            state.state = CircuitState::Closed;
            state.last_state_change = Instant::now();
            self.record_transition(CircuitState::Closed);
        }
    }

    /// Record a failed call
    pub fn record_failure(&self) {
        let mut state = self.state.lock();
        state.consecutive_successes = 0;
        state.consecutive_failures += 1;

        match state.state {
            CircuitState::Closed => {
                if state.consecutive_failures >= self.config.failure_threshold {
                    tracing::warn!(
                        store = %self.store,
                        "Circuit breaker opening after {} consecutive failures",
                        state.consecutive_failures
                    );
                    state.state = CircuitState::Open;
                    state.last_state_change = Instant::now();
                    self.record_transition(CircuitState::Open);
                }
            }
            CircuitState::HalfOpen => {
                // Single failure in half-open returns to open
                tracing::warn!(
                    store = %self.store,
                    "Circuit breaker returning to Open after failure in HalfOpen state"
                );
                state.state = CircuitState::Open;
                state.last_state_change = Instant::now();
                self.record_transition(CircuitState::Open);
            }
            CircuitState::Open => {
                // Already open, nothing to do
            }
        }
    }

    fn record_transition(&self, new_state: CircuitState) {
        crate::metrics::BREAKER_TRANSITIONS_TOTAL
            .with_label_values(&[self.store.as_str(), &new_state.to_string()])
            .inc();
    }
}
