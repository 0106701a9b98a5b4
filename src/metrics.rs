//! Production-grade metrics with Prometheus
//!
//! Exposes key operational metrics for monitoring and alerting:
//! - Request rates and latencies per retrieval strategy
//! - Per-store search/upsert durations and outcomes
//! - Circuit breaker transitions and rejections
//! - Triage decisions and reasoner call health
//! - Background queue depth and drops
//!
//! NOTE: We intentionally avoid user_id in metric labels to prevent
//! high-cardinality explosion that can crash Prometheus.

use lazy_static::lazy_static;
use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
};

lazy_static! {
    /// Global metrics registry
    pub static ref METRICS_REGISTRY: Registry = Registry::new();

    // ============================================================================
    // Request Metrics
    // ============================================================================

    /// HTTP request duration in seconds
    pub static ref HTTP_REQUEST_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "smriti_http_request_duration_seconds",
            "HTTP request duration in seconds"
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["method", "endpoint", "status"]
    ).unwrap();

    /// Total HTTP requests
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("smriti_http_requests_total", "Total HTTP requests"),
        &["method", "endpoint", "status"]
    ).unwrap();

    // ============================================================================
    // Context Orchestration Metrics
    // ============================================================================

    /// Fast-path process_message invocations by strategy outcome
    pub static ref CONTEXT_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("smriti_context_requests_total", "Total context requests"),
        &["strategy"]  // none, narrative, relevant, deep, comprehensive
    ).unwrap();

    /// Fast-path latency by strategy
    pub static ref CONTEXT_REQUEST_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "smriti_context_request_duration_seconds",
            "Fast-path context retrieval duration"
        )
        .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0]),
        &["strategy"]
    ).unwrap();

    // ============================================================================
    // Store Metrics (labeled by store kind, never by user)
    // ============================================================================

    /// Store search operations
    pub static ref STORE_SEARCH_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("smriti_store_search_total", "Total store search operations"),
        &["store", "result"]  // result: ok, timeout, circuit_open, backend
    ).unwrap();

    /// Store search duration
    pub static ref STORE_SEARCH_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "smriti_store_search_duration_seconds",
            "Store search duration"
        )
        .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 3.0]),
        &["store"]
    ).unwrap();

    /// Store upsert operations
    pub static ref STORE_UPSERT_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("smriti_store_upsert_total", "Total store upsert operations"),
        &["store", "result"]
    ).unwrap();

    // ============================================================================
    // Circuit Breaker Metrics
    // ============================================================================

    /// Breaker state transitions
    pub static ref BREAKER_TRANSITIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("smriti_breaker_transitions_total", "Circuit breaker state transitions"),
        &["store", "state"]  // state: closed, open, half_open
    ).unwrap();

    /// Calls rejected by an open breaker
    pub static ref BREAKER_REJECTIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("smriti_breaker_rejections_total", "Calls rejected by open circuit breaker"),
        &["store"]
    ).unwrap();

    // ============================================================================
    // Triage & Reasoner Metrics
    // ============================================================================

    /// Triage decisions
    pub static ref TRIAGE_DECISIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("smriti_triage_decisions_total", "Triage classifier decisions"),
        &["decision"]  // remember, skip, prefiltered, failed_closed
    ).unwrap();

    /// Reasoner call outcomes by call site
    pub static ref REASONER_CALLS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("smriti_reasoner_calls_total", "External reasoner calls"),
        &["caller", "result"]  // caller: triage, planner, narrative; result: ok, timeout, error
    ).unwrap();

    /// Reasoner call duration by call site
    pub static ref REASONER_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "smriti_reasoner_duration_seconds",
            "External reasoner call duration"
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 5.0, 10.0, 20.0]),
        &["caller"]
    ).unwrap();

    // ============================================================================
    // Narrative Cache Metrics
    // ============================================================================

    /// Narrative cache lookups
    pub static ref NARRATIVE_CACHE_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("smriti_narrative_cache_total", "Narrative cache lookups"),
        &["result"]  // hit, miss, expired, invalidated
    ).unwrap();

    // ============================================================================
    // Write Pipeline Metrics
    // ============================================================================

    /// Memory write outcomes
    pub static ref MEMORY_WRITES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("smriti_memory_writes_total", "Memory write pipeline outcomes"),
        &["result"]  // accepted, deduplicated, rejected, degraded
    ).unwrap();

    /// Memory write duration (full fan-out)
    pub static ref MEMORY_WRITE_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "smriti_memory_write_duration_seconds",
            "Memory write fan-out duration"
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5])
    ).unwrap();

    // ============================================================================
    // Background Path Metrics
    // ============================================================================

    /// Background task outcomes
    pub static ref BACKGROUND_TASKS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("smriti_background_tasks_total", "Background task outcomes"),
        &["kind", "result"]  // kind: triage_write, narrative_refresh; result: ok, error, timeout
    ).unwrap();

    /// Tasks dropped because the bounded queue was full
    pub static ref BACKGROUND_TASKS_DROPPED: IntCounter = IntCounter::new(
        "smriti_background_tasks_dropped_total",
        "Background tasks dropped due to full queue"
    ).unwrap();

    /// Current background queue depth
    pub static ref BACKGROUND_QUEUE_DEPTH: IntGauge = IntGauge::new(
        "smriti_background_queue_depth",
        "Number of queued background tasks"
    ).unwrap();

    // ============================================================================
    // Concurrency Metrics
    // ============================================================================

    /// Current concurrent fast-path requests
    pub static ref CONCURRENT_REQUESTS: IntGauge = IntGauge::new(
        "smriti_concurrent_requests",
        "Current number of concurrent requests"
    ).unwrap();
}

/// Register all metrics with the global registry
pub fn register_metrics() -> Result<(), prometheus::Error> {
    // Request metrics
    METRICS_REGISTRY.register(Box::new(HTTP_REQUEST_DURATION.clone()))?;
    METRICS_REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()))?;

    // Orchestration metrics
    METRICS_REGISTRY.register(Box::new(CONTEXT_REQUESTS_TOTAL.clone()))?;
    METRICS_REGISTRY.register(Box::new(CONTEXT_REQUEST_DURATION.clone()))?;

    // Store metrics
    METRICS_REGISTRY.register(Box::new(STORE_SEARCH_TOTAL.clone()))?;
    METRICS_REGISTRY.register(Box::new(STORE_SEARCH_DURATION.clone()))?;
    METRICS_REGISTRY.register(Box::new(STORE_UPSERT_TOTAL.clone()))?;

    // Breaker metrics
    METRICS_REGISTRY.register(Box::new(BREAKER_TRANSITIONS_TOTAL.clone()))?;
    METRICS_REGISTRY.register(Box::new(BREAKER_REJECTIONS_TOTAL.clone()))?;

    // Triage & reasoner metrics
    METRICS_REGISTRY.register(Box::new(TRIAGE_DECISIONS_TOTAL.clone()))?;
    METRICS_REGISTRY.register(Box::new(REASONER_CALLS_TOTAL.clone()))?;
    METRICS_REGISTRY.register(Box::new(REASONER_DURATION.clone()))?;

    // Cache metrics
    METRICS_REGISTRY.register(Box::new(NARRATIVE_CACHE_TOTAL.clone()))?;

    // Write pipeline metrics
    METRICS_REGISTRY.register(Box::new(MEMORY_WRITES_TOTAL.clone()))?;
    METRICS_REGISTRY.register(Box::new(MEMORY_WRITE_DURATION.clone()))?;

    // Background metrics
    METRICS_REGISTRY.register(Box::new(BACKGROUND_TASKS_TOTAL.clone()))?;
    METRICS_REGISTRY.register(Box::new(BACKGROUND_TASKS_DROPPED.clone()))?;
    METRICS_REGISTRY.register(Box::new(BACKGROUND_QUEUE_DEPTH.clone()))?;

    // Concurrency metrics
    METRICS_REGISTRY.register(Box::new(CONCURRENT_REQUESTS.clone()))?;

    Ok(())
}

/// Helper to time operations with histogram (RAII pattern)
/// Usage: let _timer = Timer::new(SOME_HISTOGRAM.clone());
#[allow(unused)] // Public API utility for metrics consumers
pub struct Timer {
    histogram: Histogram,
    start: std::time::Instant,
}

#[allow(unused)] // Public API utility
impl Timer {
    /// Create timer that records duration to histogram on drop
    pub fn new(histogram: Histogram) -> Self {
        Self {
            histogram,
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        self.histogram.observe(duration);
    }
}
