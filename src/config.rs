//! Configuration management for the context engine
//!
//! All configurable parameters in one place with environment variable overrides.
//! Follows the principle: sensible defaults, configurable in production.

use std::env;
use std::time::Duration;
use tracing::info;

use crate::constants;
use crate::stores::StoreKind;

/// CORS configuration
#[derive(Debug, Clone)]
pub struct CorsConfig {
    /// Allowed origins (empty = allow all)
    pub allowed_origins: Vec<String>,
    /// Allowed HTTP methods
    pub allowed_methods: Vec<String>,
    /// Allowed headers
    pub allowed_headers: Vec<String>,
    /// Max age for preflight cache (seconds)
    pub max_age_seconds: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: Vec::new(), // Empty = allow all origins
            allowed_methods: vec!["GET".to_string(), "POST".to_string(), "OPTIONS".to_string()],
            allowed_headers: vec![
                "Content-Type".to_string(),
                "Authorization".to_string(),
                "X-API-Key".to_string(),
            ],
            max_age_seconds: 86400, // 24 hours
        }
    }
}

impl CorsConfig {
    /// Load from environment variables with production safety checks
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(origins) = env::var("SMRITI_CORS_ORIGINS") {
            config.allowed_origins = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        if let Ok(methods) = env::var("SMRITI_CORS_METHODS") {
            config.allowed_methods = methods
                .split(',')
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect();
        }

        if let Ok(headers) = env::var("SMRITI_CORS_HEADERS") {
            config.allowed_headers = headers
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        let is_production = env::var("SMRITI_ENV")
            .map(|v| {
                let v = v.to_lowercase();
                v == "production" || v == "prod"
            })
            .unwrap_or(false);

        if is_production && config.allowed_origins.is_empty() {
            tracing::warn!(
                "PRODUCTION WARNING: CORS allows all origins. Set SMRITI_CORS_ORIGINS for security."
            );
        }

        config
    }

    /// Check if any origin restrictions are configured
    pub fn is_restricted(&self) -> bool {
        !self.allowed_origins.is_empty()
    }

    /// Convert to tower-http CorsLayer
    pub fn to_layer(&self) -> tower_http::cors::CorsLayer {
        use tower_http::cors::{AllowOrigin, Any, CorsLayer};

        let mut layer = CorsLayer::new();

        if self.allowed_origins.is_empty() {
            layer = layer.allow_origin(Any);
        } else {
            let mut valid_origins = Vec::new();

            for origin_str in &self.allowed_origins {
                match origin_str.parse::<axum::http::HeaderValue>() {
                    Ok(origin) => valid_origins.push(origin),
                    Err(_) => tracing::warn!("CORS: Invalid origin '{}' - skipping", origin_str),
                }
            }

            if valid_origins.is_empty() {
                // All configured origins failed to parse - deny all rather than
                // falling back to permissive
                tracing::error!(
                    "CORS: All {} configured origin(s) failed to parse. \
                     Rejecting all cross-origin requests. Fix SMRITI_CORS_ORIGINS.",
                    self.allowed_origins.len()
                );
                layer =
                    layer.allow_origin(AllowOrigin::list(Vec::<axum::http::HeaderValue>::new()));
            } else {
                layer = layer.allow_origin(AllowOrigin::list(valid_origins));
            }
        }

        let methods: Vec<axum::http::Method> = self
            .allowed_methods
            .iter()
            .filter_map(|m| m.parse().ok())
            .collect();
        if methods.is_empty() {
            layer = layer.allow_methods(Any);
        } else {
            layer = layer.allow_methods(methods);
        }

        let headers: Vec<axum::http::HeaderName> = self
            .allowed_headers
            .iter()
            .filter_map(|h| h.parse().ok())
            .collect();
        if headers.is_empty() {
            layer = layer.allow_headers(Any);
        } else {
            layer = layer.allow_headers(headers);
        }

        layer = layer.max_age(std::time::Duration::from_secs(self.max_age_seconds));

        layer
    }
}

/// Engine tuning parameters: latency budgets, caps, breaker settings.
///
/// Every field defaults to the documented value in `constants.rs` and can be
/// overridden per deployment.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Triage classification budget
    pub triage_timeout: Duration,

    /// Strategy planning / query expansion budget
    pub plan_timeout: Duration,

    /// Total fast-path deadline per strategy depth
    pub relevant_deadline: Duration,
    pub deep_deadline: Duration,
    pub comprehensive_deadline: Duration,

    /// Per-store call budgets
    pub vector_timeout: Duration,
    pub relational_timeout: Duration,
    pub graph_timeout: Duration,

    /// Merge ranking priority, highest first (default: relational > vector > graph)
    pub store_priority: Vec<StoreKind>,

    /// Circuit breaker thresholds (applied to the graph store)
    pub breaker_failure_threshold: u32,
    pub breaker_success_threshold: u32,
    pub breaker_open_duration: Duration,

    /// Narrative cache TTL
    pub narrative_ttl: Duration,

    /// Content-hash dedup LRU capacity
    pub dedup_capacity: usize,

    /// Background queue capacity, worker count, and per-task deadline
    pub background_queue_capacity: usize,
    pub background_workers: usize,
    pub background_task_deadline: Duration,

    /// External reasoner endpoint (Ollama or OpenAI-compatible); model name
    pub reasoner_endpoint: String,
    pub reasoner_model: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            triage_timeout: constants::TRIAGE_TIMEOUT,
            plan_timeout: constants::PLAN_TIMEOUT,
            relevant_deadline: constants::RELEVANT_DEADLINE,
            deep_deadline: constants::DEEP_DEADLINE,
            comprehensive_deadline: constants::COMPREHENSIVE_DEADLINE,
            vector_timeout: constants::VECTOR_STORE_TIMEOUT,
            relational_timeout: constants::RELATIONAL_STORE_TIMEOUT,
            graph_timeout: constants::GRAPH_STORE_TIMEOUT,
            store_priority: vec![StoreKind::Relational, StoreKind::Vector, StoreKind::Graph],
            breaker_failure_threshold: constants::BREAKER_FAILURE_THRESHOLD,
            breaker_success_threshold: constants::BREAKER_SUCCESS_THRESHOLD,
            breaker_open_duration: constants::BREAKER_OPEN_DURATION,
            narrative_ttl: constants::NARRATIVE_TTL,
            dedup_capacity: constants::DEDUP_CACHE_CAPACITY,
            background_queue_capacity: constants::BACKGROUND_QUEUE_CAPACITY,
            background_workers: constants::BACKGROUND_WORKERS,
            background_task_deadline: constants::BACKGROUND_TASK_DEADLINE,
            reasoner_endpoint: "http://localhost:11434".to_string(),
            reasoner_model: "qwen2.5:1.5b".to_string(),
        }
    }
}

impl EngineConfig {
    /// Load engine tuning from environment variables with defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(ms) = env_ms("SMRITI_TRIAGE_TIMEOUT_MS") {
            config.triage_timeout = ms;
        }
        if let Some(ms) = env_ms("SMRITI_PLAN_TIMEOUT_MS") {
            config.plan_timeout = ms;
        }
        if let Some(ms) = env_ms("SMRITI_RELEVANT_DEADLINE_MS") {
            config.relevant_deadline = ms;
        }
        if let Some(ms) = env_ms("SMRITI_DEEP_DEADLINE_MS") {
            config.deep_deadline = ms;
        }
        if let Some(ms) = env_ms("SMRITI_COMPREHENSIVE_DEADLINE_MS") {
            config.comprehensive_deadline = ms;
        }
        if let Some(ms) = env_ms("SMRITI_VECTOR_TIMEOUT_MS") {
            config.vector_timeout = ms;
        }
        if let Some(ms) = env_ms("SMRITI_RELATIONAL_TIMEOUT_MS") {
            config.relational_timeout = ms;
        }
        if let Some(ms) = env_ms("SMRITI_GRAPH_TIMEOUT_MS") {
            config.graph_timeout = ms;
        }

        if let Ok(val) = env::var("SMRITI_BREAKER_FAILURES") {
            if let Ok(n) = val.parse() {
                config.breaker_failure_threshold = n;
            }
        }
        if let Some(ms) = env_ms("SMRITI_BREAKER_OPEN_MS") {
            config.breaker_open_duration = ms;
        }

        if let Ok(val) = env::var("SMRITI_NARRATIVE_TTL_SECS") {
            if let Ok(n) = val.parse() {
                config.narrative_ttl = Duration::from_secs(n);
            }
        }

        if let Ok(val) = env::var("SMRITI_DEDUP_CAPACITY") {
            if let Ok(n) = val.parse::<usize>() {
                config.dedup_capacity = n.max(16);
            }
        }

        if let Ok(val) = env::var("SMRITI_BACKGROUND_QUEUE") {
            if let Ok(n) = val.parse::<usize>() {
                config.background_queue_capacity = n.max(1);
            }
        }
        if let Ok(val) = env::var("SMRITI_BACKGROUND_WORKERS") {
            if let Ok(n) = val.parse::<usize>() {
                config.background_workers = n.clamp(1, 64);
            }
        }

        if let Ok(val) = env::var("SMRITI_REASONER_ENDPOINT") {
            config.reasoner_endpoint = val;
        }
        if let Ok(val) = env::var("SMRITI_REASONER_MODEL") {
            config.reasoner_model = val;
        }

        config
    }

    /// Per-store call budget for a given store kind
    pub fn store_timeout(&self, kind: StoreKind) -> Duration {
        match kind {
            StoreKind::Vector => self.vector_timeout,
            StoreKind::Relational => self.relational_timeout,
            StoreKind::Graph => self.graph_timeout,
        }
    }
}

/// Server configuration loaded from environment with defaults
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server host address (default: 127.0.0.1)
    /// Set to 0.0.0.0 for Docker or network-accessible deployments
    pub host: String,

    /// Server port (default: 3040)
    pub port: u16,

    /// Rate limit: requests per second (default: 2000 - agent-friendly)
    pub rate_limit_per_second: u64,

    /// Rate limit: burst size (default: 4000 - allows rapid agent bursts)
    pub rate_limit_burst: u32,

    /// Maximum concurrent requests (default: 200)
    pub max_concurrent_requests: usize,

    /// Whether running in production mode
    pub is_production: bool,

    /// CORS configuration
    pub cors: CorsConfig,

    /// Engine tuning
    pub engine: EngineConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3040,
            rate_limit_per_second: 2000,
            rate_limit_burst: 4000,
            max_concurrent_requests: 200,
            is_production: false,
            cors: CorsConfig::default(),
            engine: EngineConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // Check production mode first
        config.is_production = env::var("SMRITI_ENV")
            .map(|v| {
                let v = v.to_lowercase();
                v == "production" || v == "prod"
            })
            .unwrap_or(false);

        if let Ok(val) = env::var("SMRITI_HOST") {
            config.host = val;
        }

        if let Ok(val) = env::var("SMRITI_PORT") {
            if let Ok(port) = val.parse() {
                config.port = port;
            }
        }

        if let Ok(val) = env::var("SMRITI_RATE_LIMIT") {
            if let Ok(n) = val.parse() {
                config.rate_limit_per_second = n;
            }
        }

        if let Ok(val) = env::var("SMRITI_RATE_BURST") {
            if let Ok(n) = val.parse() {
                config.rate_limit_burst = n;
            }
        }

        if let Ok(val) = env::var("SMRITI_MAX_CONCURRENT") {
            if let Ok(n) = val.parse() {
                config.max_concurrent_requests = n;
            }
        }

        config.cors = CorsConfig::from_env();
        config.engine = EngineConfig::from_env();

        config
    }

    /// Log the current configuration
    pub fn log(&self) {
        info!("📋 Configuration:");
        info!(
            "   Mode: {}",
            if self.is_production {
                "PRODUCTION"
            } else {
                "Development"
            }
        );
        info!("   Listen: {}:{}", self.host, self.port);
        if self.rate_limit_per_second > 0 {
            info!(
                "   Rate limit: {} req/sec (burst: {})",
                self.rate_limit_per_second, self.rate_limit_burst
            );
        } else {
            info!("   Rate limit: disabled");
        }
        info!("   Max concurrent: {}", self.max_concurrent_requests);
        if self.cors.is_restricted() {
            info!("   CORS origins: {:?}", self.cors.allowed_origins);
        } else {
            info!("   CORS: Permissive (all origins allowed)");
        }
        info!(
            "   Deadlines: relevant={:?} deep={:?} comprehensive={:?}",
            self.engine.relevant_deadline,
            self.engine.deep_deadline,
            self.engine.comprehensive_deadline
        );
        info!(
            "   Store budgets: vector={:?} relational={:?} graph={:?}",
            self.engine.vector_timeout, self.engine.relational_timeout, self.engine.graph_timeout
        );
        info!(
            "   Background: {} workers, queue of {}",
            self.engine.background_workers, self.engine.background_queue_capacity
        );
        info!("   Reasoner: {}", self.engine.reasoner_endpoint);
    }
}

fn env_ms(key: &str) -> Option<Duration> {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_millis)
}
