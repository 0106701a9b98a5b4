//! Smriti-Context - personal-memory context engine for AI assistants
//!
//! Standalone server exposing the context orchestration engine over REST

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower::limit::ConcurrencyLimitLayer;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tracing::info;

use smriti_context::config::ServerConfig;
use smriti_context::engine::Orchestrator;
use smriti_context::handlers::{self, AppState};
use smriti_context::reasoner::HttpReasoner;
use smriti_context::stores::mem::{
    InMemoryGraphStore, InMemoryRelationalStore, InMemoryVectorStore,
};
use smriti_context::{auth, metrics, middleware};

#[cfg(feature = "telemetry")]
use smriti_context::tracing_setup;

/// Max time to drain in-flight requests and background tasks on shutdown
const GRACEFUL_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

#[tokio::main]
async fn main() -> Result<()> {
    // Distributed tracing with OpenTelemetry (optional)
    #[cfg(feature = "telemetry")]
    {
        tracing_setup::init_tracing().expect("Failed to initialize tracing");
    }
    #[cfg(not(feature = "telemetry"))]
    {
        tracing_subscriber::fmt::init();
        info!("📝 Console logging initialized (telemetry disabled)");
    }

    // Register Prometheus metrics
    metrics::register_metrics().expect("Failed to register metrics");
    info!("📊 Metrics registered at /metrics");

    info!("🧠 Starting smriti-context server...");

    // Load configuration from environment
    let server_config = ServerConfig::from_env();
    server_config.log();

    // Backing stores. The in-memory implementations keep the binary
    // self-contained; production deployments swap in adapters over their
    // actual vector/graph/relational backends.
    let vector = Arc::new(InMemoryVectorStore::new());
    let graph = Arc::new(InMemoryGraphStore::new());
    let relational = Arc::new(InMemoryRelationalStore::new());

    let reasoner = Arc::new(HttpReasoner::new(
        &server_config.engine.reasoner_endpoint,
        &server_config.engine.reasoner_model,
    ));

    let orchestrator = Arc::new(Orchestrator::new(
        vector,
        graph,
        relational,
        reasoner,
        server_config.engine.clone(),
    ));

    let state = Arc::new(AppState::new(orchestrator, server_config.clone()));

    // Configure rate limiting from config
    let governor_conf = GovernorConfigBuilder::default()
        .per_second(server_config.rate_limit_per_second)
        .burst_size(server_config.rate_limit_burst)
        .finish()
        .expect("Failed to build governor rate limiter configuration");

    let governor_layer = GovernorLayer {
        config: Arc::new(governor_conf),
    };

    info!(
        "⚡ Rate limiting enabled: {} req/sec, burst of {}",
        server_config.rate_limit_per_second, server_config.rate_limit_burst
    );

    // Build CORS layer from configuration
    let cors = server_config.cors.to_layer();

    // Protected API routes - require authentication and are rate limited
    let protected_routes = handlers::build_protected_routes(state.clone())
        .layer(axum::middleware::from_fn(auth::auth_middleware))
        .layer(governor_layer);

    // Public routes - NO rate limiting (health checks, metrics)
    // These must always be accessible for monitoring and Kubernetes probes
    let public_routes = handlers::build_public_routes(state.clone());

    let max_concurrent = server_config.max_concurrent_requests;
    info!("🔄 Concurrency limiting enabled: max_concurrent={max_concurrent}");

    let app = axum::Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(axum::middleware::from_fn(middleware::track_metrics))
        .layer(ConcurrencyLimitLayer::new(max_concurrent))
        .layer(cors);

    // Start server using address from config
    let addr: SocketAddr = format!("{}:{}", server_config.host, server_config.port)
        .parse()
        .expect("Invalid host/port configuration");
    info!("🚀 Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("🔒 Shutdown signal received, draining...");

    // Background tasks are bounded by their own deadlines; give them a
    // window to finish before the process exits.
    let cleanup_future = async {
        #[cfg(feature = "telemetry")]
        tracing_setup::shutdown_tracing();
    };

    match tokio::time::timeout(
        std::time::Duration::from_secs(GRACEFUL_SHUTDOWN_TIMEOUT_SECS),
        cleanup_future,
    )
    .await
    {
        Ok(()) => {
            info!("👋 Server shutdown complete");
        }
        Err(_) => {
            tracing::error!(
                "⏱️  Graceful shutdown timed out after {}s, forcing exit",
                GRACEFUL_SHUTDOWN_TIMEOUT_SECS
            );
            std::process::exit(1);
        }
    }

    Ok(())
}

/// Handle graceful shutdown
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("🛑 Shutdown signal received, starting graceful shutdown");
}
