use crawler::interfaces::{ChannelBroadcaster, InMemorySessionStore, LoggingLeadSink, StaticSectorRegistry};
use crawler::search::pool::PagePool;
use crawler::validator::EmailValidator;
use crawler::{build_app, config::Config, jobs::JobManager, AppState};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config =
        Arc::new(Config::from_env().expect("failed to load configuration from environment"));
    let port = config.port;

    let search_pool = match PagePool::launch(config.max_search_pages).await {
        Ok(pool) => Some(Arc::new(pool)),
        Err(e) => {
            tracing::warn!(error = %e, "headless browser unavailable, falling back to HTTP search only");
            None
        }
    };

    let validator = Arc::new(
        EmailValidator::new(
            Duration::from_millis(config.mx_lookup_timeout_ms),
            Duration::from_millis(config.smtp_timeout_ms),
        )
        .expect("failed to initialize email validator"),
    );

    let job_manager = Arc::new(JobManager::new(
        config.clone(),
        Arc::new(StaticSectorRegistry::new()),
        search_pool.clone(),
        Arc::new(ChannelBroadcaster::new()),
        Arc::new(LoggingLeadSink),
        Arc::new(InMemorySessionStore::new()),
        validator,
    ));

    let state = AppState {
        config: config.clone(),
        job_manager: job_manager.clone(),
    };

    let app = build_app(state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!("lead-generation service starting on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind to address");

    let server = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(job_manager, search_pool));
    server.await.expect("server error");
}

/// Waits for SIGTERM/SIGINT, requests cancellation of every active job,
/// then drains the headless-browser pool (closing Chrome) before letting
/// axum finish in-flight HTTP requests and exit.
async fn shutdown_signal(job_manager: Arc<JobManager>, search_pool: Option<Arc<PagePool>>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received, cancelling active jobs");
    job_manager.cancel_all().await;

    if let Some(pool) = search_pool {
        tracing::info!("draining browser page pool");
        pool.drain().await;
    }
}
