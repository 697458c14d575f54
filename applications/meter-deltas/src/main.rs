use meter_deltas::{
    api::{self, AppState},
    client::{QueryClient, ReadingSource},
    config::Config,
    poller::spawn_feeds,
};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("meter_deltas=info,tower_http=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    info!("Starting meter-deltas");

    let cfg_path = std::env::var("APP_CONFIG").unwrap_or_else(|_| "config/config.yaml".into());
    let cfg = Config::load(&cfg_path)?;
    info!(
        path = %cfg_path,
        query_url = %cfg.query.url,
        feeds = cfg.feeds.len(),
        "Configuration loaded"
    );

    let source: Arc<dyn ReadingSource> = Arc::new(QueryClient::new(&cfg.query)?);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (receivers, pollers) = spawn_feeds(&cfg.feeds, source.clone(), &shutdown_rx);

    let state = AppState::new(source, receivers);
    let router = api::create_router(state);
    let addr = format!("{}:{}", cfg.api.host, cfg.api.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", addr, e))?;

    info!("API server listening on {}", addr);

    if let Err(e) = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(error = %e, "API server error");
    }

    let _ = shutdown_tx.send(true);
    for handle in pollers {
        if let Err(e) = handle.await {
            error!(error = %e, "Feed poller terminated abnormally");
        }
    }

    info!("Application shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
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
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down");
        },
    }
}
