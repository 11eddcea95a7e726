use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use commit_ledger::aggregate::CommitAggregator;
use commit_ledger::config::Config;
use commit_ledger::ingest::Ingestor;
use commit_ledger::pool::WorkerPool;
use commit_ledger::server::{AppState, RateLimiter, build_router};
use commit_ledger::store::Store;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "commit_ledger=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("invalid configuration")?;
    if config.webhook_secret.is_empty() {
        tracing::warn!("WEBHOOK_SECRET is empty, webhook authentication is disabled");
    }

    let store = Store::connect(&config.database_url)
        .await
        .with_context(|| format!("failed to open database {}", config.database_url))?;
    store.init_schema().await.context("failed to create schema")?;

    let pool = Arc::new(WorkerPool::new(config.pool_config()));
    pool.start();

    let limiter = Arc::new(RateLimiter::new(config.rate_limit, config.rate_limit_window));
    let limiter_shutdown = CancellationToken::new();
    let limiter_cleanup = limiter.spawn_cleanup(limiter_shutdown.clone());

    let ingestor = Ingestor::new(Arc::clone(&pool), CommitAggregator::new(store));
    let app = build_router(AppState::new(
        ingestor,
        config.webhook_secret.clone(),
        limiter,
    ));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(
        %addr,
        workers = config.workers,
        queue_size = config.queue_size,
        rate_limit = config.rate_limit,
        rate_limit_window = ?config.rate_limit_window,
        "listening"
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    limiter_shutdown.cancel();
    if let Err(e) = limiter_cleanup.await {
        tracing::error!(error = %e, "rate limit cleanup task failed");
    }

    info!("shutting down, draining worker pool");
    pool.stop().await;
    info!("worker pool stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
