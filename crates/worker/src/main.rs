//! `warden-worker <queue>` -- consumes one job queue.
//!
//! Started and stopped by the node agent's process supervisor, one
//! process per live queue. SIGTERM lets the current job finish and then
//! exits.
//!
//! # Environment variables
//!
//! | Variable                | Required | Default | Description                         |
//! |-------------------------|----------|---------|-------------------------------------|
//! | `QUEUE_BACKEND_URL`     | yes      | --      | PostgreSQL URL of the queue backend |
//! | `PLUGIN_DIRS`           | no       | --      | Comma-separated plugin directories  |
//! | `CORRELATION_THRESHOLD` | no       | `20`    | Over-correlation threshold          |
//! | `POLL_INTERVAL_MS`      | no       | `1000`  | Sleep between polls of an empty queue |

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use warden_core::naming::validate_queue_name;
use warden_db::{PgAttributeStore, PgQueueBackend};
use warden_plugins::builtin::register_builtins;
use warden_plugins::loader::load_dirs;
use warden_plugins::PluginRegistry;
use warden_worker::config::WorkerConfig;
use warden_worker::consumer::Consumer;
use warden_worker::runner::JobRunner;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warden_worker=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let queue = std::env::args().nth(1).unwrap_or_else(|| {
        tracing::error!("usage: warden-worker <queue>");
        std::process::exit(2);
    });
    if let Err(e) = validate_queue_name(&queue) {
        tracing::error!(queue = %queue, error = %e, "Invalid queue name");
        std::process::exit(2);
    }

    let config = WorkerConfig::from_env().unwrap_or_else(|e| {
        tracing::error!(error = %e, "Invalid worker configuration");
        std::process::exit(1);
    });

    // --- Plugins ---
    let registry = Arc::new(PluginRegistry::new());
    if let Err(e) = register_builtins(&registry) {
        tracing::error!(error = %e, "Failed to register built-in plugins");
        std::process::exit(1);
    }
    let report = load_dirs(&registry, &config.plugin_dirs);
    tracing::info!(
        loaded = report.loaded.len(),
        failed = report.failed.len(),
        total = registry.len(),
        "Plugins ready",
    );

    // --- Backend ---
    let pool = warden_db::create_pool(&config.queue_backend_url)
        .await
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to connect to queue backend");
            std::process::exit(1);
        });

    let runner = JobRunner::new(
        Arc::clone(&registry),
        Arc::new(PgAttributeStore::new(pool.clone())),
        config.correlation_threshold,
    );
    let consumer = Consumer::new(
        queue.clone(),
        Arc::new(PgQueueBackend::new(pool)),
        runner,
        config.poll_interval,
    );

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_cancel.cancel();
    });

    tracing::info!(queue = %queue, pid = std::process::id(), "Starting warden-worker");
    consumer.run(cancel).await;
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received SIGINT, finishing current job"),
        () = terminate => tracing::info!("Received SIGTERM, finishing current job"),
    }
}
