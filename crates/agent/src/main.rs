//! `warden-agent` -- worker-node daemon.
//!
//! Supervises one `warden-worker` subprocess per live queue and keeps a
//! control connection to the master, which can add, remove, pause and
//! reset queues remotely. See [`AgentConfig`] for the environment.
//!
//! Plugins run inside the workers. The agent only checks the plugin
//! directories at boot and passes them on (see `warden_agent::plugins`).

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use warden_agent::config::AgentConfig;
use warden_agent::handlers::{register_handlers, NodeControl};
use warden_agent::plugins::{check_plugin_dirs, worker_env};
use warden_agent::session::{self, SessionConfig};
use warden_agent::supervisor::{ProcessSupervisor, SupervisorConfig};
use warden_protocol::ConnectionManager;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warden_agent=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AgentConfig::from_env().unwrap_or_else(|e| {
        tracing::error!(error = %e, "Invalid agent configuration");
        std::process::exit(1);
    });

    tracing::info!(
        worker_name = %config.worker_name,
        control_url = %config.control_url,
        remote_control = config.remote_control,
        "Starting warden-agent",
    );

    // --- Plugins ---
    let check = check_plugin_dirs(&config.plugin_dirs).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to register built-in plugins");
        std::process::exit(1);
    });
    for failure in &check.failed {
        tracing::warn!(path = %failure.path.display(), error = %failure.error, "Plugin not loaded");
    }
    tracing::info!(plugins = ?check.available, "Plugins available to workers");

    // --- Supervisor ---
    let supervisor = Arc::new(ProcessSupervisor::new(SupervisorConfig {
        program: config.worker_bin.clone(),
        args: Vec::new(),
        stop_grace: config.stop_grace,
        env: worker_env(&config.plugin_dirs),
    }));

    if config.remote_control {
        tracing::info!("Remote control enabled, waiting for the master to assign queues");
    } else {
        for queue in &config.desired_queues {
            if let Err(e) = supervisor.start(queue) {
                tracing::error!(queue = %queue, error = %e, "Failed to start queue worker");
            }
        }
    }

    // --- Control connection ---
    let manager = Arc::new(ConnectionManager::new());
    let control = Arc::new(NodeControl::new(
        Arc::clone(&supervisor),
        config.desired_queues.clone(),
    ));
    register_handlers(&manager, control);

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_cancel.cancel();
    });

    let session_config = SessionConfig {
        url: config.control_url.clone(),
        api_key: config.api_key.clone(),
        worker_name: config.worker_name.clone(),
        reconnect: config.reconnect.clone(),
    };
    if let Err(e) = session::run(&session_config, manager, cancel).await {
        tracing::error!(error = %e, "Control loop aborted");
    }

    // --- Cleanup ---
    supervisor.stop_all().await;
    tracing::info!("Shutdown complete");
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
        () = ctrl_c => tracing::info!("Received SIGINT, shutting down"),
        () = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
