//! OSO Install Strategy Kubernetes Operator
//!
//! Main entry point for the operator. Sets up the Kubernetes client,
//! starts the managed-object watches, and runs the Installation controller.

use kube::Client;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use install_strategy_operator::{
    config::OperatorConfig,
    controllers::{installation_controller, Context},
    metrics,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = OperatorConfig::from_env()?;
    info!(
        metrics_port = config.metrics_port,
        watch_namespace = config.watch_namespace.as_deref().unwrap_or("<all>"),
        "Starting OSO Install Strategy Operator"
    );

    let client = Client::try_default().await?;

    // Probes answer while the caches fill; /readyz stays 503 until they have
    let metrics_port = config.metrics_port;
    let metrics_handle = tokio::spawn(metrics::serve(metrics_port));

    // Managed-object watches start here and feed the backup expectations
    let context = Context::new(client, config);

    tokio::select! {
        synced = context.stores.wait_until_ready() => synced?,
        _ = shutdown_signal() => {
            info!("Shutdown requested before watch caches synced");
            return Ok(());
        }
    }
    metrics::mark_ready();

    let controller_handle = tokio::spawn(installation_controller::run(context));

    tokio::select! {
        _ = controller_handle => {
            error!("Installation controller exited unexpectedly");
        }
        _ = metrics_handle => {
            error!("Metrics server exited unexpectedly");
        }
        _ = shutdown_signal() => {
            info!("Received shutdown signal, stopping operator");
        }
    }

    info!("OSO Install Strategy Operator stopped");
    Ok(())
}

/// Initialize tracing subscriber
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info,install_strategy_operator=debug,kube=warn,hyper=warn")
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install CTRL+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received CTRL+C signal");
        }
        _ = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}
