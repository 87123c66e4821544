use anyhow::Result;
use std::sync::Arc;
use tracing::{error, info, warn};

use tripwire_honeypot::ban::Iptables;
use tripwire_honeypot::{handlers, telemetry, Config, Dispatcher};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (before any other initialization)
    let _ = dotenvy::dotenv();

    // A broken policy file is not fatal, but it can only be reported once the
    // log file is open
    let (config, load_error) = match Config::load() {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };

    telemetry::init(&config)?;

    if let Some(e) = load_error {
        warn!("Failed to load config: {:#}. Using default configuration.", e);
    } else {
        info!("Configuration loaded");
    }

    let config = Arc::new(config);
    let dispatcher = Arc::new(Dispatcher::from_config(config, Arc::new(Iptables::new()))?);

    let honeypot = handlers::start_all(dispatcher).await;
    info!("Honeypot is running. Press Ctrl+C to stop.");

    honeypot.run_until(shutdown_signal()).await;
    info!("Honeypot stopped.");

    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
