//! Passive TCP decoy listener, one per monitored port

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::alert::Dispatcher;
use crate::config::Config;
use crate::events::ConnectionEvent;

/// Resolves once the shutdown flag is set or the sender is gone
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

/// Listen on `port` until shutdown, reporting every connection attempt.
///
/// A bind failure only takes this port out of service and returns `Ok`. An
/// accept error stops the listener and is returned to the caller.
pub async fn start(port: u16, dispatcher: Arc<Dispatcher>, mut shutdown: watch::Receiver<bool>) -> Result<()> {
    // Same (host, port) resolution as the availability check
    let host = dispatcher.config().bind_host.as_str();
    let listener = match TcpListener::bind((host, port)).await {
        Ok(l) => l,
        Err(e) => {
            warn!("Failed to start listener on {} port {}: {}", host, port, e);
            return Ok(());
        }
    };

    info!(
        "Started listening on port {} ({}) as honeypot",
        port,
        Config::service_name(port)
    );

    loop {
        tokio::select! {
            biased;

            _ = shutdown_requested(&mut shutdown) => {
                info!("Stopping listener on port {}", port);
                return Ok(());
            }
            accepted = listener.accept() => {
                let (socket, peer_addr) = accepted
                    .with_context(|| format!("Accept error on port {}", port))?;

                let peer = peer_addr.to_string();
                debug!("Connection attempt detected on port {} from {}", port, peer);

                // Nothing is read or written: close before reacting
                drop(socket);

                let event = ConnectionEvent::from_peer(port, &peer);
                dispatcher.dispatch(&event).await;
            }
        }
    }
}
