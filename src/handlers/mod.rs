//! Listener orchestration
//!
//! One decoy listener task per configured port, all sharing the dispatcher
//! and a single shutdown flag. Ports already taken by a real service are
//! skipped.

pub mod probe;
pub mod tcp;

use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::alert::Dispatcher;
use crate::config::Config;

/// Running set of decoy listeners
pub struct Honeypot {
    dispatcher: Arc<Dispatcher>,
    shutdown: watch::Sender<bool>,
    listeners: JoinSet<u16>,
    ports: Vec<u16>,
}

/// Start a listener for every configured port that is not already in use
pub async fn start_all(dispatcher: Arc<Dispatcher>) -> Honeypot {
    let config = dispatcher.config();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut listeners = JoinSet::new();
    let mut ports = Vec::new();

    for &port in &config.ports_to_monitor {
        if probe::port_in_use(&config.bind_host, port).await {
            info!(
                "Port {} is already in use by a legitimate service. Skipping honeypot setup for this port.",
                port
            );
            continue;
        }

        let dispatcher = dispatcher.clone();
        let shutdown = shutdown_rx.clone();
        listeners.spawn(async move {
            if let Err(e) = tcp::start(port, dispatcher, shutdown).await {
                error!("Listener on port {} ({}) stopped: {:#}", port, Config::service_name(port), e);
            }
            port
        });
        ports.push(port);
        info!("Started honeypot on port {}", port);
    }

    info!("Started {} of {} decoy listeners", ports.len(), config.ports_to_monitor.len());

    Honeypot {
        dispatcher,
        shutdown: shutdown_tx,
        listeners,
        ports,
    }
}

impl Honeypot {
    /// Ports a listener was launched for, in launch order
    pub fn ports(&self) -> &[u16] {
        &self.ports
    }

    /// Listeners that have not stopped yet
    pub fn active(&self) -> usize {
        self.listeners.len()
    }

    /// Run until `signal` resolves, then shut down
    pub async fn run_until<F>(self, signal: F) -> usize
    where
        F: Future<Output = ()>,
    {
        signal.await;
        info!("Shutting down honeypot...");
        self.shutdown().await
    }

    /// Fire the shutdown flag and wait for every listener to stop.
    ///
    /// Returns the number of listeners joined.
    pub async fn shutdown(mut self) -> usize {
        self.shutdown.send_replace(true);

        let mut stopped = 0;
        while let Some(joined) = self.listeners.join_next().await {
            match joined {
                Ok(port) => {
                    stopped += 1;
                    debug!("Listener on port {} joined", port);
                }
                Err(e) => warn!("Listener task failed: {}", e),
            }
        }
        info!("All {} listeners stopped", stopped);

        let config = self.dispatcher.config();
        if config.release_bans_on_shutdown {
            self.dispatcher.bans().release_pending().await;
        } else {
            let pending = self.dispatcher.bans().pending_unbans();
            if pending > 0 {
                warn!("{} temporary bans are still in place and will not be lifted", pending);
            }
        }

        stopped
    }
}
