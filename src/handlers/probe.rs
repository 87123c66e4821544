//! Port availability check

use tokio::net::TcpListener;
use tracing::debug;

/// Whether `port` on `host` is already taken by another service.
///
/// Any bind failure counts as "in use", including permission errors on
/// privileged ports. A successful probe listener is released immediately.
pub async fn port_in_use(host: &str, port: u16) -> bool {
    match TcpListener::bind((host, port)).await {
        Ok(listener) => {
            drop(listener);
            false
        }
        Err(e) => {
            debug!("Probe bind on {}:{} failed: {}", host, port, e);
            true
        }
    }
}
