//! Connection events produced by the decoy listeners

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::net::SocketAddr;

/// A single connection attempt against a monitored port
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionEvent {
    pub port: u16,
    pub remote_ip: String,
    pub timestamp: DateTime<Utc>,
}

impl ConnectionEvent {
    pub fn new(port: u16, remote_ip: String) -> Self {
        Self {
            port,
            remote_ip,
            timestamp: Utc::now(),
        }
    }

    /// Build an event from the textual peer address reported by the socket
    pub fn from_peer(port: u16, peer: &str) -> Self {
        Self::new(port, remote_ip(peer))
    }

    /// Human-readable alert line written to the log sink
    pub fn alert_line(&self) -> String {
        format!(
            "{} - Alert: Connection attempt detected on port {} from IP {}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.port,
            self.remote_ip
        )
    }
}

/// Strip the ephemeral port from a peer address, keeping the raw text if it
/// does not parse as `host:port`
pub fn remote_ip(peer: &str) -> String {
    match peer.parse::<SocketAddr>() {
        Ok(addr) => addr.ip().to_string(),
        Err(e) => {
            tracing::debug!("Failed to parse remote address {:?}: {}", peer, e);
            peer.to_string()
        }
    }
}
