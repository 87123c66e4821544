//! Alert dispatch: log line, remote notification and ban for each event

pub mod notify;

use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

use crate::ban::{BanController, Firewall};
use crate::config::Config;
use crate::events::ConnectionEvent;

pub use notify::{HttpNotifier, NotifyError, Notifier};

/// Tracing target carrying alert lines
pub const ALERT_TARGET: &str = "honeypot::alert";

/// Reacts to connection events according to the monitoring policy.
///
/// Each reaction is gated by its own policy flag and a failure in one never
/// stops the others. Nothing is reported back to the caller; outcomes only
/// show up in the log.
pub struct Dispatcher {
    config: Arc<Config>,
    notifier: Option<Arc<dyn Notifier>>,
    bans: Arc<BanController>,
}

impl Dispatcher {
    pub fn new(config: Arc<Config>, notifier: Option<Arc<dyn Notifier>>, bans: Arc<BanController>) -> Self {
        Self {
            config,
            notifier,
            bans,
        }
    }

    /// Wire up the HTTP notifier (when an endpoint is configured) and `firewall`
    pub fn from_config(config: Arc<Config>, firewall: Arc<dyn Firewall>) -> Result<Self> {
        let notifier: Option<Arc<dyn Notifier>> = match config.notify_endpoint() {
            Some(url) => {
                // A bad URL only costs alert delivery, the rest of the policy stays in force
                if let Err(e) = reqwest::Url::parse(url) {
                    warn!("server_url '{}' is not a valid URL, alert delivery will fail: {}", url, e);
                }
                Some(Arc::new(HttpNotifier::new(url, config.notify_timeout())?))
            }
            None => None,
        };
        let bans = Arc::new(BanController::new(firewall));
        Ok(Self::new(config, notifier, bans))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn bans(&self) -> &Arc<BanController> {
        &self.bans
    }

    pub async fn dispatch(&self, event: &ConnectionEvent) {
        if self.config.log_to_file {
            info!(
                target: ALERT_TARGET,
                port = event.port,
                remote_ip = %event.remote_ip,
                "{}",
                event.alert_line()
            );
        }

        if self.config.notify_endpoint().is_some() {
            if let Some(notifier) = &self.notifier {
                match notifier.notify(event).await {
                    Ok(()) => info!("Alert sent to server: {}", notifier.endpoint()),
                    Err(e) => warn!("Failed to send alert to server {}: {}", notifier.endpoint(), e),
                }
            }
        }

        if self.config.ban_ip {
            self.bans.apply_ban(&event.remote_ip, self.config.ban_duration).await;
        }
    }
}
