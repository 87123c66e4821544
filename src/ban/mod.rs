//! Source address banning with optional expiry
//!
//! A ban installs a firewall rule immediately. Timed bans also spawn a
//! detached task that lifts the rule once the ban duration, counted from the
//! moment the ban was requested, has elapsed. Overlapping bans on the same
//! address are not coordinated: each one schedules its own unban.

pub mod firewall;

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub use firewall::{Firewall, FirewallError, Iptables};

struct PendingUnban {
    ip: String,
    release: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

pub struct BanController {
    firewall: Arc<dyn Firewall>,
    pending: Mutex<Vec<PendingUnban>>,
}

impl BanController {
    pub fn new(firewall: Arc<dyn Firewall>) -> Self {
        Self {
            firewall,
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Block `ip`; lift the block after `duration_minutes` unless it is 0
    pub async fn apply_ban(&self, ip: &str, duration_minutes: u64) {
        let requested_at = Instant::now();

        if duration_minutes == 0 {
            match self.firewall.block(ip).await {
                Ok(()) => info!("Permanently banned IP: {}", ip),
                Err(e) => warn!("Failed to permanently ban IP {}: {}", ip, e),
            }
            return;
        }

        // No rule was installed, so there is nothing of ours to remove later
        if let Err(e) = self.firewall.block(ip).await {
            warn!("Failed to temporarily ban IP {}: {}", ip, e);
            return;
        }
        info!("Temporarily banned IP {} for {} minutes", ip, duration_minutes);

        let lifetime = Duration::from_secs(duration_minutes.saturating_mul(60));
        match requested_at.checked_add(lifetime) {
            Some(expires_at) => self.schedule_unban(ip, expires_at),
            None => warn!(
                "Ban duration of {} minutes is out of range, ban on {} will not expire",
                duration_minutes, ip
            ),
        }
    }

    /// Lift the block on `ip` right away
    pub async fn remove_ban(&self, ip: &str) {
        lift(self.firewall.as_ref(), ip).await;
    }

    /// Number of timed bans still waiting to expire
    pub fn pending_unbans(&self) -> usize {
        let mut pending = self.lock_pending();
        pending.retain(|p| !p.handle.is_finished());
        pending.len()
    }

    /// Run every pending unban now and wait for all of them to finish
    pub async fn release_pending(&self) {
        let pending: Vec<PendingUnban> = std::mem::take(&mut *self.lock_pending());
        if pending.is_empty() {
            return;
        }

        info!("Releasing {} pending temporary bans", pending.len());
        for unban in pending {
            let _ = unban.release.send(());
            if let Err(e) = unban.handle.await {
                warn!("Unban task for {} failed: {}", unban.ip, e);
            }
        }
    }

    fn schedule_unban(&self, ip: &str, expires_at: Instant) {
        let (release_tx, release_rx) = oneshot::channel();
        let firewall = self.firewall.clone();
        let task_ip = ip.to_string();

        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep_until(expires_at) => {
                    debug!("Ban on {} expired", task_ip);
                }
                Ok(()) = release_rx => {
                    debug!("Ban on {} released early", task_ip);
                }
            }
            lift(firewall.as_ref(), &task_ip).await;
        });

        let mut pending = self.lock_pending();
        pending.retain(|p| !p.handle.is_finished());
        pending.push(PendingUnban {
            ip: ip.to_string(),
            release: release_tx,
            handle,
        });
    }

    fn lock_pending(&self) -> MutexGuard<'_, Vec<PendingUnban>> {
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

async fn lift(firewall: &dyn Firewall, ip: &str) {
    match firewall.unblock(ip).await {
        Ok(()) => info!("Unbanned IP: {}", ip),
        Err(e) => warn!("Failed to unban IP {}: {}", ip, e),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub(crate) enum Call {
        Block(String),
        Unblock(String),
    }

    /// Firewall double that records calls and can be told to fail
    #[derive(Default)]
    pub(crate) struct RecordingFirewall {
        pub calls: Mutex<Vec<Call>>,
        pub fail: bool,
    }

    impl RecordingFirewall {
        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn rejected() -> FirewallError {
            FirewallError::Spawn {
                program: "iptables".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
            }
        }
    }

    #[async_trait]
    impl Firewall for RecordingFirewall {
        async fn block(&self, ip: &str) -> Result<(), FirewallError> {
            self.calls.lock().unwrap().push(Call::Block(ip.to_string()));
            if self.fail {
                return Err(Self::rejected());
            }
            Ok(())
        }

        async fn unblock(&self, ip: &str) -> Result<(), FirewallError> {
            self.calls.lock().unwrap().push(Call::Unblock(ip.to_string()));
            if self.fail {
                return Err(Self::rejected());
            }
            Ok(())
        }
    }

    fn controller() -> (Arc<RecordingFirewall>, BanController) {
        let firewall = Arc::new(RecordingFirewall::default());
        (firewall.clone(), BanController::new(firewall))
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_ban_expires_after_duration() {
        let (firewall, bans) = controller();

        bans.apply_ban("192.0.2.10", 5).await;
        assert_eq!(firewall.calls(), vec![Call::Block("192.0.2.10".into())]);
        assert_eq!(bans.pending_unbans(), 1);

        tokio::time::sleep(Duration::from_secs(5 * 60 - 1)).await;
        assert_eq!(firewall.calls().len(), 1);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(
            firewall.calls(),
            vec![
                Call::Block("192.0.2.10".into()),
                Call::Unblock("192.0.2.10".into())
            ]
        );
        assert_eq!(bans.pending_unbans(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_ban_never_unblocks() {
        let (firewall, bans) = controller();

        bans.apply_ban("192.0.2.11", 0).await;
        assert_eq!(bans.pending_unbans(), 0);

        tokio::time::sleep(Duration::from_secs(24 * 60 * 60)).await;
        assert_eq!(firewall.calls(), vec![Call::Block("192.0.2.11".into())]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_bans_schedule_independent_unbans() {
        let (firewall, bans) = controller();

        bans.apply_ban("192.0.2.12", 10).await;
        tokio::time::sleep(Duration::from_secs(60)).await;
        bans.apply_ban("192.0.2.12", 10).await;
        assert_eq!(bans.pending_unbans(), 2);

        // The first unban lifts the address even though the second ban is younger
        tokio::time::sleep(Duration::from_secs(9 * 60 + 1)).await;
        let unblocks = firewall
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Unblock(_)))
            .count();
        assert_eq!(unblocks, 1);

        tokio::time::sleep(Duration::from_secs(60)).await;
        let unblocks = firewall
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Unblock(_)))
            .count();
        assert_eq!(unblocks, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_block_schedules_no_unban() {
        let firewall = Arc::new(RecordingFirewall {
            fail: true,
            ..Default::default()
        });
        let bans = BanController::new(firewall.clone());

        bans.apply_ban("192.0.2.13", 10).await;
        assert_eq!(bans.pending_unbans(), 0);

        tokio::time::sleep(Duration::from_secs(11 * 60)).await;
        assert_eq!(firewall.calls(), vec![Call::Block("192.0.2.13".into())]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_out_of_range_duration_keeps_ban() {
        let (firewall, bans) = controller();

        bans.apply_ban("192.0.2.17", u64::MAX / 60).await;
        assert_eq!(bans.pending_unbans(), 0);

        tokio::time::sleep(Duration::from_secs(24 * 60 * 60)).await;
        assert_eq!(firewall.calls(), vec![Call::Block("192.0.2.17".into())]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_pending_unbans_now() {
        let (firewall, bans) = controller();

        bans.apply_ban("192.0.2.14", 30).await;
        bans.apply_ban("192.0.2.15", 0).await;
        bans.release_pending().await;

        assert_eq!(bans.pending_unbans(), 0);
        assert_eq!(
            firewall.calls(),
            vec![
                Call::Block("192.0.2.14".into()),
                Call::Block("192.0.2.15".into()),
                Call::Unblock("192.0.2.14".into())
            ]
        );
    }

    #[tokio::test]
    async fn test_remove_ban() {
        let (firewall, bans) = controller();
        bans.remove_ban("192.0.2.16").await;
        assert_eq!(firewall.calls(), vec![Call::Unblock("192.0.2.16".into())]);
    }
}
