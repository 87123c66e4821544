//! Shared doubles for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpStream;

use tripwire_honeypot::alert::{Notifier, NotifyError};
use tripwire_honeypot::ban::{BanController, Firewall, FirewallError};
use tripwire_honeypot::{Config, ConnectionEvent, Dispatcher};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Block(String),
    Unblock(String),
}

#[derive(Default)]
pub struct RecordingFirewall {
    calls: Mutex<Vec<Call>>,
}

impl RecordingFirewall {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Firewall for RecordingFirewall {
    async fn block(&self, ip: &str) -> Result<(), FirewallError> {
        self.calls.lock().unwrap().push(Call::Block(ip.to_string()));
        Ok(())
    }

    async fn unblock(&self, ip: &str) -> Result<(), FirewallError> {
        self.calls.lock().unwrap().push(Call::Unblock(ip.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<ConnectionEvent>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<ConnectionEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, event: &ConnectionEvent) -> Result<(), NotifyError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }

    fn endpoint(&self) -> &str {
        "http://collector.test/alert"
    }
}

/// A port that was free a moment ago
pub fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Loopback policy watching `ports` with every reaction switched off
pub fn loopback_policy(ports: Vec<u16>) -> Config {
    Config {
        bind_host: "127.0.0.1".to_string(),
        ports_to_monitor: ports,
        log_to_file: false,
        post_to_server: false,
        server_url: None,
        ban_ip: false,
        ..Config::default()
    }
}

pub struct Harness {
    pub dispatcher: Arc<Dispatcher>,
    pub firewall: Arc<RecordingFirewall>,
    pub notifier: Arc<RecordingNotifier>,
}

pub fn harness(config: Config) -> Harness {
    let firewall = Arc::new(RecordingFirewall::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let bans = Arc::new(BanController::new(firewall.clone()));
    let dispatcher = Arc::new(Dispatcher::new(Arc::new(config), Some(notifier.clone()), bans));
    Harness {
        dispatcher,
        firewall,
        notifier,
    }
}

/// Connect, retrying while the listener task is still binding
pub async fn connect(port: u16) -> TcpStream {
    for _ in 0..100 {
        if let Ok(stream) = TcpStream::connect(("127.0.0.1", port)).await {
            return stream;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("listener on port {} never came up", port);
}

pub async fn wait_until(mut check: impl FnMut() -> bool) {
    for _ in 0..250 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not reached in time");
}
