//! Configuration management

use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;

/// Environment variable naming the policy file (extension optional)
pub const CONFIG_FILE_ENV: &str = "HONEYPOT_CONFIG_FILE";

const DEFAULT_CONFIG_FILE: &str = "config";

/// Ports watched when the policy does not name any
pub const DEFAULT_PORTS: &[(u16, &str)] = &[
    (445, "smb"),
    (135, "msrpc"),
    (139, "netbios"),
    (5985, "winrm"),
    (3389, "rdp"),
    (22, "ssh"),
    (23, "telnet"),
    (1433, "mssql"),
    (3306, "mysql"),
    (5900, "vnc"),
    (1723, "pptp"),
    (8000, "http-alt"),
    (8080, "http-proxy"),
    (3268, "global-catalog"),
    (389, "ldap"),
    (636, "ldaps"),
    (21, "ftp"),
];

/// Monitoring policy shared read-only by every listener
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Emit an alert line to the log for every connection
    #[serde(default = "default_true")]
    pub log_to_file: bool,
    /// POST every alert as JSON to `server_url`
    #[serde(default)]
    pub post_to_server: bool,
    #[serde(default)]
    pub server_url: Option<String>,
    /// Block the source address with the firewall
    #[serde(default = "default_true")]
    pub ban_ip: bool,
    /// Ban length in minutes, 0 means permanent
    #[serde(default = "default_ban_duration")]
    pub ban_duration: u64,
    #[serde(default = "default_ports")]
    pub ports_to_monitor: Vec<u16>,
    #[serde(default = "default_log_file")]
    pub log_file: String,
    /// Address every decoy listener binds to
    #[serde(default = "default_bind_host")]
    pub bind_host: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Upper bound for a single alert delivery
    #[serde(default = "default_notify_timeout_secs")]
    pub notify_timeout_secs: u64,
    /// Lift pending temporary bans when the honeypot stops
    #[serde(default)]
    pub release_bans_on_shutdown: bool,
}

fn default_true() -> bool {
    true
}

fn default_ban_duration() -> u64 {
    10
}

fn default_ports() -> Vec<u16> {
    DEFAULT_PORTS.iter().map(|(port, _)| *port).collect()
}

fn default_log_file() -> String {
    "./LogFile.txt".to_string()
}

fn default_bind_host() -> String {
    "0.0.0.0".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_notify_timeout_secs() -> u64 {
    10
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_to_file: true,
            post_to_server: false,
            server_url: None,
            ban_ip: true,
            ban_duration: default_ban_duration(),
            ports_to_monitor: default_ports(),
            log_file: default_log_file(),
            bind_host: default_bind_host(),
            log_level: default_log_level(),
            notify_timeout_secs: default_notify_timeout_secs(),
            release_bans_on_shutdown: false,
        }
    }
}

impl Config {
    /// Load from the file named by `HONEYPOT_CONFIG_FILE` (default `config.*`)
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_FILE_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::load_from(&path)
    }

    /// Load from `path`, with `HONEYPOT_*` environment variables layered on top
    pub fn load_from(path: &str) -> Result<Self> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(
                config::Environment::with_prefix("HONEYPOT")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("ports_to_monitor"),
            );

        let settings = builder.build()?;
        let mut config: Config = settings.try_deserialize()?;
        config.apply_fallbacks();

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Replace empty values with their built-in counterparts
    fn apply_fallbacks(&mut self) {
        if self.ports_to_monitor.is_empty() {
            self.ports_to_monitor = default_ports();
        }
        if self.log_file.trim().is_empty() {
            self.log_file = default_log_file();
        }
        if self.server_url.as_deref().is_some_and(|url| url.trim().is_empty()) {
            self.server_url = None;
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.ports_to_monitor.contains(&0) {
            anyhow::bail!("Invalid port in ports_to_monitor: 0 is not allowed");
        }
        if self.bind_host.is_empty() {
            anyhow::bail!("bind_host cannot be empty");
        }

        if self.notify_timeout_secs == 0 {
            anyhow::bail!("notify_timeout_secs must be greater than 0");
        }

        // Validate logging level
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            anyhow::bail!("Invalid logging level '{}'. Must be one of: {:?}", self.log_level, valid_levels);
        }

        Ok(())
    }

    /// Endpoint for outbound alerts, if remote notification is switched on
    pub fn notify_endpoint(&self) -> Option<&str> {
        if !self.post_to_server {
            return None;
        }
        self.server_url.as_deref()
    }

    pub fn notify_timeout(&self) -> Duration {
        Duration::from_secs(self.notify_timeout_secs)
    }

    /// Service name for a well-known port, used only for log readability
    pub fn service_name(port: u16) -> &'static str {
        DEFAULT_PORTS
            .iter()
            .find(|(p, _)| *p == port)
            .map(|(_, name)| *name)
            .unwrap_or("tcp")
    }
}
