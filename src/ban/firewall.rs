//! Firewall backends used to block and unblock source addresses

use async_trait::async_trait;
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum FirewallError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exited with {status}: {stderr}")]
    Rejected {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
}

/// Block/unblock capability for a single source address
#[async_trait]
pub trait Firewall: Send + Sync {
    /// Install a rule dropping all inbound traffic from `ip`
    async fn block(&self, ip: &str) -> Result<(), FirewallError>;

    /// Remove the rule installed by [`Firewall::block`]
    async fn unblock(&self, ip: &str) -> Result<(), FirewallError>;
}

/// `iptables` INPUT-chain DROP rules
pub struct Iptables {
    program: String,
    chain: String,
}

impl Iptables {
    pub fn new() -> Self {
        Self {
            program: "iptables".to_string(),
            chain: "INPUT".to_string(),
        }
    }

    /// Use a different binary (e.g. `ip6tables`) or chain
    pub fn with_program(program: impl Into<String>, chain: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            chain: chain.into(),
        }
    }

    fn rule_args<'a>(&'a self, action: &'a str, ip: &'a str) -> [&'a str; 6] {
        [action, self.chain.as_str(), "-s", ip, "-j", "DROP"]
    }

    async fn run(&self, action: &str, ip: &str) -> Result<(), FirewallError> {
        let output = Command::new(&self.program)
            .args(self.rule_args(action, ip))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| FirewallError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(FirewallError::Rejected {
                program: self.program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(())
    }
}

impl Default for Iptables {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Firewall for Iptables {
    async fn block(&self, ip: &str) -> Result<(), FirewallError> {
        self.run("-A", ip).await
    }

    async fn unblock(&self, ip: &str) -> Result<(), FirewallError> {
        self.run("-D", ip).await
    }
}
