//! Tripwire honeypot - passive decoy listeners on commonly attacked TCP ports
//!
//! Every connection attempt is closed immediately and turned into an alert:
//! - Log line to the configured log file
//! - JSON notification to a remote collector
//! - Optional firewall ban of the source address, permanent or timed

pub mod alert;
pub mod ban;
pub mod config;
pub mod events;
pub mod handlers;
pub mod telemetry;

pub use alert::Dispatcher;
pub use config::Config;
pub use events::ConnectionEvent;
pub use handlers::{start_all, Honeypot};
