//! Relay Shared Protocol Types
//!
//! This crate provides the types shared by the agent and the server side of
//! the relay: command-line parsing, control-message decoding, the session
//! state machine and TLS configuration.

pub mod command;
pub mod message;
pub mod state_machine;
pub mod tls;

pub use command::{CommandLine, EmptyCommand};
pub use message::ControlMessage;
pub use state_machine::{SessionEvent, SessionState, SessionStateMachine, TransitionResult};

/// Compiled-in endpoints and credential paths
pub mod defaults {
    use std::time::Duration;

    /// Port the control channel server listens on
    pub const CONTROL_PORT: u16 = 8888;

    /// Path the control channel is upgraded on
    pub const CONTROL_PATH: &str = "/ws";

    /// Port the collector endpoint listens on
    pub const COLLECTOR_PORT: u16 = 4433;

    /// Control endpoint the agent dials
    pub const CONTROL_URL: &str = "wss://127.0.0.1:8888/ws";

    /// Collector endpoint the agent reports to
    pub const COLLECTOR_URL: &str = "https://127.0.0.1:4433/";

    /// Server certificate (PEM)
    pub const CERT_PATH: &str = "server.crt";

    /// Server private key (PEM)
    pub const KEY_PATH: &str = "server.key";

    /// Control channel dial timeout
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

    /// Deadline for a single report exchange
    pub const REPORT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Delimiter the collector prints around each report body
    pub const REPORT_DELIMITER: &str = "---------";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_urls_match_ports() {
        assert!(defaults::CONTROL_URL.contains(&defaults::CONTROL_PORT.to_string()));
        assert!(defaults::CONTROL_URL.ends_with(defaults::CONTROL_PATH));
        assert!(defaults::COLLECTOR_URL.contains(&defaults::COLLECTOR_PORT.to_string()));
    }
}
