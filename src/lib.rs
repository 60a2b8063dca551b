//! Relay agent
//!
//! Holds one control-channel session at a time, runs every command it
//! receives as a local subprocess and reports the captured output to the
//! collector over a separate HTTPS connection.

pub mod agent;
pub mod command;
pub mod config;
pub mod report;
pub mod session;
pub mod transport;

pub use agent::{Agent, AgentError};
pub use config::{AgentConfig, ReconnectPolicy};
