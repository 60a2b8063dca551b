//! Relay server
//!
//! Runs the two listeners of the relay: the control channel server that
//! pushes operator commands to connected agents, and the collector endpoint
//! that receives their results.

pub mod collector;
pub mod config;
pub mod control;

pub use collector::{CollectedReport, Collector};
pub use config::ServerConfig;
pub use control::{ChannelSource, CommandSource, ControlServer, LineSource};

use std::net::SocketAddr;
use thiserror::Error;

/// Errors that stop a listener
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
