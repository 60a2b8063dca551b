//! Control channel server
//!
//! This module handles:
//! - Accepting control connections and upgrading them to WebSocket
//! - Pulling the next command from a shared command source
//! - Pushing each command to the connected agent as one message

mod listener;
mod source;

pub use listener::{ControlError, ControlServer};
pub use source::{ChannelSource, CommandSource, LineSource, StdinSource};
