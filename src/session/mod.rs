//! Control session for the agent
//!
//! This module handles:
//! - Establishing the control channel
//! - Receiving command messages one at a time
//! - Gating, executing and reporting each command in sequence
//! - Tracking the session lifecycle until the channel closes

mod client;
mod gate;

pub use client::{ControlSession, SessionError, SessionSummary};
pub use gate::ProcessGate;
