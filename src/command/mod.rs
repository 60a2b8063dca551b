//! Command execution for the agent
//!
//! This module handles:
//! - Turning a parsed command line into a child process
//! - Capturing stdout and stderr as one combined byte stream
//! - Converting launch and exit failures into diagnostic text

mod executor;

pub use executor::{CommandExecutor, ExecutionResult};
