//! Report channel for the agent
//!
//! Every execution result is delivered to the collector as the body of one
//! POST on its own short-lived connection. A failed delivery is surfaced to
//! the caller and never retried.

mod sender;

pub use sender::{ReportError, ReportSender, ReportSink};
