//! Collector endpoint
//!
//! Receives one execution result per request and logs it. The collector
//! accepts anything: no validation, no size limit, no rate limiting.

mod endpoint;

pub use endpoint::{CollectedReport, Collector};
