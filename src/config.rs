//! Agent configuration

use relay_shared::defaults;
use std::path::PathBuf;
use std::time::Duration;

/// Reconnection behavior after a session ends
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Delay before the first redial
    pub initial_delay: Duration,
    /// Upper bound for the doubling delay
    pub max_delay: Duration,
    /// Redials allowed after consecutive dial failures (`None` retries forever)
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_attempts: None,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before redial number `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        self.initial_delay
            .saturating_mul(1 << shift)
            .min(self.max_delay)
    }

    /// Check if another dial is allowed after `failures` consecutive failures
    pub fn allows(&self, failures: u32) -> bool {
        self.max_attempts.map_or(true, |max| failures <= max)
    }
}

/// Configuration for the agent
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Control endpoint (`ws://` or `wss://`)
    pub control_url: String,
    /// Collector endpoint (`http://` or `https://`)
    pub collector_url: String,
    /// Verify server certificates on both channels
    pub verify_peer_certificate: bool,
    /// Extra PEM trust anchor, e.g. the collector's self-signed certificate
    pub trust_anchor: Option<PathBuf>,
    /// Probability that a non-empty command is processed, in `[0, 1]`
    pub process_probability: f64,
    /// Seed for the process gate (entropy when unset)
    pub gate_seed: Option<u64>,
    /// Control channel dial timeout
    pub connect_timeout: Duration,
    /// Deadline for one report exchange (`None` waits indefinitely)
    pub report_timeout: Option<Duration>,
    /// Redial policy; `None` runs a single session
    pub reconnect: Option<ReconnectPolicy>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            control_url: defaults::CONTROL_URL.into(),
            collector_url: defaults::COLLECTOR_URL.into(),
            verify_peer_certificate: true,
            trust_anchor: Some(PathBuf::from(defaults::CERT_PATH)),
            process_probability: 1.0,
            gate_seed: None,
            connect_timeout: defaults::CONNECT_TIMEOUT,
            report_timeout: Some(defaults::REPORT_TIMEOUT),
            reconnect: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_deterministic_and_verified() {
        let config = AgentConfig::default();
        assert_eq!(config.process_probability, 1.0);
        assert!(config.verify_peer_certificate);
        assert!(config.reconnect.is_none());
    }

    #[test]
    fn test_backoff_doubles_up_to_max() {
        let policy = ReconnectPolicy {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(500),
            max_attempts: Some(5),
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for(4), Duration::from_millis(500));
        assert_eq!(policy.delay_for(40), Duration::from_millis(500));
    }

    #[test]
    fn test_attempt_budget() {
        let limited = ReconnectPolicy {
            max_attempts: Some(2),
            ..Default::default()
        };
        assert!(limited.allows(2));
        assert!(!limited.allows(3));
        assert!(ReconnectPolicy::default().allows(u32::MAX));
    }
}
