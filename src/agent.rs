//! Agent wiring: builds sessions from configuration and supervises them

use crate::config::AgentConfig;
use crate::report::{ReportError, ReportSender, ReportSink};
use crate::session::{ControlSession, ProcessGate, SessionError, SessionSummary};
use crate::transport::WebSocketConnector;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

/// Errors raised while assembling the agent
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Invalid collector URL {url}: {source}")]
    CollectorUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error(transparent)]
    Report(#[from] ReportError),
}

/// The agent process: one control session at a time plus a report sender
pub struct Agent {
    config: AgentConfig,
    collector_url: Url,
    sink: Arc<dyn ReportSink>,
}

impl Agent {
    /// Create an agent reporting through a [`ReportSender`] built from `config`
    pub fn new(config: AgentConfig) -> Result<Self, AgentError> {
        let sender = ReportSender::from_config(&config)?;
        Self::with_sink(config, Arc::new(sender))
    }

    /// Create an agent with a custom report sink
    pub fn with_sink(config: AgentConfig, sink: Arc<dyn ReportSink>) -> Result<Self, AgentError> {
        let collector_url =
            Url::parse(&config.collector_url).map_err(|source| AgentError::CollectorUrl {
                url: config.collector_url.clone(),
                source,
            })?;

        Ok(Self {
            config,
            collector_url,
            sink,
        })
    }

    /// Build a fresh, unconnected session
    pub fn session(&self) -> Result<ControlSession<WebSocketConnector>, SessionError> {
        let connector = WebSocketConnector::from_config(&self.config).map_err(SessionError::Connect)?;
        let gate = ProcessGate::new(self.config.process_probability, self.config.gate_seed);

        Ok(ControlSession::new(connector, self.collector_url.clone(), self.sink.clone()).with_gate(gate))
    }

    /// Run sessions until one ends and no reconnect is configured, or the
    /// redial budget is spent. Returns the outcome of the last session.
    pub async fn run(&self) -> Result<SessionSummary, SessionError> {
        let mut failures: u32 = 0;

        loop {
            let outcome = match self.session() {
                Ok(mut session) => session.run().await,
                Err(e) => Err(e),
            };

            let Some(policy) = &self.config.reconnect else {
                return outcome;
            };

            match &outcome {
                Err(SessionError::Connect(e)) => {
                    failures += 1;
                    warn!("Control dial failed ({} in a row): {:#}", failures, e);
                }
                _ => failures = 0,
            }

            if !policy.allows(failures) {
                warn!("Giving up after {} failed dials", failures);
                return outcome;
            }

            let delay = policy.delay_for(failures.max(1));
            info!("Reconnecting in {:?}", delay);
            tokio::time::sleep(delay).await;
        }
    }
}
