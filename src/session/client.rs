//! Control client session - receives commands and relays their results

use super::gate::ProcessGate;
use crate::command::CommandExecutor;
use crate::report::ReportSink;
use crate::transport::{ControlChannel, ControlConnector};
use relay_shared::{
    CommandLine, ControlMessage, SessionEvent, SessionState, SessionStateMachine,
    TransitionResult,
};
use std::sync::Arc;
use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;
use tracing::{debug, error, info, warn};
use url::Url;

/// Errors that end a control session
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Failed to connect to control endpoint: {0:#}")]
    Connect(anyhow::Error),

    #[error("Control channel read failed: {0}")]
    ChannelRead(#[source] WsError),

    #[error("Session already {0}")]
    Finished(SessionState),
}

/// Counters collected over the lifetime of one session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSummary {
    /// Command messages received
    pub received: u64,
    /// Empty or whitespace-only messages
    pub skipped_empty: u64,
    /// Messages dropped by the process gate
    pub gated: u64,
    /// Commands handed to the executor
    pub executed: u64,
    /// Reports acknowledged with a 2xx status
    pub reports_delivered: u64,
    /// Reports answered with a non-2xx status
    pub reports_rejected: u64,
    /// Reports that could not be transmitted
    pub reports_failed: u64,
}

/// One control-channel session, from dial to close
pub struct ControlSession<C: ControlConnector> {
    connector: C,
    collector_url: Url,
    executor: CommandExecutor,
    sink: Arc<dyn ReportSink>,
    gate: ProcessGate,
    fsm: SessionStateMachine,
    summary: SessionSummary,
}

impl<C: ControlConnector> ControlSession<C> {
    /// Create a new session that reports to `collector_url` through `sink`
    pub fn new(connector: C, collector_url: Url, sink: Arc<dyn ReportSink>) -> Self {
        Self {
            connector,
            collector_url,
            executor: CommandExecutor::new(),
            sink,
            gate: ProcessGate::always(),
            fsm: SessionStateMachine::new(),
            summary: SessionSummary::default(),
        }
    }

    /// Replace the process gate (admits everything by default)
    pub fn with_gate(mut self, gate: ProcessGate) -> Self {
        self.gate = gate;
        self
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.fsm.state()
    }

    /// Dial the control endpoint and process commands until the channel closes.
    ///
    /// A remote close ends the session with `Ok`; a dial or read failure ends
    /// it with the corresponding error. Report failures never end it.
    pub async fn run(&mut self) -> Result<SessionSummary, SessionError> {
        if self.fsm.state() != SessionState::Connecting {
            return Err(SessionError::Finished(self.fsm.state()));
        }

        info!("Dialing control endpoint via {}", self.connector.name());
        let mut channel = match self.connector.connect().await {
            Ok(channel) => channel,
            Err(e) => {
                self.transition(SessionEvent::DialFailed {
                    reason: format!("{e:#}"),
                });
                return Err(SessionError::Connect(e));
            }
        };
        self.transition(SessionEvent::Dialed);
        info!(peer = channel.peer(), "Connected to control channel");

        let outcome = self.serve(&mut channel).await;

        if let Err(e) = channel.shutdown().await {
            debug!("Control channel shutdown: {}", e);
        }
        info!(
            peer = channel.peer(),
            received = self.summary.received,
            executed = self.summary.executed,
            "Control session closed"
        );

        outcome
    }

    async fn serve(&mut self, channel: &mut C::Channel) -> Result<SessionSummary, SessionError> {
        loop {
            let frame = match channel.next_frame().await {
                Some(Ok(frame)) => frame,
                Some(Err(e)) => {
                    error!("Control channel read error: {}", e);
                    self.transition(SessionEvent::ReadFailed {
                        reason: e.to_string(),
                    });
                    return Err(SessionError::ChannelRead(e));
                }
                None => {
                    info!("Control channel ended");
                    self.transition(SessionEvent::RemoteClosed);
                    return Ok(self.summary.clone());
                }
            };

            match ControlMessage::from_frame(frame) {
                ControlMessage::Command(raw) => self.handle_command(&raw).await,
                ControlMessage::Keepalive => {}
                ControlMessage::Close { reason } => {
                    info!(reason = reason.as_deref().unwrap_or(""), "Control channel closed by peer");
                    self.transition(SessionEvent::RemoteClosed);
                    return Ok(self.summary.clone());
                }
            }
        }
    }

    /// Execute one command message and report its result
    async fn handle_command(&mut self, raw: &[u8]) {
        self.summary.received += 1;

        let Some(command) = CommandLine::parse(raw) else {
            info!("Received empty command");
            self.summary.skipped_empty += 1;
            return;
        };

        if !self.gate.admit() {
            info!(%command, "Command not selected by process gate");
            self.summary.gated += 1;
            return;
        }

        let result = self.executor.execute(&command).await;
        self.summary.executed += 1;

        match self.sink.send(&self.collector_url, result.output).await {
            Ok(status) if status.is_success() => {
                info!(%status, "Report delivered");
                self.summary.reports_delivered += 1;
            }
            Ok(status) => {
                warn!(%status, "Collector rejected report");
                self.summary.reports_rejected += 1;
            }
            Err(e) => {
                error!("Failed to deliver report: {}", e);
                self.summary.reports_failed += 1;
            }
        }
    }

    fn transition(&mut self, event: SessionEvent) {
        match self.fsm.process_event(event) {
            TransitionResult::Success(state) => debug!("Session state -> {}", state),
            TransitionResult::Invalid { from, event } => {
                warn!("Ignoring {:?} in state {}", event, from)
            }
        }
    }
}
