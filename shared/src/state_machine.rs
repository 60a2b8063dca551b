//! Control Session State Machine
//!
//! Defines the valid lifecycle transitions of one control-channel session:
//! ```text
//! Connecting --Dialed--> Open --RemoteClosed/ReadFailed/LocalClose--> Closed
//!     |
//!     +--DialFailed--> Failed
//! ```
//! `Closed` and `Failed` are terminal; a new session starts over in `Connecting`.

use std::fmt;

/// Lifecycle state of a control session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Dialing the control endpoint
    Connecting,
    /// Channel established, waiting for commands
    Open,
    /// Channel released after a close or read error
    Closed,
    /// Initial dial failed
    Failed,
}

impl SessionState {
    /// Check if no further transition can leave this state
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Failed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Connecting => write!(f, "connecting"),
            SessionState::Open => write!(f, "open"),
            SessionState::Closed => write!(f, "closed"),
            SessionState::Failed => write!(f, "failed"),
        }
    }
}

/// Events that drive session transitions
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Control channel handshake completed
    Dialed,
    /// Control channel could not be established
    DialFailed { reason: String },
    /// Peer sent a close frame or the stream ended
    RemoteClosed,
    /// Reading from the channel failed
    ReadFailed { reason: String },
    /// Session is shutting the channel down itself
    LocalClose,
}

/// Result of a state transition attempt
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionResult {
    /// Transition was valid and state changed
    Success(SessionState),
    /// Transition was invalid from current state
    Invalid { from: SessionState, event: SessionEvent },
}

/// The state machine owned by a single control session
#[derive(Debug)]
pub struct SessionStateMachine {
    current_state: SessionState,
    last_error: Option<String>,
}

impl Default for SessionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStateMachine {
    /// Create a new state machine in Connecting state
    pub fn new() -> Self {
        Self {
            current_state: SessionState::Connecting,
            last_error: None,
        }
    }

    /// Get current state
    pub fn state(&self) -> SessionState {
        self.current_state
    }

    /// Reason recorded by the last failing event, if any
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Process an event and return the transition result
    pub fn process_event(&mut self, event: SessionEvent) -> TransitionResult {
        let Some(next) = self.get_next_state(&event) else {
            return TransitionResult::Invalid {
                from: self.current_state,
                event,
            };
        };

        match event {
            SessionEvent::DialFailed { reason } | SessionEvent::ReadFailed { reason } => {
                self.last_error = Some(reason);
            }
            _ => {}
        }

        self.current_state = next;
        TransitionResult::Success(next)
    }

    /// Get the next state for a given event, if the transition is valid
    fn get_next_state(&self, event: &SessionEvent) -> Option<SessionState> {
        use SessionEvent::*;
        use SessionState::*;

        match (self.current_state, event) {
            (Connecting, Dialed) => Some(Open),
            (Connecting, DialFailed { .. }) => Some(Failed),

            (Open, RemoteClosed | ReadFailed { .. } | LocalClose) => Some(Closed),

            _ => None,
        }
    }
}
