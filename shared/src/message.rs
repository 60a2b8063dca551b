//! Control channel message mapping
//!
//! Each WebSocket data frame carries exactly one command:
//! ```text
//! [ text or binary frame ] -> one CommandMessage
//! ```
//! Message boundaries come from the WebSocket layer, so no extra framing is
//! applied on top of it.

use bytes::Bytes;
use tokio_tungstenite::tungstenite::Message;

/// What a single control-channel frame means to the relay
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    /// A command line to execute (may be empty)
    Command(Bytes),
    /// Transport-level ping/pong, carries no command
    Keepalive,
    /// The peer closed the channel
    Close { reason: Option<String> },
}

impl ControlMessage {
    /// Interpret a WebSocket frame received from the peer
    pub fn from_frame(frame: Message) -> Self {
        match frame {
            Message::Text(text) => ControlMessage::Command(Bytes::from(text.into_bytes())),
            Message::Binary(data) => ControlMessage::Command(Bytes::from(data)),
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => ControlMessage::Keepalive,
            Message::Close(frame) => ControlMessage::Close {
                reason: frame
                    .map(|f| f.reason.into_owned())
                    .filter(|reason| !reason.is_empty()),
            },
        }
    }

    /// Check if this is a command message
    pub fn is_command(&self) -> bool {
        matches!(self, ControlMessage::Command(_))
    }
}

/// Build the frame that carries one command to the agent
pub fn command_frame(command: impl Into<String>) -> Message {
    Message::Text(command.into())
}
