//! Transport trait abstraction for the control channel

use anyhow::Result;
use async_trait::async_trait;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

/// An established, message-oriented control channel
#[async_trait]
pub trait ControlChannel: Send {
    /// Wait for the next frame. `None` means the stream has ended.
    async fn next_frame(&mut self) -> Option<Result<Message, WsError>>;

    /// Close the channel gracefully
    async fn shutdown(&mut self) -> Result<()>;

    /// Human-readable remote identity for logs
    fn peer(&self) -> &str;
}

/// Factory for creating control channel connections
#[async_trait]
pub trait ControlConnector: Send + Sync {
    /// The channel type this connector produces
    type Channel: ControlChannel;

    /// Attempt to connect, returning a channel on success
    async fn connect(&self) -> Result<Self::Channel>;

    /// Human-readable name for this transport
    fn name(&self) -> &'static str;
}
