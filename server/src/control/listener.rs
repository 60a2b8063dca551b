//! Control channel listener and per-agent push loop

use super::source::CommandSource;
use crate::ServerError;
use futures::{SinkExt, StreamExt};
use relay_shared::{defaults, message};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_rustls::TlsAcceptor;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};
use tracing::{debug, info, warn};

/// Errors that end one control connection
#[derive(Error, Debug)]
pub enum ControlError {
    #[error("TLS handshake failed: {0}")]
    Tls(#[source] io::Error),

    #[error("WebSocket handshake failed: {0}")]
    Handshake(#[source] WsError),

    #[error("Command source failed: {0}")]
    Source(#[source] io::Error),

    #[error("Write to agent failed: {0}")]
    Write(#[source] WsError),
}

/// Accepts agents and pushes commands to them
pub struct ControlServer<S: CommandSource> {
    listener: TcpListener,
    tls: Option<TlsAcceptor>,
    source: Arc<Mutex<S>>,
}

impl<S: CommandSource> ControlServer<S> {
    /// Bind the listening socket
    pub async fn bind(
        addr: SocketAddr,
        tls: Option<TlsAcceptor>,
        source: S,
    ) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;

        Ok(Self {
            listener,
            tls,
            source: Arc::new(Mutex::new(source)),
        })
    }

    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections forever, one task per agent
    pub async fn run(self) -> Result<(), ServerError> {
        let addr = self.listener.local_addr()?;
        let scheme = if self.tls.is_some() { "wss" } else { "ws" };
        info!(
            "Control server listening on {}://{}{}",
            scheme,
            addr,
            defaults::CONTROL_PATH
        );

        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    debug!("New control connection from {}", peer);
                    let tls = self.tls.clone();
                    let source = self.source.clone();

                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, peer, tls, source).await {
                            warn!(%peer, "Control connection ended: {}", e);
                        }
                    });
                }
                Err(e) => {
                    warn!("Error accepting control connection: {}", e);
                }
            }
        }
    }
}

async fn handle_connection<S: CommandSource>(
    stream: TcpStream,
    peer: SocketAddr,
    tls: Option<TlsAcceptor>,
    source: Arc<Mutex<S>>,
) -> Result<(), ControlError> {
    if let Some(acceptor) = tls {
        let tls_stream = acceptor.accept(stream).await.map_err(ControlError::Tls)?;
        let ws = accept_control(tls_stream).await?;
        info!(%peer, "Control channel established (tls)");
        return push_commands(ws, peer, source).await;
    }

    let ws = accept_control(stream).await?;
    info!(%peer, "Control channel established");
    push_commands(ws, peer, source).await
}

/// Upgrade to WebSocket, only on the control path. Any origin is accepted.
async fn accept_control<T>(stream: T) -> Result<WebSocketStream<T>, ControlError>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    let callback = |request: &Request, response: Response| {
        let path = request.uri().path();
        if path != defaults::CONTROL_PATH {
            warn!(path, "Rejecting control upgrade on unknown path");
            return Err(error_response(404, "not found"));
        }
        Ok(response)
    };

    accept_hdr_async(stream, callback)
        .await
        .map_err(ControlError::Handshake)
}

fn error_response(status: u16, message: &str) -> ErrorResponse {
    let mut response = ErrorResponse::new(Some(message.to_string()));
    if let Ok(status) = status.try_into() {
        *response.status_mut() = status;
    }
    response
}

/// Push commands until the source ends, the agent leaves or a write fails
async fn push_commands<T, S>(
    ws: WebSocketStream<T>,
    peer: SocketAddr,
    source: Arc<Mutex<S>>,
) -> Result<(), ControlError>
where
    T: AsyncRead + AsyncWrite + Unpin,
    S: CommandSource,
{
    let (mut writer, mut reader) = ws.split();
    let mut sent: u64 = 0;

    loop {
        tokio::select! {
            next = async { source.lock().await.next_command().await } => {
                let command = match next {
                    Ok(Some(command)) => command,
                    Ok(None) => {
                        info!(%peer, sent, "Command source exhausted, closing control channel");
                        let frame = CloseFrame {
                            code: CloseCode::Normal,
                            reason: "command source closed".into(),
                        };
                        if let Err(e) = writer.send(Message::Close(Some(frame))).await {
                            debug!(%peer, "Close frame not delivered: {}", e);
                        }
                        return Ok(());
                    }
                    Err(e) => {
                        if let Err(e) = writer.close().await {
                            debug!(%peer, "Closing after source failure: {}", e);
                        }
                        return Err(ControlError::Source(e));
                    }
                };

                debug!(%peer, %command, "Pushing command");
                writer
                    .send(message::command_frame(command))
                    .await
                    .map_err(ControlError::Write)?;
                sent += 1;
            }
            frame = reader.next() => match frame {
                Some(Ok(Message::Close(_))) | None => {
                    info!(%peer, sent, "Agent closed control channel");
                    return Ok(());
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    info!(%peer, sent, "Agent connection lost: {}", e);
                    return Ok(());
                }
            }
        }
    }
}
