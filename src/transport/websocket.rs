//! WebSocket transport for the control channel

use crate::config::AgentConfig;
use crate::transport::traits::{ControlChannel, ControlConnector};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use relay_shared::tls::{self, ClientConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async_tls_with_config, Connector, MaybeTlsStream, WebSocketStream};
use tracing::debug;
use url::Url;

/// Established WebSocket control channel
pub struct WebSocketChannel {
    inner: WebSocketStream<MaybeTlsStream<TcpStream>>,
    peer: String,
}

#[async_trait]
impl ControlChannel for WebSocketChannel {
    async fn next_frame(&mut self) -> Option<Result<Message, WsError>> {
        self.inner.next().await
    }

    async fn shutdown(&mut self) -> Result<()> {
        match self.inner.close(None).await {
            Ok(()) | Err(WsError::ConnectionClosed) | Err(WsError::AlreadyClosed) => {}
            Err(e) => return Err(e.into()),
        }
        // Flush anything still queued, including our close frame
        if let Err(e) = self.inner.flush().await {
            debug!("Flush after close failed: {}", e);
        }
        Ok(())
    }

    fn peer(&self) -> &str {
        &self.peer
    }
}

/// Dials the control endpoint over `ws://` or `wss://`
pub struct WebSocketConnector {
    url: Url,
    tls: Option<Arc<ClientConfig>>,
    connect_timeout: Duration,
}

impl WebSocketConnector {
    /// Create a connector; a TLS config is required for `wss://` endpoints
    pub fn new(url: Url, tls: Option<Arc<ClientConfig>>, connect_timeout: Duration) -> Result<Self> {
        match url.scheme() {
            "ws" => {}
            "wss" if tls.is_some() => {}
            "wss" => bail!("TLS configuration required for {}", url),
            other => bail!("Unsupported control channel scheme: {}", other),
        }

        Ok(Self {
            url,
            tls,
            connect_timeout,
        })
    }

    /// Create a connector from the agent configuration
    pub fn from_config(config: &AgentConfig) -> Result<Self> {
        let url = Url::parse(&config.control_url)
            .with_context(|| format!("invalid control URL {}", config.control_url))?;

        let tls = if url.scheme() == "wss" {
            let client_config =
                tls::client_config(config.verify_peer_certificate, config.trust_anchor.as_deref())?;
            Some(Arc::new(client_config))
        } else {
            None
        };

        Self::new(url, tls, config.connect_timeout)
    }
}

#[async_trait]
impl ControlConnector for WebSocketConnector {
    type Channel = WebSocketChannel;

    async fn connect(&self) -> Result<Self::Channel> {
        let connector = self.tls.clone().map(Connector::Rustls);
        let dial = connect_async_tls_with_config(self.url.as_str(), None, false, connector);

        let (inner, _response) = timeout(self.connect_timeout, dial)
            .await
            .map_err(|_| anyhow!("timed out after {:?}", self.connect_timeout))??;

        Ok(WebSocketChannel {
            inner,
            peer: self.url.to_string(),
        })
    }

    fn name(&self) -> &'static str {
        match self.url.scheme() {
            "wss" => "WebSocket/TLS",
            _ => "WebSocket",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connector(url: &str) -> Result<WebSocketConnector> {
        let config = AgentConfig {
            control_url: url.into(),
            trust_anchor: None,
            ..Default::default()
        };
        WebSocketConnector::from_config(&config)
    }

    #[test]
    fn test_connector_names() {
        assert_eq!(connector("ws://127.0.0.1:8888/ws").unwrap().name(), "WebSocket");
        assert_eq!(connector("wss://127.0.0.1:8888/ws").unwrap().name(), "WebSocket/TLS");
    }

    #[test]
    fn test_rejects_other_schemes() {
        assert!(connector("https://127.0.0.1:8888/ws").is_err());
        assert!(connector("not a url").is_err());

        let url = Url::parse("wss://127.0.0.1:8888/ws").unwrap();
        assert!(WebSocketConnector::new(url, None, Duration::from_secs(1)).is_err());
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = connector(&format!("ws://{addr}/ws")).unwrap().connect().await;
        assert!(result.is_err());
    }
}
