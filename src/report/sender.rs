//! HTTPS report sender

use crate::config::AgentConfig;
use async_trait::async_trait;
use bytes::Bytes;
use relay_shared::tls::{self, TlsError};
use reqwest::StatusCode;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Errors raised while delivering a report
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("TLS setup failed: {0}")]
    Tls(#[from] TlsError),

    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Report to {endpoint} failed: {source}")]
    Transmit {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Destination for execution results
#[async_trait]
pub trait ReportSink: Send + Sync {
    /// Deliver one payload and return the collector's status
    async fn send(&self, endpoint: &Url, payload: Bytes) -> Result<StatusCode, ReportError>;
}

/// Sends each report as a single POST over a fresh connection, HTTP/2 when
/// the collector offers it over TLS
#[derive(Debug, Clone)]
pub struct ReportSender {
    client: reqwest::Client,
}

impl ReportSender {
    /// Create a sender with explicit trust and deadline settings
    pub fn new(
        verify_peer: bool,
        trust_anchor: Option<&Path>,
        timeout: Option<Duration>,
    ) -> Result<Self, ReportError> {
        let mut tls_config = tls::client_config(verify_peer, trust_anchor)?;
        // Prefer the multiplexed transport, the collector negotiates it via ALPN
        tls_config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

        let mut builder = reqwest::Client::builder()
            .use_preconfigured_tls(tls_config)
            .pool_max_idle_per_host(0);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let client = builder.build().map_err(ReportError::Client)?;
        Ok(Self { client })
    }

    /// Create a sender from the agent configuration
    pub fn from_config(config: &AgentConfig) -> Result<Self, ReportError> {
        Self::new(
            config.verify_peer_certificate,
            config.trust_anchor.as_deref(),
            config.report_timeout,
        )
    }
}

#[async_trait]
impl ReportSink for ReportSender {
    async fn send(&self, endpoint: &Url, payload: Bytes) -> Result<StatusCode, ReportError> {
        debug!(%endpoint, bytes = payload.len(), "Sending report");

        let response = self
            .client
            .post(endpoint.clone())
            .body(payload)
            .send()
            .await
            .map_err(|source| ReportError::Transmit {
                endpoint: endpoint.to_string(),
                source,
            })?;

        Ok(response.status())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn plain_sender() -> ReportSender {
        ReportSender::new(true, None, Some(Duration::from_secs(5))).expect("sender")
    }

    /// Accept one request, capture it, answer with `status_line`
    async fn one_shot_collector(status_line: &'static str) -> (Url, tokio::task::JoinHandle<Vec<u8>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = Url::parse(&format!("http://{}/", listener.local_addr().unwrap())).unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                if n == 0 || request.ends_with(b"hello\n") {
                    break;
                }
            }
            let response = format!("HTTP/1.1 {status_line}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
            socket.write_all(response.as_bytes()).await.unwrap();
            request
        });

        (url, handle)
    }

    #[tokio::test]
    async fn test_payload_is_post_body() {
        let (url, collector) = one_shot_collector("200 OK").await;

        let status = plain_sender()
            .send(&url, Bytes::from_static(b"hello\n"))
            .await
            .expect("report should be delivered");
        assert_eq!(status, StatusCode::OK);

        let request = String::from_utf8(collector.await.unwrap()).unwrap();
        assert!(request.starts_with("POST / HTTP/1.1"));
        assert!(request.ends_with("\r\n\r\nhello\n"));
    }

    #[tokio::test]
    async fn test_rejection_status_is_returned() {
        let (url, _collector) = one_shot_collector("500 Internal Server Error").await;

        let status = plain_sender()
            .send(&url, Bytes::from_static(b"hello\n"))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_unreachable_collector() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let url = Url::parse(&format!("http://{addr}/")).unwrap();
        let result = plain_sender().send(&url, Bytes::from_static(b"lost")).await;
        assert!(matches!(result, Err(ReportError::Transmit { .. })));
    }
}
