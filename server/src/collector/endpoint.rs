//! HTTP(S) collector for execution reports

use crate::ServerError;
use axum::body::{to_bytes, Body};
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{StatusCode, Version};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Extension, Router};
use bytes::Bytes;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use hyper_util::service::TowerToHyperService;
use relay_shared::defaults;
use relay_shared::tls::{self, ServerConfig};
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, info, warn};

/// A report as received by the collector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectedReport {
    /// Remote address, when served from a socket
    pub peer: Option<SocketAddr>,
    /// HTTP version the report arrived over
    pub version: Version,
    /// Raw request body
    pub body: Bytes,
}

#[derive(Clone, Default)]
struct CollectorState {
    sink: Option<mpsc::UnboundedSender<CollectedReport>>,
}

/// Report collector owning its route table
pub struct Collector {
    router: Router,
}

impl Default for Collector {
    fn default() -> Self {
        Self::new()
    }
}

impl Collector {
    /// Create a collector that only logs reports
    pub fn new() -> Self {
        Self::build(CollectorState::default())
    }

    /// Create a collector that also forwards each report to `sink`
    pub fn with_sink(sink: mpsc::UnboundedSender<CollectedReport>) -> Self {
        Self::build(CollectorState { sink: Some(sink) })
    }

    fn build(state: CollectorState) -> Self {
        let router = Router::new()
            .route("/", post(collect))
            .layer(DefaultBodyLimit::disable())
            .with_state(state);
        Self { router }
    }

    /// TLS acceptor offering HTTP/2 ahead of HTTP/1.1 via ALPN
    pub fn tls_acceptor(mut config: ServerConfig) -> TlsAcceptor {
        config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];
        tls::acceptor(config)
    }

    /// The route table, for embedding or direct testing
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Bind `addr` and serve forever
    pub async fn bind_and_serve(
        self,
        addr: SocketAddr,
        tls: Option<TlsAcceptor>,
    ) -> Result<(), ServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        self.serve(listener, tls).await
    }

    /// Serve on an already bound listener, one task per connection
    pub async fn serve(self, listener: TcpListener, tls: Option<TlsAcceptor>) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        let scheme = if tls.is_some() { "https" } else { "http" };
        info!("Collector listening on {}://{}/", scheme, addr);

        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!("Error accepting collector connection: {}", e);
                    continue;
                }
            };

            let app = self.router.clone().layer(Extension(peer));
            let tls = tls.clone();

            tokio::spawn(async move {
                let result = match tls {
                    Some(acceptor) => match acceptor.accept(stream).await {
                        Ok(tls_stream) => serve_connection(tls_stream, app).await,
                        Err(e) => {
                            warn!(%peer, "Collector TLS handshake failed: {}", e);
                            return;
                        }
                    },
                    None => serve_connection(stream, app).await,
                };

                if let Err(e) = result {
                    debug!(%peer, "Collector connection error: {}", e);
                }
            });
        }
    }
}

async fn serve_connection<T>(
    stream: T,
    app: Router,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
where
    T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    auto::Builder::new(TokioExecutor::new())
        .serve_connection(TokioIo::new(stream), TowerToHyperService::new(app))
        .await
}

/// Read the whole body, log it, acknowledge
async fn collect(
    State(state): State<CollectorState>,
    peer: Option<Extension<SocketAddr>>,
    version: Version,
    body: Body,
) -> Response {
    let peer = peer.map(|Extension(peer)| peer);

    let body = match to_bytes(body, usize::MAX).await {
        Ok(body) => body,
        Err(e) => {
            warn!(?peer, "Unable to read report body: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Unable to read request body").into_response();
        }
    };

    info!(
        ?peer,
        ?version,
        bytes = body.len(),
        "Report received\n{}\n{}\n{}",
        defaults::REPORT_DELIMITER,
        String::from_utf8_lossy(&body),
        defaults::REPORT_DELIMITER
    );

    if let Some(sink) = &state.sink {
        if sink.send(CollectedReport {
            peer,
            version,
            body,
        }).is_err() {
            debug!("Report sink closed");
        }
    }

    StatusCode::OK.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Method, Request};
    use std::io;
    use tower::ServiceExt;

    fn post_body(body: Body) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/")
            .body(body)
            .unwrap()
    }

    #[tokio::test]
    async fn test_report_is_acknowledged_and_forwarded() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let collector = Collector::with_sink(tx);

        let response = collector
            .router()
            .oneshot(post_body(Body::from("hello\n")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let report = rx.recv().await.unwrap();
        assert_eq!(report.body, Bytes::from_static(b"hello\n"));
        assert_eq!(report.peer, None);
        assert_eq!(report.version, Version::HTTP_11);
    }

    #[tokio::test]
    async fn test_large_bodies_are_accepted() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let collector = Collector::with_sink(tx);
        let big = vec![b'x'; 4 * 1024 * 1024];

        let response = collector
            .router()
            .oneshot(post_body(Body::from(big.clone())))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(rx.recv().await.unwrap().body.len(), big.len());
    }

    #[tokio::test]
    async fn test_body_read_failure_is_server_error() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let collector = Collector::with_sink(tx);
        let chunks: Vec<Result<Bytes, io::Error>> = vec![
            Ok(Bytes::from_static(b"partial")),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "client went away")),
        ];

        let response = collector
            .router()
            .oneshot(post_body(Body::from_stream(futures::stream::iter(chunks))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(rx.try_recv().is_err(), "failed reads are not forwarded");
    }

    #[tokio::test]
    async fn test_served_over_socket_records_peer() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(Collector::with_sink(tx).serve(listener, None));

        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        let mut socket = tokio::net::TcpStream::connect(addr).await.unwrap();
        socket
            .write_all(b"POST / HTTP/1.1\r\nhost: collector\r\ncontent-length: 3\r\nconnection: close\r\n\r\nabc")
            .await
            .unwrap();
        let mut response = String::new();
        socket.read_to_string(&mut response).await.unwrap();

        assert!(response.starts_with("HTTP/1.1 200"));
        let report = rx.recv().await.unwrap();
        assert_eq!(report.body, Bytes::from_static(b"abc"));
        assert_eq!(report.peer.map(|p| p.ip()), Some(addr.ip()));
    }
}
