//! Per-endpoint HTTP transport.
//!
//! One [`HostTransport`] exists per coordinator URL. It owns a pooled
//! keep-alive HTTP client and executes exactly one prepared request at a
//! time per call, yielding either the raw response or a classified
//! [`TransportError`]. It has no retry logic of its own; failover is the
//! dispatcher's job.

use std::time::Duration;

use bytes::Bytes;
use http::header::HeaderMap;
use http::{Method, StatusCode, Uri};
use http_body_util::{BodyExt, Full};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use url::Url;

use crate::config::AgentOptions;
use crate::error::{DriverError, TransportError};

/// A request after header layering and URL composition, ready for the wire.
#[derive(Debug)]
pub(crate) struct PreparedRequest {
    pub method: Method,
    pub path: String,
    pub search: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub expect_binary: bool,
    pub timeout: Option<Duration>,
}

/// What the transport hands back on success: status, headers, raw bytes.
#[derive(Debug)]
pub(crate) struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

pub(crate) struct HostTransport {
    base: Url,
    client: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
}

impl HostTransport {
    pub(crate) fn new(url: &Url, agent: &AgentOptions) -> Result<Self, DriverError> {
        if url.host_str() == Some("unix") {
            return Err(DriverError::Config(format!(
                "unix socket endpoints are not supported by the HTTP transport: {url}"
            )));
        }

        let mut tcp = HttpConnector::new();
        tcp.enforce_http(false);
        tcp.set_nodelay(true);
        if agent.keep_alive {
            tcp.set_keepalive(Some(Duration::from_millis(agent.keep_alive_msecs)));
        }
        let tls = HttpsConnectorBuilder::new()
            .with_webpki_roots()
            .https_or_http()
            .enable_http1()
            .wrap_connector(tcp);

        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_millis(agent.keep_alive_msecs))
            .pool_max_idle_per_host(if agent.keep_alive { agent.max_sockets } else { 0 })
            .build(tls);

        Ok(Self {
            base: url.clone(),
            client,
        })
    }

    /// Executes one prepared request against this endpoint.
    pub(crate) async fn execute(&self, request: &PreparedRequest) -> Result<RawResponse, TransportError> {
        let uri = self.target_uri(request)?;
        let mut builder = http::Request::builder().method(request.method.clone()).uri(uri);
        if let Some(headers) = builder.headers_mut() {
            *headers = request.headers.clone();
        }
        let outbound = builder
            .body(Full::new(request.body.clone()))
            .map_err(|err| self.other(format!("invalid request: {err}")))?;

        let pending = self.client.request(outbound);
        let response = match request.timeout {
            Some(limit) => match tokio::time::timeout(limit, pending).await {
                Ok(done) => done,
                Err(_) => {
                    return Err(TransportError::Timeout {
                        url: self.base.to_string(),
                        timeout_ms: limit.as_millis() as u64,
                    })
                }
            },
            None => pending.await,
        }
        .map_err(|err| self.classify(err))?;

        let (parts, body) = response.into_parts();
        let bytes = body
            .collect()
            .await
            .map_err(|err| self.other(format!("failed to read response body: {err}")))?
            .to_bytes();

        Ok(RawResponse {
            status: parts.status,
            headers: parts.headers,
            body: bytes,
        })
    }

    fn target_uri(&self, request: &PreparedRequest) -> Result<Uri, TransportError> {
        let mut target = self.base.clone();
        target.set_path(&request.path);
        target.set_query(request.search.as_deref());
        target
            .as_str()
            .parse::<Uri>()
            .map_err(|err| self.other(format!("invalid request target: {err}")))
    }

    fn classify(&self, err: hyper_util::client::legacy::Error) -> TransportError {
        if connection_refused(&err) {
            TransportError::ConnectionRefused {
                url: self.base.to_string(),
            }
        } else {
            self.other(err.to_string())
        }
    }

    fn other(&self, message: String) -> TransportError {
        TransportError::Other {
            url: self.base.to_string(),
            message,
        }
    }
}

/// Walks the source chain looking for a refused-connection I/O error.
fn connection_refused(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut cause: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(current) = cause {
        if let Some(io) = current.downcast_ref::<std::io::Error>() {
            if io.kind() == std::io::ErrorKind::ConnectionRefused {
                return true;
            }
        }
        cause = current.source();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unix_endpoints_are_rejected() {
        let url = Url::parse("http://unix:/tmp/arangodb.sock").unwrap();
        let result = HostTransport::new(&url, &AgentOptions::default());
        assert!(matches!(result, Err(DriverError::Config(_))));
    }

    #[test]
    fn test_http_endpoint_builds() {
        let url = Url::parse("http://127.0.0.1:8529").unwrap();
        assert!(HostTransport::new(&url, &AgentOptions::default()).is_ok());
    }

    #[test]
    fn test_connection_refused_detection_walks_sources() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        assert!(connection_refused(&io));

        let wrapped: Box<dyn std::error::Error + Send + Sync> = Box::new(io);
        let outer = std::io::Error::new(std::io::ErrorKind::Other, wrapped);
        assert!(connection_refused(&outer));

        let timeout = std::io::Error::new(std::io::ErrorKind::TimedOut, "slow");
        assert!(!connection_refused(&timeout));
    }
}
