use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::header::CONTENT_TYPE;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tandem_jsonrpc::RpcError;
use tandem_server::{RpcServer, TransportContext};
use tokio::net::TcpListener;
use tracing::{debug, error, info};

/// Host configuration.
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Address to bind to.
    pub bind_address: SocketAddr,
    /// Requests under this prefix are JSON-RPC traffic; the rest of the
    /// path selects the endpoint.
    pub path_prefix: String,
    /// Maximum accepted request body size.
    pub max_body_size: usize,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 8000)),
            path_prefix: "/rpc".to_string(),
            max_body_size: 1024 * 1024,
        }
    }
}

/// Builder for [`HttpHost`].
pub struct HttpHostBuilder {
    config: HostConfig,
    server: Arc<RpcServer>,
}

impl HttpHostBuilder {
    pub fn new(server: Arc<RpcServer>) -> Self {
        Self {
            config: HostConfig::default(),
            server,
        }
    }

    pub fn bind_address(mut self, addr: SocketAddr) -> Self {
        self.config.bind_address = addr;
        self
    }

    pub fn path_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.path_prefix = prefix.into();
        self
    }

    pub fn max_body_size(mut self, size: usize) -> Self {
        self.config.max_body_size = size;
        self
    }

    pub fn build(self) -> HttpHost {
        HttpHost {
            config: Arc::new(self.config),
            server: self.server,
        }
    }
}

/// hyper-based HTTP front end for one [`RpcServer`].
#[derive(Clone)]
pub struct HttpHost {
    config: Arc<HostConfig>,
    server: Arc<RpcServer>,
}

impl HttpHost {
    pub fn builder(server: Arc<RpcServer>) -> HttpHostBuilder {
        HttpHostBuilder::new(server)
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// Bind the configured address and serve until the listener fails.
    pub async fn run(&self) -> Result<(), RpcError> {
        let listener = TcpListener::bind(self.config.bind_address)
            .await
            .map_err(|e| {
                RpcError::transport(format!("failed to bind {}: {e}", self.config.bind_address))
            })?;
        self.serve_on(listener).await
    }

    /// Serve on an already-bound listener (lets callers pick port 0 and read
    /// the real address back).
    pub async fn serve_on(&self, listener: TcpListener) -> Result<(), RpcError> {
        if let Ok(addr) = listener.local_addr() {
            info!(%addr, prefix = %self.config.path_prefix, "http host listening");
        }

        loop {
            let (stream, peer) = listener
                .accept()
                .await
                .map_err(|e| RpcError::transport(format!("accept failed: {e}")))?;
            debug!(%peer, "connection accepted");

            let host = self.clone();
            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let service = service_fn(move |request| {
                    let host = host.clone();
                    async move { host.handle(request, peer).await }
                });
                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    let text = err.to_string();
                    if text.contains("connection closed before message completed") {
                        debug!(%peer, "client disconnected");
                    } else {
                        error!(%peer, %err, "error serving connection");
                    }
                }
            });
        }
    }

    async fn handle(
        &self,
        request: Request<hyper::body::Incoming>,
        peer: SocketAddr,
    ) -> Result<Response<Full<Bytes>>, hyper::Error> {
        let (parts, body) = request.into_parts();
        let endpoint_path = match endpoint_path_for(&self.config.path_prefix, parts.uri.path()) {
            Some(endpoint_path) => endpoint_path,
            None => return Ok(plain(StatusCode::NOT_FOUND, "Not Found")),
        };
        if parts.method != Method::POST {
            return Ok(plain(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed"));
        }

        let body = body.collect().await?.to_bytes();
        if body.len() > self.config.max_body_size {
            return Ok(plain(StatusCode::PAYLOAD_TOO_LARGE, "Payload Too Large"));
        }
        let raw = match String::from_utf8(body.to_vec()) {
            Ok(raw) => raw,
            Err(_) => return Ok(plain(StatusCode::BAD_REQUEST, "Body is not UTF-8")),
        };

        let cx = TransportContext {
            peer: Some(peer.to_string()),
            ..TransportContext::default()
        };
        match self.server.process_request(&raw, &endpoint_path, cx).await {
            Some(blob) => {
                let mut response = Response::new(Full::new(Bytes::from(blob)));
                response.headers_mut().insert(
                    CONTENT_TYPE,
                    hyper::header::HeaderValue::from_static("application/json"),
                );
                Ok(response)
            }
            None => {
                let mut response = Response::new(Full::new(Bytes::new()));
                *response.status_mut() = StatusCode::NO_CONTENT;
                Ok(response)
            }
        }
    }
}

fn plain(status: StatusCode, text: &'static str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from_static(text.as_bytes())));
    *response.status_mut() = status;
    response
}

/// Map a request path to the endpoint path it addresses, or `None` when it
/// is outside the configured prefix. The bare prefix addresses `/`.
fn endpoint_path_for(prefix: &str, path: &str) -> Option<String> {
    if prefix.is_empty() || prefix == "/" {
        return Some(path.to_string());
    }
    let rest = path.strip_prefix(prefix)?;
    if rest.is_empty() {
        return Some("/".to_string());
    }
    if !rest.starts_with('/') {
        // "/rpcx" must not match prefix "/rpc".
        return None;
    }
    Some(rest.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_mapping() {
        assert_eq!(endpoint_path_for("/rpc", "/rpc/api"), Some("/api".into()));
        assert_eq!(endpoint_path_for("/rpc", "/rpc"), Some("/".into()));
        assert_eq!(endpoint_path_for("/rpc", "/rpcx/api"), None);
        assert_eq!(endpoint_path_for("/rpc", "/other"), None);
        assert_eq!(endpoint_path_for("/", "/api"), Some("/api".into()));
        assert_eq!(endpoint_path_for("", "/api"), Some("/api".into()));
    }

    #[test]
    fn config_defaults() {
        let config = HostConfig::default();
        assert_eq!(config.path_prefix, "/rpc");
        assert_eq!(config.max_body_size, 1024 * 1024);
    }
}
