use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use tandem_jsonrpc::RpcError;
use tracing::debug;
use url::Url;

use crate::call::OutgoingCall;
use crate::plugin::ClientPlugin;

/// HTTP POST transport.
///
/// One request/response round trip per call: the encoded envelope goes out
/// as the POST body with `Content-Type: application/json` and the response
/// body comes back synchronously through the hook chain, so pending-call
/// matching degenerates to 1:1.
#[derive(Debug)]
pub struct HttpTransport {
    endpoint: Url,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(endpoint: &str) -> Result<Self, RpcError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| RpcError::transport(format!("failed to build http client: {e}")))?;
        Self::with_client(endpoint, client)
    }

    /// Use a preconfigured `reqwest` client (proxies, TLS settings, ...).
    pub fn with_client(endpoint: &str, client: reqwest::Client) -> Result<Self, RpcError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| RpcError::transport(format!("invalid endpoint url: {e}")))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(RpcError::transport(format!(
                "unsupported scheme for http transport: {}",
                endpoint.scheme()
            )));
        }
        Ok(Self { endpoint, client })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl ClientPlugin for HttpTransport {
    async fn make_request(&self, call: &mut OutgoingCall) -> Result<bool, RpcError> {
        let body = call
            .body
            .clone()
            .ok_or_else(|| RpcError::internal("request reached transport before encoding"))?;

        debug!(method = call.method(), url = %self.endpoint, "posting request");
        let response = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| RpcError::transport(format!("http request failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| RpcError::transport(format!("failed to read http response: {e}")))?;

        if !status.is_success() {
            // A non-2xx body only counts as the reply when it actually is a
            // JSON-RPC envelope; anything else is a transport failure.
            let looks_like_envelope = serde_json::from_str::<serde_json::Value>(&text)
                .map(|value| value.get("jsonrpc").is_some())
                .unwrap_or(false);
            if !looks_like_envelope {
                return Err(RpcError::transport(format!(
                    "http status {status} from {}",
                    self.endpoint
                )));
            }
        }

        if !call.is_notification() {
            call.response_body = Some(text);
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_http_schemes() {
        let error = HttpTransport::new("ws://localhost/api").unwrap_err();
        assert_eq!(error.kind, tandem_jsonrpc::ErrorKind::Transport);
    }

    #[test]
    fn accepts_http_and_https() {
        assert!(HttpTransport::new("http://localhost:8080/api").is_ok());
        assert!(HttpTransport::new("https://example.com/rpc").is_ok());
    }
}
