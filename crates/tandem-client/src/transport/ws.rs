use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tandem_jsonrpc::RpcError;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message as WsMessage};
use tracing::{debug, warn};
use url::Url;

use crate::call::OutgoingCall;
use crate::client::RpcClient;
use crate::plugin::ClientPlugin;

/// WebSocket transport for one-way (client-initiated) use.
///
/// `make_request` writes one text frame and returns; a reader task feeds
/// every inbound text frame to the owning client's `on_response`, which
/// resolves pending calls by id in arrival order. When the socket closes,
/// every pending call on the client fails with connection-closed.
///
/// For bi-directional use the router owns the socket instead and reverse
/// clients use the router's connection transport.
#[derive(Debug)]
pub struct WebSocketTransport {
    outbound: mpsc::UnboundedSender<WsMessage>,
}

impl WebSocketTransport {
    /// Connect to `url` and bind the socket to `client`.
    ///
    /// Register the returned transport on that same client.
    pub async fn connect(url: &str, client: &RpcClient) -> Result<Self, RpcError> {
        let parsed = Url::parse(url)
            .map_err(|e| RpcError::transport(format!("invalid websocket url: {e}")))?;
        if !matches!(parsed.scheme(), "ws" | "wss") {
            return Err(RpcError::transport(format!(
                "unsupported scheme for websocket transport: {}",
                parsed.scheme()
            )));
        }

        let (socket, _) = connect_async(parsed.as_str())
            .await
            .map_err(|e| RpcError::transport(format!("websocket connect failed: {e}")))?;
        let (mut sink, mut stream) = socket.split();
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<WsMessage>();

        // Writer: drains the outbound channel into the socket.
        tokio::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                if let Err(error) = sink.send(frame).await {
                    warn!(%error, "websocket send failed");
                    break;
                }
            }
        });

        // Reader: text frames resolve pending calls; close/error fails them.
        let reader_client = client.clone();
        let pong_sender = outbound.clone();
        tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                match frame {
                    Ok(WsMessage::Text(text)) => reader_client.on_response(&text),
                    Ok(WsMessage::Ping(payload)) => {
                        let _ = pong_sender.send(WsMessage::Pong(payload));
                    }
                    Ok(WsMessage::Close(_)) => break,
                    Ok(_) => {}
                    Err(error) => {
                        warn!(%error, "websocket read failed");
                        break;
                    }
                }
            }
            debug!("websocket closed, failing pending calls");
            reader_client.fail_pending(RpcError::connection_closed());
        });

        Ok(Self { outbound })
    }
}

#[async_trait]
impl ClientPlugin for WebSocketTransport {
    async fn make_request(&self, call: &mut OutgoingCall) -> Result<bool, RpcError> {
        let body = call
            .body
            .clone()
            .ok_or_else(|| RpcError::internal("request reached transport before encoding"))?;
        self.outbound
            .send(WsMessage::Text(body))
            .map_err(|_| RpcError::connection_closed())?;
        Ok(true)
    }
}
