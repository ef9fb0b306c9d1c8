//! tokio-tungstenite adapters binding real WebSockets to a [`Router`].
//!
//! [`serve`] accepts inbound sockets and reads the endpoint path from the
//! upgrade request URI (query string stripped, then the registry's
//! normalization: trailing slashes trimmed, empty is `/`). [`connect`] dials
//! out and registers the resulting socket the same way, so the dialing side
//! can both serve the peer's requests and issue its own through
//! [`Router::connection_client`].

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tandem_jsonrpc::RpcError;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_tungstenite::{accept_hdr_async, connect_async, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;

use crate::router::{Router, SocketEvent};

/// Accept WebSocket connections on `addr` and feed them to the router.
/// Runs until the listener fails.
pub async fn serve(addr: &str, router: Arc<Router>) -> Result<(), RpcError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| RpcError::transport(format!("failed to bind {addr}: {e}")))?;
    serve_on(listener, router).await
}

/// Accept connections on an already-bound listener (lets callers pick port 0
/// and read the real address back).
pub async fn serve_on(listener: TcpListener, router: Arc<Router>) -> Result<(), RpcError> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "websocket host listening");
    }

    loop {
        let (stream, peer) = listener
            .accept()
            .await
            .map_err(|e| RpcError::transport(format!("accept failed: {e}")))?;
        let router = router.clone();
        tokio::spawn(async move {
            if let Err(error) = accept_socket(stream, peer.to_string(), router).await {
                warn!(%peer, %error, "websocket connection setup failed");
            }
        });
    }
}

/// Dial `url` and register the socket. Returns the connection id, usable
/// with [`Router::connection_client`] to start calling the peer.
pub async fn connect(url: &str, router: Arc<Router>) -> Result<u64, RpcError> {
    let parsed =
        Url::parse(url).map_err(|e| RpcError::transport(format!("invalid websocket url: {e}")))?;
    if !matches!(parsed.scheme(), "ws" | "wss") {
        return Err(RpcError::transport(format!(
            "unsupported scheme for websocket: {}",
            parsed.scheme()
        )));
    }
    let (socket, _) = connect_async(parsed.as_str())
        .await
        .map_err(|e| RpcError::transport(format!("websocket connect failed: {e}")))?;
    let peer = parsed.host_str().map(String::from);
    Ok(pump_socket(socket, parsed.path(), peer, router))
}

async fn accept_socket(
    stream: TcpStream,
    peer: String,
    router: Arc<Router>,
) -> Result<(), RpcError> {
    let mut path = String::from("/");
    let socket = accept_hdr_async(stream, |request: &Request, response: Response| {
        // The endpoint path comes from the upgrade URL; the query string is
        // not part of the routing key.
        path = request.uri().path().to_string();
        Ok::<_, ErrorResponse>(response)
    })
    .await
    .map_err(|e| RpcError::transport(format!("websocket handshake failed: {e}")))?;

    let id = pump_socket(socket, &path, Some(peer.clone()), router);
    debug!(connection = id, %peer, %path, "websocket connection accepted");
    Ok(())
}

/// Wire one established socket to the router: a writer task drains the
/// connection's outbound channel, a reader task turns frames into
/// [`SocketEvent`]s. Returns the connection id.
fn pump_socket<S>(
    socket: WebSocketStream<S>,
    path: &str,
    peer: Option<String>,
    router: Arc<Router>,
) -> u64
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + 'static,
{
    let (mut sink, mut stream) = socket.split();
    let (ws_tx, mut ws_rx) = mpsc::unbounded_channel::<WsMessage>();
    let (frame_tx, mut frame_rx) = mpsc::unbounded_channel::<String>();
    let id = router.add_connection(path, peer, frame_tx);

    // Bridge: router frames become text messages on the socket channel.
    let bridge_tx = ws_tx.clone();
    tokio::spawn(async move {
        while let Some(text) = frame_rx.recv().await {
            if bridge_tx.send(WsMessage::Text(text)).is_err() {
                break;
            }
        }
        // Router dropped its sender (local close): tell the peer.
        let _ = bridge_tx.send(WsMessage::Close(None));
    });

    // Writer: single owner of the sink.
    tokio::spawn(async move {
        while let Some(message) = ws_rx.recv().await {
            let closing = matches!(message, WsMessage::Close(_));
            if sink.send(message).await.is_err() || closing {
                break;
            }
        }
    });

    // Reader: frames in, events out.
    tokio::spawn(async move {
        while let Some(frame) = stream.next().await {
            match frame {
                Ok(WsMessage::Text(text)) => {
                    router.handle_event(id, SocketEvent::Message(text));
                }
                Ok(WsMessage::Ping(payload)) => {
                    let _ = ws_tx.send(WsMessage::Pong(payload));
                }
                Ok(WsMessage::Close(_)) => break,
                Ok(_) => {}
                Err(error) => {
                    router.handle_event(id, SocketEvent::Error(error.to_string()));
                    return;
                }
            }
        }
        router.handle_event(id, SocketEvent::Closed);
    });

    id
}
