//! # Bi-directional router
//!
//! One [`Router`] owns the duplex connections of a peer. Every inbound text
//! frame on a connection is classified by shape: frames carrying `method`
//! are dispatched through the local [`tandem_server::RpcServer`] (and their
//! responses sent back out on the same connection); frames carrying
//! `result`/`error` resolve a pending call on one of the connection's
//! reverse clients. Either side of the socket can therefore initiate calls.
//!
//! Reverse clients are created lazily, once per connection and endpoint,
//! from the factory the endpoint declared; the
//! [`Router::on_reverse_client`] observer lets operators install
//! per-connection client plugins at creation time.
//!
//! The bundled [`ws`] module adapts tokio-tungstenite sockets (host and
//! dialer). Any other transport is compatible if it forwards
//! [`SocketEvent`]s into [`Router::handle_event`] and drains the
//! connection's outbound channel into `send(text)`.

pub mod connection;
pub mod router;
pub mod transport;
pub mod ws;

pub use connection::ConnectionState;
pub use router::{Router, SocketEvent};
pub use transport::ConnectionTransport;

pub use tandem_jsonrpc::{ErrorKind, RpcError};
