//! # JSON-RPC 2.0 client
//!
//! [`RpcClient`] issues calls through an ordered plugin pipeline. Exactly one
//! registered plugin is expected to act as the transport (its
//! [`ClientPlugin::make_request`] hook moves the encoded request); the bundled
//! transports cover HTTP POST ([`HttpTransport`]), WebSocket
//! ([`WebSocketTransport`]) and in-process loopback ([`LoopbackTransport`]).
//!
//! Responses are correlated by id only: over HTTP the transport hands the
//! body back synchronously, over WebSocket the reader task feeds
//! [`RpcClient::on_response`] and the pending-call map resolves whichever
//! caller the id belongs to, in whatever order replies arrive.

pub mod call;
pub mod client;
pub mod pending;
pub mod plugin;
pub mod transport;

pub use call::{CallOptions, OutboundEnvelope, OutgoingCall};
pub use client::{ClientConfig, RpcClient};
pub use pending::PendingCalls;
pub use plugin::ClientPlugin;
pub use transport::http::HttpTransport;
pub use transport::loopback::LoopbackTransport;
pub use transport::ws::WebSocketTransport;

// The shared error contract lives in the codec crate.
pub use tandem_jsonrpc::{ErrorKind, RpcError};
