//! # JSON-RPC 2.0 codec
//!
//! Wire types and framing for the tandem framework. This crate is pure and
//! transport-agnostic: it knows how to encode and decode JSON-RPC 2.0
//! envelopes and how to classify an inbound text frame as a request, a
//! notification or a response, but it never touches a socket.
//!
//! The domain error type [`RpcError`] also lives here, together with its
//! stable kind-to-code mapping, so that client, server and router crates all
//! share one error contract.

pub mod error;
pub mod frame;
pub mod notification;
pub mod request;
pub mod response;
pub mod types;

pub use error::{ErrorKind, JsonRpcError, JsonRpcErrorObject, RpcError};
pub use frame::InboundFrame;
pub use notification::JsonRpcNotification;
pub use request::{JsonRpcRequest, RequestParams};
pub use response::{JsonRpcMessage, JsonRpcResponse};
pub use types::{JsonRpcVersion, RequestId};

/// JSON-RPC 2.0 version string
pub const JSONRPC_VERSION: &str = "2.0";

/// Numeric error codes used on the wire.
///
/// The protocol reserves `-32768..=-32000`; the `-32099..=-32000` slice is
/// left to implementations, which is where the non-protocol kinds of
/// [`ErrorKind`] live. Application-defined codes must stay outside the
/// reserved range entirely.
pub mod error_codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;

    // Implementation-defined server errors: -32099..=-32000
    pub const AUTHENTICATION: i64 = -32001;
    pub const AUTHORIZATION: i64 = -32002;
    pub const TIMEOUT: i64 = -32003;
    pub const CONNECTION_CLOSED: i64 = -32004;
    pub const TRANSPORT: i64 = -32005;

    pub const SERVER_ERROR_START: i64 = -32099;
    pub const SERVER_ERROR_END: i64 = -32000;
}

/// Encode any wire envelope to a JSON text frame.
pub fn encode<T: serde::Serialize>(envelope: &T) -> Result<String, RpcError> {
    serde_json::to_string(envelope)
        .map_err(|e| RpcError::internal(format!("failed to encode envelope: {e}")))
}

/// Decode a request envelope, distinguishing unparseable JSON (`parse`)
/// from JSON that is not a valid request (`invalid-request`).
pub fn decode_request(text: &str) -> Result<JsonRpcRequest, RpcError> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| RpcError::parse(e.to_string()))?;
    serde_json::from_value(value).map_err(|e| RpcError::invalid_request(e.to_string()))
}

/// Decode a response envelope (success or error shape).
pub fn decode_message(text: &str) -> Result<JsonRpcMessage, RpcError> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| RpcError::parse(e.to_string()))?;
    serde_json::from_value(value).map_err(|e| RpcError::invalid_request(e.to_string()))
}
