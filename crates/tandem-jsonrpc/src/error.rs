use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error_codes;
use crate::types::{JsonRpcVersion, RequestId};

/// The `error` member of an error response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// An error response envelope. `id` is `None` when the failing request could
/// not be identified (unparseable frame), which serializes as `"id":null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    #[serde(rename = "jsonrpc")]
    pub version: JsonRpcVersion,
    #[serde(default)]
    pub id: Option<RequestId>,
    pub error: JsonRpcErrorObject,
}

impl JsonRpcError {
    pub fn new(id: Option<RequestId>, error: JsonRpcErrorObject) -> Self {
        Self {
            version: JsonRpcVersion,
            id,
            error,
        }
    }
}

impl fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JSON-RPC error {}: {}", self.error.code, self.error.message)
    }
}

impl std::error::Error for JsonRpcError {}

/// What went wrong, independent of its wire representation.
///
/// Every kind maps to one stable numeric code (see [`crate::error_codes`]);
/// `Application` carries its own code, which must stay outside the reserved
/// `-32768..=-32000` range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Parse,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    Internal,
    Authentication,
    Authorization,
    Transport,
    ConnectionClosed,
    Timeout,
    Application(i64),
}

impl ErrorKind {
    pub fn code(&self) -> i64 {
        match self {
            ErrorKind::Parse => error_codes::PARSE_ERROR,
            ErrorKind::InvalidRequest => error_codes::INVALID_REQUEST,
            ErrorKind::MethodNotFound => error_codes::METHOD_NOT_FOUND,
            ErrorKind::InvalidParams => error_codes::INVALID_PARAMS,
            ErrorKind::Internal => error_codes::INTERNAL_ERROR,
            ErrorKind::Authentication => error_codes::AUTHENTICATION,
            ErrorKind::Authorization => error_codes::AUTHORIZATION,
            ErrorKind::Timeout => error_codes::TIMEOUT,
            ErrorKind::ConnectionClosed => error_codes::CONNECTION_CLOSED,
            ErrorKind::Transport => error_codes::TRANSPORT,
            ErrorKind::Application(code) => *code,
        }
    }

    pub fn from_code(code: i64) -> Self {
        match code {
            error_codes::PARSE_ERROR => ErrorKind::Parse,
            error_codes::INVALID_REQUEST => ErrorKind::InvalidRequest,
            error_codes::METHOD_NOT_FOUND => ErrorKind::MethodNotFound,
            error_codes::INVALID_PARAMS => ErrorKind::InvalidParams,
            error_codes::INTERNAL_ERROR => ErrorKind::Internal,
            error_codes::AUTHENTICATION => ErrorKind::Authentication,
            error_codes::AUTHORIZATION => ErrorKind::Authorization,
            error_codes::TIMEOUT => ErrorKind::Timeout,
            error_codes::CONNECTION_CLOSED => ErrorKind::ConnectionClosed,
            error_codes::TRANSPORT => ErrorKind::Transport,
            other => ErrorKind::Application(other),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ErrorKind::Parse => "parse",
            ErrorKind::InvalidRequest => "invalid-request",
            ErrorKind::MethodNotFound => "method-not-found",
            ErrorKind::InvalidParams => "invalid-params",
            ErrorKind::Internal => "internal",
            ErrorKind::Authentication => "authentication",
            ErrorKind::Authorization => "authorization",
            ErrorKind::Transport => "transport",
            ErrorKind::ConnectionClosed => "connection-closed",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Application(_) => "application",
        }
    }
}

/// The domain error shared by client, server and router.
///
/// Servers capture these into error envelopes and never propagate them past
/// the connection; clients surface them to the caller of `call`.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcError {
    pub kind: ErrorKind,
    pub message: String,
    pub data: Option<Value>,
}

impl RpcError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            data: None,
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Parse, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidRequest, message)
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            ErrorKind::MethodNotFound,
            format!("method '{method}' not found"),
        )
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidParams, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Authentication, message)
    }

    pub fn authorization(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Authorization, message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transport, message)
    }

    pub fn connection_closed() -> Self {
        Self::new(ErrorKind::ConnectionClosed, "connection closed")
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    pub fn application(code: i64, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Application(code), message)
    }

    /// Attach structured detail, carried in the `data` member on the wire.
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn code(&self) -> i64 {
        self.kind.code()
    }

    pub fn to_error_object(&self) -> JsonRpcErrorObject {
        JsonRpcErrorObject {
            code: self.code(),
            message: self.message.clone(),
            data: self.data.clone(),
        }
    }

    pub fn from_error_object(object: &JsonRpcErrorObject) -> Self {
        Self {
            kind: ErrorKind::from_code(object.code),
            message: object.message.clone(),
            data: object.data.clone(),
        }
    }

    /// Build the full error response envelope for this error.
    pub fn to_envelope(&self, id: Option<RequestId>) -> JsonRpcError {
        JsonRpcError::new(id, self.to_error_object())
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.kind.label(), self.code(), self.message)
    }
}

impl std::error::Error for RpcError {}

impl From<JsonRpcError> for RpcError {
    fn from(envelope: JsonRpcError) -> Self {
        RpcError::from_error_object(&envelope.error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn kind_codes_are_stable() {
        assert_eq!(ErrorKind::Parse.code(), -32700);
        assert_eq!(ErrorKind::MethodNotFound.code(), -32601);
        assert_eq!(ErrorKind::Authentication.code(), -32001);
        assert_eq!(ErrorKind::ConnectionClosed.code(), -32004);
        assert_eq!(ErrorKind::Application(0).code(), 0);
    }

    #[test]
    fn code_mapping_roundtrips() {
        for kind in [
            ErrorKind::Parse,
            ErrorKind::InvalidRequest,
            ErrorKind::MethodNotFound,
            ErrorKind::InvalidParams,
            ErrorKind::Internal,
            ErrorKind::Authentication,
            ErrorKind::Authorization,
            ErrorKind::Transport,
            ErrorKind::ConnectionClosed,
            ErrorKind::Timeout,
            ErrorKind::Application(42),
        ] {
            assert_eq!(ErrorKind::from_code(kind.code()), kind);
        }
    }

    #[test]
    fn envelope_serialization() {
        let envelope = RpcError::parse("bad frame").to_envelope(None);
        let text = serde_json::to_string(&envelope).unwrap();
        assert!(text.contains(r#""id":null"#));
        assert!(text.contains(r#""code":-32700"#));
    }

    #[test]
    fn wire_conversion_preserves_kind_and_data() {
        let error = RpcError::application(7, "boom").with_data(json!({"detail": true}));
        let back = RpcError::from_error_object(&error.to_error_object());
        assert_eq!(back, error);
    }
}
