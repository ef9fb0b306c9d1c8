use std::time::Duration;

use serde_json::{Map, Value};
use tandem_jsonrpc::{
    JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, RequestId, RequestParams,
};

/// The envelope being sent: a call that expects a reply, or a notification.
#[derive(Debug, Clone)]
pub enum OutboundEnvelope {
    Call(JsonRpcRequest),
    Notification(JsonRpcNotification),
}

impl OutboundEnvelope {
    pub fn method(&self) -> &str {
        match self {
            OutboundEnvelope::Call(request) => &request.method,
            OutboundEnvelope::Notification(notification) => &notification.method,
        }
    }

    pub fn id(&self) -> Option<&RequestId> {
        match self {
            OutboundEnvelope::Call(request) => Some(&request.id),
            OutboundEnvelope::Notification(_) => None,
        }
    }
}

/// Mutable state threaded through the client plugin pipeline for one call.
///
/// Plugins see it at every hook: the envelope before encoding, the encoded
/// `body`, the raw `response_body` the transport filled (the first plugin to
/// fill it wins, so a cache plugin registered ahead of the network transport
/// short-circuits it), and the parsed `response`. `context` is scratch space
/// plugins may use to hand each other values.
#[derive(Debug)]
pub struct OutgoingCall {
    pub envelope: OutboundEnvelope,
    pub body: Option<String>,
    pub response_body: Option<String>,
    pub response: Option<JsonRpcMessage>,
    pub context: Map<String, Value>,
}

impl OutgoingCall {
    pub fn call(id: RequestId, method: &str, params: Option<RequestParams>) -> Self {
        Self {
            envelope: OutboundEnvelope::Call(JsonRpcRequest::new(id, method, params)),
            body: None,
            response_body: None,
            response: None,
            context: Map::new(),
        }
    }

    pub fn notification(method: &str, params: Option<RequestParams>) -> Self {
        Self {
            envelope: OutboundEnvelope::Notification(JsonRpcNotification::new(method, params)),
            body: None,
            response_body: None,
            response: None,
            context: Map::new(),
        }
    }

    pub fn method(&self) -> &str {
        self.envelope.method()
    }

    pub fn is_notification(&self) -> bool {
        matches!(self.envelope, OutboundEnvelope::Notification(_))
    }

    /// Numeric id of this call, if it has one. Ids this client allocates are
    /// always numeric.
    pub fn id_number(&self) -> Option<i64> {
        self.envelope.id().and_then(RequestId::as_i64)
    }
}

/// Per-call knobs for [`crate::RpcClient::call_with`].
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Overrides the client-level timeout for this call.
    pub timeout: Option<Duration>,
    /// Send without an id and return as soon as the transport accepted it.
    pub notification: bool,
}

impl CallOptions {
    pub fn notification() -> Self {
        Self {
            timeout: None,
            notification: true,
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            notification: false,
        }
    }
}
