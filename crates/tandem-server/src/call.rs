use std::sync::Arc;

use serde_json::{Map, Value};
use tandem_client::RpcClient;
use tandem_jsonrpc::{JsonRpcNotification, JsonRpcRequest, RequestId, RequestParams};

use crate::endpoint::Endpoint;

/// Who is calling. Opaque to the framework: an authentication plugin fills
/// it in during the authenticate phase and authorization plugins read it.
#[derive(Debug, Clone, PartialEq)]
pub struct CallerIdentity {
    pub subject: String,
    pub attributes: Map<String, Value>,
}

impl CallerIdentity {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            attributes: Map::new(),
        }
    }

    /// The identity granted by [`crate::builtins::SkipAuthentication`].
    pub fn anonymous() -> Self {
        Self::new("anonymous")
    }
}

/// What the transport knows about where a request came from.
///
/// The router fills `connection_id` and `reverse_client` for requests
/// arriving over a duplex connection; an HTTP host typically sets only
/// `peer`.
#[derive(Default)]
pub struct TransportContext {
    pub peer: Option<String>,
    pub connection_id: Option<u64>,
    pub reverse_client: Option<RpcClient>,
    pub metadata: Map<String, Value>,
}

/// A decoded request or notification, unified for dispatch: `id` is `None`
/// for notifications.
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingEnvelope {
    pub id: Option<RequestId>,
    pub method: String,
    pub params: Option<RequestParams>,
}

impl From<JsonRpcRequest> for IncomingEnvelope {
    fn from(request: JsonRpcRequest) -> Self {
        Self {
            id: Some(request.id),
            method: request.method,
            params: request.params,
        }
    }
}

impl From<JsonRpcNotification> for IncomingEnvelope {
    fn from(notification: JsonRpcNotification) -> Self {
        Self {
            id: None,
            method: notification.method,
            params: notification.params,
        }
    }
}

/// Per-call context, created for one inbound request and dropped once its
/// response (if any) has been emitted.
///
/// Handlers receive it as their first argument; plugins see it from the
/// authenticate hook onwards. At most one response envelope is ever produced
/// for it, and none when it is a notification.
pub struct IncomingCall {
    envelope: IncomingEnvelope,
    endpoint: Arc<Endpoint>,
    caller: Option<CallerIdentity>,
    reverse_client: Option<RpcClient>,
    peer: Option<String>,
    connection_id: Option<u64>,
    context: Map<String, Value>,
}

impl IncomingCall {
    pub fn new(envelope: IncomingEnvelope, endpoint: Arc<Endpoint>, cx: TransportContext) -> Self {
        Self {
            envelope,
            endpoint,
            caller: None,
            reverse_client: cx.reverse_client,
            peer: cx.peer,
            connection_id: cx.connection_id,
            context: cx.metadata,
        }
    }

    pub fn method(&self) -> &str {
        &self.envelope.method
    }

    pub fn params(&self) -> Option<&RequestParams> {
        self.envelope.params.as_ref()
    }

    pub fn id(&self) -> Option<&RequestId> {
        self.envelope.id.as_ref()
    }

    pub fn is_notification(&self) -> bool {
        self.envelope.id.is_none()
    }

    pub fn endpoint(&self) -> &Arc<Endpoint> {
        &self.endpoint
    }

    pub fn caller(&self) -> Option<&CallerIdentity> {
        self.caller.as_ref()
    }

    /// Grant an identity. Called by authentication plugins; leaving the
    /// caller unset means the request is rejected after the authenticate
    /// phase.
    pub fn set_caller(&mut self, caller: CallerIdentity) {
        self.caller = Some(caller);
    }

    /// Client for calling back toward the peer that sent this request.
    /// Present only on duplex connections whose endpoint declares a reverse
    /// client factory.
    pub fn reverse_client(&self) -> Option<&RpcClient> {
        self.reverse_client.as_ref()
    }

    pub fn peer(&self) -> Option<&str> {
        self.peer.as_deref()
    }

    pub fn connection_id(&self) -> Option<u64> {
        self.connection_id
    }

    /// Plugin scratch space, seeded from the transport metadata.
    pub fn context(&self) -> &Map<String, Value> {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.context
    }
}
