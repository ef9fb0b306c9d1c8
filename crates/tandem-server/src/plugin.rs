use async_trait::async_trait;
use serde_json::Value;
use tandem_jsonrpc::{JsonRpcMessage, RpcError};

use crate::call::{IncomingCall, IncomingEnvelope};

/// Lifecycle hooks around one inbound request.
///
/// Hooks run in plugin registration order at each stage; every hook has a
/// no-op default. The first hook error short-circuits the stage and is
/// captured into the response envelope (it never propagates past the
/// connection).
///
/// Stage order per request: `before_json_decode`, `after_json_decode`,
/// `authenticate`, `authorize`, then the handler, then `call_result` on
/// success or `exception_catch` on failure, then `response` and
/// `after_json_encode` on the outbound envelope.
#[async_trait]
pub trait ServerPlugin: Send + Sync {
    /// Mutate the raw inbound blob before JSON parsing.
    async fn before_json_decode(&self, raw: &mut String) -> Result<(), RpcError> {
        let _ = raw;
        Ok(())
    }

    /// Mutate the decoded envelope before dispatch.
    async fn after_json_decode(&self, envelope: &mut IncomingEnvelope) -> Result<(), RpcError> {
        let _ = envelope;
        Ok(())
    }

    /// Establish the caller identity via [`IncomingCall::set_caller`].
    ///
    /// If no plugin grants an identity the server rejects the request with
    /// an authentication error: deny is the default.
    async fn authenticate(&self, call: &mut IncomingCall) -> Result<(), RpcError> {
        let _ = call;
        Ok(())
    }

    /// Reject the authenticated caller with an authorization error, or let
    /// it pass.
    async fn authorize(&self, call: &IncomingCall) -> Result<(), RpcError> {
        let _ = call;
        Ok(())
    }

    /// Observe or reshape a successful handler result.
    async fn call_result(&self, call: &IncomingCall, result: &mut Value) -> Result<(), RpcError> {
        let _ = (call, result);
        Ok(())
    }

    /// Translate a failure before it is serialized. Must keep the error-kind
    /// contract intact (auth failures stay auth failures, and so on).
    async fn exception_catch(&self, call: &IncomingCall, error: RpcError) -> RpcError {
        let _ = call;
        error
    }

    /// Last chance to shape the outbound envelope. Not invoked for
    /// notifications, which produce no envelope.
    async fn response(
        &self,
        call: &IncomingCall,
        message: &mut JsonRpcMessage,
    ) -> Result<(), RpcError> {
        let _ = (call, message);
        Ok(())
    }

    /// Mutate the encoded outbound blob.
    async fn after_json_encode(&self, call: &IncomingCall, raw: &mut String) -> Result<(), RpcError> {
        let _ = (call, raw);
        Ok(())
    }
}
