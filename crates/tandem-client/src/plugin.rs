use async_trait::async_trait;
use tandem_jsonrpc::RpcError;

use crate::call::OutgoingCall;

/// Lifecycle hooks around one outbound call.
///
/// Hooks run in plugin registration order; every hook has a no-op default so
/// a plugin implements only what it needs. The transport is just another
/// plugin: the first one whose [`ClientPlugin::make_request`] either fills
/// `response_body` or returns `Ok(true)` ends the transport phase.
#[async_trait]
pub trait ClientPlugin: Send + Sync {
    /// Mutate the envelope before it is encoded.
    async fn before_json_encode(&self, call: &mut OutgoingCall) -> Result<(), RpcError> {
        let _ = call;
        Ok(())
    }

    /// Mutate the encoded request blob.
    async fn after_json_encode(&self, call: &mut OutgoingCall) -> Result<(), RpcError> {
        let _ = call;
        Ok(())
    }

    /// Move the request. Return `Ok(true)` if this plugin delivered it.
    ///
    /// A synchronous transport (HTTP) also assigns `call.response_body`
    /// before returning; an asynchronous one (WebSocket) returns after the
    /// send and lets the owning client's `on_response` resolve the call
    /// later. Filling `response_body` without sending anything is how a
    /// cache plugin answers from local state.
    async fn make_request(&self, call: &mut OutgoingCall) -> Result<bool, RpcError> {
        let _ = call;
        Ok(false)
    }

    /// Inspect or mutate the parsed response envelope.
    async fn after_json_decode(&self, call: &mut OutgoingCall) -> Result<(), RpcError> {
        let _ = call;
        Ok(())
    }

    /// Translate an error before it reaches the caller. Must preserve the
    /// error-kind contract (a timeout stays a timeout unless deliberately
    /// reclassified to an application kind).
    async fn exception_catch(&self, call: &OutgoingCall, error: RpcError) -> RpcError {
        let _ = call;
        error
    }
}
