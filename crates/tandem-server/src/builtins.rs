//! Built-in plugins for common operator needs.

use async_trait::async_trait;
use serde_json::{json, Value};
use tandem_jsonrpc::RpcError;
use tracing::{debug, warn};

use crate::call::{CallerIdentity, IncomingCall, IncomingEnvelope};
use crate::plugin::ServerPlugin;

/// Grants an anonymous identity to every request that nothing else has
/// authenticated. Without this (or a real authenticator) the server rejects
/// all traffic.
pub struct SkipAuthentication;

#[async_trait]
impl ServerPlugin for SkipAuthentication {
    async fn authenticate(&self, call: &mut IncomingCall) -> Result<(), RpcError> {
        if call.caller().is_none() {
            call.set_caller(CallerIdentity::anonymous());
        }
        Ok(())
    }
}

/// Explicitly allows every authenticated caller. Authorization already
/// defaults to allow when no plugin denies; registering this documents the
/// intent at the call site.
pub struct AllowAllAuthorization;

#[async_trait]
impl ServerPlugin for AllowAllAuthorization {
    async fn authorize(&self, _call: &IncomingCall) -> Result<(), RpcError> {
        Ok(())
    }
}

/// Logs each dispatched method and its outcome through `tracing`.
pub struct RequestLogging;

#[async_trait]
impl ServerPlugin for RequestLogging {
    async fn after_json_decode(&self, envelope: &mut IncomingEnvelope) -> Result<(), RpcError> {
        debug!(
            method = %envelope.method,
            notification = envelope.id.is_none(),
            "request received"
        );
        Ok(())
    }

    async fn call_result(&self, call: &IncomingCall, _result: &mut Value) -> Result<(), RpcError> {
        debug!(method = %call.method(), "request succeeded");
        Ok(())
    }

    async fn exception_catch(&self, call: &IncomingCall, error: RpcError) -> RpcError {
        warn!(method = %call.method(), %error, "request failed");
        error
    }
}

/// Attaches error details to the `data` member of outbound error envelopes.
/// Install only where leaking internals to callers is acceptable.
pub struct DebugErrorDetails;

#[async_trait]
impl ServerPlugin for DebugErrorDetails {
    async fn exception_catch(&self, call: &IncomingCall, error: RpcError) -> RpcError {
        let detail = json!({
            "kind": error.kind.label(),
            "method": call.method(),
            "endpoint": call.endpoint().name(),
        });
        match error.data {
            Some(_) => error,
            None => error.with_data(detail),
        }
    }
}
