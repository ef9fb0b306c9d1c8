use std::sync::Arc;

use async_trait::async_trait;
use tandem_jsonrpc::RpcError;

use crate::call::OutgoingCall;
use crate::plugin::ClientPlugin;

/// In-process transport: hands each encoded request to a closure and uses
/// whatever it returns as the response body.
///
/// Exists for tests and for wiring a client straight to a co-located server
/// (`Some` carries the response blob, `None` means notification / no reply).
pub struct LoopbackTransport {
    exchange: Arc<dyn Fn(&str) -> Option<String> + Send + Sync>,
}

impl LoopbackTransport {
    pub fn new(exchange: impl Fn(&str) -> Option<String> + Send + Sync + 'static) -> Self {
        Self {
            exchange: Arc::new(exchange),
        }
    }
}

#[async_trait]
impl ClientPlugin for LoopbackTransport {
    async fn make_request(&self, call: &mut OutgoingCall) -> Result<bool, RpcError> {
        let body = call
            .body
            .clone()
            .ok_or_else(|| RpcError::internal("request reached transport before encoding"))?;
        let reply = (self.exchange)(&body);
        if !call.is_notification() {
            call.response_body = reply;
        }
        Ok(true)
    }
}
