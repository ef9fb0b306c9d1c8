use std::sync::Weak;

use async_trait::async_trait;
use tandem_client::{ClientPlugin, OutgoingCall};
use tandem_jsonrpc::RpcError;

use crate::router::Router;

/// Client transport for reverse calls: hands each encoded request to the
/// router, addressed by connection id.
///
/// Holds only the id and a weak router handle, never the connection itself:
/// the router looks the connection up on every send, so its state machine
/// governs the frame (no sends once the connection leaves `Open`) and no
/// reference cycle forms between router, connection and reverse client.
pub struct ConnectionTransport {
    connection_id: u64,
    router: Weak<Router>,
}

impl ConnectionTransport {
    pub fn new(connection_id: u64, router: Weak<Router>) -> Self {
        Self {
            connection_id,
            router,
        }
    }

    pub fn connection_id(&self) -> u64 {
        self.connection_id
    }
}

#[async_trait]
impl ClientPlugin for ConnectionTransport {
    async fn make_request(&self, call: &mut OutgoingCall) -> Result<bool, RpcError> {
        let body = call
            .body
            .clone()
            .ok_or_else(|| RpcError::internal("request reached transport before encoding"))?;
        let router = self
            .router
            .upgrade()
            .ok_or_else(RpcError::connection_closed)?;
        router.send_frame(self.connection_id, body)?;
        Ok(true)
    }
}
