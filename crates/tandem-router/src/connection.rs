use std::collections::HashMap;

use tandem_client::RpcClient;
use tandem_jsonrpc::RpcError;
use tokio::sync::mpsc;

/// Lifecycle of one routed connection.
///
/// `Open -> Closing` on local shutdown, `Closing -> Closed` once the
/// transport confirms, any state `-> Closed` on transport error. No frame is
/// sent once the connection has left `Open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Open,
    Closing,
    Closed,
}

/// Router-side state for one duplex connection.
pub(crate) struct RouterConnection {
    id: u64,
    path: String,
    peer: Option<String>,
    state: ConnectionState,
    outbound: Option<mpsc::UnboundedSender<String>>,
    /// Reverse clients created for this connection, keyed by endpoint path.
    reverse_clients: HashMap<String, RpcClient>,
}

impl RouterConnection {
    pub(crate) fn new(
        id: u64,
        path: String,
        peer: Option<String>,
        outbound: mpsc::UnboundedSender<String>,
    ) -> Self {
        Self {
            id,
            path,
            peer,
            state: ConnectionState::Open,
            outbound: Some(outbound),
            reverse_clients: HashMap::new(),
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn path(&self) -> &str {
        &self.path
    }

    pub(crate) fn peer(&self) -> Option<&str> {
        self.peer.as_deref()
    }

    pub(crate) fn state(&self) -> ConnectionState {
        self.state
    }

    pub(crate) fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    /// Queue one frame for the transport.
    pub(crate) fn send(&self, text: String) -> Result<(), RpcError> {
        let sender = self
            .outbound
            .as_ref()
            .filter(|_| self.is_open())
            .ok_or_else(RpcError::connection_closed)?;
        sender.send(text).map_err(|_| RpcError::connection_closed())
    }

    /// Local shutdown: stop sending and drop the outbound channel so the
    /// transport's writer ends and closes the socket.
    pub(crate) fn begin_close(&mut self) {
        if self.state == ConnectionState::Open {
            self.state = ConnectionState::Closing;
        }
        self.outbound = None;
    }

    /// Terminal transition; fails every pending reverse call.
    pub(crate) fn mark_closed(&mut self, error: RpcError) {
        self.state = ConnectionState::Closed;
        self.outbound = None;
        for client in self.reverse_clients.values() {
            client.fail_pending(error.clone());
        }
    }

    pub(crate) fn reverse_client(&self, endpoint_path: &str) -> Option<RpcClient> {
        self.reverse_clients.get(endpoint_path).cloned()
    }

    pub(crate) fn insert_reverse_client(&mut self, endpoint_path: String, client: RpcClient) {
        self.reverse_clients.insert(endpoint_path, client);
    }

    pub(crate) fn reverse_clients(&self) -> impl Iterator<Item = &RpcClient> {
        self.reverse_clients.values()
    }
}
