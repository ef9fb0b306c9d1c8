use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde_json::Map;
use tandem_client::RpcClient;
use tandem_jsonrpc::{self as jsonrpc, InboundFrame, JsonRpcMessage, RequestId, RpcError};
use tandem_server::{normalize_path, ReverseClientFactory, RpcServer, TransportContext};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::connection::{ConnectionState, RouterConnection};
use crate::transport::ConnectionTransport;

/// What a transport adapter reports about its connection. `Message` carries
/// one text frame; `Closed` and `Error` are terminal.
#[derive(Debug)]
pub enum SocketEvent {
    Message(String),
    Closed,
    Error(String),
}

type ReverseClientObserver = Box<dyn Fn(u64, &RpcClient) + Send + Sync>;

/// Demultiplexer for the duplex connections of one peer.
///
/// The router exclusively owns its connections; it shares the local server
/// (many connections, one server) and exclusively owns the reverse clients
/// it instantiates per connection. Inbound frames on one connection are
/// classified in arrival order; requests are dispatched on their own tasks
/// so a handler awaiting a reverse call never stalls the frame loop, which
/// also means responses go out in completion order, not arrival order.
///
/// Every outbound frame goes through [`Router::send_frame`], so the
/// per-connection state machine is the single authority on whether a frame
/// may still be sent.
pub struct Router {
    server: Arc<RpcServer>,
    connections: Mutex<HashMap<u64, RouterConnection>>,
    next_id: AtomicU64,
    observers: Mutex<Vec<ReverseClientObserver>>,
    /// Handle to ourselves for the transports of reverse clients; they hold
    /// it weakly and look the connection up on every send.
    weak: Weak<Router>,
}

impl Router {
    pub fn new(server: Arc<RpcServer>) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            server,
            connections: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            observers: Mutex::new(Vec::new()),
            weak: weak.clone(),
        })
    }

    pub fn server(&self) -> &Arc<RpcServer> {
        &self.server
    }

    /// Register a connection: `path` is the endpoint path from its upgrade
    /// URL, `outbound` is where the transport drains frames to send. The
    /// connection holds the only copy of the sender, so dropping the
    /// connection (or closing it locally) ends the transport's writer.
    /// Returns the fresh connection id.
    pub fn add_connection(
        &self,
        path: &str,
        peer: Option<String>,
        outbound: mpsc::UnboundedSender<String>,
    ) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let connection = RouterConnection::new(id, normalize_path(path), peer, outbound);
        self.connections.lock().insert(id, connection);
        debug!(connection = id, path, "connection added");
        id
    }

    /// Entry point for transport adapters.
    pub fn handle_event(&self, id: u64, event: SocketEvent) {
        match event {
            SocketEvent::Message(text) => self.handle_message(id, &text),
            SocketEvent::Closed => self.connection_closed(id),
            SocketEvent::Error(reason) => self.connection_error(id, &reason),
        }
    }

    /// Classify and route one inbound text frame.
    pub fn handle_message(&self, id: u64, text: &str) {
        match InboundFrame::classify(text) {
            Err(error) => {
                // Not JSON: report it, keep the connection.
                self.send_protocol_error(id, &error, None);
            }
            Ok(InboundFrame::Call(_)) | Ok(InboundFrame::Notify(_)) => {
                self.dispatch_inbound(id, text);
            }
            Ok(InboundFrame::Reply(message)) => self.route_reply(id, message),
            Ok(InboundFrame::Invalid { id: request_id }) => {
                let error = RpcError::invalid_request("unrecognized frame shape");
                self.send_protocol_error(id, &error, request_id);
            }
        }
    }

    /// The reverse client bound to this connection for its endpoint,
    /// creating it on first use from the endpoint's declared factory.
    pub fn connection_client(&self, id: u64) -> Result<RpcClient, RpcError> {
        self.client_for(id, None)
    }

    /// Like [`Router::connection_client`] but with an explicit factory,
    /// overriding whatever the endpoint declares.
    pub fn connection_client_with(
        &self,
        id: u64,
        factory: &ReverseClientFactory,
    ) -> Result<RpcClient, RpcError> {
        self.client_for(id, Some(factory))
    }

    /// Observe every first-time reverse client creation on any connection,
    /// e.g. to install per-connection client plugins.
    pub fn on_reverse_client(&self, hook: impl Fn(u64, &RpcClient) + Send + Sync + 'static) {
        self.observers.lock().push(Box::new(hook));
    }

    /// Queue one frame on a connection, subject to its state machine.
    pub(crate) fn send_frame(&self, id: u64, text: String) -> Result<(), RpcError> {
        let connections = self.connections.lock();
        let connection = connections.get(&id).ok_or_else(RpcError::connection_closed)?;
        connection.send(text)
    }

    /// Local shutdown: `Open -> Closing`, outbound channel dropped so the
    /// transport writer ends and closes the socket. The entry stays until
    /// the transport confirms with [`SocketEvent::Closed`].
    pub fn close_connection(&self, id: u64) {
        if let Some(connection) = self.connections.lock().get_mut(&id) {
            connection.begin_close();
            debug!(connection = id, "connection closing");
        }
    }

    /// Transport confirmed closure: fail all pending reverse calls and drop
    /// the entry.
    pub fn connection_closed(&self, id: u64) {
        if let Some(mut connection) = self.connections.lock().remove(&id) {
            connection.mark_closed(RpcError::connection_closed());
            debug!(connection = id, "connection closed");
        }
    }

    /// Transport failure: terminal, same cleanup as a close.
    pub fn connection_error(&self, id: u64, reason: &str) {
        if let Some(mut connection) = self.connections.lock().remove(&id) {
            connection.mark_closed(RpcError::new(
                tandem_jsonrpc::ErrorKind::ConnectionClosed,
                format!("connection error: {reason}"),
            ));
            warn!(connection = id, reason, "connection failed");
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }

    pub fn connection_state(&self, id: u64) -> Option<ConnectionState> {
        self.connections.lock().get(&id).map(|c| c.state())
    }

    /// Dispatch a request/notification blob through the local server on its
    /// own task, sending any response back over the same connection.
    fn dispatch_inbound(&self, id: u64, text: &str) {
        let (path, peer, reverse_client, created) = {
            let mut connections = self.connections.lock();
            let connection = match connections.get_mut(&id) {
                Some(connection) => connection,
                None => {
                    warn!(connection = id, "frame for unknown connection dropped");
                    return;
                }
            };
            if !connection.is_open() {
                debug!(connection = id, "request on non-open connection dropped");
                return;
            }
            let (reverse_client, created) = self.ensure_reverse_client(connection, None);
            (
                connection.path().to_string(),
                connection.peer().map(String::from),
                reverse_client,
                created,
            )
        };
        if created {
            if let Some(client) = &reverse_client {
                self.notify_observers(id, client);
            }
        }

        let router = match self.weak.upgrade() {
            Some(router) => router,
            None => return,
        };
        let raw = text.to_string();
        tokio::spawn(async move {
            let cx = TransportContext {
                peer,
                connection_id: Some(id),
                reverse_client,
                metadata: Map::new(),
            };
            if let Some(response) = router.server.process_request(&raw, &path, cx).await {
                if router.send_frame(id, response).is_err() {
                    debug!(connection = id, "response dropped, connection not open");
                }
            }
        });
    }

    /// Hand a reply to whichever reverse client on this connection owns its
    /// id. Unmatched ids are logged and dropped; replies are still honored
    /// while the connection is `Closing`.
    fn route_reply(&self, id: u64, message: JsonRpcMessage) {
        let clients: Vec<RpcClient> = {
            let connections = self.connections.lock();
            match connections.get(&id) {
                Some(connection) => connection.reverse_clients().cloned().collect(),
                None => {
                    warn!(connection = id, "reply for unknown connection dropped");
                    return;
                }
            }
        };
        for client in &clients {
            if client.complete_response(message.clone()) {
                return;
            }
        }
        warn!(
            connection = id,
            reply_id = ?message.id(),
            "dropping reply with no matching pending call"
        );
    }

    fn client_for(
        &self,
        id: u64,
        factory: Option<&ReverseClientFactory>,
    ) -> Result<RpcClient, RpcError> {
        let (client, created) = {
            let mut connections = self.connections.lock();
            let connection = connections
                .get_mut(&id)
                .ok_or_else(RpcError::connection_closed)?;
            self.ensure_reverse_client(connection, factory)
        };
        let client = client.ok_or_else(|| {
            RpcError::transport("endpoint declares no reverse client for this connection")
        })?;
        if created {
            self.notify_observers(id, &client);
        }
        Ok(client)
    }

    /// Get or lazily create the connection's reverse client. Returns whether
    /// this call created it (observers fire outside the connection lock).
    fn ensure_reverse_client(
        &self,
        connection: &mut RouterConnection,
        factory: Option<&ReverseClientFactory>,
    ) -> (Option<RpcClient>, bool) {
        let key = connection.path().to_string();
        if let Some(existing) = connection.reverse_client(&key) {
            return (Some(existing), false);
        }
        let endpoint_factory;
        let factory = match factory {
            Some(factory) => factory,
            None => {
                endpoint_factory = self
                    .server
                    .endpoint_at(&key)
                    .and_then(|endpoint| endpoint.reverse_factory().cloned());
                match &endpoint_factory {
                    Some(factory) => factory,
                    None => return (None, false),
                }
            }
        };
        let transport = Arc::new(ConnectionTransport::new(
            connection.id(),
            self.weak.clone(),
        ));
        let client = factory(transport);
        connection.insert_reverse_client(key, client.clone());
        (Some(client), true)
    }

    fn notify_observers(&self, id: u64, client: &RpcClient) {
        for observer in self.observers.lock().iter() {
            observer(id, client);
        }
    }

    /// Send an error envelope for a frame that never reached the server.
    fn send_protocol_error(&self, id: u64, error: &RpcError, request_id: Option<RequestId>) {
        let envelope = JsonRpcMessage::failure(error.to_envelope(request_id));
        let text = match jsonrpc::encode(&envelope) {
            Ok(text) => text,
            Err(encode_error) => {
                warn!(%encode_error, "failed to encode protocol error envelope");
                return;
            }
        };
        if self.send_frame(id, text).is_err() {
            debug!(connection = id, "protocol error envelope dropped");
        }
    }
}
