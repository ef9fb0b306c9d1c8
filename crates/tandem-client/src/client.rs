use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde_json::Value;
use tandem_jsonrpc::{self as jsonrpc, JsonRpcMessage, RequestId, RequestParams, RpcError};
use tracing::{debug, warn};

use crate::call::{CallOptions, OutboundEnvelope, OutgoingCall};
use crate::pending::PendingCalls;
use crate::plugin::ClientPlugin;

/// Client-level configuration.
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    /// Default per-call timeout. `None` waits indefinitely (the connection
    /// closing still fails the call).
    pub timeout: Option<Duration>,
}

struct ClientInner {
    plugins: RwLock<Vec<Arc<dyn ClientPlugin>>>,
    pending: PendingCalls,
    next_id: AtomicI64,
    config: ClientConfig,
}

/// A JSON-RPC client.
///
/// Cheap to clone; clones share the plugin list, the id counter and the
/// pending-call map, so a transport reader task can hold one clone while
/// callers hold others. Ids are allocated from a monotonic per-client
/// counter and are unique for the lifetime of the client.
#[derive(Clone)]
pub struct RpcClient {
    inner: Arc<ClientInner>,
}

impl Default for RpcClient {
    fn default() -> Self {
        Self::new(ClientConfig::default())
    }
}

impl RpcClient {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                plugins: RwLock::new(Vec::new()),
                pending: PendingCalls::new(),
                next_id: AtomicI64::new(1),
                config,
            }),
        }
    }

    /// Append a plugin. Hooks run in registration order.
    pub fn add_plugin(&self, plugin: Arc<dyn ClientPlugin>) {
        self.inner.plugins.write().push(plugin);
    }

    /// Remove the most recently added plugin (plugins come off in reverse
    /// registration order).
    pub fn remove_last_plugin(&self) -> Option<Arc<dyn ClientPlugin>> {
        self.inner.plugins.write().pop()
    }

    pub fn plugin_count(&self) -> usize {
        self.inner.plugins.read().len()
    }

    /// Number of calls currently awaiting a response.
    pub fn pending_count(&self) -> usize {
        self.inner.pending.len()
    }

    /// Call a remote method and await its result.
    pub async fn call(
        &self,
        method: &str,
        params: impl Into<RequestParams>,
    ) -> Result<Value, RpcError> {
        self.call_with(method, Some(params.into()), CallOptions::default())
            .await
    }

    /// Send a notification: no id, no response, returns once the transport
    /// accepted the frame.
    pub async fn notify(
        &self,
        method: &str,
        params: impl Into<RequestParams>,
    ) -> Result<(), RpcError> {
        self.call_with(method, Some(params.into()), CallOptions::notification())
            .await
            .map(|_| ())
    }

    /// Call with explicit options (timeout override, notification flag).
    pub async fn call_with(
        &self,
        method: &str,
        params: Option<RequestParams>,
        options: CallOptions,
    ) -> Result<Value, RpcError> {
        let plugins = self.plugins_snapshot();
        let mut call = if options.notification {
            OutgoingCall::notification(method, params)
        } else {
            let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
            OutgoingCall::call(RequestId::Number(id), method, params)
        };

        match self.run_pipeline(&plugins, &mut call, &options).await {
            Ok(value) => Ok(value),
            Err(mut error) => {
                for plugin in &plugins {
                    error = plugin.exception_catch(&call, error).await;
                }
                Err(error)
            }
        }
    }

    /// Feed a raw inbound response frame to the pending-call map.
    ///
    /// Transports with asynchronous replies (WebSocket, router connections)
    /// call this from their read path. Unmatched or undecodable frames are
    /// logged and dropped; they never fail the client.
    pub fn on_response(&self, text: &str) {
        let message = match jsonrpc::decode_message(text) {
            Ok(message) => message,
            Err(error) => {
                warn!(%error, "dropping undecodable response frame");
                return;
            }
        };
        let id = match message.id().and_then(RequestId::as_i64) {
            Some(id) => id,
            None => {
                warn!("dropping response without a numeric id");
                return;
            }
        };
        if !self.complete_response(message) {
            warn!(id, "dropping response with no matching pending call");
        }
    }

    /// Resolve the pending call the envelope's id belongs to, if this client
    /// owns it. Routers demultiplexing one connection between several
    /// clients use this to probe without logging.
    pub fn complete_response(&self, message: JsonRpcMessage) -> bool {
        match message.id().and_then(RequestId::as_i64) {
            Some(id) => self.inner.pending.complete(id, message),
            None => false,
        }
    }

    /// Reject every in-flight call. Invoked when the transport under this
    /// client goes away.
    pub fn fail_pending(&self, error: RpcError) {
        let failed = self.inner.pending.fail_all(error);
        if failed > 0 {
            debug!(failed, "rejected pending calls");
        }
    }

    fn plugins_snapshot(&self) -> Vec<Arc<dyn ClientPlugin>> {
        self.inner.plugins.read().clone()
    }

    async fn run_pipeline(
        &self,
        plugins: &[Arc<dyn ClientPlugin>],
        call: &mut OutgoingCall,
        options: &CallOptions,
    ) -> Result<Value, RpcError> {
        for plugin in plugins {
            plugin.before_json_encode(call).await?;
        }
        call.body = Some(match &call.envelope {
            OutboundEnvelope::Call(request) => jsonrpc::encode(request)?,
            OutboundEnvelope::Notification(notification) => jsonrpc::encode(notification)?,
        });
        for plugin in plugins {
            plugin.after_json_encode(call).await?;
        }

        let receiver = call
            .id_number()
            .map(|id| self.inner.pending.register(id, call.method()));

        let mut sent = false;
        for plugin in plugins {
            if call.response_body.is_some() {
                // An earlier plugin already produced the response; later
                // transports are short-circuited.
                sent = true;
                break;
            }
            match plugin.make_request(call).await {
                Ok(true) => {
                    sent = true;
                    break;
                }
                Ok(false) => continue,
                Err(error) => {
                    self.forget(call);
                    return Err(error);
                }
            }
        }
        if !sent && call.response_body.is_none() {
            self.forget(call);
            return Err(RpcError::transport("no transport plugin installed"));
        }

        if call.is_notification() {
            return Ok(Value::Null);
        }

        let message = match call.response_body.clone() {
            Some(body) => {
                // Synchronous transport: the reply is already here, the
                // pending entry was never needed.
                self.forget(call);
                jsonrpc::decode_message(&body)?
            }
            None => {
                let receiver = match receiver {
                    Some(receiver) => receiver,
                    None => return Err(RpcError::internal("call has no pending entry")),
                };
                let limit = options.timeout.or(self.inner.config.timeout);
                let awaited = match limit {
                    Some(limit) => match tokio::time::timeout(limit, receiver).await {
                        Ok(awaited) => awaited,
                        Err(_) => {
                            self.forget(call);
                            return Err(RpcError::timeout(format!(
                                "no response to '{}' within {}ms",
                                call.method(),
                                limit.as_millis()
                            )));
                        }
                    },
                    None => receiver.await,
                };
                match awaited {
                    Ok(resolution) => resolution?,
                    // Sender dropped without resolving: the pending map (and
                    // the client with it) went away under us.
                    Err(_) => return Err(RpcError::connection_closed()),
                }
            }
        };

        call.response = Some(message);
        for plugin in plugins {
            plugin.after_json_decode(call).await?;
        }

        match call.response.take() {
            Some(JsonRpcMessage::Response(response)) => Ok(response.result),
            Some(JsonRpcMessage::Error(envelope)) => Err(RpcError::from(envelope)),
            None => Err(RpcError::internal("response envelope removed by plugin")),
        }
    }

    fn forget(&self, call: &OutgoingCall) {
        if let Some(id) = call.id_number() {
            self.inner.pending.cancel(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use tandem_jsonrpc::ErrorKind;

    /// Transport answering every call with its own request id and a fixed
    /// result, recording the bodies it saw.
    struct EchoTransport {
        result: Value,
        seen: Mutex<Vec<String>>,
    }

    impl EchoTransport {
        fn new(result: Value) -> Self {
            Self {
                result,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ClientPlugin for EchoTransport {
        async fn make_request(&self, call: &mut OutgoingCall) -> Result<bool, RpcError> {
            let body = call.body.clone().unwrap();
            self.seen.lock().unwrap().push(body);
            if let Some(id) = call.id_number() {
                let reply = JsonRpcMessage::success(RequestId::Number(id), self.result.clone());
                call.response_body = Some(serde_json::to_string(&reply).unwrap());
            }
            Ok(true)
        }
    }

    #[tokio::test]
    async fn call_resolves_with_result() {
        let client = RpcClient::default();
        client.add_plugin(Arc::new(EchoTransport::new(json!(3))));

        let result = client.call("divide", vec![json!(6), json!(2)]).await.unwrap();
        assert_eq!(result, json!(3));
        assert_eq!(client.pending_count(), 0);
    }

    #[tokio::test]
    async fn ids_are_monotonic_per_client() {
        let transport = Arc::new(EchoTransport::new(json!(null)));
        let client = RpcClient::default();
        client.add_plugin(transport.clone());

        client.call("a", Vec::<Value>::new()).await.unwrap();
        client.call("b", Vec::<Value>::new()).await.unwrap();

        let seen = transport.seen.lock().unwrap();
        assert!(seen[0].contains(r#""id":1"#));
        assert!(seen[1].contains(r#""id":2"#));
    }

    #[tokio::test]
    async fn notification_sends_without_id_and_returns_immediately() {
        let transport = Arc::new(EchoTransport::new(json!(null)));
        let client = RpcClient::default();
        client.add_plugin(transport.clone());

        client.notify("tick", Vec::<Value>::new()).await.unwrap();
        let seen = transport.seen.lock().unwrap();
        assert!(!seen[0].contains(r#""id""#));
        assert_eq!(client.pending_count(), 0);
    }

    #[tokio::test]
    async fn no_transport_is_a_transport_error() {
        let client = RpcClient::default();
        let error = client.call("m", Vec::<Value>::new()).await.unwrap_err();
        assert_eq!(error.kind, ErrorKind::Transport);
        assert_eq!(client.pending_count(), 0);
    }

    #[tokio::test]
    async fn wire_error_surfaces_with_kind() {
        struct FailingTransport;
        #[async_trait]
        impl ClientPlugin for FailingTransport {
            async fn make_request(&self, call: &mut OutgoingCall) -> Result<bool, RpcError> {
                let id = call.id_number().unwrap();
                let envelope = RpcError::application(0, "You asked me to throw.")
                    .to_envelope(Some(RequestId::Number(id)));
                call.response_body =
                    Some(serde_json::to_string(&JsonRpcMessage::failure(envelope)).unwrap());
                Ok(true)
            }
        }

        let client = RpcClient::default();
        client.add_plugin(Arc::new(FailingTransport));
        let error = client.call("ping", vec![json!("x"), json!(true)]).await.unwrap_err();
        assert_eq!(error.kind, ErrorKind::Application(0));
        assert_eq!(error.message, "You asked me to throw.");
    }

    #[tokio::test]
    async fn timeout_rejects_and_removes_pending() {
        // Sends but never answers.
        struct BlackHoleTransport;
        #[async_trait]
        impl ClientPlugin for BlackHoleTransport {
            async fn make_request(&self, _call: &mut OutgoingCall) -> Result<bool, RpcError> {
                Ok(true)
            }
        }

        let client = RpcClient::default();
        client.add_plugin(Arc::new(BlackHoleTransport));
        let error = client
            .call_with(
                "slow",
                None,
                CallOptions::with_timeout(Duration::from_millis(20)),
            )
            .await
            .unwrap_err();
        assert_eq!(error.kind, ErrorKind::Timeout);
        assert_eq!(client.pending_count(), 0);

        // A late response for the timed-out id is dropped quietly.
        client.on_response(r#"{"jsonrpc":"2.0","id":1,"result":"late"}"#);
    }

    #[tokio::test]
    async fn cache_plugin_short_circuits_transport() {
        struct CachePlugin;
        #[async_trait]
        impl ClientPlugin for CachePlugin {
            async fn make_request(&self, call: &mut OutgoingCall) -> Result<bool, RpcError> {
                if let Some(id) = call.id_number() {
                    let reply =
                        JsonRpcMessage::success(RequestId::Number(id), json!("cached"));
                    call.response_body = Some(serde_json::to_string(&reply).unwrap());
                }
                Ok(false) // did not send anything; just filled the body
            }
        }

        let transport = Arc::new(EchoTransport::new(json!("network")));
        let client = RpcClient::default();
        client.add_plugin(Arc::new(CachePlugin));
        client.add_plugin(transport.clone());

        let result = client.call("lookup", Vec::<Value>::new()).await.unwrap();
        assert_eq!(result, json!("cached"));
        assert!(transport.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn plugins_removed_in_reverse_order() {
        let client = RpcClient::default();
        let first: Arc<dyn ClientPlugin> = Arc::new(EchoTransport::new(json!(1)));
        let second: Arc<dyn ClientPlugin> = Arc::new(EchoTransport::new(json!(2)));
        client.add_plugin(first);
        client.add_plugin(second.clone());

        let removed = client.remove_last_plugin().unwrap();
        assert!(Arc::ptr_eq(&removed, &second));
        assert_eq!(client.plugin_count(), 1);
    }
}
