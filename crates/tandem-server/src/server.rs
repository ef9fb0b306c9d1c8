use std::sync::Arc;

use parking_lot::RwLock;
use tandem_jsonrpc::{self as jsonrpc, InboundFrame, JsonRpcMessage, RequestId, RpcError};
use tracing::{debug, warn};

use crate::call::{IncomingCall, IncomingEnvelope, TransportContext};
use crate::endpoint::Endpoint;
use crate::error::RegistryError;
use crate::plugin::ServerPlugin;
use crate::registry::EndpointRegistry;

/// Emitted when even the error envelope cannot be encoded.
const INTERNAL_FALLBACK: &str =
    r#"{"jsonrpc":"2.0","id":null,"error":{"code":-32603,"message":"Internal error"}}"#;

/// Server-level configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Accept id-less envelopes. When false they are rejected with an
    /// invalid-request envelope instead of being dispatched silently.
    pub allow_notifications: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            allow_notifications: true,
        }
    }
}

/// Assembles an [`RpcServer`]: endpoints, initial plugins, configuration.
pub struct RpcServerBuilder {
    config: ServerConfig,
    registry: EndpointRegistry,
    plugins: Vec<Arc<dyn ServerPlugin>>,
    invalid: Option<RegistryError>,
}

impl RpcServerBuilder {
    fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            registry: EndpointRegistry::new(),
            plugins: Vec::new(),
            invalid: None,
        }
    }

    pub fn endpoint(mut self, endpoint: Endpoint) -> Self {
        if self.invalid.is_none() {
            if let Err(error) = self.registry.register(endpoint) {
                self.invalid = Some(error);
            }
        }
        self
    }

    pub fn plugin<P: ServerPlugin + 'static>(mut self, plugin: P) -> Self {
        self.plugins.push(Arc::new(plugin));
        self
    }

    pub fn allow_notifications(mut self, allow: bool) -> Self {
        self.config.allow_notifications = allow;
        self
    }

    pub fn build(self) -> Result<RpcServer, RegistryError> {
        if let Some(error) = self.invalid {
            return Err(error);
        }
        Ok(RpcServer {
            config: self.config,
            registry: self.registry,
            plugins: RwLock::new(self.plugins),
        })
    }
}

/// The server half of a peer: turns one raw request blob into at most one
/// raw response blob.
///
/// Re-entrant by construction: `process_request` takes `&self` and keeps all
/// per-request state in the [`IncomingCall`], so one instance serves any
/// number of connections concurrently.
pub struct RpcServer {
    config: ServerConfig,
    registry: EndpointRegistry,
    plugins: RwLock<Vec<Arc<dyn ServerPlugin>>>,
}

impl RpcServer {
    pub fn builder() -> RpcServerBuilder {
        RpcServerBuilder::new()
    }

    /// Append a plugin at runtime (e.g. operators enabling traffic by
    /// registering an authenticator).
    pub fn add_plugin(&self, plugin: Arc<dyn ServerPlugin>) {
        self.plugins.write().push(plugin);
    }

    /// Remove the most recently added plugin.
    pub fn remove_last_plugin(&self) -> Option<Arc<dyn ServerPlugin>> {
        self.plugins.write().pop()
    }

    /// Endpoint mounted at `path`, if any. The router uses this to find the
    /// reverse client factory for a connection.
    pub fn endpoint_at(&self, path: &str) -> Option<Arc<Endpoint>> {
        self.registry.get(path)
    }

    /// Process one inbound blob addressed to `endpoint_path`.
    ///
    /// Returns the encoded response, or `None` for notifications (whose
    /// hooks still run, but whose envelope is suppressed). Failures of any
    /// kind are captured into error envelopes; this method never fails past
    /// the connection.
    pub async fn process_request(
        &self,
        raw: &str,
        endpoint_path: &str,
        cx: TransportContext,
    ) -> Option<String> {
        let plugins = self.plugins_snapshot();

        let mut raw = raw.to_string();
        for plugin in &plugins {
            if let Err(error) = plugin.before_json_decode(&mut raw).await {
                return self.bare_error(None, error);
            }
        }

        let frame = match InboundFrame::classify(&raw) {
            Ok(frame) => frame,
            Err(error) => return self.bare_error(None, error),
        };
        let mut envelope = match frame {
            InboundFrame::Call(request) => IncomingEnvelope::from(request),
            InboundFrame::Notify(notification) => {
                if !self.config.allow_notifications {
                    return self.bare_error(
                        None,
                        RpcError::invalid_request("notifications are not accepted here"),
                    );
                }
                IncomingEnvelope::from(notification)
            }
            InboundFrame::Reply(message) => {
                return self.bare_error(
                    message.id().cloned(),
                    RpcError::invalid_request("response envelope addressed to a server"),
                );
            }
            InboundFrame::Invalid { id } => {
                return self.bare_error(id, RpcError::invalid_request("malformed request envelope"));
            }
        };

        for plugin in &plugins {
            if let Err(error) = plugin.after_json_decode(&mut envelope).await {
                return self.bare_error(envelope.id.clone(), error);
            }
        }

        let endpoint = match self.registry.get(endpoint_path) {
            Some(endpoint) => endpoint,
            None => {
                return self.bare_error(
                    envelope.id.clone(),
                    RpcError::method_not_found(endpoint_path),
                );
            }
        };

        let mut call = IncomingCall::new(envelope, endpoint, cx);

        for plugin in &plugins {
            if let Err(error) = plugin.authenticate(&mut call).await {
                return self.finish_error(&plugins, &call, error).await;
            }
        }
        if call.caller().is_none() {
            // Deny by default: nothing vouched for this caller.
            let error = RpcError::authentication("no authentication plugin granted access");
            return self.finish_error(&plugins, &call, error).await;
        }
        for plugin in &plugins {
            if let Err(error) = plugin.authorize(&call).await {
                return self.finish_error(&plugins, &call, error).await;
            }
        }

        let resolution = {
            let endpoint = call.endpoint().clone();
            endpoint.resolve(call.method(), call.params())
        };
        let call = Arc::new(call);
        let outcome = match resolution {
            Ok((handler, params)) => handler(call.clone(), params).await,
            Err(error) => Err(error),
        };

        match outcome {
            Ok(mut result) => {
                for plugin in &plugins {
                    if let Err(error) = plugin.call_result(&call, &mut result).await {
                        return self.finish_error(&plugins, &call, error).await;
                    }
                }
                if call.is_notification() {
                    debug!(method = %call.method(), "notification handled, response suppressed");
                    return None;
                }
                let id = call.id().cloned()?;
                let mut message = JsonRpcMessage::success(id, result);
                self.finish(&plugins, &call, &mut message).await
            }
            Err(error) => self.finish_error(&plugins, &call, error).await,
        }
    }

    fn plugins_snapshot(&self) -> Vec<Arc<dyn ServerPlugin>> {
        self.plugins.read().clone()
    }

    /// Error path for failures that happen after the call context exists.
    async fn finish_error(
        &self,
        plugins: &[Arc<dyn ServerPlugin>],
        call: &IncomingCall,
        mut error: RpcError,
    ) -> Option<String> {
        for plugin in plugins {
            error = plugin.exception_catch(call, error).await;
        }
        if call.is_notification() {
            debug!(method = %call.method(), %error, "notification failed, response suppressed");
            return None;
        }
        let mut message = JsonRpcMessage::failure(error.to_envelope(call.id().cloned()));
        self.finish(plugins, call, &mut message).await
    }

    async fn finish(
        &self,
        plugins: &[Arc<dyn ServerPlugin>],
        call: &IncomingCall,
        message: &mut JsonRpcMessage,
    ) -> Option<String> {
        for plugin in plugins {
            if let Err(error) = plugin.response(call, message).await {
                *message = JsonRpcMessage::failure(error.to_envelope(call.id().cloned()));
            }
        }
        let mut raw = match jsonrpc::encode(message) {
            Ok(raw) => raw,
            Err(error) => {
                warn!(%error, "failed to encode response envelope");
                return Some(INTERNAL_FALLBACK.to_string());
            }
        };
        for plugin in plugins {
            if let Err(error) = plugin.after_json_encode(call, &mut raw).await {
                warn!(%error, "after_json_encode hook failed, sending envelope unmodified");
            }
        }
        Some(raw)
    }

    /// Error path for failures before any call context exists (parse and
    /// shape errors). Call-scoped hooks cannot run here.
    fn bare_error(&self, id: Option<RequestId>, error: RpcError) -> Option<String> {
        let message = JsonRpcMessage::failure(error.to_envelope(id));
        match jsonrpc::encode(&message) {
            Ok(raw) => Some(raw),
            Err(encode_error) => {
                warn!(%encode_error, "failed to encode error envelope");
                Some(INTERNAL_FALLBACK.to_string())
            }
        }
    }
}
