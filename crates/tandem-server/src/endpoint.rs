use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;
use tandem_client::{ClientPlugin, RpcClient};
use tandem_jsonrpc::{RequestParams, RpcError};

use crate::call::IncomingCall;
use crate::error::RegistryError;

/// Method names under this prefix belong to the protocol and are never
/// dispatchable.
const RESERVED_PREFIX: &str = "rpc.";

/// A method handler capability: the per-call context plus the bound
/// positional parameters, returning the result value or a domain error.
pub type Handler = Arc<
    dyn Fn(Arc<IncomingCall>, Vec<Value>) -> BoxFuture<'static, Result<Value, RpcError>>
        + Send
        + Sync,
>;

/// Builds the reverse client the router instantiates per connection: given
/// the connection-bound transport, produce a configured client. The default
/// factory just registers the transport on a fresh client; endpoints wanting
/// extra plugins or a timeout supply their own.
pub type ReverseClientFactory = Arc<dyn Fn(Arc<dyn ClientPlugin>) -> RpcClient + Send + Sync>;

struct Method {
    param_names: Vec<String>,
    handler: Handler,
}

/// A named method set mounted at a URL path. Immutable once built.
pub struct Endpoint {
    name: String,
    path: String,
    methods: HashMap<String, Method>,
    reverse_factory: Option<ReverseClientFactory>,
}

impl Endpoint {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }

    pub fn reverse_factory(&self) -> Option<&ReverseClientFactory> {
        self.reverse_factory.as_ref()
    }

    /// Resolve a method and bind `params` positionally.
    ///
    /// Array params bind in order. Object params bind against the declared
    /// parameter names; a missing name binds to JSON `null`, extras are
    /// ignored. Reserved (`rpc.`-prefixed) and unknown names both come back
    /// as method-not-found.
    pub fn resolve(
        &self,
        method: &str,
        params: Option<&RequestParams>,
    ) -> Result<(Handler, Vec<Value>), RpcError> {
        if method.starts_with(RESERVED_PREFIX) {
            return Err(RpcError::method_not_found(method));
        }
        let entry = self
            .methods
            .get(method)
            .ok_or_else(|| RpcError::method_not_found(method))?;

        let bound = match params {
            None => Vec::new(),
            Some(RequestParams::Array(items)) => items.clone(),
            Some(RequestParams::Object(map)) => entry
                .param_names
                .iter()
                .map(|name| map.get(name).cloned().unwrap_or(Value::Null))
                .collect(),
        };
        Ok((entry.handler.clone(), bound))
    }
}

/// Assembles an immutable [`Endpoint`].
pub struct EndpointBuilder {
    name: String,
    path: String,
    methods: HashMap<String, Method>,
    reverse_factory: Option<ReverseClientFactory>,
    invalid: Option<RegistryError>,
}

impl EndpointBuilder {
    /// `name` is diagnostic only; `path` is the routing key.
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            methods: HashMap::new(),
            reverse_factory: None,
            invalid: None,
        }
    }

    /// Register a method. `param_names` drive by-name binding of object
    /// params; positional callers just line up with them.
    pub fn method<F>(mut self, name: &str, param_names: &[&str], handler: F) -> Self
    where
        F: Fn(Arc<IncomingCall>, Vec<Value>) -> BoxFuture<'static, Result<Value, RpcError>>
            + Send
            + Sync
            + 'static,
    {
        if name.starts_with(RESERVED_PREFIX) && self.invalid.is_none() {
            self.invalid = Some(RegistryError::ReservedMethod(name.to_string()));
            return self;
        }
        self.methods.insert(
            name.to_string(),
            Method {
                param_names: param_names.iter().map(|n| n.to_string()).collect(),
                handler: Arc::new(handler),
            },
        );
        self
    }

    /// Declare that connections hitting this endpoint get a reverse client
    /// built by `factory`.
    pub fn reverse_client_factory(mut self, factory: ReverseClientFactory) -> Self {
        self.reverse_factory = Some(factory);
        self
    }

    /// Declare the default reverse client: a fresh [`RpcClient`] with just
    /// the connection transport registered.
    pub fn reverse_client(self) -> Self {
        self.reverse_client_factory(Arc::new(|transport| {
            let client = RpcClient::default();
            client.add_plugin(transport);
            client
        }))
    }

    pub fn build(self) -> Result<Endpoint, RegistryError> {
        if let Some(error) = self.invalid {
            return Err(error);
        }
        Ok(Endpoint {
            name: self.name,
            path: self.path,
            methods: self.methods,
            reverse_factory: self.reverse_factory,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sum_endpoint() -> Endpoint {
        EndpointBuilder::new("math", "/math")
            .method("sum", &["a", "b"], |_call, params| {
                Box::pin(async move {
                    let a = params.first().and_then(Value::as_i64).unwrap_or(0);
                    let b = params.get(1).and_then(Value::as_i64).unwrap_or(0);
                    Ok(json!(a + b))
                })
            })
            .build()
            .unwrap()
    }

    #[test]
    fn positional_binding() {
        let endpoint = sum_endpoint();
        let params = RequestParams::Array(vec![json!(1), json!(2)]);
        let (_, bound) = endpoint.resolve("sum", Some(&params)).unwrap();
        assert_eq!(bound, vec![json!(1), json!(2)]);
    }

    #[test]
    fn named_binding_fills_missing_with_null_and_drops_extras() {
        let endpoint = sum_endpoint();
        let mut map = serde_json::Map::new();
        map.insert("b".to_string(), json!(5));
        map.insert("unrelated".to_string(), json!(true));
        let params = RequestParams::Object(map);
        let (_, bound) = endpoint.resolve("sum", Some(&params)).unwrap();
        assert_eq!(bound, vec![Value::Null, json!(5)]);
    }

    #[test]
    fn absent_params_bind_empty() {
        let endpoint = sum_endpoint();
        let (_, bound) = endpoint.resolve("sum", None).unwrap();
        assert!(bound.is_empty());
    }

    #[test]
    fn unknown_method_not_found() {
        let endpoint = sum_endpoint();
        let error = match endpoint.resolve("product", None) {
            Err(e) => e,
            Ok(_) => panic!("expected error"),
        };
        assert_eq!(error.kind, tandem_jsonrpc::ErrorKind::MethodNotFound);
    }

    #[test]
    fn reserved_names_are_not_callable_nor_registrable() {
        let endpoint = sum_endpoint();
        let error = match endpoint.resolve("rpc.discover", None) {
            Err(e) => e,
            Ok(_) => panic!("expected error"),
        };
        assert_eq!(error.kind, tandem_jsonrpc::ErrorKind::MethodNotFound);

        let build_error = match EndpointBuilder::new("bad", "/bad")
            .method("rpc.internal", &[], |_call, _params| {
                Box::pin(async { Ok(Value::Null) })
            })
            .build()
        {
            Err(e) => e,
            Ok(_) => panic!("expected error"),
        };
        assert_eq!(
            build_error,
            RegistryError::ReservedMethod("rpc.internal".to_string())
        );
    }
}
