use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::{JsonRpcVersion, RequestId};

/// The `params` field of a request or notification.
///
/// Positional (array) and named (object) forms are both legal; an absent
/// `params` field is treated as an empty array at the binding site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestParams {
    Array(Vec<Value>),
    Object(Map<String, Value>),
}

impl RequestParams {
    /// Empty positional parameters.
    pub fn empty() -> Self {
        RequestParams::Array(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            RequestParams::Array(items) => items.is_empty(),
            RequestParams::Object(map) => map.is_empty(),
        }
    }

    /// Named lookup; positional params have no names.
    pub fn get(&self, name: &str) -> Option<&Value> {
        match self {
            RequestParams::Array(_) => None,
            RequestParams::Object(map) => map.get(name),
        }
    }

    /// Positional lookup; named params have no order.
    pub fn get_index(&self, index: usize) -> Option<&Value> {
        match self {
            RequestParams::Array(items) => items.get(index),
            RequestParams::Object(_) => None,
        }
    }
}

impl From<Vec<Value>> for RequestParams {
    fn from(items: Vec<Value>) -> Self {
        RequestParams::Array(items)
    }
}

impl From<Map<String, Value>> for RequestParams {
    fn from(map: Map<String, Value>) -> Self {
        RequestParams::Object(map)
    }
}

/// A JSON-RPC request that expects a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(rename = "jsonrpc")]
    pub version: JsonRpcVersion,
    pub id: RequestId,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<RequestParams>,
}

impl JsonRpcRequest {
    pub fn new(
        id: impl Into<RequestId>,
        method: impl Into<String>,
        params: Option<RequestParams>,
    ) -> Self {
        Self {
            version: JsonRpcVersion,
            id: id.into(),
            method: method.into(),
            params,
        }
    }

    /// Params as owned positional values. Named params keep their insertion
    /// order only through the caller binding them by name, so this returns
    /// `None` for the object form.
    pub fn positional_params(&self) -> Option<Vec<Value>> {
        match &self.params {
            None => Some(Vec::new()),
            Some(RequestParams::Array(items)) => Some(items.clone()),
            Some(RequestParams::Object(_)) => None,
        }
    }
}
