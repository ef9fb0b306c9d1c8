use serde::{Deserialize, Serialize};

use crate::request::RequestParams;
use crate::types::JsonRpcVersion;

/// A request without an `id`: fire-and-forget, no response is ever produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    #[serde(rename = "jsonrpc")]
    pub version: JsonRpcVersion,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<RequestParams>,
}

impl JsonRpcNotification {
    pub fn new(method: impl Into<String>, params: Option<RequestParams>) -> Self {
        Self {
            version: JsonRpcVersion,
            method: method.into(),
            params,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn notification_has_no_id() {
        let notification =
            JsonRpcNotification::new("log", Some(vec![json!("line")].into()));
        let text = serde_json::to_string(&notification).unwrap();
        assert!(!text.contains(r#""id""#));
        assert!(text.contains(r#""method":"log""#));
    }

    #[test]
    fn notification_roundtrip() {
        let notification = JsonRpcNotification::new("tick", None);
        let text = serde_json::to_string(&notification).unwrap();
        let parsed: JsonRpcNotification = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, notification);
    }
}
