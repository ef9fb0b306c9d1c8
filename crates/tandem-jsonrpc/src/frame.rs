use serde_json::Value;

use crate::error::RpcError;
use crate::notification::JsonRpcNotification;
use crate::request::JsonRpcRequest;
use crate::response::JsonRpcMessage;
use crate::types::RequestId;

/// Classification of one inbound text frame on a duplex connection.
///
/// A frame carrying `method` is traffic for the local server (with or
/// without an id); a frame carrying `result` or `error` plus an id answers a
/// call the local side made earlier. Anything else that is still valid JSON
/// is `Invalid` and owed an invalid-request envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// A request expecting a response.
    Call(JsonRpcRequest),
    /// A notification; no response may be produced.
    Notify(JsonRpcNotification),
    /// A response to one of our own calls.
    Reply(JsonRpcMessage),
    /// Valid JSON of no recognizable JSON-RPC shape.
    Invalid { id: Option<RequestId> },
}

impl InboundFrame {
    /// Classify a raw text frame by shape.
    ///
    /// Returns a parse error only for text that is not JSON at all;
    /// everything else classifies, with malformed envelopes landing in
    /// [`InboundFrame::Invalid`] carrying whatever id could be salvaged.
    pub fn classify(text: &str) -> Result<Self, RpcError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| RpcError::parse(e.to_string()))?;

        let object = match value {
            Value::Object(ref map) => map,
            _ => return Ok(InboundFrame::Invalid { id: None }),
        };
        let id = object
            .get("id")
            .and_then(|id| serde_json::from_value::<RequestId>(id.clone()).ok());

        if object.contains_key("method") {
            if object.contains_key("id") {
                return match serde_json::from_value::<JsonRpcRequest>(value.clone()) {
                    Ok(request) => Ok(InboundFrame::Call(request)),
                    Err(_) => Ok(InboundFrame::Invalid { id }),
                };
            }
            return match serde_json::from_value::<JsonRpcNotification>(value.clone()) {
                Ok(notification) => Ok(InboundFrame::Notify(notification)),
                Err(_) => Ok(InboundFrame::Invalid { id: None }),
            };
        }

        if (object.contains_key("result") || object.contains_key("error"))
            && object.contains_key("id")
        {
            return match serde_json::from_value::<JsonRpcMessage>(value.clone()) {
                Ok(message) => Ok(InboundFrame::Reply(message)),
                Err(_) => Ok(InboundFrame::Invalid { id }),
            };
        }

        Ok(InboundFrame::Invalid { id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_call() {
        let frame =
            InboundFrame::classify(r#"{"jsonrpc":"2.0","id":1,"method":"ping","params":[]}"#)
                .unwrap();
        match frame {
            InboundFrame::Call(request) => assert_eq!(request.method, "ping"),
            other => panic!("expected call, got {other:?}"),
        }
    }

    #[test]
    fn classifies_notification() {
        let frame =
            InboundFrame::classify(r#"{"jsonrpc":"2.0","method":"tick"}"#).unwrap();
        assert!(matches!(frame, InboundFrame::Notify(_)));
    }

    #[test]
    fn classifies_reply_and_error_reply() {
        let ok = InboundFrame::classify(r#"{"jsonrpc":"2.0","id":5,"result":42}"#).unwrap();
        assert!(matches!(ok, InboundFrame::Reply(JsonRpcMessage::Response(_))));

        let err = InboundFrame::classify(
            r#"{"jsonrpc":"2.0","id":5,"error":{"code":0,"message":"nope"}}"#,
        )
        .unwrap();
        assert!(matches!(err, InboundFrame::Reply(JsonRpcMessage::Error(_))));
    }

    #[test]
    fn non_json_is_parse_error() {
        let err = InboundFrame::classify("{not json").unwrap_err();
        assert_eq!(err.kind, crate::ErrorKind::Parse);
    }

    #[test]
    fn shapeless_json_is_invalid() {
        assert_eq!(
            InboundFrame::classify(r#"{"hello":"world"}"#).unwrap(),
            InboundFrame::Invalid { id: None }
        );
        assert_eq!(
            InboundFrame::classify("[1,2,3]").unwrap(),
            InboundFrame::Invalid { id: None }
        );
    }

    #[test]
    fn wrong_version_call_salvages_id() {
        let frame =
            InboundFrame::classify(r#"{"jsonrpc":"1.0","id":9,"method":"m"}"#).unwrap();
        assert_eq!(
            frame,
            InboundFrame::Invalid {
                id: Some(RequestId::Number(9))
            }
        );
    }
}
