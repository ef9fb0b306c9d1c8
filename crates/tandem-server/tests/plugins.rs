//! Server plugin pipeline: ordering, mutation hooks, error translation.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tandem_jsonrpc::{JsonRpcMessage, RpcError};
use tandem_server::builtins::SkipAuthentication;
use tandem_server::{
    EndpointBuilder, IncomingCall, IncomingEnvelope, RpcServer, ServerPlugin, TransportContext,
};

struct Recorder {
    id: &'static str,
    log: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl ServerPlugin for Recorder {
    async fn before_json_decode(&self, _raw: &mut String) -> Result<(), RpcError> {
        self.log.lock().unwrap().push(format!("decode:{}", self.id));
        Ok(())
    }

    async fn authenticate(&self, _call: &mut IncomingCall) -> Result<(), RpcError> {
        self.log.lock().unwrap().push(format!("auth:{}", self.id));
        Ok(())
    }

    async fn call_result(&self, _call: &IncomingCall, _result: &mut Value) -> Result<(), RpcError> {
        self.log.lock().unwrap().push(format!("result:{}", self.id));
        Ok(())
    }
}

fn echo_endpoint() -> tandem_server::Endpoint {
    EndpointBuilder::new("echo", "/")
        .method("echo", &["value"], |_call, params| {
            Box::pin(async move { Ok(params.first().cloned().unwrap_or(Value::Null)) })
        })
        .build()
        .unwrap()
}

#[tokio::test]
async fn hooks_run_in_registration_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let server = RpcServer::builder()
        .endpoint(echo_endpoint())
        .plugin(Recorder {
            id: "first",
            log: log.clone(),
        })
        .plugin(Recorder {
            id: "second",
            log: log.clone(),
        })
        .plugin(SkipAuthentication)
        .build()
        .unwrap();

    server
        .process_request(
            r#"{"jsonrpc":"2.0","id":1,"method":"echo","params":["hi"]}"#,
            "/",
            TransportContext::default(),
        )
        .await
        .unwrap();

    let log = log.lock().unwrap();
    assert_eq!(
        *log,
        vec![
            "decode:first",
            "decode:second",
            "auth:first",
            "auth:second",
            "result:first",
            "result:second",
        ]
    );
}

#[tokio::test]
async fn blob_and_envelope_mutation_hooks() {
    // Un-prefixes inbound blobs and rewrites the dispatched method name.
    struct Rewriter;

    #[async_trait]
    impl ServerPlugin for Rewriter {
        async fn before_json_decode(&self, raw: &mut String) -> Result<(), RpcError> {
            if let Some(stripped) = raw.strip_prefix("framed:") {
                *raw = stripped.to_string();
            }
            Ok(())
        }

        async fn after_json_decode(&self, envelope: &mut IncomingEnvelope) -> Result<(), RpcError> {
            if envelope.method == "alias" {
                envelope.method = "echo".to_string();
            }
            Ok(())
        }

        async fn after_json_encode(&self, _call: &IncomingCall, raw: &mut String) -> Result<(), RpcError> {
            raw.push('\n');
            Ok(())
        }
    }

    let server = RpcServer::builder()
        .endpoint(echo_endpoint())
        .plugin(Rewriter)
        .plugin(SkipAuthentication)
        .build()
        .unwrap();

    let blob = server
        .process_request(
            r#"framed:{"jsonrpc":"2.0","id":1,"method":"alias","params":["hi"]}"#,
            "/",
            TransportContext::default(),
        )
        .await
        .unwrap();
    assert!(blob.ends_with('\n'));
    let reply: Value = serde_json::from_str(blob.trim_end()).unwrap();
    assert_eq!(reply["result"], json!("hi"));
}

#[tokio::test]
async fn exception_catch_translates_errors() {
    struct Translator;

    #[async_trait]
    impl ServerPlugin for Translator {
        async fn exception_catch(&self, _call: &IncomingCall, error: RpcError) -> RpcError {
            RpcError::application(1000, format!("wrapped: {}", error.message))
        }
    }

    let server = RpcServer::builder()
        .endpoint(
            EndpointBuilder::new("boom", "/")
                .method("boom", &[], |_call, _params| {
                    Box::pin(async { Err(RpcError::internal("kaboom")) })
                })
                .build()
                .unwrap(),
        )
        .plugin(SkipAuthentication)
        .plugin(Translator)
        .build()
        .unwrap();

    let blob = server
        .process_request(
            r#"{"jsonrpc":"2.0","id":1,"method":"boom"}"#,
            "/",
            TransportContext::default(),
        )
        .await
        .unwrap();
    let reply: Value = serde_json::from_str(&blob).unwrap();
    assert_eq!(reply["error"]["code"], json!(1000));
    assert_eq!(reply["error"]["message"], json!("wrapped: kaboom"));
}

#[tokio::test]
async fn response_hook_shapes_outbound_envelope() {
    struct Stamper;

    #[async_trait]
    impl ServerPlugin for Stamper {
        async fn response(
            &self,
            _call: &IncomingCall,
            message: &mut JsonRpcMessage,
        ) -> Result<(), RpcError> {
            if let JsonRpcMessage::Response(response) = message {
                response.result = json!({ "wrapped": response.result });
            }
            Ok(())
        }
    }

    let server = RpcServer::builder()
        .endpoint(echo_endpoint())
        .plugin(SkipAuthentication)
        .plugin(Stamper)
        .build()
        .unwrap();

    let blob = server
        .process_request(
            r#"{"jsonrpc":"2.0","id":1,"method":"echo","params":[41]}"#,
            "/",
            TransportContext::default(),
        )
        .await
        .unwrap();
    let reply: Value = serde_json::from_str(&blob).unwrap();
    assert_eq!(reply["result"], json!({"wrapped": 41}));
}

#[tokio::test]
async fn authorization_denial_skips_handler() {
    struct DenyAll;

    #[async_trait]
    impl ServerPlugin for DenyAll {
        async fn authorize(&self, call: &IncomingCall) -> Result<(), RpcError> {
            Err(RpcError::authorization(format!(
                "{} may not call {}",
                call.caller().map(|c| c.subject.as_str()).unwrap_or("?"),
                call.method()
            )))
        }
    }

    let server = RpcServer::builder()
        .endpoint(echo_endpoint())
        .plugin(SkipAuthentication)
        .plugin(DenyAll)
        .build()
        .unwrap();

    let blob = server
        .process_request(
            r#"{"jsonrpc":"2.0","id":1,"method":"echo","params":["hi"]}"#,
            "/",
            TransportContext::default(),
        )
        .await
        .unwrap();
    let reply: Value = serde_json::from_str(&blob).unwrap();
    assert_eq!(
        reply["error"]["code"],
        json!(tandem_jsonrpc::error_codes::AUTHORIZATION)
    );
    assert_eq!(
        reply["error"]["message"],
        json!("anonymous may not call echo")
    );
}
