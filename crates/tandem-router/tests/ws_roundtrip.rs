//! Bi-directional calls over a real WebSocket between two routed peers.

use std::sync::Arc;

use serde_json::{json, Value};
use tandem_jsonrpc::RpcError;
use tandem_router::{ws, Router};
use tandem_server::builtins::SkipAuthentication;
use tandem_server::{EndpointBuilder, RpcServer};
use tokio::net::TcpListener;

fn site_server(site: &'static str) -> Arc<RpcServer> {
    let endpoint = EndpointBuilder::new(site, "/peer")
        .method("whoami", &[], move |_call, _params| {
            Box::pin(async move { Ok(json!(site)) })
        })
        .method("relay", &["payload"], |call, params| {
            Box::pin(async move {
                let reverse = call
                    .reverse_client()
                    .cloned()
                    .ok_or_else(|| RpcError::internal("no reverse client attached"))?;
                let peer_name = reverse.call("whoami", Vec::<Value>::new()).await?;
                Ok(json!({
                    "payload": params.first().cloned().unwrap_or(Value::Null),
                    "asked_peer": peer_name,
                }))
            })
        })
        .reverse_client()
        .build()
        .unwrap();

    Arc::new(
        RpcServer::builder()
            .endpoint(endpoint)
            .plugin(SkipAuthentication)
            .build()
            .unwrap(),
    )
}

#[tokio::test]
async fn websocket_calls_work_both_ways() {
    // Accepting side.
    let host_router = Router::new(site_server("host"));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    {
        let host_router = host_router.clone();
        tokio::spawn(async move {
            let _ = ws::serve_on(listener, host_router).await;
        });
    }

    // Dialing side: same model, its own router and server.
    let dial_router = Router::new(site_server("dialer"));
    let connection = ws::connect(&format!("ws://{addr}/peer"), dial_router.clone())
        .await
        .unwrap();

    // Dialer calls the host.
    let client = dial_router.connection_client(connection).unwrap();
    let result = client.call("whoami", Vec::<Value>::new()).await.unwrap();
    assert_eq!(result, json!("host"));

    // Dialer call that makes the host call back over the same socket.
    let result = client.call("relay", vec![json!("over-ws")]).await.unwrap();
    assert_eq!(result, json!({"payload": "over-ws", "asked_peer": "dialer"}));
}

#[tokio::test]
async fn socket_close_fails_pending_calls() {
    let host_router = Router::new(site_server("host"));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    {
        let host_router = host_router.clone();
        tokio::spawn(async move {
            let _ = ws::serve_on(listener, host_router).await;
        });
    }

    let dial_router = Router::new(site_server("dialer"));
    let connection = ws::connect(&format!("ws://{addr}/peer"), dial_router.clone())
        .await
        .unwrap();
    let client = dial_router.connection_client(connection).unwrap();

    // Warm call proves the link.
    client.call("whoami", Vec::<Value>::new()).await.unwrap();

    // Local close: pending work is cancelled once the socket confirms.
    dial_router.close_connection(connection);
    let error = client.call("whoami", Vec::<Value>::new()).await.unwrap_err();
    assert_eq!(error.kind, tandem_jsonrpc::ErrorKind::ConnectionClosed);
}
