//! Two peers on one WebSocket: the dialer calls the host, and the host's
//! handler calls the dialer back over the same connection before answering.
//!
//! Run with:
//! ```bash
//! RUST_LOG=debug cargo run --example peer_demo
//! ```

use std::sync::Arc;

use serde_json::{json, Value};
use tandem_router::{ws, Router, RpcError};
use tandem_server::builtins::{RequestLogging, SkipAuthentication};
use tandem_server::{EndpointBuilder, RpcServer};
use tokio::net::TcpListener;

fn site(name: &'static str) -> Arc<RpcServer> {
    let endpoint = EndpointBuilder::new(name, "/peer")
        .method("greet", &["who"], move |_call, params| {
            Box::pin(async move {
                let who = params.first().and_then(Value::as_str).unwrap_or("stranger");
                Ok(json!(format!("hello {who}, this is {name}")))
            })
        })
        .method("greet_back", &["who"], |call, params| {
            Box::pin(async move {
                let reverse = call
                    .reverse_client()
                    .cloned()
                    .ok_or_else(|| RpcError::internal("no reverse client attached"))?;
                let them = reverse.call("greet", params).await?;
                Ok(json!({ "relayed": them }))
            })
        })
        .reverse_client()
        .build()
        .expect("endpoint");

    Arc::new(
        RpcServer::builder()
            .endpoint(endpoint)
            .plugin(SkipAuthentication)
            .plugin(RequestLogging)
            .build()
            .expect("server"),
    )
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let host = Router::new(site("host"));
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = ws::serve_on(listener, host).await;
    });

    let dialer = Router::new(site("dialer"));
    let connection = ws::connect(&format!("ws://{addr}/peer"), dialer.clone()).await?;
    let client = dialer.connection_client(connection)?;

    let direct = client.call("greet", vec![json!("tandem")]).await?;
    println!("direct call:  {direct}");

    let relayed = client.call("greet_back", vec![json!("tandem")]).await?;
    println!("reverse call: {relayed}");

    dialer.close_connection(connection);
    Ok(())
}
