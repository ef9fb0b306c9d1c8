//! # HTTP host
//!
//! Classical one-way operation: POSTs under a path prefix are fed to
//! [`tandem_server::RpcServer::process_request`], with the endpoint path
//! taken from the remainder of the URI. One envelope per request body, one
//! per response body, `Content-Type: application/json`; notifications get a
//! `204 No Content`.

pub mod host;

pub use host::{HostConfig, HttpHost, HttpHostBuilder};
