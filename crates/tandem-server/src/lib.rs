//! # JSON-RPC 2.0 server core
//!
//! An [`RpcServer`] takes a raw request blob plus the endpoint path it was
//! addressed to and produces a raw response blob (or nothing, for
//! notifications). Every step of that pipeline is mediated by the ordered
//! [`ServerPlugin`] hooks: blob and envelope mutation, authentication,
//! authorization, result shaping and error translation.
//!
//! Dispatch is path-keyed: each [`Endpoint`] mounts a named method set at a
//! URL path, and a method handler receives the per-call [`IncomingCall`]
//! context plus its bound positional parameters.
//!
//! Security default: a server with no authentication plugin rejects every
//! request with an `authentication` error. Register
//! [`builtins::SkipAuthentication`] (or a real authenticator) to let
//! traffic through.

pub mod builtins;
pub mod call;
pub mod endpoint;
pub mod error;
pub mod plugin;
pub mod registry;
pub mod server;

pub use call::{CallerIdentity, IncomingCall, IncomingEnvelope, TransportContext};
pub use endpoint::{Endpoint, EndpointBuilder, Handler, ReverseClientFactory};
pub use error::RegistryError;
pub use plugin::ServerPlugin;
pub use registry::{normalize_path, EndpointRegistry};
pub use server::{RpcServer, RpcServerBuilder, ServerConfig};

pub use tandem_jsonrpc::{ErrorKind, RpcError};
