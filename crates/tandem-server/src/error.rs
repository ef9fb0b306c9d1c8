use thiserror::Error;

/// Errors raised while assembling a server, before any traffic flows.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// Two endpoints may not share a normalized path.
    #[error("endpoint path already in use: {0}")]
    PathInUse(String),

    /// Names starting with `rpc.` are reserved by the protocol and can
    /// never be dispatched, so registering one is a configuration bug.
    #[error("method name is reserved: {0}")]
    ReservedMethod(String),
}
