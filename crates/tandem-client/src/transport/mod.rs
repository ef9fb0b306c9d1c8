//! Transport plugins bundled with the client.
//!
//! Each transport is an ordinary [`crate::ClientPlugin`] implementing
//! `make_request`. Exactly one transport should be registered per client;
//! non-transport plugins may come before or after it.

pub mod http;
pub mod loopback;
pub mod ws;
