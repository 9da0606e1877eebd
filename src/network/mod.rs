//! Message handling at the transport boundary.
//!
//! The transport itself (framing, connections, endpoint resolution) lives
//! elsewhere; this module only defines what a server-side handler must do
//! with a message once it has been read off a channel.

mod cleanup_rpc_handler;
mod rpc_handler;

pub use cleanup_rpc_handler::*;
pub use rpc_handler::*;
