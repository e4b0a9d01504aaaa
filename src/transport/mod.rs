//! The `transport` module is the client-facing side of the relay.
//!
//! It defines the chat record exchanged with browsers, the HTTP routes, and
//! the two tasks that serve every WebSocket connection: the handler reading
//! from the client and the bridge relaying broker events back to it.
//!
//! The handler cancels its bridge when it stops, so a bridge never outlives
//! its client connection by more than one in-flight broker event.

pub mod bridge;
pub mod handler;
pub mod message;
pub mod router;
pub mod server;
pub mod session;

pub use handler::{Relay, handle_connection};
pub use message::{Message, MessageKind};
pub use router::{AppState, create_router};
pub use server::serve;

#[cfg(test)]
mod websocket_tests;
