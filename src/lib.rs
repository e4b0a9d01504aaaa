//! # Convo
//!
//! `convo` is a minimal real-time chat relay. Browsers connect over a
//! WebSocket, send chat records, and receive every record published by any
//! connected client. Fan-out goes through an external pub/sub broker (Redis)
//! on a single channel, `main`, so several relay processes can share one
//! conversation.
//!
//! ## Core Modules
//!
//! - `broker`: connection pool, publisher and broker backends (Redis and in-process).
//! - `transport`: the chat record, HTTP routes, and the per-connection handler and bridge.
//! - `config`: loading server, broker and logging settings.
//! - `utils`: shared error types and logging setup.

pub mod broker;
pub mod config;
pub mod transport;
pub mod utils;
