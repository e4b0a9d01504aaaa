//! The `error` module defines the error types used within the `convo` relay.
//!
//! Errors fall into three families: transport errors on a client socket,
//! broker errors on the pub/sub side, and codec errors on the JSON wire
//! record. Each is fatal to at most one connection; none of them crash the
//! process.

use thiserror::Error;

/// Boxed error used where the concrete sink or stream error type is generic.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Top-level error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("broker error: {0}")]
    Broker(#[from] BrokerError),

    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures reading from or writing to a client socket.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("read failed: {0}")]
    Read(BoxError),

    #[error("write failed: {0}")]
    Write(BoxError),
}

/// Failures talking to the pub/sub broker.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error(transparent)]
    Redis(#[from] redis::RedisError),

    #[error("connection pool is closed")]
    PoolClosed,

    #[error("no broker connection became free in time")]
    PoolExhausted,

    #[error("connection is in subscriber mode")]
    Subscribed,

    #[error("connection is not subscribed to any channel")]
    NotSubscribed,

    #[error("subscription stream closed")]
    Closed,

    #[error("broker unavailable: {0}")]
    Unavailable(String),
}
