//! The `broker` module is everything on the pub/sub side of the relay.
//!
//! A [`Connector`] dials connections to a broker backend, the [`Pool`] hands
//! them out for one logical operation at a time, the [`Publisher`] pushes
//! chat records onto the channel, and subscriber connections yield
//! [`BrokerEvent`]s for the per-client bridges.
//!
//! Two backends are provided: Redis (`redis://`) and a process-local hub
//! (`memory://`).

pub mod event;
pub mod memory;
pub mod pool;
pub mod publisher;
pub mod redis;

use std::future::Future;

use crate::utils::BrokerError;

pub use event::{BrokerEvent, SubscriptionKind};
pub use memory::MemoryBroker;
pub use pool::{Pool, PoolConfig, PoolStatus, PooledConnection};
pub use publisher::Publisher;
pub use self::redis::RedisConnector;

/// The single channel every client publishes to and subscribes on.
pub const CHANNEL: &str = "main";

/// Dials new connections to a broker.
pub trait Connector: Send + Sync + 'static {
    type Connection: BrokerConnection;

    fn connect(&self) -> impl Future<Output = Result<Self::Connection, BrokerError>> + Send;
}

/// One connection to a broker, exclusively owned by whoever acquired it.
pub trait BrokerConnection: Send + 'static {
    /// Publishes `payload` on `channel`, returning how many subscribers the
    /// broker delivered it to.
    fn publish(
        &mut self,
        channel: &str,
        payload: &str,
    ) -> impl Future<Output = Result<usize, BrokerError>> + Send;

    /// Puts the connection into subscriber mode on `channel`.
    fn subscribe(&mut self, channel: &str) -> impl Future<Output = Result<(), BrokerError>> + Send;

    /// Waits for the next event on a subscribed connection.
    fn next_event(&mut self) -> impl Future<Output = BrokerEvent> + Send;

    /// Whether the connection may go back to the idle list once released.
    /// Subscribed connections may not.
    fn is_reusable(&self) -> bool;
}
