//! In-process broker backend.
//!
//! Channels are created on first use and keep a broadcast queue that every
//! subscribed connection reads from. Delivery is best-effort: a subscriber
//! that falls more than `capacity` events behind skips the ones it missed.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use super::{BrokerConnection, BrokerEvent, Connector, SubscriptionKind};
use crate::utils::BrokerError;

const DEFAULT_CAPACITY: usize = 1024;

/// Process-local pub/sub hub. Clones share the same channels.
#[derive(Debug, Clone)]
pub struct MemoryBroker {
    channels: Arc<Mutex<HashMap<String, broadcast::Sender<Vec<u8>>>>>,
    capacity: usize,
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// `capacity` is how many undelivered events a subscriber may lag behind.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: Arc::new(Mutex::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    fn sender(&self, channel: &str) -> broadcast::Sender<Vec<u8>> {
        let mut channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    /// Publishes `payload` to every current subscriber of `channel` and
    /// returns how many there were.
    pub fn publish(&self, channel: &str, payload: impl Into<Vec<u8>>) -> usize {
        self.sender(channel).send(payload.into()).unwrap_or(0)
    }

    pub fn subscribe(&self, channel: &str) -> broadcast::Receiver<Vec<u8>> {
        self.sender(channel).subscribe()
    }

    pub fn subscriber_count(&self, channel: &str) -> usize {
        let channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        channels
            .get(channel)
            .map_or(0, broadcast::Sender::receiver_count)
    }
}

impl Connector for MemoryBroker {
    type Connection = MemoryConnection;

    async fn connect(&self) -> Result<MemoryConnection, BrokerError> {
        Ok(MemoryConnection {
            broker: self.clone(),
            subscription: None,
        })
    }
}

struct Subscription {
    channel: String,
    receiver: broadcast::Receiver<Vec<u8>>,
    acknowledged: bool,
}

pub struct MemoryConnection {
    broker: MemoryBroker,
    subscription: Option<Subscription>,
}

impl BrokerConnection for MemoryConnection {
    async fn publish(&mut self, channel: &str, payload: &str) -> Result<usize, BrokerError> {
        if self.subscription.is_some() {
            return Err(BrokerError::Subscribed);
        }
        Ok(self.broker.publish(channel, payload))
    }

    async fn subscribe(&mut self, channel: &str) -> Result<(), BrokerError> {
        self.subscription = Some(Subscription {
            channel: channel.to_string(),
            receiver: self.broker.subscribe(channel),
            acknowledged: false,
        });
        Ok(())
    }

    async fn next_event(&mut self) -> BrokerEvent {
        let Some(subscription) = self.subscription.as_mut() else {
            return BrokerEvent::Error(BrokerError::NotSubscribed);
        };

        if !subscription.acknowledged {
            subscription.acknowledged = true;
            return BrokerEvent::Subscription {
                channel: subscription.channel.clone(),
                kind: SubscriptionKind::Subscribe,
                count: 1,
            };
        }

        loop {
            match subscription.receiver.recv().await {
                Ok(payload) => {
                    return BrokerEvent::Message {
                        channel: subscription.channel.clone(),
                        payload,
                    };
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        channel = %subscription.channel,
                        skipped,
                        "subscriber lagged behind; events dropped"
                    );
                }
                Err(RecvError::Closed) => return BrokerEvent::Error(BrokerError::Closed),
            }
        }
    }

    fn is_reusable(&self) -> bool {
        self.subscription.is_none()
    }
}
