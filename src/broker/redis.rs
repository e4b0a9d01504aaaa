//! Redis broker backend.
//!
//! A pooled connection dials nothing until it is used. The first `publish`
//! opens a multiplexed command connection that is kept for reuse; `subscribe`
//! opens a dedicated pub/sub connection instead, after which the connection
//! refuses commands and is never handed back to the idle list.

use ::redis::aio::{MultiplexedConnection, PubSub};
use ::redis::{AsyncCommands, Client};
use futures_util::StreamExt;

use super::{BrokerConnection, BrokerEvent, Connector, SubscriptionKind};
use crate::utils::BrokerError;

/// Dials Redis at a fixed address.
#[derive(Debug, Clone)]
pub struct RedisConnector {
    client: Client,
}

impl RedisConnector {
    /// Validates `url` (e.g. `redis://127.0.0.1:6379`). No connection is
    /// made until one is used.
    pub fn new(url: &str) -> Result<Self, BrokerError> {
        Ok(Self {
            client: Client::open(url)?,
        })
    }
}

impl Connector for RedisConnector {
    type Connection = RedisConnection;

    async fn connect(&self) -> Result<RedisConnection, BrokerError> {
        Ok(RedisConnection {
            client: self.client.clone(),
            command: None,
            subscription: None,
        })
    }
}

struct Subscription {
    pubsub: PubSub,
    channel: String,
    pending_ack: bool,
}

pub struct RedisConnection {
    client: Client,
    command: Option<MultiplexedConnection>,
    subscription: Option<Subscription>,
}

impl BrokerConnection for RedisConnection {
    async fn publish(&mut self, channel: &str, payload: &str) -> Result<usize, BrokerError> {
        if self.subscription.is_some() {
            return Err(BrokerError::Subscribed);
        }
        let conn = match self.command.take() {
            Some(conn) => conn,
            None => self.client.get_multiplexed_async_connection().await?,
        };
        let conn = self.command.insert(conn);
        let receivers: usize = conn.publish(channel, payload).await?;
        Ok(receivers)
    }

    async fn subscribe(&mut self, channel: &str) -> Result<(), BrokerError> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(channel).await?;
        self.command = None;
        self.subscription = Some(Subscription {
            pubsub,
            channel: channel.to_string(),
            pending_ack: true,
        });
        Ok(())
    }

    async fn next_event(&mut self) -> BrokerEvent {
        let Some(Subscription {
            pubsub,
            channel,
            pending_ack,
        }) = self.subscription.as_mut()
        else {
            return BrokerEvent::Error(BrokerError::NotSubscribed);
        };

        // `SUBSCRIBE` only returns once Redis confirmed it, so the ack is
        // reported here rather than read off the wire.
        if *pending_ack {
            *pending_ack = false;
            return BrokerEvent::Subscription {
                channel: channel.clone(),
                kind: SubscriptionKind::Subscribe,
                count: 1,
            };
        }

        match pubsub.on_message().next().await {
            Some(msg) => BrokerEvent::Message {
                channel: msg.get_channel_name().to_string(),
                payload: msg.get_payload_bytes().to_vec(),
            },
            None => BrokerEvent::Error(BrokerError::Closed),
        }
    }

    fn is_reusable(&self) -> bool {
        self.subscription.is_none()
    }
}
