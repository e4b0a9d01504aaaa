use std::time::Duration;

use tracing::{debug, error, warn};

use super::{BrokerConnection, CHANNEL, Connector, Pool};
use crate::transport::message::Message;
use crate::utils::BrokerError;

/// How long a publish waits for a free pooled connection by default.
pub const DEFAULT_PUBLISH_WAIT: Duration = Duration::from_secs(1);

/// Publishes chat records onto the shared channel.
///
/// Each publish borrows one pooled connection for the duration of the
/// command. Delivery counts are not reported back to the sender.
pub struct Publisher<C: Connector> {
    pool: Pool<C>,
    channel: &'static str,
    wait: Duration,
}

impl<C: Connector> Clone for Publisher<C> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            channel: self.channel,
            wait: self.wait,
        }
    }
}

impl<C: Connector> Publisher<C> {
    pub fn new(pool: Pool<C>) -> Self {
        Self::with_wait(pool, DEFAULT_PUBLISH_WAIT)
    }

    /// `wait` bounds how long a publish queues for a pooled connection
    /// before the message is dropped.
    pub fn with_wait(pool: Pool<C>, wait: Duration) -> Self {
        Self {
            pool,
            channel: CHANNEL,
            wait,
        }
    }

    pub fn channel(&self) -> &str {
        self.channel
    }

    /// Serializes `message` and publishes it.
    ///
    /// A message that fails to serialize, or that finds the pool exhausted
    /// for longer than the configured wait, is logged and dropped. Other
    /// broker failures are returned.
    pub async fn publish(&self, message: &Message) -> Result<(), BrokerError> {
        let payload = match message.to_json() {
            Ok(payload) => payload,
            Err(e) => {
                error!(channel = self.channel, error = %e, "failed to serialize message; dropped");
                return Ok(());
            }
        };

        let mut conn = match self.pool.acquire_within(self.wait).await {
            Ok(conn) => conn,
            Err(BrokerError::PoolExhausted) => {
                let status = self.pool.status();
                warn!(
                    channel = self.channel,
                    active = status.active,
                    max_active = status.max_active,
                    "broker pool exhausted; message dropped"
                );
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        let receivers = conn.publish(self.channel, &payload).await?;
        debug!(channel = self.channel, receivers, "published message");
        Ok(())
    }
}
