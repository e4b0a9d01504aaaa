use std::fmt;

use crate::utils::BrokerError;

/// Something that happened on a subscribed broker connection.
#[derive(Debug)]
pub enum BrokerEvent {
    /// A payload published on `channel`.
    Message { channel: String, payload: Vec<u8> },
    /// A subscribe/unsubscribe acknowledgment. `count` is the number of
    /// channels the connection is subscribed to afterwards.
    Subscription {
        channel: String,
        kind: SubscriptionKind,
        count: usize,
    },
    /// The subscription can no longer deliver events.
    Error(BrokerError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionKind {
    Subscribe,
    Unsubscribe,
}

impl fmt::Display for SubscriptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubscriptionKind::Subscribe => f.write_str("subscribe"),
            SubscriptionKind::Unsubscribe => f.write_str("unsubscribe"),
        }
    }
}
