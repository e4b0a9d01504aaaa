//! Subscriber bridge: relays broker events on the shared channel to one
//! client socket.
//!
//! The bridge moves through three states and never goes back:
//! `Subscribing` until the broker acknowledges the subscription,
//! `Relaying` while events flow, and `Terminated`. It stops when the handler
//! cancels it, when a write to the client fails, or when the broker reports
//! an error. The dedicated broker connection is released on every one of
//! those paths.

use std::sync::Arc;

use axum::extract::ws::Message as WsMessage;
use futures_util::Sink;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::message::Message;
use super::session::{ConnectionId, Outbound};
use crate::broker::{BrokerConnection, BrokerEvent, CHANNEL, Connector, Pool, SubscriptionKind};
use crate::utils::BoxError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Subscribing,
    Relaying,
    Terminated,
}

/// Why a bridge stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeExit {
    /// The owning handler terminated.
    Cancelled,
    /// Writing to the client failed.
    ClientGone,
    /// No broker connection could be obtained or subscribed.
    SubscribeFailed,
    /// The broker reported an error on the subscription.
    BrokerFailed,
}

pub async fn run<C, S>(
    id: ConnectionId,
    pool: Pool<C>,
    outbound: Arc<Outbound<S>>,
    cancel: CancellationToken,
) -> BridgeExit
where
    C: Connector,
    S: Sink<WsMessage> + Unpin + Send,
    S::Error: Into<BoxError>,
{
    let mut conn = tokio::select! {
        biased;
        () = cancel.cancelled() => return BridgeExit::Cancelled,
        acquired = pool.acquire() => match acquired {
            Ok(conn) => conn,
            Err(e) => {
                error!(conn = %id, channel = CHANNEL, error = %e, "no broker connection");
                return BridgeExit::SubscribeFailed;
            }
        },
    };

    let subscribed = tokio::select! {
        biased;
        () = cancel.cancelled() => return BridgeExit::Cancelled,
        subscribed = conn.subscribe(CHANNEL) => subscribed,
    };
    if let Err(e) = subscribed {
        error!(conn = %id, channel = CHANNEL, error = %e, "subscribe failed");
        return BridgeExit::SubscribeFailed;
    }

    let mut state = BridgeState::Subscribing;
    let exit = loop {
        let event = tokio::select! {
            biased;
            () = cancel.cancelled() => break BridgeExit::Cancelled,
            event = conn.next_event() => event,
        };

        match event {
            BrokerEvent::Message { channel, payload } => {
                let message = match Message::from_slice(&payload) {
                    Ok(message) => message,
                    Err(e) => {
                        warn!(conn = %id, %channel, error = %e, "skipping malformed payload");
                        continue;
                    }
                };
                if let Err(e) = outbound.send(&message).await {
                    info!(conn = %id, %channel, error = %e, "client write failed; stopping bridge");
                    break BridgeExit::ClientGone;
                }
            }
            BrokerEvent::Subscription {
                channel,
                kind,
                count,
            } => {
                debug!(conn = %id, %channel, %kind, count, "subscription update");
                if state == BridgeState::Subscribing && kind == SubscriptionKind::Subscribe {
                    state = BridgeState::Relaying;
                    debug!(conn = %id, %channel, "bridge relaying");
                }
            }
            BrokerEvent::Error(e) => {
                error!(conn = %id, channel = CHANNEL, error = %e, "subscription failed");
                break BridgeExit::BrokerFailed;
            }
        }
    };

    state = BridgeState::Terminated;
    drop(conn);
    debug!(conn = %id, ?state, ?exit, "bridge stopped; broker connection released");
    exit
}
