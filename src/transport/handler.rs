//! Connection handler: owns one client socket for its whole life.
//!
//! Right after the upgrade a subscriber bridge is spawned for the same
//! socket, then inbound frames are read one at a time. Handshakes are
//! answered directly; every other record is published to the broker. Any
//! read, decode, write or publish failure ends the connection.

use std::sync::Arc;

use axum::extract::ws::Message as WsMessage;
use futures_util::{Sink, Stream, StreamExt};
use tracing::{debug, info, warn};

use super::bridge::{self, BridgeExit};
use super::message::Message;
use super::session::{ConnectionId, Outbound, Session};
use crate::broker::{Connector, Pool, Publisher};
use crate::utils::{BoxError, TransportError};

/// Broker-side handles every connection handler needs.
pub struct Relay<C: Connector> {
    pub pool: Pool<C>,
    pub publisher: Publisher<C>,
}

impl<C: Connector> Relay<C> {
    pub fn new(pool: Pool<C>) -> Self {
        let publisher = Publisher::new(pool.clone());
        Self { pool, publisher }
    }

    pub fn with_publisher(pool: Pool<C>, publisher: Publisher<C>) -> Self {
        Self { pool, publisher }
    }
}

impl<C: Connector> Clone for Relay<C> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            publisher: self.publisher.clone(),
        }
    }
}

/// Why a connection handler stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerExit {
    /// The client closed the socket or the stream ended.
    Closed,
    ReadFailed,
    /// The client sent a frame that is not a chat record.
    Malformed,
    WriteFailed,
    PublishFailed,
}

/// Outcome of one connection, for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionSummary {
    pub handler: HandlerExit,
    pub bridge: Option<BridgeExit>,
}

enum Inbound {
    Record(Message),
    Control,
    Close,
}

fn classify(frame: WsMessage) -> serde_json::Result<Inbound> {
    match frame {
        WsMessage::Text(text) => Message::from_json(&text).map(Inbound::Record),
        WsMessage::Binary(bytes) => Message::from_slice(&bytes).map(Inbound::Record),
        WsMessage::Ping(_) | WsMessage::Pong(_) => Ok(Inbound::Control),
        WsMessage::Close(_) => Ok(Inbound::Close),
    }
}

/// Serves one upgraded client connection until it terminates.
pub async fn handle_connection<C, S, R, E>(
    relay: Relay<C>,
    sink: S,
    mut stream: R,
) -> ConnectionSummary
where
    C: Connector,
    S: Sink<WsMessage> + Unpin + Send + 'static,
    S::Error: Into<BoxError>,
    R: Stream<Item = Result<WsMessage, E>> + Unpin,
    E: Into<BoxError>,
{
    let id = ConnectionId::new();
    let outbound = Arc::new(Outbound::new(sink));

    let mut session = Session::new(id);
    session.attach_bridge(tokio::spawn(bridge::run(
        id,
        relay.pool.clone(),
        Arc::clone(&outbound),
        session.cancel_token(),
    )));
    info!(conn = %id, "client connected");

    let handler = loop {
        let frame = match stream.next().await {
            Some(Ok(frame)) => frame,
            Some(Err(e)) => {
                let e = TransportError::Read(e.into());
                warn!(conn = %id, error = %e, "client read failed");
                break HandlerExit::ReadFailed;
            }
            None => break HandlerExit::Closed,
        };

        let message = match classify(frame) {
            Ok(Inbound::Record(message)) => message,
            Ok(Inbound::Control) => continue,
            Ok(Inbound::Close) => break HandlerExit::Closed,
            Err(e) => {
                warn!(conn = %id, error = %e, "malformed client message");
                break HandlerExit::Malformed;
            }
        };
        debug!(conn = %id, kind = %message.kind(), user = message.user(), "client message");

        if message.kind().is_handshake() {
            if let Err(e) = outbound.send(&Message::handshake_reply(&message)).await {
                warn!(conn = %id, error = %e, "handshake reply failed");
                break HandlerExit::WriteFailed;
            }
        } else if let Err(e) = relay.publisher.publish(&message).await {
            warn!(conn = %id, channel = relay.publisher.channel(), error = %e, "publish failed");
            break HandlerExit::PublishFailed;
        }
    };

    let bridge = session.close().await;
    outbound.close().await;
    info!(conn = %id, ?handler, ?bridge, "client disconnected");

    ConnectionSummary { handler, bridge }
}
