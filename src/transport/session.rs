//! Per-connection context.
//!
//! A [`Session`] ties together the two tasks serving one client: the
//! handler reading from the socket and the bridge writing broker events to
//! it. The handler owns the session; when it stops, the bridge is cancelled
//! and awaited so its broker connection goes back to the pool.

use std::fmt;

use axum::extract::ws::Message as WsMessage;
use futures_util::{Sink, SinkExt};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::message::Message;
use crate::utils::{BoxError, Error, TransportError};

/// Identifies one client connection in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0.simple())
    }
}

/// Write half of a client socket, shared by the handler and the bridge.
pub struct Outbound<S> {
    sink: Mutex<S>,
}

impl<S> Outbound<S>
where
    S: Sink<WsMessage> + Unpin + Send,
    S::Error: Into<BoxError>,
{
    pub fn new(sink: S) -> Self {
        Self {
            sink: Mutex::new(sink),
        }
    }

    /// Writes `message` as one text frame.
    pub async fn send(&self, message: &Message) -> Result<(), Error> {
        let text = message.to_json()?;
        self.sink
            .lock()
            .await
            .send(WsMessage::Text(text.into()))
            .await
            .map_err(|e| TransportError::Write(e.into()))?;
        Ok(())
    }

    pub async fn close(&self) {
        let _ = self.sink.lock().await.close().await;
    }
}

pub struct Session<T> {
    id: ConnectionId,
    cancel: CancellationToken,
    bridge: Option<JoinHandle<T>>,
}

impl<T> Session<T> {
    pub fn new(id: ConnectionId) -> Self {
        Self {
            id,
            cancel: CancellationToken::new(),
            bridge: None,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Token the bridge watches for the handler's termination.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn attach_bridge(&mut self, bridge: JoinHandle<T>) {
        self.bridge = Some(bridge);
    }

    /// Signals the bridge to stop and waits for it. Returns the bridge's
    /// outcome, or `None` if it was never started or panicked.
    pub async fn close(mut self) -> Option<T> {
        self.cancel.cancel();
        let bridge = self.bridge.take()?;
        match bridge.await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                tracing::error!(conn = %self.id, error = %e, "bridge task failed");
                None
            }
        }
    }
}

impl<T> Drop for Session<T> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
