//! Bounded pool of reusable broker connections.
//!
//! At most `max_active` connections are checked out at once; callers past
//! that wait. Released connections park on an idle list and are closed once
//! they have been idle longer than `idle_timeout`.

use std::collections::VecDeque;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;

use super::{BrokerConnection, Connector};
use crate::utils::BrokerError;

const MIN_REAP_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    pub max_active: usize,
    pub idle_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_active: 80,
            idle_timeout: Duration::from_secs(240),
        }
    }
}

/// Snapshot of pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    /// Connections currently checked out.
    pub active: usize,
    /// Connections parked for reuse.
    pub idle: usize,
    pub max_active: usize,
}

struct IdleConnection<T> {
    conn: T,
    since: Instant,
}

struct Shared<C: Connector> {
    connector: C,
    config: PoolConfig,
    permits: Arc<Semaphore>,
    idle: Mutex<VecDeque<IdleConnection<C::Connection>>>,
}

impl<C: Connector> Shared<C> {
    fn lock_idle(&self) -> std::sync::MutexGuard<'_, VecDeque<IdleConnection<C::Connection>>> {
        // The idle list stays consistent even if a holder panicked.
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn evict_expired(&self, now: Instant) -> usize {
        let mut idle = self.lock_idle();
        let before = idle.len();
        idle.retain(|entry| now.duration_since(entry.since) < self.config.idle_timeout);
        before - idle.len()
    }

    fn take_idle(&self) -> Option<C::Connection> {
        self.evict_expired(Instant::now());
        self.lock_idle().pop_back().map(|entry| entry.conn)
    }

    fn put_back(&self, conn: C::Connection) {
        if self.permits.is_closed() || !conn.is_reusable() {
            return;
        }
        self.lock_idle().push_back(IdleConnection {
            conn,
            since: Instant::now(),
        });
    }
}

/// Thread-safe handle to a connection pool. Clones share the same pool.
pub struct Pool<C: Connector> {
    shared: Arc<Shared<C>>,
}

impl<C: Connector> Clone for Pool<C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<C: Connector> fmt::Debug for Pool<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool").field("status", &self.status()).finish()
    }
}

impl<C: Connector> Pool<C> {
    pub fn new(connector: C, config: PoolConfig) -> Self {
        let max_active = config.max_active.max(1);
        Self {
            shared: Arc::new(Shared {
                connector,
                config: PoolConfig {
                    max_active,
                    ..config
                },
                permits: Arc::new(Semaphore::new(max_active)),
                idle: Mutex::new(VecDeque::new()),
            }),
        }
    }

    /// Checks out a connection, waiting while the pool is at capacity.
    ///
    /// Reuses an idle connection when one is available, otherwise dials a
    /// new one. Dial errors free the slot and are returned to the caller.
    pub async fn acquire(&self) -> Result<PooledConnection<C>, BrokerError> {
        let permit = Arc::clone(&self.shared.permits)
            .acquire_owned()
            .await
            .map_err(|_| BrokerError::PoolClosed)?;
        self.check_out(permit).await
    }

    /// Like [`Pool::acquire`], but fails with [`BrokerError::PoolExhausted`]
    /// when no slot frees up within `wait`.
    pub async fn acquire_within(
        &self,
        wait: Duration,
    ) -> Result<PooledConnection<C>, BrokerError> {
        let permit = Arc::clone(&self.shared.permits).acquire_owned();
        let permit = match tokio::time::timeout(wait, permit).await {
            Ok(permit) => permit.map_err(|_| BrokerError::PoolClosed)?,
            Err(_) => return Err(BrokerError::PoolExhausted),
        };
        self.check_out(permit).await
    }

    async fn check_out(
        &self,
        permit: OwnedSemaphorePermit,
    ) -> Result<PooledConnection<C>, BrokerError> {
        let conn = match self.shared.take_idle() {
            Some(conn) => conn,
            None => self.shared.connector.connect().await?,
        };

        Ok(PooledConnection {
            conn: Some(conn),
            shared: Arc::clone(&self.shared),
            _permit: permit,
        })
    }

    pub fn status(&self) -> PoolStatus {
        let max_active = self.shared.config.max_active;
        PoolStatus {
            active: max_active.saturating_sub(self.shared.permits.available_permits()),
            idle: self.shared.lock_idle().len(),
            max_active,
        }
    }

    /// Closes idle connections older than the idle timeout. Returns how many
    /// were closed.
    pub fn evict_idle(&self) -> usize {
        self.shared.evict_expired(Instant::now())
    }

    /// Periodically evicts expired idle connections until the pool closes.
    pub fn spawn_reaper(&self, every: Duration) -> JoinHandle<()> {
        let pool = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every.max(MIN_REAP_INTERVAL));
            ticker.tick().await;
            while !pool.is_closed() {
                ticker.tick().await;
                let evicted = pool.evict_idle();
                if evicted > 0 {
                    tracing::debug!(evicted, "closed expired idle broker connections");
                }
            }
        })
    }

    /// Stops handing out connections and drops every idle one. Connections
    /// already checked out are closed when released.
    pub fn close(&self) {
        self.shared.permits.close();
        self.shared.lock_idle().clear();
    }

    pub fn is_closed(&self) -> bool {
        self.shared.permits.is_closed()
    }
}

/// A checked-out connection. Returned to the pool when dropped.
pub struct PooledConnection<C: Connector> {
    conn: Option<C::Connection>,
    shared: Arc<Shared<C>>,
    _permit: OwnedSemaphorePermit,
}

impl<C: Connector> Deref for PooledConnection<C> {
    type Target = C::Connection;

    fn deref(&self) -> &Self::Target {
        self.conn
            .as_ref()
            .unwrap_or_else(|| unreachable!("connection is only taken on drop"))
    }
}

impl<C: Connector> DerefMut for PooledConnection<C> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn
            .as_mut()
            .unwrap_or_else(|| unreachable!("connection is only taken on drop"))
    }
}

impl<C: Connector> Drop for PooledConnection<C> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.shared.put_back(conn);
        }
    }
}
