//! Fixed-size SQLite connection pool and per-operation deadlines.
//!
//! Idle connections live in a bounded channel; checkout is a timed receive,
//! return-to-pool happens when the guard drops.

use super::{open_db, open_db_in_memory, DbError, DbResult};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use log::{info, warn};
use rusqlite::Connection;
use std::ops::{Deref, DerefMut};
use std::path::Path;
use std::time::{Duration, Instant};

const MIN_BUSY_TIMEOUT: Duration = Duration::from_millis(1);
/// Largest busy timeout SQLite accepts (an `i32` of milliseconds).
pub const MAX_BUSY_TIMEOUT: Duration = Duration::from_millis(i32::MAX as u64);

/// Time budget for one store operation, measured from construction.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started_at: Instant,
    budget: Duration,
}

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Self {
            started_at: Instant::now(),
            budget,
        }
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Returns the unspent budget, zero once expired.
    pub fn remaining(&self) -> Duration {
        self.budget.saturating_sub(self.started_at.elapsed())
    }

    pub fn is_expired(&self) -> bool {
        self.started_at.elapsed() >= self.budget
    }

    /// Fails with `DbError::Timeout` once the budget is spent.
    pub fn check(&self) -> DbResult<()> {
        if self.is_expired() {
            return Err(self.timeout_error());
        }
        Ok(())
    }

    pub(crate) fn timeout_error(&self) -> DbError {
        DbError::Timeout {
            budget_ms: u64::try_from(self.budget.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// Shared pool of migrated SQLite connections.
///
/// In-memory databases are private to one connection, so their pool always
/// has exactly one slot.
pub struct ConnectionPool {
    idle_tx: Sender<Connection>,
    idle_rx: Receiver<Connection>,
    size: usize,
}

impl ConnectionPool {
    /// Opens `size` connections to the database file at `path`.
    pub fn open(path: impl AsRef<Path>, size: usize) -> DbResult<Self> {
        if size == 0 {
            return Err(DbError::InvalidPoolSize(size));
        }
        let mut connections = Vec::with_capacity(size);
        for _ in 0..size {
            connections.push(open_db(path.as_ref())?);
        }
        info!(
            "event=db_pool_open module=db status=ok mode=file size={}",
            size
        );
        Self::from_connections(connections)
    }

    /// Opens a single-slot pool over a private in-memory database.
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = open_db_in_memory()?;
        info!("event=db_pool_open module=db status=ok mode=memory size=1");
        Self::from_connections(vec![conn])
    }

    /// Wraps already-migrated connections; an empty set is rejected.
    pub fn from_connections(connections: Vec<Connection>) -> DbResult<Self> {
        let size = connections.len();
        if size == 0 {
            return Err(DbError::InvalidPoolSize(size));
        }
        let (idle_tx, idle_rx) = bounded(size);
        for conn in connections {
            // Capacity equals the number of connections, so this never fails.
            let _ = idle_tx.try_send(conn);
        }
        Ok(Self {
            idle_tx,
            idle_rx,
            size,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of connections currently checked in.
    pub fn idle(&self) -> usize {
        self.idle_rx.len()
    }

    /// Checks out one connection, waiting at most the deadline's remaining
    /// budget.
    ///
    /// The connection's busy timeout is capped to the same budget so lock
    /// waits inside the operation cannot outlive it.
    pub fn get(&self, deadline: Deadline) -> DbResult<PooledConnection<'_>> {
        deadline.check()?;
        let conn = match self.idle_rx.recv_timeout(deadline.remaining()) {
            Ok(conn) => conn,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                warn!(
                    "event=db_pool_checkout module=db status=error error_code=timeout budget_ms={} size={}",
                    deadline.budget().as_millis(),
                    self.size
                );
                return Err(deadline.timeout_error());
            }
        };

        let pooled = PooledConnection {
            conn: Some(conn),
            pool: self,
        };
        pooled.busy_timeout(busy_timeout_for(deadline))?;
        Ok(pooled)
    }
}

fn busy_timeout_for(deadline: Deadline) -> Duration {
    deadline
        .remaining()
        .clamp(MIN_BUSY_TIMEOUT, MAX_BUSY_TIMEOUT)
}

/// Checked-out connection; returns to its pool on drop.
pub struct PooledConnection<'pool> {
    conn: Option<Connection>,
    pool: &'pool ConnectionPool,
}

impl Deref for PooledConnection<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn
            .as_ref()
            .expect("pooled connection is present until drop")
    }
}

impl DerefMut for PooledConnection<'_> {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn
            .as_mut()
            .expect("pooled connection is present until drop")
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            let _ = self.pool.idle_tx.try_send(conn);
        }
    }
}
