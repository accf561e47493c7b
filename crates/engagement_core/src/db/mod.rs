//! SQLite storage bootstrap, pooling and schema migration entry points.
//!
//! # Responsibility
//! - Open and configure SQLite connections for the engagement stores.
//! - Hand out pooled connections bounded by a per-operation deadline.
//! - Apply schema migrations in deterministic order.
//!
//! # Invariants
//! - Migration version is tracked via `PRAGMA user_version`.
//! - Stores must not read/write engagement data before migrations succeed.
//! - No connection is checked out, or lock awaited, past its deadline.

use thiserror::Error;

pub mod migrations;
mod open;
mod pool;

pub use open::{open_db, open_db_in_memory};
pub use pool::{ConnectionPool, Deadline, PooledConnection, MAX_BUSY_TIMEOUT};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error("database schema version {db_version} is newer than supported {latest_supported}")]
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    /// No pooled connection became available within the operation budget.
    #[error("timed out after {budget_ms}ms waiting for a database connection")]
    Timeout { budget_ms: u64 },
    #[error("connection pool size must be at least 1, got {0}")]
    InvalidPoolSize(usize),
}
