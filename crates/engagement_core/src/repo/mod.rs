//! Store contracts and SQLite implementations.
//!
//! # Responsibility
//! - Define the relationship and reaction store contracts.
//! - Keep SQL, transactions and driver error classification inside the
//!   persistence boundary.
//!
//! # Invariants
//! - Every mutation runs in exactly one immediate transaction that is
//!   committed only while its deadline is still live.
//! - Every read filters on `deleted_at IS NULL`.
//! - Store errors carry the name of the operation that produced them.

pub mod reaction_repo;
pub mod relationship_repo;

use crate::db::{ConnectionPool, DbError, Deadline};
use crate::model::ValidationError;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, ErrorCode, Transaction, TransactionBehavior};
use thiserror::Error;
use uuid::Uuid;

pub type StoreResult<T> = Result<T, StoreError>;

/// Classified store failure.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("{entity} not found")]
    NotFound { entity: &'static str },
    #[error("relationship already exists: {follower_id} -> {followee_id}")]
    DuplicateRelationship { follower_id: Uuid, followee_id: Uuid },
    #[error("reaction already exists for actor {actor_id} and target {target_id}")]
    DuplicateReaction { actor_id: Uuid, target_id: Uuid },
    #[error("{operation} timed out after {budget_ms}ms")]
    Timeout {
        operation: &'static str,
        budget_ms: u64,
    },
    #[error("invalid persisted data: {0}")]
    InvalidData(String),
    #[error("{operation} failed")]
    Db {
        operation: &'static str,
        #[source]
        source: DbError,
    },
}

impl StoreError {
    /// Attaches operation context and reclassifies lock contention as a
    /// timeout.
    fn in_operation(self, operation: &'static str, deadline: Deadline) -> Self {
        match self {
            Self::Db {
                source: DbError::Timeout { budget_ms },
                ..
            } => Self::Timeout {
                operation,
                budget_ms,
            },
            Self::Db {
                source: DbError::Sqlite(err),
                ..
            } if is_lock_contention(&err) => Self::Timeout {
                operation,
                budget_ms: budget_ms(deadline),
            },
            Self::Db { source, .. } => Self::Db { operation, source },
            Self::Timeout { budget_ms, .. } => Self::Timeout {
                operation,
                budget_ms,
            },
            other => other,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db {
            operation: "db",
            source: value,
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db {
            operation: "db",
            source: DbError::Sqlite(value),
        }
    }
}

impl From<ValidationError> for StoreError {
    fn from(value: ValidationError) -> Self {
        Self::InvalidArgument(value.to_string())
    }
}

/// Rejects pagination windows with `limit <= 0` or `offset < 0`.
pub fn validate_page(limit: i64, offset: i64) -> StoreResult<()> {
    if limit <= 0 {
        return Err(StoreError::InvalidArgument(format!(
            "limit must be positive, got {limit}"
        )));
    }
    if offset < 0 {
        return Err(StoreError::InvalidArgument(format!(
            "offset must not be negative, got {offset}"
        )));
    }
    Ok(())
}

pub(crate) fn require_id(id: Uuid, field: &'static str) -> StoreResult<()> {
    if id.is_nil() {
        return Err(StoreError::InvalidArgument(format!("{field} must not be nil")));
    }
    Ok(())
}

/// Runs `f` inside one immediate transaction on a pooled connection.
///
/// The transaction is rolled back when `f` fails or when the deadline has
/// expired by the time `f` returns.
pub(crate) fn write_tx<T>(
    pool: &ConnectionPool,
    operation: &'static str,
    deadline: Deadline,
    f: impl FnOnce(&Transaction<'_>) -> StoreResult<T>,
) -> StoreResult<T> {
    let run = || -> StoreResult<T> {
        let mut conn = pool.get(deadline)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(&tx)?;
        if deadline.is_expired() {
            return Err(deadline.timeout_error().into());
        }
        tx.commit()?;
        Ok(value)
    };
    run().map_err(|err| err.in_operation(operation, deadline))
}

/// Runs a read-only `f` on a pooled connection.
pub(crate) fn read<T>(
    pool: &ConnectionPool,
    operation: &'static str,
    deadline: Deadline,
    f: impl FnOnce(&Connection) -> StoreResult<T>,
) -> StoreResult<T> {
    let run = || -> StoreResult<T> {
        let conn = pool.get(deadline)?;
        f(&conn)
    };
    run().map_err(|err| err.in_operation(operation, deadline))
}

fn is_lock_contention(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _)
            if matches!(failure.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
    )
}

fn budget_ms(deadline: Deadline) -> u64 {
    u64::try_from(deadline.budget().as_millis()).unwrap_or(u64::MAX)
}

/// Current UTC instant truncated to the millisecond precision stored on disk.
pub(crate) fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

pub(crate) fn to_epoch_ms(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

pub(crate) fn parse_epoch_ms(value: i64, column: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(value).ok_or_else(|| {
        StoreError::InvalidData(format!("timestamp `{value}` out of range in {column}"))
    })
}

pub(crate) fn parse_uuid(value: &str, column: &str) -> StoreResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| StoreError::InvalidData(format!("invalid uuid value `{value}` in {column}")))
}

#[cfg(test)]
mod tests {
    use super::{validate_page, StoreError};
    use crate::db::{DbError, Deadline};
    use rusqlite::ffi;
    use std::time::Duration;

    #[test]
    fn page_bounds_are_enforced() {
        validate_page(1, 0).unwrap();
        assert!(matches!(
            validate_page(0, 0),
            Err(StoreError::InvalidArgument(_))
        ));
        assert!(matches!(
            validate_page(10, -1),
            Err(StoreError::InvalidArgument(_))
        ));
    }

    #[test]
    fn busy_database_is_reclassified_as_timeout() {
        let busy = rusqlite::Error::SqliteFailure(ffi::Error::new(ffi::SQLITE_BUSY), None);
        let err = StoreError::from(busy)
            .in_operation("relationship.create", Deadline::after(Duration::from_secs(3)));
        assert!(matches!(
            err,
            StoreError::Timeout {
                operation: "relationship.create",
                budget_ms: 3000
            }
        ));
    }

    #[test]
    fn driver_errors_carry_operation_context() {
        let err = StoreError::from(DbError::InvalidPoolSize(0))
            .in_operation("reaction.get_by_id", Deadline::after(Duration::from_secs(1)));
        assert!(err.to_string().starts_with("reaction.get_by_id failed"));
    }
}
