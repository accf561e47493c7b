//! Engagement use-case services.
//!
//! # Responsibility
//! - Orchestrate store calls into follow, like and query use cases.
//! - Classify store failures at the engine boundary.
//! - Schedule notifications only after a mutation committed.
//!
//! # Invariants
//! - Services receive their stores and dispatcher through constructors;
//!   there is no process-wide state.
//! - Every store call runs under a fresh `Deadline` from `EngineOptions`.

pub mod query_service;
pub mod reaction_service;
pub mod subscription_service;

use crate::db::Deadline;
use crate::error::{error_chain, EngagementError, ErrorKind};
use crate::repo::StoreError;
use log::{debug, warn};
use std::time::Duration;

const DEFAULT_OP_TIMEOUT: Duration = Duration::from_secs(3);

/// Per-engine tuning shared by every operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    /// Budget of one store operation, from checkout to commit.
    pub op_timeout: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            op_timeout: DEFAULT_OP_TIMEOUT,
        }
    }
}

impl EngineOptions {
    pub fn with_op_timeout(op_timeout: Duration) -> Self {
        Self { op_timeout }
    }

    pub(crate) fn deadline(&self) -> Deadline {
        Deadline::after(self.op_timeout)
    }
}

/// Classifies and logs a store failure raised by `operation`.
pub(crate) fn engine_error(operation: &'static str, err: StoreError) -> EngagementError {
    let err = EngagementError::from_store(operation, err);
    match err.kind() {
        ErrorKind::Timeout | ErrorKind::Internal => warn!(
            "event={} module=service status=error error_kind={} error={}",
            operation,
            err.kind(),
            error_chain(&err)
        ),
        _ => debug!(
            "event={} module=service status=error error_kind={}",
            operation,
            err.kind()
        ),
    }
    err
}
