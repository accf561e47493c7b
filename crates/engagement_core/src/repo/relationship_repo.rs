//! Relationship store contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist directed follow edges with soft-delete semantics.
//! - Enforce one row per `(follower_id, followee_id)` via a table-wide
//!   unique constraint.
//!
//! # Invariants
//! - `create` reactivates a tombstoned row for the same pair in place and
//!   reports `DuplicateRelationship` when the pair is already live.
//! - `soft_delete` and `hard_delete` report `NotFound` when nothing changed.
//! - Lists never include tombstoned rows and are ordered
//!   `created_at DESC, id ASC`.

use crate::db::{ConnectionPool, Deadline};
use crate::model::relationship::{validate_pair, Relationship};
use crate::model::UserId;
use crate::repo::{
    now_millis, parse_epoch_ms, parse_uuid, read, require_id, to_epoch_ms, validate_page,
    write_tx, StoreError, StoreResult,
};
use chrono::{DateTime, Utc};
use log::info;
use rusqlite::{params, Connection, Row};
use std::sync::Arc;

const RELATIONSHIP_COLUMNS: &str = "id, follower_id, followee_id, approved, created_at, deleted_at";

const INDEX_SQL: &str = "
CREATE INDEX IF NOT EXISTS idx_relationships_followee
    ON relationships (followee_id, deleted_at);
CREATE INDEX IF NOT EXISTS idx_relationships_follower
    ON relationships (follower_id, deleted_at);";

/// Store contract for follow edges.
pub trait RelationshipStore: Send + Sync {
    /// Ensures lookup indexes exist. Idempotent.
    fn ensure_indexes(&self, deadline: Deadline) -> StoreResult<()>;
    /// Persists a live edge, or reactivates a tombstoned one for the pair.
    fn create(&self, deadline: Deadline, edge: &Relationship) -> StoreResult<Relationship>;
    /// Tombstones the live edge and returns the deletion instant.
    fn soft_delete(
        &self,
        deadline: Deadline,
        follower_id: UserId,
        followee_id: UserId,
    ) -> StoreResult<DateTime<Utc>>;
    /// Physically removes the edge, live or tombstoned.
    fn hard_delete(
        &self,
        deadline: Deadline,
        follower_id: UserId,
        followee_id: UserId,
    ) -> StoreResult<()>;
    fn is_active(
        &self,
        deadline: Deadline,
        follower_id: UserId,
        followee_id: UserId,
    ) -> StoreResult<bool>;
    /// Live edges pointing at `user_id`.
    fn list_followers(
        &self,
        deadline: Deadline,
        user_id: UserId,
        limit: i64,
        offset: i64,
    ) -> StoreResult<Vec<Relationship>>;
    /// Live edges starting at `user_id`.
    fn list_following(
        &self,
        deadline: Deadline,
        user_id: UserId,
        limit: i64,
        offset: i64,
    ) -> StoreResult<Vec<Relationship>>;
    fn count_followers(&self, deadline: Deadline, user_id: UserId) -> StoreResult<u64>;
    fn count_following(&self, deadline: Deadline, user_id: UserId) -> StoreResult<u64>;
}

/// SQLite-backed relationship store sharing one connection pool.
#[derive(Clone)]
pub struct SqliteRelationshipStore {
    pool: Arc<ConnectionPool>,
}

impl SqliteRelationshipStore {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Followers,
    Following,
}

impl Direction {
    fn key_column(self) -> &'static str {
        match self {
            Self::Followers => "followee_id",
            Self::Following => "follower_id",
        }
    }
}

impl RelationshipStore for SqliteRelationshipStore {
    fn ensure_indexes(&self, deadline: Deadline) -> StoreResult<()> {
        write_tx(&self.pool, "relationship.ensure_indexes", deadline, |tx| {
            tx.execute_batch(INDEX_SQL)?;
            Ok(())
        })
    }

    fn create(&self, deadline: Deadline, edge: &Relationship) -> StoreResult<Relationship> {
        edge.validate()?;
        if !edge.is_active() {
            return Err(StoreError::InvalidArgument(
                "cannot create a tombstoned relationship".to_string(),
            ));
        }

        let stored = write_tx(&self.pool, "relationship.create", deadline, |tx| {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO relationships (
                    id,
                    follower_id,
                    followee_id,
                    approved,
                    created_at,
                    deleted_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, NULL)
                 ON CONFLICT (follower_id, followee_id) DO UPDATE
                 SET
                    approved = excluded.approved,
                    created_at = excluded.created_at,
                    deleted_at = NULL
                 WHERE relationships.deleted_at IS NOT NULL
                 RETURNING {RELATIONSHIP_COLUMNS};"
            ))?;
            let mut rows = stmt.query(params![
                edge.id.to_string(),
                edge.follower_id.to_string(),
                edge.followee_id.to_string(),
                edge.approved,
                to_epoch_ms(edge.created_at),
            ])?;
            if let Some(row) = rows.next()? {
                return parse_relationship_row(row);
            }
            // The conflict clause skipped a live row.
            Err(StoreError::DuplicateRelationship {
                follower_id: edge.follower_id,
                followee_id: edge.followee_id,
            })
        })?;

        info!(
            "event=relationship_create module=repo status=ok id={} follower_id={} followee_id={} reactivated={}",
            stored.id,
            stored.follower_id,
            stored.followee_id,
            stored.id != edge.id
        );
        Ok(stored)
    }

    fn soft_delete(
        &self,
        deadline: Deadline,
        follower_id: UserId,
        followee_id: UserId,
    ) -> StoreResult<DateTime<Utc>> {
        validate_pair(follower_id, followee_id)?;
        let deleted_at = now_millis();

        write_tx(&self.pool, "relationship.soft_delete", deadline, |tx| {
            let changed = tx.execute(
                "UPDATE relationships
                 SET deleted_at = ?1
                 WHERE follower_id = ?2
                   AND followee_id = ?3
                   AND deleted_at IS NULL;",
                params![
                    to_epoch_ms(deleted_at),
                    follower_id.to_string(),
                    followee_id.to_string(),
                ],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound {
                    entity: "relationship",
                });
            }
            Ok(())
        })?;

        info!(
            "event=relationship_soft_delete module=repo status=ok follower_id={follower_id} followee_id={followee_id}"
        );
        Ok(deleted_at)
    }

    fn hard_delete(
        &self,
        deadline: Deadline,
        follower_id: UserId,
        followee_id: UserId,
    ) -> StoreResult<()> {
        validate_pair(follower_id, followee_id)?;

        write_tx(&self.pool, "relationship.hard_delete", deadline, |tx| {
            let changed = tx.execute(
                "DELETE FROM relationships
                 WHERE follower_id = ?1
                   AND followee_id = ?2;",
                params![follower_id.to_string(), followee_id.to_string()],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound {
                    entity: "relationship",
                });
            }
            Ok(())
        })?;

        info!(
            "event=relationship_hard_delete module=repo status=ok follower_id={follower_id} followee_id={followee_id}"
        );
        Ok(())
    }

    fn is_active(
        &self,
        deadline: Deadline,
        follower_id: UserId,
        followee_id: UserId,
    ) -> StoreResult<bool> {
        require_id(follower_id, "follower_id")?;
        require_id(followee_id, "followee_id")?;

        read(&self.pool, "relationship.is_active", deadline, |conn| {
            let exists: i64 = conn.query_row(
                "SELECT EXISTS(
                    SELECT 1
                    FROM relationships
                    WHERE follower_id = ?1
                      AND followee_id = ?2
                      AND deleted_at IS NULL
                 );",
                params![follower_id.to_string(), followee_id.to_string()],
                |row| row.get(0),
            )?;
            Ok(exists == 1)
        })
    }

    fn list_followers(
        &self,
        deadline: Deadline,
        user_id: UserId,
        limit: i64,
        offset: i64,
    ) -> StoreResult<Vec<Relationship>> {
        require_id(user_id, "user_id")?;
        validate_page(limit, offset)?;
        read(&self.pool, "relationship.list_followers", deadline, |conn| {
            list_edges(conn, Direction::Followers, user_id, limit, offset)
        })
    }

    fn list_following(
        &self,
        deadline: Deadline,
        user_id: UserId,
        limit: i64,
        offset: i64,
    ) -> StoreResult<Vec<Relationship>> {
        require_id(user_id, "user_id")?;
        validate_page(limit, offset)?;
        read(&self.pool, "relationship.list_following", deadline, |conn| {
            list_edges(conn, Direction::Following, user_id, limit, offset)
        })
    }

    fn count_followers(&self, deadline: Deadline, user_id: UserId) -> StoreResult<u64> {
        require_id(user_id, "user_id")?;
        read(&self.pool, "relationship.count_followers", deadline, |conn| {
            count_edges(conn, Direction::Followers, user_id)
        })
    }

    fn count_following(&self, deadline: Deadline, user_id: UserId) -> StoreResult<u64> {
        require_id(user_id, "user_id")?;
        read(&self.pool, "relationship.count_following", deadline, |conn| {
            count_edges(conn, Direction::Following, user_id)
        })
    }
}

fn list_edges(
    conn: &Connection,
    direction: Direction,
    user_id: UserId,
    limit: i64,
    offset: i64,
) -> StoreResult<Vec<Relationship>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {RELATIONSHIP_COLUMNS}
         FROM relationships
         WHERE {} = ?1
           AND deleted_at IS NULL
         ORDER BY created_at DESC, id ASC
         LIMIT ?2 OFFSET ?3;",
        direction.key_column()
    ))?;
    let mut rows = stmt.query(params![user_id.to_string(), limit, offset])?;
    let mut edges = Vec::new();
    while let Some(row) = rows.next()? {
        edges.push(parse_relationship_row(row)?);
    }
    Ok(edges)
}

fn count_edges(conn: &Connection, direction: Direction, user_id: UserId) -> StoreResult<u64> {
    let count: i64 = conn.query_row(
        &format!(
            "SELECT COUNT(*)
             FROM relationships
             WHERE {} = ?1
               AND deleted_at IS NULL;",
            direction.key_column()
        ),
        [user_id.to_string()],
        |row| row.get(0),
    )?;
    u64::try_from(count)
        .map_err(|_| StoreError::InvalidData(format!("negative relationship count {count}")))
}

fn parse_relationship_row(row: &Row<'_>) -> StoreResult<Relationship> {
    let id: String = row.get("id")?;
    let follower_id: String = row.get("follower_id")?;
    let followee_id: String = row.get("followee_id")?;
    let deleted_at = match row.get::<_, Option<i64>>("deleted_at")? {
        Some(value) => Some(parse_epoch_ms(value, "relationships.deleted_at")?),
        None => None,
    };

    let edge = Relationship {
        id: parse_uuid(&id, "relationships.id")?,
        follower_id: parse_uuid(&follower_id, "relationships.follower_id")?,
        followee_id: parse_uuid(&followee_id, "relationships.followee_id")?,
        approved: row.get("approved")?,
        created_at: parse_epoch_ms(row.get("created_at")?, "relationships.created_at")?,
        deleted_at,
    };
    edge.validate()
        .map_err(|err| StoreError::InvalidData(format!("relationship {}: {err}", edge.id)))?;
    Ok(edge)
}
