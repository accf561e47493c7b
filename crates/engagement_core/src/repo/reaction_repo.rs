//! Reaction store contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist like edges from an actor to a target with soft-delete semantics.
//! - Scope deletes to the owning actor.
//!
//! # Invariants
//! - A partial unique index allows one live row per `(actor_id, target_id)`;
//!   re-liking after an unlike inserts a fresh row.
//! - Lookups that match no live row report `NotFound`, never an empty list.
//! - Deletes match on `id AND actor_id`, so a foreign actor sees `NotFound`.

use crate::db::{ConnectionPool, Deadline};
use crate::model::reaction::{Reaction, ReactionId};
use crate::model::{TargetId, UserId};
use crate::repo::{
    now_millis, parse_epoch_ms, parse_uuid, read, require_id, to_epoch_ms, validate_page,
    write_tx, StoreError, StoreResult,
};
use chrono::{DateTime, Utc};
use log::info;
use rusqlite::{params, Connection, Row};
use std::sync::Arc;

const REACTION_COLUMNS: &str = "id, actor_id, target_id, created_at, deleted_at";

const INDEX_SQL: &str = "
CREATE UNIQUE INDEX IF NOT EXISTS uq_reactions_live_pair
    ON reactions (actor_id, target_id)
    WHERE deleted_at IS NULL;
CREATE INDEX IF NOT EXISTS idx_reactions_actor
    ON reactions (actor_id, deleted_at, created_at);
CREATE INDEX IF NOT EXISTS idx_reactions_target
    ON reactions (target_id, deleted_at, created_at);";

/// Store contract for like edges.
pub trait ReactionStore: Send + Sync {
    fn ensure_indexes(&self, deadline: Deadline) -> StoreResult<()>;
    /// Persists a live reaction; a live row for the same pair is a
    /// `DuplicateReaction`.
    fn create(&self, deadline: Deadline, reaction: &Reaction) -> StoreResult<Reaction>;
    fn get_by_id(&self, deadline: Deadline, id: ReactionId) -> StoreResult<Reaction>;
    fn list_by_actor(
        &self,
        deadline: Deadline,
        actor_id: UserId,
        limit: i64,
        offset: i64,
    ) -> StoreResult<Vec<Reaction>>;
    fn list_by_target(
        &self,
        deadline: Deadline,
        target_id: TargetId,
        limit: i64,
        offset: i64,
    ) -> StoreResult<Vec<Reaction>>;
    fn count_by_target(&self, deadline: Deadline, target_id: TargetId) -> StoreResult<u64>;
    /// Tombstones the reaction owned by `actor_id` and returns the deletion
    /// instant.
    fn soft_delete(
        &self,
        deadline: Deadline,
        id: ReactionId,
        actor_id: UserId,
    ) -> StoreResult<DateTime<Utc>>;
    fn hard_delete(&self, deadline: Deadline, id: ReactionId, actor_id: UserId) -> StoreResult<()>;
}

/// SQLite-backed reaction store sharing one connection pool.
#[derive(Clone)]
pub struct SqliteReactionStore {
    pool: Arc<ConnectionPool>,
}

impl SqliteReactionStore {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }
}

impl ReactionStore for SqliteReactionStore {
    fn ensure_indexes(&self, deadline: Deadline) -> StoreResult<()> {
        write_tx(&self.pool, "reaction.ensure_indexes", deadline, |tx| {
            tx.execute_batch(INDEX_SQL)?;
            Ok(())
        })
    }

    fn create(&self, deadline: Deadline, reaction: &Reaction) -> StoreResult<Reaction> {
        reaction.validate()?;
        if !reaction.is_active() {
            return Err(StoreError::InvalidArgument(
                "cannot create a tombstoned reaction".to_string(),
            ));
        }

        let stored = write_tx(&self.pool, "reaction.create", deadline, |tx| {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO reactions (
                    id,
                    actor_id,
                    target_id,
                    created_at,
                    deleted_at
                 ) VALUES (?1, ?2, ?3, ?4, NULL)
                 ON CONFLICT DO NOTHING
                 RETURNING {REACTION_COLUMNS};"
            ))?;
            let mut rows = stmt.query(params![
                reaction.id.to_string(),
                reaction.actor_id.to_string(),
                reaction.target_id.to_string(),
                to_epoch_ms(reaction.created_at),
            ])?;
            if let Some(row) = rows.next()? {
                return parse_reaction_row(row);
            }
            Err(StoreError::DuplicateReaction {
                actor_id: reaction.actor_id,
                target_id: reaction.target_id,
            })
        })?;

        info!(
            "event=reaction_create module=repo status=ok id={} actor_id={} target_id={}",
            stored.id, stored.actor_id, stored.target_id
        );
        Ok(stored)
    }

    fn get_by_id(&self, deadline: Deadline, id: ReactionId) -> StoreResult<Reaction> {
        require_id(id, "reaction id")?;
        read(&self.pool, "reaction.get_by_id", deadline, |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {REACTION_COLUMNS}
                 FROM reactions
                 WHERE id = ?1
                   AND deleted_at IS NULL;"
            ))?;
            let mut rows = stmt.query([id.to_string()])?;
            if let Some(row) = rows.next()? {
                return parse_reaction_row(row);
            }
            Err(StoreError::NotFound { entity: "reaction" })
        })
    }

    fn list_by_actor(
        &self,
        deadline: Deadline,
        actor_id: UserId,
        limit: i64,
        offset: i64,
    ) -> StoreResult<Vec<Reaction>> {
        require_id(actor_id, "actor_id")?;
        validate_page(limit, offset)?;
        read(&self.pool, "reaction.list_by_actor", deadline, |conn| {
            list_reactions(conn, "actor_id", actor_id, limit, offset)
        })
    }

    fn list_by_target(
        &self,
        deadline: Deadline,
        target_id: TargetId,
        limit: i64,
        offset: i64,
    ) -> StoreResult<Vec<Reaction>> {
        require_id(target_id, "target_id")?;
        validate_page(limit, offset)?;
        read(&self.pool, "reaction.list_by_target", deadline, |conn| {
            list_reactions(conn, "target_id", target_id, limit, offset)
        })
    }

    fn count_by_target(&self, deadline: Deadline, target_id: TargetId) -> StoreResult<u64> {
        require_id(target_id, "target_id")?;
        read(&self.pool, "reaction.count_by_target", deadline, |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*)
                 FROM reactions
                 WHERE target_id = ?1
                   AND deleted_at IS NULL;",
                [target_id.to_string()],
                |row| row.get(0),
            )?;
            u64::try_from(count)
                .map_err(|_| StoreError::InvalidData(format!("negative reaction count {count}")))
        })
    }

    fn soft_delete(
        &self,
        deadline: Deadline,
        id: ReactionId,
        actor_id: UserId,
    ) -> StoreResult<DateTime<Utc>> {
        require_id(id, "reaction id")?;
        require_id(actor_id, "actor_id")?;
        let deleted_at = now_millis();

        write_tx(&self.pool, "reaction.soft_delete", deadline, |tx| {
            let changed = tx.execute(
                "UPDATE reactions
                 SET deleted_at = ?1
                 WHERE id = ?2
                   AND actor_id = ?3
                   AND deleted_at IS NULL;",
                params![to_epoch_ms(deleted_at), id.to_string(), actor_id.to_string()],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound { entity: "reaction" });
            }
            Ok(())
        })?;

        info!("event=reaction_soft_delete module=repo status=ok id={id} actor_id={actor_id}");
        Ok(deleted_at)
    }

    fn hard_delete(&self, deadline: Deadline, id: ReactionId, actor_id: UserId) -> StoreResult<()> {
        require_id(id, "reaction id")?;
        require_id(actor_id, "actor_id")?;

        write_tx(&self.pool, "reaction.hard_delete", deadline, |tx| {
            let changed = tx.execute(
                "DELETE FROM reactions
                 WHERE id = ?1
                   AND actor_id = ?2;",
                params![id.to_string(), actor_id.to_string()],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound { entity: "reaction" });
            }
            Ok(())
        })?;

        info!("event=reaction_hard_delete module=repo status=ok id={id} actor_id={actor_id}");
        Ok(())
    }
}

fn list_reactions(
    conn: &Connection,
    key_column: &str,
    key: uuid::Uuid,
    limit: i64,
    offset: i64,
) -> StoreResult<Vec<Reaction>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {REACTION_COLUMNS}
         FROM reactions
         WHERE {key_column} = ?1
           AND deleted_at IS NULL
         ORDER BY created_at DESC, id ASC
         LIMIT ?2 OFFSET ?3;"
    ))?;
    let mut rows = stmt.query(params![key.to_string(), limit, offset])?;
    let mut reactions = Vec::new();
    while let Some(row) = rows.next()? {
        reactions.push(parse_reaction_row(row)?);
    }

    if reactions.is_empty() {
        return Err(StoreError::NotFound {
            entity: "reactions",
        });
    }
    Ok(reactions)
}

fn parse_reaction_row(row: &Row<'_>) -> StoreResult<Reaction> {
    let id: String = row.get("id")?;
    let actor_id: String = row.get("actor_id")?;
    let target_id: String = row.get("target_id")?;
    let deleted_at = match row.get::<_, Option<i64>>("deleted_at")? {
        Some(value) => Some(parse_epoch_ms(value, "reactions.deleted_at")?),
        None => None,
    };

    let reaction = Reaction {
        id: parse_uuid(&id, "reactions.id")?,
        actor_id: parse_uuid(&actor_id, "reactions.actor_id")?,
        target_id: parse_uuid(&target_id, "reactions.target_id")?,
        created_at: parse_epoch_ms(row.get("created_at")?, "reactions.created_at")?,
        deleted_at,
    };
    reaction
        .validate()
        .map_err(|err| StoreError::InvalidData(format!("reaction {}: {err}", reaction.id)))?;
    Ok(reaction)
}
