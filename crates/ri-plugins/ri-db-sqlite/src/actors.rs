//! Actor persistence. Upserts lean on the unique `user_id` /
//! `anonymous_key` columns so concurrent first touches converge.

use async_trait::async_trait;
use ri_core::error::{AppError, Result};
use ri_core::models::Actor;
use ri_core::traits::ActorRepo;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use crate::{blob_to_uuid, db_err, uuid_to_blob, SqliteStore};

fn actor_from_row(row: &SqliteRow) -> Result<Actor> {
    Ok(Actor {
        id: blob_to_uuid(row.try_get::<Vec<u8>, _>("id").map_err(db_err)?.as_slice()),
        user_id: row.try_get("user_id").map_err(db_err)?,
        anonymous_key: row.try_get("anonymous_key").map_err(db_err)?,
        fingerprint: row.try_get("fingerprint").map_err(db_err)?,
        created_at: row.try_get("created_at").map_err(db_err)?,
    })
}

#[async_trait]
impl ActorRepo for SqliteStore {
    async fn upsert_user_actor(&self, candidate: Actor) -> Result<Actor> {
        let user_id = candidate
            .user_id
            .clone()
            .ok_or_else(|| AppError::ValidationError("user actor without user id".into()))?;

        sqlx::query(
            "INSERT INTO actors (id, user_id, anonymous_key, fingerprint, created_at) VALUES (?, ?, NULL, ?, ?)
             ON CONFLICT(user_id) DO NOTHING",
        )
        .bind(uuid_to_blob(candidate.id))
        .bind(&user_id)
        .bind(&candidate.fingerprint)
        .bind(candidate.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        let row = sqlx::query("SELECT * FROM actors WHERE user_id = ?")
            .bind(&user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        actor_from_row(&row)
    }

    async fn upsert_anonymous_actor(&self, candidate: Actor) -> Result<Actor> {
        let key = candidate
            .anonymous_key
            .clone()
            .ok_or_else(|| AppError::ValidationError("anonymous actor without key".into()))?;

        // An empty fingerprint never overwrites a stored one.
        sqlx::query(
            "INSERT INTO actors (id, user_id, anonymous_key, fingerprint, created_at) VALUES (?, NULL, ?, ?, ?)
             ON CONFLICT(anonymous_key) DO UPDATE SET fingerprint = excluded.fingerprint
             WHERE excluded.fingerprint <> '' AND excluded.fingerprint <> actors.fingerprint",
        )
        .bind(uuid_to_blob(candidate.id))
        .bind(&key)
        .bind(&candidate.fingerprint)
        .bind(candidate.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        let row = sqlx::query("SELECT * FROM actors WHERE anonymous_key = ?")
            .bind(&key)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        actor_from_row(&row)
    }

    async fn find_anonymous_actor(&self, anonymous_key: &str) -> Result<Option<Actor>> {
        let row = sqlx::query("SELECT * FROM actors WHERE anonymous_key = ? AND user_id IS NULL")
            .bind(anonymous_key)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(actor_from_row).transpose()
    }

    async fn get_actor(&self, id: Uuid) -> Result<Option<Actor>> {
        let row = sqlx::query("SELECT * FROM actors WHERE id = ?")
            .bind(uuid_to_blob(id))
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(actor_from_row).transpose()
    }
}
