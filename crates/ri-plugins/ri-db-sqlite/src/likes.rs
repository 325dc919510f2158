//! Like persistence and the toggle transaction.

use async_trait::async_trait;
use ri_core::error::Result;
use ri_core::models::{ArticleId, InteractionNotification, Like, LikeToggle};
use ri_core::traits::LikeRepo;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use crate::notifications::insert_notification;
use crate::{blob_to_uuid, db_err, uuid_to_blob, SqliteStore};

fn like_from_row(row: &SqliteRow) -> Result<Like> {
    Ok(Like {
        id: blob_to_uuid(row.try_get::<Vec<u8>, _>("id").map_err(db_err)?.as_slice()),
        article_id: row.try_get("article_id").map_err(db_err)?,
        actor_id: blob_to_uuid(row.try_get::<Vec<u8>, _>("actor_id").map_err(db_err)?.as_slice()),
        is_positive: row.try_get("is_positive").map_err(db_err)?,
        anonymous_key: row.try_get("anonymous_key").map_err(db_err)?,
        user_agent: row.try_get("user_agent").map_err(db_err)?,
        ip_address: row.try_get("ip_address").map_err(db_err)?,
        created_at: row.try_get("created_at").map_err(db_err)?,
    })
}

#[async_trait]
impl LikeRepo for SqliteStore {
    /// Atomic toggle.
    ///
    /// # Developer Note
    /// The delete runs first: it both detects an existing like and takes the
    /// write lock. If the insert still trips the unique pair, somebody liked
    /// concurrently under the same actor, so the desired end state is "unliked".
    async fn toggle_like(
        &self,
        like: Like,
        notification: Option<InteractionNotification>,
    ) -> Result<LikeToggle> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        // 1. Existing like? Remove it.
        let removed = sqlx::query("DELETE FROM likes WHERE article_id = ? AND actor_id = ?")
            .bind(like.article_id)
            .bind(uuid_to_blob(like.actor_id))
            .execute(&mut *tx)
            .await
            .map_err(db_err)?
            .rows_affected();

        let mut liked = false;
        if removed == 0 {
            // 2. Otherwise insert it, with the author's notification.
            let inserted = sqlx::query(
                "INSERT INTO likes (id, article_id, actor_id, is_positive, anonymous_key, user_agent, ip_address, created_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(uuid_to_blob(like.id))
            .bind(like.article_id)
            .bind(uuid_to_blob(like.actor_id))
            .bind(like.is_positive)
            .bind(&like.anonymous_key)
            .bind(&like.user_agent)
            .bind(&like.ip_address)
            .bind(like.created_at)
            .execute(&mut *tx)
            .await;

            match inserted {
                Ok(_) => {
                    liked = true;
                    if let Some(notification) = &notification {
                        insert_notification(&mut tx, notification).await?;
                    }
                }
                Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                    log::warn!("like insert raced on article {}, toggling off", like.article_id);
                    sqlx::query("DELETE FROM likes WHERE article_id = ? AND actor_id = ?")
                        .bind(like.article_id)
                        .bind(uuid_to_blob(like.actor_id))
                        .execute(&mut *tx)
                        .await
                        .map_err(db_err)?;
                }
                Err(err) => return Err(db_err(err)),
            }
        }

        // 3. Live count, read inside the same transaction.
        let like_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM likes WHERE article_id = ?")
            .bind(like.article_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(LikeToggle { liked, created: liked, like_count })
    }

    async fn count_likes(&self, article_id: ArticleId) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM likes WHERE article_id = ?")
            .bind(article_id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)
    }

    async fn has_liked(&self, actor_id: Uuid, article_id: ArticleId) -> Result<bool> {
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM likes WHERE actor_id = ? AND article_id = ?")
            .bind(uuid_to_blob(actor_id))
            .bind(article_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(found.is_some())
    }

    async fn list_likes_by_actor(&self, actor_id: Uuid, limit: i64) -> Result<Vec<Like>> {
        sqlx::query("SELECT * FROM likes WHERE actor_id = ? ORDER BY created_at DESC, id DESC LIMIT ?")
            .bind(uuid_to_blob(actor_id))
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?
            .iter()
            .map(like_from_row)
            .collect()
    }
}
