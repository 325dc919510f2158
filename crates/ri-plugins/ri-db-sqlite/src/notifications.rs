//! Notification rows: written inside the like/favorite transactions, read by
//! the inbox.

use async_trait::async_trait;
use ri_core::error::{AppError, Result};
use ri_core::models::{InteractionNotification, NotificationKind};
use ri_core::traits::NotificationRepo;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, Transaction};
use uuid::Uuid;

use crate::{blob_to_uuid, db_err, uuid_to_blob, SqliteStore};

pub(crate) async fn insert_notification(
    tx: &mut Transaction<'_, Sqlite>,
    n: &InteractionNotification,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO interaction_notifications (id, recipient_user_id, article_id, folder_id, kind, payload, is_read, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(uuid_to_blob(n.id))
    .bind(&n.recipient_user_id)
    .bind(n.article_id)
    .bind(n.folder_id.map(uuid_to_blob))
    .bind(n.kind.as_str())
    .bind(serde_json::to_string(&n.payload)?)
    .bind(n.is_read)
    .bind(n.created_at)
    .execute(&mut **tx)
    .await
    .map_err(db_err)?;
    Ok(())
}

fn notification_from_row(row: &SqliteRow) -> Result<InteractionNotification> {
    let kind: String = row.try_get("kind").map_err(db_err)?;
    let folder_id: Option<Vec<u8>> = row.try_get("folder_id").map_err(db_err)?;
    let payload: String = row.try_get("payload").map_err(db_err)?;
    Ok(InteractionNotification {
        id: blob_to_uuid(row.try_get::<Vec<u8>, _>("id").map_err(db_err)?.as_slice()),
        recipient_user_id: row.try_get("recipient_user_id").map_err(db_err)?,
        article_id: row.try_get("article_id").map_err(db_err)?,
        folder_id: folder_id.as_deref().map(blob_to_uuid),
        kind: NotificationKind::parse(&kind)
            .ok_or_else(|| AppError::Internal(format!("unknown notification kind '{kind}'")))?,
        payload: serde_json::from_str(&payload).unwrap_or_default(),
        is_read: row.try_get("is_read").map_err(db_err)?,
        created_at: row.try_get("created_at").map_err(db_err)?,
    })
}

#[async_trait]
impl NotificationRepo for SqliteStore {
    async fn list_notifications(
        &self,
        recipient_user_id: &str,
        unread_only: bool,
        limit: i64,
    ) -> Result<Vec<InteractionNotification>> {
        let sql = if unread_only {
            "SELECT * FROM interaction_notifications WHERE recipient_user_id = ? AND is_read = 0
             ORDER BY created_at DESC, id DESC LIMIT ?"
        } else {
            "SELECT * FROM interaction_notifications WHERE recipient_user_id = ?
             ORDER BY created_at DESC, id DESC LIMIT ?"
        };
        sqlx::query(sql)
            .bind(recipient_user_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?
            .iter()
            .map(notification_from_row)
            .collect()
    }

    async fn mark_notification_read(&self, recipient_user_id: &str, id: Uuid) -> Result<bool> {
        let updated = sqlx::query(
            "UPDATE interaction_notifications SET is_read = 1 WHERE id = ? AND recipient_user_id = ?",
        )
        .bind(uuid_to_blob(id))
        .bind(recipient_user_id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?
        .rows_affected();
        Ok(updated > 0)
    }

    async fn count_unread(&self, recipient_user_id: &str) -> Result<i64> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM interaction_notifications WHERE recipient_user_id = ? AND is_read = 0",
        )
        .bind(recipient_user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)
    }
}
