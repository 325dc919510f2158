//! Folding an anonymous actor into a signed-in one.

use std::collections::HashSet;

use async_trait::async_trait;
use ri_core::error::Result;
use ri_core::models::slugify;
use ri_core::traits::MergeRepo;
use sqlx::Row;
use uuid::Uuid;

use crate::{blob_to_uuid, db_err, uuid_to_blob, SqliteStore};

/// First free variant of `name` among `taken`: the name itself, then
/// "name (2)", "name (3)" and so on.
fn free_name(name: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(name) {
        return name.to_string();
    }
    (2..)
        .map(|n| format!("{name} ({n})"))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| name.to_string())
}

#[async_trait]
impl MergeRepo for SqliteStore {
    /// # Developer Note
    /// Likes the target already holds are dropped from the source first, so
    /// the reassignment can never trip the `(article, actor)` pair. Folder
    /// names that collide with the target's are suffixed instead.
    async fn merge_actor(&self, from: Uuid, into: Uuid) -> Result<u64> {
        if from == into {
            return Ok(0);
        }
        let (from_blob, into_blob) = (uuid_to_blob(from), uuid_to_blob(into));
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        // 1. Drop duplicate likes.
        let dropped = sqlx::query(
            "DELETE FROM likes WHERE actor_id = ? AND article_id IN (SELECT article_id FROM likes WHERE actor_id = ?)",
        )
        .bind(&from_blob)
        .bind(&into_blob)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?
        .rows_affected();

        // 2. Reassign the remaining likes.
        let likes = sqlx::query(
            "UPDATE likes SET actor_id = ?,
                anonymous_key = COALESCE((SELECT anonymous_key FROM actors WHERE id = ?), '')
             WHERE actor_id = ?",
        )
        .bind(&into_blob)
        .bind(&into_blob)
        .bind(&from_blob)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?
        .rows_affected();

        // 3. Reassign folders, renaming on collision.
        let mut taken: HashSet<String> = sqlx::query_scalar("SELECT name FROM favorite_folders WHERE owner_id = ?")
            .bind(&into_blob)
            .fetch_all(&mut *tx)
            .await
            .map_err(db_err)?
            .into_iter()
            .collect();
        let folders = sqlx::query("SELECT id, name FROM favorite_folders WHERE owner_id = ? ORDER BY created_at ASC")
            .bind(&from_blob)
            .fetch_all(&mut *tx)
            .await
            .map_err(db_err)?;
        let mut moved_folders = 0;
        for row in folders {
            let id: Vec<u8> = row.try_get("id").map_err(db_err)?;
            let name: String = row.try_get("name").map_err(db_err)?;
            let new_name = free_name(&name, &taken);
            if new_name != name {
                log::info!("folder {} renamed to '{}' while merging", blob_to_uuid(&id), new_name);
            }
            sqlx::query("UPDATE favorite_folders SET owner_id = ?, name = ?, slug = ? WHERE id = ?")
                .bind(&into_blob)
                .bind(&new_name)
                .bind(slugify(&new_name))
                .bind(&id)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
            taken.insert(new_name);
            moved_folders += 1;
        }

        // 4. Item authorship.
        let items = sqlx::query("UPDATE favorite_items SET added_by = ? WHERE added_by = ?")
            .bind(&into_blob)
            .bind(&from_blob)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?
            .rows_affected();

        // 5. The source actor is empty now.
        sqlx::query("DELETE FROM actors WHERE id = ?")
            .bind(&from_blob)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        log::info!(
            "merged actor {} into {}: {} likes ({} duplicates dropped), {} folders, {} items",
            from, into, likes, dropped, moved_folders, items
        );
        Ok(likes + moved_folders + items)
    }
}
