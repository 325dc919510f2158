//! Token-based access to public folders.

use async_trait::async_trait;
use ri_core::error::Result;
use ri_core::models::FavoriteFolder;
use ri_core::traits::ShareRepo;

use crate::{db_err, folder_from_row, SqliteStore};

#[async_trait]
impl ShareRepo for SqliteStore {
    /// Counting and resolving is one statement, so a private folder's counter
    /// never moves.
    async fn open_shared_folder(&self, token: &str) -> Result<Option<FavoriteFolder>> {
        let row = sqlx::query(
            "UPDATE favorite_folders SET share_hits = share_hits + 1
             WHERE share_token = ? AND is_public = 1
             RETURNING *",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.as_ref().map(folder_from_row).transpose()
    }

    async fn list_public_folders(&self, limit: i64) -> Result<Vec<FavoriteFolder>> {
        sqlx::query("SELECT * FROM favorite_folders WHERE is_public = 1 ORDER BY updated_at DESC, created_at DESC LIMIT ?")
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?
            .iter()
            .map(folder_from_row)
            .collect()
    }
}
