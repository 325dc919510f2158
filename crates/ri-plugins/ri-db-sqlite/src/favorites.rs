//! Folder and item persistence.

use async_trait::async_trait;
use chrono::Utc;
use ri_core::batch::{BatchAction, BatchOutcome};
use ri_core::error::{AppError, Result};
use ri_core::models::{
    AddMode, FavoriteFolder, FavoriteItem, FolderStats, InteractionNotification, ItemAdd, ItemTarget,
};
use ri_core::traits::FavoriteRepo;
use sqlx::query::Query;
use sqlx::sqlite::SqliteArguments;
use sqlx::{Row, Sqlite, Transaction};
use uuid::Uuid;

use crate::notifications::insert_notification;
use crate::{db_err, folder_from_row, is_duplicate_favorite, item_from_row, uuid_to_blob, SqliteStore};

const INSERT_FOLDER: &str = "INSERT INTO favorite_folders
    (id, owner_id, name, slug, description, is_public, allow_duplicates, tags, pinned, sort_order, share_token, share_hits, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)";

const LIST_ORDER: &str = "ORDER BY pinned DESC, sort_order ASC, updated_at DESC, created_at DESC";

/// Folders of `owner`, for item scoping.
const OWNED_FOLDERS: &str = "SELECT id FROM favorite_folders WHERE owner_id = ?";

fn bind_folder<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    folder: &'q FavoriteFolder,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    query
        .bind(uuid_to_blob(folder.id))
        .bind(uuid_to_blob(folder.owner_id))
        .bind(&folder.name)
        .bind(&folder.slug)
        .bind(&folder.description)
        .bind(folder.is_public)
        .bind(folder.allow_duplicates)
        .bind(&folder.tags)
        .bind(folder.pinned)
        .bind(folder.sort_order)
        .bind(&folder.share_token)
        .bind(folder.share_hits)
        .bind(folder.created_at)
        .bind(folder.updated_at)
}

async fn insert_item(tx: &mut Transaction<'_, Sqlite>, item: &FavoriteItem) -> std::result::Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO favorite_items (id, folder_id, article_id, added_by, note, note_version, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(uuid_to_blob(item.id))
    .bind(uuid_to_blob(item.folder_id))
    .bind(item.article_id)
    .bind(item.added_by.map(uuid_to_blob))
    .bind(&item.note)
    .bind(item.note_version)
    .bind(item.created_at)
    .bind(item.updated_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn existing_item(
    tx: &mut Transaction<'_, Sqlite>,
    folder_id: Uuid,
    article_id: i64,
) -> Result<Option<FavoriteItem>> {
    let row = sqlx::query(
        "SELECT * FROM favorite_items WHERE folder_id = ? AND article_id = ? ORDER BY created_at ASC, id ASC LIMIT 1",
    )
    .bind(uuid_to_blob(folder_id))
    .bind(article_id)
    .fetch_optional(&mut **tx)
    .await
    .map_err(db_err)?;
    row.as_ref().map(item_from_row).transpose()
}

/// Resolves the item's target folder inside `tx`, inserting a named folder
/// when the owner has none by that name. Either path writes, so the
/// transaction holds the write lock from here on.
async fn resolve_folder(
    tx: &mut Transaction<'_, Sqlite>,
    owner_id: Uuid,
    target: &ItemTarget,
) -> Result<FavoriteFolder> {
    match target {
        ItemTarget::Folder(folder_id) => {
            let touched = sqlx::query("UPDATE favorite_folders SET updated_at = updated_at WHERE id = ? AND owner_id = ?")
                .bind(uuid_to_blob(*folder_id))
                .bind(uuid_to_blob(owner_id))
                .execute(&mut **tx)
                .await
                .map_err(db_err)?
                .rows_affected();
            if touched == 0 {
                return Err(AppError::not_found("Folder", folder_id));
            }
            let row = sqlx::query("SELECT * FROM favorite_folders WHERE id = ?")
                .bind(uuid_to_blob(*folder_id))
                .fetch_one(&mut **tx)
                .await
                .map_err(db_err)?;
            folder_from_row(&row)
        }
        ItemTarget::Named(candidate) => {
            let mut candidate = candidate.clone();
            candidate.owner_id = owner_id;
            let sql = format!("{INSERT_FOLDER} ON CONFLICT(owner_id, name) DO NOTHING");
            bind_folder(sqlx::query(&sql), &candidate)
                .execute(&mut **tx)
                .await
                .map_err(db_err)?;
            let row = sqlx::query("SELECT * FROM favorite_folders WHERE owner_id = ? AND name = ?")
                .bind(uuid_to_blob(owner_id))
                .bind(&candidate.name)
                .fetch_one(&mut **tx)
                .await
                .map_err(db_err)?;
            folder_from_row(&row)
        }
    }
}

#[async_trait]
impl FavoriteRepo for SqliteStore {
    async fn insert_folder(&self, folder: FavoriteFolder) -> Result<FavoriteFolder> {
        bind_folder(sqlx::query(INSERT_FOLDER), &folder)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(folder)
    }

    async fn get_folder(&self, owner_id: Uuid, folder_id: Uuid) -> Result<Option<FavoriteFolder>> {
        let row = sqlx::query("SELECT * FROM favorite_folders WHERE id = ? AND owner_id = ?")
            .bind(uuid_to_blob(folder_id))
            .bind(uuid_to_blob(owner_id))
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(folder_from_row).transpose()
    }

    async fn find_folder_by_name(&self, owner_id: Uuid, name: &str) -> Result<Option<FavoriteFolder>> {
        let row = sqlx::query("SELECT * FROM favorite_folders WHERE owner_id = ? AND name = ?")
            .bind(uuid_to_blob(owner_id))
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(folder_from_row).transpose()
    }

    async fn list_folders(&self, owner_id: Uuid) -> Result<Vec<FavoriteFolder>> {
        let sql = format!("SELECT * FROM favorite_folders WHERE owner_id = ? {LIST_ORDER}");
        sqlx::query(&sql)
            .bind(uuid_to_blob(owner_id))
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?
            .iter()
            .map(folder_from_row)
            .collect()
    }

    async fn save_folder(&self, folder: FavoriteFolder) -> Result<bool> {
        let updated = sqlx::query(
            "UPDATE favorite_folders SET name = ?, slug = ?, description = ?, is_public = ?, allow_duplicates = ?,
                tags = ?, pinned = ?, sort_order = ?, share_token = ?, updated_at = ?
             WHERE id = ? AND owner_id = ?",
        )
        .bind(&folder.name)
        .bind(&folder.slug)
        .bind(&folder.description)
        .bind(folder.is_public)
        .bind(folder.allow_duplicates)
        .bind(&folder.tags)
        .bind(folder.pinned)
        .bind(folder.sort_order)
        .bind(&folder.share_token)
        .bind(folder.updated_at)
        .bind(uuid_to_blob(folder.id))
        .bind(uuid_to_blob(folder.owner_id))
        .execute(&self.pool)
        .await
        .map_err(db_err)?
        .rows_affected();
        Ok(updated > 0)
    }

    async fn delete_folder(&self, owner_id: Uuid, folder_id: Uuid) -> Result<bool> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        // 1. Items go first, but only when the folder belongs to the owner.
        sqlx::query("DELETE FROM favorite_items WHERE folder_id IN (SELECT id FROM favorite_folders WHERE id = ? AND owner_id = ?)")
            .bind(uuid_to_blob(folder_id))
            .bind(uuid_to_blob(owner_id))
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        // 2. The folder itself.
        let deleted = sqlx::query("DELETE FROM favorite_folders WHERE id = ? AND owner_id = ?")
            .bind(uuid_to_blob(folder_id))
            .bind(uuid_to_blob(owner_id))
            .execute(&mut *tx)
            .await
            .map_err(db_err)?
            .rows_affected();

        tx.commit().await.map_err(db_err)?;
        Ok(deleted > 0)
    }

    async fn set_share_token(&self, owner_id: Uuid, folder_id: Uuid, token: &str) -> Result<bool> {
        let updated = sqlx::query("UPDATE favorite_folders SET share_token = ?, updated_at = ? WHERE id = ? AND owner_id = ?")
            .bind(token)
            .bind(Utc::now())
            .bind(uuid_to_blob(folder_id))
            .bind(uuid_to_blob(owner_id))
            .execute(&self.pool)
            .await
            .map_err(db_err)?
            .rows_affected();
        Ok(updated > 0)
    }

    /// # Developer Note
    /// The duplicate check and the insert share one write transaction. The
    /// store triggers still reject a duplicate that slips past the check, and
    /// that rejection is reported as `DuplicateFavorite` as well.
    async fn add_item(
        &self,
        owner_id: Uuid,
        target: ItemTarget,
        mut item: FavoriteItem,
        mode: AddMode,
        mut notification: Option<InteractionNotification>,
    ) -> Result<ItemAdd> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        // 1. Resolve (or create) the folder.
        let folder = resolve_folder(&mut tx, owner_id, &target).await?;
        item.folder_id = folder.id;
        if let Some(n) = notification.as_mut() {
            n.folder_id = Some(folder.id);
        }

        // 2. Existing entry for this article?
        if let Some(mut existing) = existing_item(&mut tx, folder.id, item.article_id).await? {
            match mode {
                AddMode::Strict if !folder.allow_duplicates => {
                    return Err(AppError::DuplicateFavorite { item_id: existing.id });
                }
                AddMode::Strict => {
                    tx.commit().await.map_err(db_err)?;
                    return Ok(ItemAdd { item: existing, folder, created: false });
                }
                AddMode::Upsert => {
                    if !item.note.is_empty() && item.note != existing.note {
                        existing.note = item.note.clone();
                        existing.note_version += 1;
                        existing.updated_at = Utc::now();
                        sqlx::query("UPDATE favorite_items SET note = ?, note_version = ?, updated_at = ? WHERE id = ?")
                            .bind(&existing.note)
                            .bind(existing.note_version)
                            .bind(existing.updated_at)
                            .bind(uuid_to_blob(existing.id))
                            .execute(&mut *tx)
                            .await
                            .map_err(db_err)?;
                    }
                    tx.commit().await.map_err(db_err)?;
                    return Ok(ItemAdd { item: existing, folder, created: false });
                }
            }
        }

        // 3. New item, plus the owner's notification.
        if let Err(err) = insert_item(&mut tx, &item).await {
            if is_duplicate_favorite(&err) {
                let item_id = existing_item(&mut tx, folder.id, item.article_id)
                    .await?
                    .map(|e| e.id)
                    .unwrap_or(item.id);
                return Err(AppError::DuplicateFavorite { item_id });
            }
            return Err(db_err(err));
        }
        if let Some(n) = &notification {
            insert_notification(&mut tx, n).await?;
        }

        tx.commit().await.map_err(db_err)?;
        Ok(ItemAdd { item, folder, created: true })
    }

    async fn remove_item(&self, owner_id: Uuid, item_id: Uuid) -> Result<u64> {
        let sql = format!("DELETE FROM favorite_items WHERE id = ? AND folder_id IN ({OWNED_FOLDERS})");
        let removed = sqlx::query(&sql)
            .bind(uuid_to_blob(item_id))
            .bind(uuid_to_blob(owner_id))
            .execute(&self.pool)
            .await
            .map_err(db_err)?
            .rows_affected();
        Ok(removed)
    }

    async fn list_items(&self, folder_id: Uuid) -> Result<Vec<FavoriteItem>> {
        sqlx::query("SELECT * FROM favorite_items WHERE folder_id = ? ORDER BY created_at ASC, id ASC")
            .bind(uuid_to_blob(folder_id))
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?
            .iter()
            .map(item_from_row)
            .collect()
    }

    async fn list_owner_items(&self, owner_id: Uuid, limit: i64, offset: i64) -> Result<Vec<FavoriteItem>> {
        let sql = format!(
            "SELECT * FROM favorite_items WHERE folder_id IN ({OWNED_FOLDERS})
             ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
        );
        sqlx::query(&sql)
            .bind(uuid_to_blob(owner_id))
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?
            .iter()
            .map(item_from_row)
            .collect()
    }

    async fn count_owner_items(&self, owner_id: Uuid) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM favorite_items WHERE folder_id IN ({OWNED_FOLDERS})");
        sqlx::query_scalar(&sql)
            .bind(uuid_to_blob(owner_id))
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)
    }

    async fn apply_batch(&self, owner_id: Uuid, action: BatchAction) -> Result<BatchOutcome> {
        let owner = uuid_to_blob(owner_id);
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let mut affected = 0;

        let outcome = match action {
            BatchAction::DeleteItems(ids) => {
                let sql = format!("DELETE FROM favorite_items WHERE id = ? AND folder_id IN ({OWNED_FOLDERS})");
                for id in ids {
                    affected += sqlx::query(&sql)
                        .bind(uuid_to_blob(id))
                        .bind(&owner)
                        .execute(&mut *tx)
                        .await
                        .map_err(db_err)?
                        .rows_affected();
                }
                BatchOutcome::Deleted(affected)
            }
            BatchAction::MoveItems { item_ids, target_folder } => {
                let owned: Option<i64> = sqlx::query_scalar("SELECT 1 FROM favorite_folders WHERE id = ? AND owner_id = ?")
                    .bind(uuid_to_blob(target_folder))
                    .bind(&owner)
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(db_err)?;
                if owned.is_none() {
                    return Err(AppError::not_found("Folder", target_folder));
                }
                let sql = format!(
                    "UPDATE favorite_items SET folder_id = ?, updated_at = ? WHERE id = ? AND folder_id IN ({OWNED_FOLDERS})"
                );
                for id in item_ids {
                    let moved = sqlx::query(&sql)
                        .bind(uuid_to_blob(target_folder))
                        .bind(now)
                        .bind(uuid_to_blob(id))
                        .bind(&owner)
                        .execute(&mut *tx)
                        .await;
                    match moved {
                        Ok(result) => affected += result.rows_affected(),
                        Err(err) if is_duplicate_favorite(&err) => {
                            log::debug!("skipping move of item {} into {}: duplicate", id, target_folder);
                        }
                        Err(err) => return Err(db_err(err)),
                    }
                }
                BatchOutcome::Moved(affected)
            }
            BatchAction::SetPinned { folder_ids, pinned } => {
                for id in folder_ids {
                    affected += sqlx::query("UPDATE favorite_folders SET pinned = ?, updated_at = ? WHERE id = ? AND owner_id = ?")
                        .bind(pinned)
                        .bind(now)
                        .bind(uuid_to_blob(id))
                        .bind(&owner)
                        .execute(&mut *tx)
                        .await
                        .map_err(db_err)?
                        .rows_affected();
                }
                BatchOutcome::Updated(affected)
            }
            BatchAction::SortFolders(pairs) => {
                for (id, order) in pairs {
                    affected += sqlx::query("UPDATE favorite_folders SET sort_order = ?, updated_at = ? WHERE id = ? AND owner_id = ?")
                        .bind(order)
                        .bind(now)
                        .bind(uuid_to_blob(id))
                        .bind(&owner)
                        .execute(&mut *tx)
                        .await
                        .map_err(db_err)?
                        .rows_affected();
                }
                BatchOutcome::Updated(affected)
            }
        };

        tx.commit().await.map_err(db_err)?;
        Ok(outcome)
    }

    async fn folder_stats(&self, owner_id: Uuid) -> Result<FolderStats> {
        let owner = uuid_to_blob(owner_id);
        let row = sqlx::query(
            "SELECT COUNT(*) AS folder_count,
                    COALESCE(SUM(is_public), 0) AS public_count,
                    COALESCE(SUM(pinned), 0) AS pinned_count
             FROM favorite_folders WHERE owner_id = ?",
        )
        .bind(&owner)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        let sql = format!("SELECT COUNT(*) FROM favorite_items WHERE folder_id IN ({OWNED_FOLDERS})");
        let item_count: i64 = sqlx::query_scalar(&sql)
            .bind(&owner)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(FolderStats {
            folder_count: row.try_get("folder_count").map_err(db_err)?,
            item_count,
            public_count: row.try_get("public_count").map_err(db_err)?,
            pinned_count: row.try_get("pinned_count").map_err(db_err)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{article, store, user};
    use ri_core::models::NewFolder;
    use ri_core::services::notify::favorite_notification;
    use ri_core::traits::NotificationRepo;
    use std::sync::Arc;

    fn folder(owner: Uuid, name: &str, token: &str) -> FavoriteFolder {
        FavoriteFolder::new(owner, NewFolder::named(name), token.to_string())
    }

    #[tokio::test]
    async fn reading_list_rejects_second_add() {
        let store = store().await;
        let bob = user(&store, "bob").await;
        article(&store, 1, Some("alice")).await;
        let list = store.insert_folder(folder(bob.id, "Reading List", "tokenAAAAAAAAAAAA")).await.unwrap();

        let first = store
            .add_item(bob.id, ItemTarget::Folder(list.id), FavoriteItem::new(list.id, 1, bob.id, ""), AddMode::Strict, None)
            .await
            .unwrap();
        assert!(first.created);

        let err = store
            .add_item(bob.id, ItemTarget::Folder(list.id), FavoriteItem::new(list.id, 1, bob.id, ""), AddMode::Strict, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DuplicateFavorite { item_id } if item_id == first.item.id));
    }

    #[tokio::test]
    async fn duplicate_folder_name_is_a_conflict() {
        let store = store().await;
        let bob = user(&store, "bob").await;
        store.insert_folder(folder(bob.id, "Reading List", "tokenAAAAAAAAAAAA")).await.unwrap();
        let err = store.insert_folder(folder(bob.id, "Reading List", "tokenBBBBBBBBBBBB")).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn concurrent_adds_keep_one_item() {
        let store = Arc::new(store().await);
        let bob = user(&store, "bob").await;
        article(&store, 1, None).await;
        let list = store.insert_folder(folder(bob.id, "Later", "tokenCCCCCCCCCCCC")).await.unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                let item = FavoriteItem::new(list.id, 1, bob.id, "");
                tokio::spawn(async move {
                    store.add_item(bob.id, ItemTarget::Folder(list.id), item, AddMode::Strict, None).await
                })
            })
            .collect();
        let mut created = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(added) => created += usize::from(added.created),
                Err(err) => assert!(matches!(err, AppError::DuplicateFavorite { .. })),
            }
        }
        assert_eq!(created, 1);
        assert_eq!(store.list_items(list.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn allow_duplicates_returns_existing_in_strict_mode() {
        let store = store().await;
        let bob = user(&store, "bob").await;
        article(&store, 1, None).await;
        let mut input = NewFolder::named("Dupes");
        input.allow_duplicates = true;
        let list = store
            .insert_folder(FavoriteFolder::new(bob.id, input, "tokenDDDDDDDDDDDD".into()))
            .await
            .unwrap();

        let first = store
            .add_item(bob.id, ItemTarget::Folder(list.id), FavoriteItem::new(list.id, 1, bob.id, ""), AddMode::Strict, None)
            .await
            .unwrap();
        let again = store
            .add_item(bob.id, ItemTarget::Folder(list.id), FavoriteItem::new(list.id, 1, bob.id, ""), AddMode::Strict, None)
            .await
            .unwrap();
        assert!(!again.created);
        assert_eq!(again.item.id, first.item.id);
    }

    #[tokio::test]
    async fn quick_save_creates_folder_and_revises_note() {
        let store = store().await;
        let bob = user(&store, "bob").await;
        let post = article(&store, 1, Some("alice")).await;
        let candidate = folder(bob.id, "Inbox", "tokenEEEEEEEEEEEE");

        let item = FavoriteItem::new(candidate.id, 1, bob.id, "first");
        let notification = favorite_notification(&candidate, &bob, &post, &bob);
        let saved = store
            .add_item(bob.id, ItemTarget::Named(candidate.clone()), item, AddMode::Upsert, notification)
            .await
            .unwrap();
        assert!(saved.created);
        assert_eq!(saved.folder.name, "Inbox");

        // Same name again: folder is reused, the note is revised.
        let other = folder(bob.id, "Inbox", "tokenFFFFFFFFFFFF");
        let item = FavoriteItem::new(other.id, 1, bob.id, "second");
        let resaved = store
            .add_item(bob.id, ItemTarget::Named(other), item, AddMode::Upsert, None)
            .await
            .unwrap();
        assert!(!resaved.created);
        assert_eq!(resaved.folder.id, saved.folder.id);
        assert_eq!(resaved.item.note, "second");
        assert_eq!(resaved.item.note_version, 2);

        // An empty note leaves the stored one alone.
        let item = FavoriteItem::new(saved.folder.id, 1, bob.id, "");
        let kept = store
            .add_item(bob.id, ItemTarget::Folder(saved.folder.id), item, AddMode::Upsert, None)
            .await
            .unwrap();
        assert_eq!(kept.item.note, "second");
        assert_eq!(kept.item.note_version, 2);

        assert_eq!(store.list_folders(bob.id).await.unwrap().len(), 1);
        // Only the first save created an item, so only it notified the folder owner.
        assert_eq!(store.count_unread("bob").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn foreign_folders_are_not_found() {
        let store = store().await;
        let bob = user(&store, "bob").await;
        let eve = user(&store, "eve").await;
        article(&store, 1, None).await;
        let list = store.insert_folder(folder(bob.id, "Private", "tokenGGGGGGGGGGGG")).await.unwrap();

        let err = store
            .add_item(eve.id, ItemTarget::Folder(list.id), FavoriteItem::new(list.id, 1, eve.id, ""), AddMode::Strict, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(..)));
        assert!(store.get_folder(eve.id, list.id).await.unwrap().is_none());
        assert!(!store.delete_folder(eve.id, list.id).await.unwrap());
    }

    #[tokio::test]
    async fn deleting_a_folder_cascades_to_items() {
        let store = store().await;
        let bob = user(&store, "bob").await;
        let list = store.insert_folder(folder(bob.id, "Gone", "tokenHHHHHHHHHHHH")).await.unwrap();
        for id in 1..=3 {
            article(&store, id, None).await;
            store
                .add_item(bob.id, ItemTarget::Folder(list.id), FavoriteItem::new(list.id, id, bob.id, ""), AddMode::Strict, None)
                .await
                .unwrap();
        }
        assert!(store.delete_folder(bob.id, list.id).await.unwrap());
        let left: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM favorite_items")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(left, 0);
    }

    #[tokio::test]
    async fn list_order_puts_pinned_first() {
        let store = store().await;
        let bob = user(&store, "bob").await;
        let a = store.insert_folder(folder(bob.id, "A", "tokenIIIIIIIIIIII")).await.unwrap();
        let mut b = folder(bob.id, "B", "tokenJJJJJJJJJJJJ");
        b.sort_order = -1;
        let b = store.insert_folder(b).await.unwrap();
        let mut c = folder(bob.id, "C", "tokenKKKKKKKKKKKK");
        c.pinned = true;
        c.sort_order = 10;
        let c = store.insert_folder(c).await.unwrap();

        let ids: Vec<_> = store.list_folders(bob.id).await.unwrap().into_iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![c.id, b.id, a.id]);
    }

    #[tokio::test]
    async fn batch_move_skips_duplicates_and_foreign_items() {
        let store = store().await;
        let bob = user(&store, "bob").await;
        let eve = user(&store, "eve").await;
        for id in 1..=2 {
            article(&store, id, None).await;
        }
        let from = store.insert_folder(folder(bob.id, "From", "tokenLLLLLLLLLLLL")).await.unwrap();
        let to = store.insert_folder(folder(bob.id, "To", "tokenMMMMMMMMMMMM")).await.unwrap();
        let eves = store.insert_folder(folder(eve.id, "Eve", "tokenNNNNNNNNNNNN")).await.unwrap();

        let add = |owner: Uuid, f: Uuid, article: i64| {
            let store = &store;
            async move {
                store
                    .add_item(owner, ItemTarget::Folder(f), FavoriteItem::new(f, article, owner, ""), AddMode::Strict, None)
                    .await
                    .unwrap()
                    .item
                    .id
            }
        };
        let one = add(bob.id, from.id, 1).await;
        let two = add(bob.id, from.id, 2).await;
        add(bob.id, to.id, 2).await;
        let foreign = add(eve.id, eves.id, 1).await;

        let outcome = store
            .apply_batch(bob.id, BatchAction::MoveItems { item_ids: vec![one, two, foreign], target_folder: to.id })
            .await
            .unwrap();
        assert_eq!(outcome, BatchOutcome::Moved(1));
        assert_eq!(store.list_items(to.id).await.unwrap().len(), 2);
        assert_eq!(store.list_items(eves.id).await.unwrap().len(), 1);

        let err = store
            .apply_batch(bob.id, BatchAction::MoveItems { item_ids: vec![one], target_folder: eves.id })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(..)));
    }

    #[tokio::test]
    async fn batch_pin_sort_delete_and_stats() {
        let store = store().await;
        let bob = user(&store, "bob").await;
        article(&store, 1, None).await;
        let a = store.insert_folder(folder(bob.id, "A", "tokenOOOOOOOOOOOO")).await.unwrap();
        let mut public = folder(bob.id, "B", "tokenPPPPPPPPPPPP");
        public.is_public = true;
        let b = store.insert_folder(public).await.unwrap();
        let item = store
            .add_item(bob.id, ItemTarget::Folder(a.id), FavoriteItem::new(a.id, 1, bob.id, ""), AddMode::Strict, None)
            .await
            .unwrap()
            .item;

        let pinned = store
            .apply_batch(bob.id, BatchAction::SetPinned { folder_ids: vec![a.id, b.id], pinned: true })
            .await
            .unwrap();
        assert_eq!(pinned, BatchOutcome::Updated(2));
        let sorted = store
            .apply_batch(bob.id, BatchAction::SortFolders(vec![(a.id, 5), (b.id, 1)]))
            .await
            .unwrap();
        assert_eq!(sorted.count(), 2);
        assert_eq!(store.list_folders(bob.id).await.unwrap()[0].id, b.id);

        let stats = store.folder_stats(bob.id).await.unwrap();
        assert_eq!(stats, FolderStats { folder_count: 2, item_count: 1, public_count: 1, pinned_count: 2 });

        let deleted = store.apply_batch(bob.id, BatchAction::DeleteItems(vec![item.id, Uuid::now_v7()])).await.unwrap();
        assert_eq!(deleted, BatchOutcome::Deleted(1));
        assert_eq!(store.folder_stats(bob.id).await.unwrap().item_count, 0);
    }

    #[tokio::test]
    async fn share_token_collisions_conflict() {
        let store = store().await;
        let bob = user(&store, "bob").await;
        let a = store.insert_folder(folder(bob.id, "A", "tokenQQQQQQQQQQQQ")).await.unwrap();
        store.insert_folder(folder(bob.id, "B", "tokenRRRRRRRRRRRR")).await.unwrap();
        let err = store.set_share_token(bob.id, a.id, "tokenRRRRRRRRRRRR").await.unwrap_err();
        assert!(err.is_conflict());
        assert!(store.set_share_token(bob.id, a.id, "tokenSSSSSSSSSSSS").await.unwrap());
    }

    #[tokio::test]
    async fn save_writes_the_share_token_with_the_rest() {
        let store = store().await;
        let bob = user(&store, "bob").await;
        let mut a = store.insert_folder(folder(bob.id, "A", "tokenTTTTTTTTTTTT")).await.unwrap();
        store.insert_folder(folder(bob.id, "B", "tokenUUUUUUUUUUUU")).await.unwrap();

        a.name = "Renamed".into();
        a.share_token = "tokenUUUUUUUUUUUU".into();
        assert!(store.save_folder(a.clone()).await.unwrap_err().is_conflict());
        let stored = store.get_folder(bob.id, a.id).await.unwrap().unwrap();
        assert_eq!((stored.name.as_str(), stored.share_token.as_str()), ("A", "tokenTTTTTTTTTTTT"));

        a.share_token = "tokenVVVVVVVVVVVV".into();
        assert!(store.save_folder(a.clone()).await.unwrap());
        let stored = store.get_folder(bob.id, a.id).await.unwrap().unwrap();
        assert_eq!((stored.name.as_str(), stored.share_token.as_str()), ("Renamed", "tokenVVVVVVVVVVVV"));
    }

    #[tokio::test]
    async fn folder_with_duplicates_cannot_turn_them_off() {
        let store = store().await;
        let bob = user(&store, "bob").await;
        article(&store, 1, None).await;
        let mut input = NewFolder::named("Dupes");
        input.allow_duplicates = true;
        let mut dupes = store
            .insert_folder(FavoriteFolder::new(bob.id, input, "tokenWWWWWWWWWWWW".into()))
            .await
            .unwrap();
        let other = store.insert_folder(folder(bob.id, "Other", "tokenXXXXXXXXXXXX")).await.unwrap();
        for f in [dupes.id, other.id] {
            store
                .add_item(bob.id, ItemTarget::Folder(f), FavoriteItem::new(f, 1, bob.id, ""), AddMode::Strict, None)
                .await
                .unwrap();
        }
        let moving = store.list_items(other.id).await.unwrap()[0].id;
        store
            .apply_batch(bob.id, BatchAction::MoveItems { item_ids: vec![moving], target_folder: dupes.id })
            .await
            .unwrap();
        assert_eq!(store.list_items(dupes.id).await.unwrap().len(), 2);

        dupes.allow_duplicates = false;
        let err = store.save_folder(dupes.clone()).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
        assert!(store.get_folder(bob.id, dupes.id).await.unwrap().unwrap().allow_duplicates);

        // Once the duplicate is gone the switch goes through.
        store.remove_item(bob.id, moving).await.unwrap();
        assert!(store.save_folder(dupes).await.unwrap());
    }

    #[tokio::test]
    async fn owner_items_page_newest_first_across_folders() {
        let store = store().await;
        let bob = user(&store, "bob").await;
        let eve = user(&store, "eve").await;
        let a = store.insert_folder(folder(bob.id, "A", "tokenYYYYYYYYYYYY")).await.unwrap();
        let b = store.insert_folder(folder(bob.id, "B", "tokenZZZZZZZZZZZZ")).await.unwrap();
        let eves = store.insert_folder(folder(eve.id, "E", "tokenEEEEEEEEEEE1")).await.unwrap();
        let base = Utc::now();
        for (n, f) in [a.id, b.id, a.id].into_iter().enumerate() {
            article(&store, n as i64 + 1, None).await;
            let mut item = FavoriteItem::new(f, n as i64 + 1, bob.id, "");
            item.created_at = base + chrono::Duration::seconds(n as i64);
            store.add_item(bob.id, ItemTarget::Folder(f), item, AddMode::Strict, None).await.unwrap();
        }
        store
            .add_item(eve.id, ItemTarget::Folder(eves.id), FavoriteItem::new(eves.id, 1, eve.id, ""), AddMode::Strict, None)
            .await
            .unwrap();

        assert_eq!(store.count_owner_items(bob.id).await.unwrap(), 3);
        let first: Vec<i64> = store.list_owner_items(bob.id, 2, 0).await.unwrap().iter().map(|i| i.article_id).collect();
        assert_eq!(first, vec![3, 2]);
        let second = store.list_owner_items(bob.id, 2, 2).await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!((second[0].article_id, second[0].folder_id), (1, a.id));
    }
}
