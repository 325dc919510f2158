//! # ri-db-sqlite Implementation
//!
//! This crate implements the data mapping between the SQLite relational model
//! and the `ri-core` domain models, for every storage port plus the article
//! read model.
//!
//! # Developer Note
//! Mutations open their transaction with a write statement so SQLite takes
//! the write lock up front. Two requests racing on the same rows therefore
//! queue behind each other instead of failing a lock upgrade halfway through.

mod actors;
mod articles;
mod favorites;
mod leaderboard;
mod likes;
mod merge;
mod notifications;
mod sharing;

use std::str::FromStr;
use std::time::Duration;

use ri_core::error::{AppError, Result};
use ri_core::models::{FavoriteFolder, FavoriteItem};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use uuid::Uuid;

/// Message raised by the duplicate-item triggers.
const DUPLICATE_FAVORITE: &str = "duplicate favorite";
/// Message raised when a folder holding duplicates is switched to unique items.
const FOLDER_HOLDS_DUPLICATES: &str = "folder holds duplicates";

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connects (creating the database file if needed) and applies migrations.
    ///
    /// In-memory databases live exactly as long as their connection, so they
    /// get a single connection that is never recycled.
    pub async fn new(url: &str) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        let in_memory = url.contains(":memory:");
        let pool = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new().max_connections(8).connect_with(options).await?
        };

        sqlx::migrate!("./migrations").run(&pool).await?;
        log::info!("sqlite store ready at {}", url);
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

// Helpers for UUID conversion
pub(crate) fn uuid_to_blob(id: Uuid) -> Vec<u8> {
    id.as_bytes().to_vec()
}

pub(crate) fn blob_to_uuid(blob: &[u8]) -> Uuid {
    Uuid::from_slice(blob).unwrap_or_default()
}

/// Translates store failures: constraint violations become conflicts, the
/// rest is an internal error.
pub(crate) fn db_err(err: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() || db.message().contains(DUPLICATE_FAVORITE) {
            return AppError::Conflict(db.message().to_string());
        }
        if db.message().contains(FOLDER_HOLDS_DUPLICATES) {
            return AppError::ValidationError(
                "remove duplicate articles before disallowing duplicates".into(),
            );
        }
    }
    AppError::Internal(err.to_string())
}

pub(crate) fn is_duplicate_favorite(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.message().contains(DUPLICATE_FAVORITE))
}

pub(crate) fn folder_from_row(row: &SqliteRow) -> Result<FavoriteFolder> {
    Ok(FavoriteFolder {
        id: blob_to_uuid(row.try_get::<Vec<u8>, _>("id").map_err(db_err)?.as_slice()),
        owner_id: blob_to_uuid(row.try_get::<Vec<u8>, _>("owner_id").map_err(db_err)?.as_slice()),
        name: row.try_get("name").map_err(db_err)?,
        slug: row.try_get("slug").map_err(db_err)?,
        description: row.try_get("description").map_err(db_err)?,
        is_public: row.try_get("is_public").map_err(db_err)?,
        allow_duplicates: row.try_get("allow_duplicates").map_err(db_err)?,
        tags: row.try_get("tags").map_err(db_err)?,
        pinned: row.try_get("pinned").map_err(db_err)?,
        sort_order: row.try_get("sort_order").map_err(db_err)?,
        share_token: row.try_get("share_token").map_err(db_err)?,
        share_hits: row.try_get("share_hits").map_err(db_err)?,
        created_at: row.try_get("created_at").map_err(db_err)?,
        updated_at: row.try_get("updated_at").map_err(db_err)?,
    })
}

pub(crate) fn item_from_row(row: &SqliteRow) -> Result<FavoriteItem> {
    let added_by: Option<Vec<u8>> = row.try_get("added_by").map_err(db_err)?;
    Ok(FavoriteItem {
        id: blob_to_uuid(row.try_get::<Vec<u8>, _>("id").map_err(db_err)?.as_slice()),
        folder_id: blob_to_uuid(row.try_get::<Vec<u8>, _>("folder_id").map_err(db_err)?.as_slice()),
        article_id: row.try_get("article_id").map_err(db_err)?,
        added_by: added_by.as_deref().map(blob_to_uuid),
        note: row.try_get("note").map_err(db_err)?,
        note_version: row.try_get("note_version").map_err(db_err)?,
        created_at: row.try_get("created_at").map_err(db_err)?,
        updated_at: row.try_get("updated_at").map_err(db_err)?,
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use ri_core::models::{Actor, ArticleRef, ArticleStatus};
    use ri_core::traits::ActorRepo;

    pub async fn store() -> SqliteStore {
        SqliteStore::new("sqlite::memory:").await.expect("in-memory store")
    }

    pub async fn article(store: &SqliteStore, id: i64, author: Option<&str>) -> ArticleRef {
        let article = ArticleRef {
            id,
            title: format!("Article {id}"),
            author_user_id: author.map(str::to_string),
            url: format!("/article/{id}.html"),
            status: ArticleStatus::Published,
        };
        store.upsert_article(&article).await.expect("article");
        article
    }

    pub async fn user(store: &SqliteStore, user_id: &str) -> Actor {
        store.upsert_user_actor(Actor::for_user(user_id)).await.expect("user actor")
    }

    pub async fn anonymous(store: &SqliteStore, key: &str) -> Actor {
        store
            .upsert_anonymous_actor(Actor::for_anonymous(key, "fp"))
            .await
            .expect("anonymous actor")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_migrations_apply_on_memory_db() {
        let store = SqliteStore::new("sqlite::memory:").await.unwrap();
        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE '\\_%' ESCAPE '\\' ORDER BY name",
        )
        .fetch_all(store.pool())
        .await
        .unwrap();
        for expected in ["actors", "articles", "favorite_folders", "favorite_items", "interaction_notifications", "likes"] {
            assert!(tables.iter().any(|t| t == expected), "missing table {expected}");
        }
    }

    #[test]
    fn uuid_blob_roundtrip_is_lossless() {
        let id = Uuid::now_v7();
        assert_eq!(blob_to_uuid(&uuid_to_blob(id)), id);
        assert_eq!(blob_to_uuid(b"short"), Uuid::nil());
    }
}
