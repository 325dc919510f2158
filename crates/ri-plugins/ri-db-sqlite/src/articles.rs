//! Article read model. The publishing system owns these rows; this store only
//! mirrors what interactions need to display and notify.

use async_trait::async_trait;
use ri_core::error::{AppError, Result};
use ri_core::models::{ArticleId, ArticleRef, ArticleStatus};
use ri_core::traits::ArticleDirectory;
use sqlx::Row;

use crate::{db_err, SqliteStore};

fn status_code(status: ArticleStatus) -> &'static str {
    match status {
        ArticleStatus::Published => "p",
        ArticleStatus::Draft => "d",
    }
}

const UPSERT_ARTICLE: &str = "INSERT INTO articles (id, title, author_user_id, url, status) VALUES (?, ?, ?, ?, ?)
    ON CONFLICT(id) DO UPDATE SET title = excluded.title, author_user_id = excluded.author_user_id,
        url = excluded.url, status = excluded.status";

impl SqliteStore {
    /// Inserts or refreshes a mirrored article.
    pub async fn upsert_article(&self, article: &ArticleRef) -> Result<()> {
        self.import_articles(std::slice::from_ref(article)).await.map(|_| ())
    }

    /// Inserts or refreshes a batch of articles in one transaction.
    pub async fn import_articles(&self, articles: &[ArticleRef]) -> Result<usize> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        for article in articles {
            sqlx::query(UPSERT_ARTICLE)
                .bind(article.id)
                .bind(&article.title)
                .bind(&article.author_user_id)
                .bind(&article.url)
                .bind(status_code(article.status))
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
        }
        tx.commit().await.map_err(db_err)?;
        Ok(articles.len())
    }

    /// Imports a JSON array of articles as exported by the publishing system:
    /// `[{"id", "title", "author_user_id", "url", "status": "published" | "draft"}]`.
    pub async fn import_articles_json(&self, json: &str) -> Result<usize> {
        let articles: Vec<ArticleRef> = serde_json::from_str(json)
            .map_err(|err| AppError::ValidationError(format!("invalid article list: {err}")))?;
        let count = self.import_articles(&articles).await?;
        log::info!("imported {} articles", count);
        Ok(count)
    }
}

#[async_trait]
impl ArticleDirectory for SqliteStore {
    async fn get_article(&self, id: ArticleId) -> Result<Option<ArticleRef>> {
        let row = sqlx::query("SELECT id, title, author_user_id, url, status FROM articles WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.map(|row| {
            let status: String = row.try_get("status").map_err(db_err)?;
            Ok(ArticleRef {
                id: row.try_get("id").map_err(db_err)?,
                title: row.try_get("title").map_err(db_err)?,
                author_user_id: row.try_get("author_user_id").map_err(db_err)?,
                url: row.try_get("url").map_err(db_err)?,
                status: if status == "p" { ArticleStatus::Published } else { ArticleStatus::Draft },
            })
        })
        .transpose()
    }
}
