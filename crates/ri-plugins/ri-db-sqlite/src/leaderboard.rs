//! Like aggregations for the leaderboard.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ri_core::error::Result;
use ri_core::models::{ArticleId, ArticleLikes};
use ri_core::traits::LeaderboardRepo;
use sqlx::Row;

use crate::{db_err, SqliteStore};

#[async_trait]
impl LeaderboardRepo for SqliteStore {
    async fn top_liked_articles(
        &self,
        limit: i64,
        offset: i64,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<ArticleLikes>> {
        let rows = match since {
            Some(since) => {
                sqlx::query(
                    "SELECT article_id, COUNT(*) AS total FROM likes WHERE created_at >= ?
                     GROUP BY article_id ORDER BY total DESC, article_id ASC LIMIT ? OFFSET ?",
                )
                .bind(since)
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(
                    "SELECT article_id, COUNT(*) AS total FROM likes
                     GROUP BY article_id ORDER BY total DESC, article_id ASC LIMIT ? OFFSET ?",
                )
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(db_err)?;

        rows.iter()
            .map(|row| {
                Ok(ArticleLikes {
                    article_id: row.try_get("article_id").map_err(db_err)?,
                    total: row.try_get("total").map_err(db_err)?,
                })
            })
            .collect()
    }

    async fn count_likes_since(&self, article_id: ArticleId, since: DateTime<Utc>) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM likes WHERE article_id = ? AND created_at >= ?")
            .bind(article_id)
            .bind(since)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)
    }
}
