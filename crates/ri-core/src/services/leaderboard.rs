//! # Leaderboard
//!
//! Ranks articles by like count. With `since`, only likes created at or after
//! that instant are counted, so the window changes the ranking itself. The
//! 7/30-day deltas are always trailing windows from "now".
//!
//! # Developer Note
//! Results are cached per `(limit, since)` for a bounded TTL. Slightly stale
//! rankings are acceptable; nothing invalidates the cache on toggle. Expired
//! entries are pruned on every store and the map never holds more than
//! [`MAX_CACHED_BOARDS`] rankings, since `since` comes straight from clients.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use log::debug;

use crate::error::Result;
use crate::models::LeaderboardEntry;
use crate::traits::{ArticleDirectory, LeaderboardRepo};

pub const DEFAULT_LIMIT: i64 = 20;
pub const MAX_LIMIT: i64 = 100;
pub const MAX_CACHED_BOARDS: usize = 256;
/// Ranked rows inspected at most while looking for visible articles.
const MAX_SCANNED_ROWS: i64 = 1_000;

type CacheKey = (i64, Option<i64>);

pub struct LeaderboardService {
    likes: Arc<dyn LeaderboardRepo>,
    articles: Arc<dyn ArticleDirectory>,
    ttl: Duration,
    cache: DashMap<CacheKey, (Instant, Vec<LeaderboardEntry>)>,
}

impl LeaderboardService {
    pub fn new(likes: Arc<dyn LeaderboardRepo>, articles: Arc<dyn ArticleDirectory>, ttl: Duration) -> Self {
        Self { likes, articles, ttl, cache: DashMap::new() }
    }

    /// Cached ranking. A zero TTL disables caching.
    pub async fn top_articles(&self, limit: i64, since: Option<DateTime<Utc>>) -> Result<Vec<LeaderboardEntry>> {
        let limit = limit.clamp(1, MAX_LIMIT);
        let key = (limit, since.map(|s| s.timestamp_millis()));
        if let Some(hit) = self.cache.get(&key) {
            let (stored_at, entries) = hit.value();
            if stored_at.elapsed() < self.ttl {
                return Ok(entries.clone());
            }
        }

        let entries = self.compute(Utc::now(), limit, since).await?;
        if !self.ttl.is_zero() {
            self.store(key, entries.clone());
        }
        Ok(entries)
    }

    fn store(&self, key: CacheKey, entries: Vec<LeaderboardEntry>) {
        let ttl = self.ttl;
        self.cache.retain(|_, (stored_at, _)| stored_at.elapsed() < ttl);
        if self.cache.len() >= MAX_CACHED_BOARDS {
            debug!("leaderboard cache full, dropping {} rankings", self.cache.len());
            self.cache.clear();
        }
        self.cache.insert(key, (Instant::now(), entries));
    }

    /// Uncached ranking relative to `now`. Hidden articles do not use up a
    /// slot: the ranking is paged until `limit` visible entries are found,
    /// the likes run out, or [`MAX_SCANNED_ROWS`] rows were inspected.
    pub async fn compute(
        &self,
        now: DateTime<Utc>,
        limit: i64,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<LeaderboardEntry>> {
        let week_ago = now - chrono::Duration::days(7);
        let month_ago = now - chrono::Duration::days(30);
        let wanted = usize::try_from(limit).unwrap_or_default();

        let mut entries = Vec::with_capacity(wanted);
        let mut offset = 0;
        while entries.len() < wanted && offset < MAX_SCANNED_ROWS {
            let rows = self.likes.top_liked_articles(limit, offset, since).await?;
            let fetched = rows.len() as i64;
            for row in rows {
                // Drafts and deleted articles never show on the public board.
                let Some(article) = self.articles.get_article(row.article_id).await? else {
                    debug!("leaderboard skips missing article {}", row.article_id);
                    continue;
                };
                if !article.is_published() {
                    continue;
                }
                entries.push(LeaderboardEntry {
                    article_id: article.id,
                    title: article.title,
                    url: article.url,
                    total_likes: row.total,
                    delta_7d: self.likes.count_likes_since(row.article_id, week_ago).await?,
                    delta_30d: self.likes.count_likes_since(row.article_id, month_ago).await?,
                });
                if entries.len() == wanted {
                    break;
                }
            }
            if fetched < limit {
                break;
            }
            offset += fetched;
        }
        Ok(entries)
    }
}
