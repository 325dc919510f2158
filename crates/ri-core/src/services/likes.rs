//! # Like Engine
//!
//! Toggle semantics over the unique `(article, actor)` pair. The count handed
//! back to callers is always recounted by the store after the mutation, never
//! a cached counter.

use std::sync::Arc;

use log::{debug, warn};

use crate::error::{AppError, Result};
use crate::models::{Actor, ArticleId, Like, LikeContext, LikeToggle};
use crate::services::notify;
use crate::traits::{ArticleDirectory, LikeRepo};

const TOGGLE_ATTEMPTS: usize = 3;
/// Upper bound for a like-history page.
pub const HISTORY_LIMIT_MAX: i64 = 100;

pub struct LikeEngine {
    likes: Arc<dyn LikeRepo>,
    articles: Arc<dyn ArticleDirectory>,
}

impl LikeEngine {
    pub fn new(likes: Arc<dyn LikeRepo>, articles: Arc<dyn ArticleDirectory>) -> Self {
        Self { likes, articles }
    }

    /// Likes the article if `actor` has not yet, unlikes it otherwise.
    pub async fn toggle(&self, actor: &Actor, article_id: ArticleId, ctx: &LikeContext) -> Result<LikeToggle> {
        let article = self
            .articles
            .get_article(article_id)
            .await?
            .ok_or_else(|| AppError::not_found("Article", article_id))?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            let like = Like::new(actor, article.id, ctx);
            let notification = notify::like_notification(&article, actor);
            match self.likes.toggle_like(like, notification).await {
                Ok(outcome) => {
                    debug!(
                        "actor {} {} article {} ({} likes)",
                        actor.id,
                        if outcome.liked { "liked" } else { "unliked" },
                        article.id,
                        outcome.like_count
                    );
                    return Ok(outcome);
                }
                Err(err) if err.is_conflict() && attempt < TOGGLE_ATTEMPTS => {
                    warn!("like toggle on article {} raced (attempt {}), retrying", article.id, attempt);
                }
                Err(err) => return Err(err),
            }
        }
    }

    pub async fn count(&self, article_id: ArticleId) -> Result<i64> {
        self.likes.count_likes(article_id).await
    }

    pub async fn has_liked(&self, actor: &Actor, article_id: ArticleId) -> Result<bool> {
        self.likes.has_liked(actor.id, article_id).await
    }

    /// The actor's likes, newest first.
    pub async fn history(&self, actor: &Actor, limit: i64) -> Result<Vec<Like>> {
        self.likes
            .list_likes_by_actor(actor.id, limit.clamp(1, HISTORY_LIMIT_MAX))
            .await
    }
}
