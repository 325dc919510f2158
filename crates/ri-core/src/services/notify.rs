//! # Notification Emitter
//!
//! Builds the notification rows that the like and favorite engines persist
//! inside their own transactions, and serves the read side (inbox, unread
//! counter, read transition).
//!
//! # Developer Note
//! An actor interacting with their own content still produces a notification;
//! only an unresolvable recipient suppresses it.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{
    Actor, ArticleRef, FavoriteFolder, InteractionNotification, NotificationKind,
};
use crate::traits::NotificationRepo;

/// Upper bound for a single inbox page.
pub const INBOX_LIMIT_MAX: i64 = 100;

/// Like notification for the article's author, if the article has one.
pub fn like_notification(article: &ArticleRef, actor: &Actor) -> Option<InteractionNotification> {
    let recipient = article.author_user_id.clone()?;
    Some(InteractionNotification {
        id: Uuid::now_v7(),
        recipient_user_id: recipient,
        article_id: Some(article.id),
        folder_id: None,
        kind: NotificationKind::Like,
        payload: json!({
            "actor": actor.display_name(),
            "article_id": article.id,
            "article_title": article.title,
        }),
        is_read: false,
        created_at: Utc::now(),
    })
}

/// Favorite notification for the folder owner's user account. Anonymous
/// owners have nobody to notify.
pub fn favorite_notification(
    folder: &FavoriteFolder,
    owner: &Actor,
    article: &ArticleRef,
    actor: &Actor,
) -> Option<InteractionNotification> {
    let recipient = owner.user_id.clone()?;
    Some(InteractionNotification {
        id: Uuid::now_v7(),
        recipient_user_id: recipient,
        article_id: Some(article.id),
        folder_id: Some(folder.id),
        kind: NotificationKind::Favorite,
        payload: json!({
            "actor": actor.display_name(),
            "folder": folder.name,
            "article_title": article.title,
        }),
        is_read: false,
        created_at: Utc::now(),
    })
}

/// Inbox operations for registered users.
pub struct NotificationService {
    repo: Arc<dyn NotificationRepo>,
}

impl NotificationService {
    pub fn new(repo: Arc<dyn NotificationRepo>) -> Self {
        Self { repo }
    }

    fn recipient(actor: &Actor) -> Result<&str> {
        actor
            .user_id
            .as_deref()
            .ok_or_else(|| AppError::Unauthorized("notifications require a signed-in user".into()))
    }

    pub async fn list(
        &self,
        actor: &Actor,
        unread_only: bool,
        limit: i64,
    ) -> Result<Vec<InteractionNotification>> {
        let user = Self::recipient(actor)?;
        self.repo
            .list_notifications(user, unread_only, limit.clamp(1, INBOX_LIMIT_MAX))
            .await
    }

    /// Idempotent: marking an already-read notification succeeds.
    pub async fn mark_read(&self, actor: &Actor, id: Uuid) -> Result<()> {
        let user = Self::recipient(actor)?;
        if self.repo.mark_notification_read(user, id).await? {
            Ok(())
        } else {
            Err(AppError::not_found("Notification", id))
        }
    }

    pub async fn unread_count(&self, actor: &Actor) -> Result<i64> {
        let user = Self::recipient(actor)?;
        self.repo.count_unread(user).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ArticleStatus, NewFolder};
    use crate::traits::MockNotificationRepo;

    fn article(author: Option<&str>) -> ArticleRef {
        ArticleRef {
            id: 1,
            title: "Ownership in Rust".into(),
            author_user_id: author.map(str::to_string),
            url: "/article/1".into(),
            status: ArticleStatus::Published,
        }
    }

    #[test]
    fn like_without_author_is_silent() {
        let actor = Actor::for_anonymous("sess-1", "");
        assert!(like_notification(&article(None), &actor).is_none());
    }

    #[test]
    fn like_payload_snapshots_names() {
        let actor = Actor::for_anonymous("sess-1", "");
        let n = like_notification(&article(Some("alice")), &actor).unwrap();
        assert_eq!(n.recipient_user_id, "alice");
        assert_eq!(n.kind, NotificationKind::Like);
        assert_eq!(n.payload["actor"], "Anonymous visitor");
        assert_eq!(n.payload["article_title"], "Ownership in Rust");
    }

    #[test]
    fn self_like_still_notifies() {
        let alice = Actor::for_user("alice");
        assert!(like_notification(&article(Some("alice")), &alice).is_some());
    }

    #[test]
    fn favorite_for_anonymous_owner_is_silent() {
        let owner = Actor::for_anonymous("sess-2", "");
        let folder = FavoriteFolder::new(owner.id, NewFolder::named("Later"), "tok".into());
        assert!(favorite_notification(&folder, &owner, &article(Some("alice")), &owner).is_none());

        let bob = Actor::for_user("bob");
        let folder = FavoriteFolder::new(bob.id, NewFolder::named("Reading List"), "tok".into());
        let n = favorite_notification(&folder, &bob, &article(Some("alice")), &bob).unwrap();
        assert_eq!(n.recipient_user_id, "bob");
        assert_eq!(n.folder_id, Some(folder.id));
        assert_eq!(n.payload["folder"], "Reading List");
    }

    #[tokio::test]
    async fn inbox_requires_user() {
        let service = NotificationService::new(Arc::new(MockNotificationRepo::new()));
        let anon = Actor::for_anonymous("sess-1", "");
        assert!(matches!(service.unread_count(&anon).await, Err(AppError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn mark_read_of_foreign_notification_is_not_found() {
        let mut repo = MockNotificationRepo::new();
        repo.expect_mark_notification_read().returning(|_, _| Ok(false));
        let service = NotificationService::new(Arc::new(repo));
        let bob = Actor::for_user("bob");
        let err = service.mark_read(&bob, Uuid::now_v7()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(..)));
    }

    #[tokio::test]
    async fn list_clamps_limit() {
        let mut repo = MockNotificationRepo::new();
        repo.expect_list_notifications()
            .withf(|user, unread, limit| user == "bob" && *unread && *limit == INBOX_LIMIT_MAX)
            .returning(|_, _, _| Ok(vec![]));
        let service = NotificationService::new(Arc::new(repo));
        let bob = Actor::for_user("bob");
        assert!(service.list(&bob, true, 10_000).await.unwrap().is_empty());
    }
}
