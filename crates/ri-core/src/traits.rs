//! # Core Traits (Ports)
//!
//! Any plugin must implement these traits to be used by the binary.
//! Every mutating method is expected to run as a single store transaction:
//! either all of its writes (including the notification row) land, or none do.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::batch::{BatchAction, BatchOutcome};
use crate::error::Result;
use crate::models::{
    Actor, AddMode, ArticleId, ArticleLikes, ArticleRef, FavoriteFolder, FavoriteItem, FolderStats,
    InteractionNotification, ItemAdd, ItemTarget, Like, LikeToggle,
};

/// Persistence contract for actors.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ActorRepo: Send + Sync {
    /// Inserts `candidate` unless an actor already holds its `user_id`, then
    /// returns whichever actor owns that user id.
    async fn upsert_user_actor(&self, candidate: Actor) -> Result<Actor>;

    /// Same as [`ActorRepo::upsert_user_actor`] keyed on `anonymous_key`.
    /// A differing non-empty fingerprint on the candidate refreshes the stored one.
    async fn upsert_anonymous_actor(&self, candidate: Actor) -> Result<Actor>;

    /// Looks up an anonymous actor (one with no linked user) by session key.
    async fn find_anonymous_actor(&self, anonymous_key: &str) -> Result<Option<Actor>>;

    async fn get_actor(&self, id: Uuid) -> Result<Option<Actor>>;
}

/// Persistence contract for likes.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait LikeRepo: Send + Sync {
    /// Flips the `(article, actor)` like. The notification is stored only when
    /// a row gets inserted. The returned count is read after the mutation.
    async fn toggle_like(
        &self,
        like: Like,
        notification: Option<InteractionNotification>,
    ) -> Result<LikeToggle>;

    async fn count_likes(&self, article_id: ArticleId) -> Result<i64>;
    async fn has_liked(&self, actor_id: Uuid, article_id: ArticleId) -> Result<bool>;

    /// Newest first.
    async fn list_likes_by_actor(&self, actor_id: Uuid, limit: i64) -> Result<Vec<Like>>;
}

/// Persistence contract for favorite folders and items.
/// Every method taking `owner_id` ignores rows the owner does not own.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait FavoriteRepo: Send + Sync {
    /// Fails with `Conflict` on a duplicate `(owner, name)` or share token.
    async fn insert_folder(&self, folder: FavoriteFolder) -> Result<FavoriteFolder>;
    async fn get_folder(&self, owner_id: Uuid, folder_id: Uuid) -> Result<Option<FavoriteFolder>>;
    async fn find_folder_by_name(&self, owner_id: Uuid, name: &str) -> Result<Option<FavoriteFolder>>;

    /// Pinned first, then `sort_order`, then most recently touched.
    async fn list_folders(&self, owner_id: Uuid) -> Result<Vec<FavoriteFolder>>;

    /// Writes every mutable column of `folder`, share token included. Returns
    /// `false` when the folder no longer exists for its owner. Turning
    /// `allow_duplicates` off while the folder holds the same article twice
    /// fails with `ValidationError`.
    async fn save_folder(&self, folder: FavoriteFolder) -> Result<bool>;

    /// Removes the folder and all of its items together.
    async fn delete_folder(&self, owner_id: Uuid, folder_id: Uuid) -> Result<bool>;

    /// Fails with `Conflict` when the token is already taken.
    async fn set_share_token(&self, owner_id: Uuid, folder_id: Uuid, token: &str) -> Result<bool>;

    /// Places `item` into the resolved folder according to `mode`. The item's
    /// and the notification's folder ids are rewritten to the resolved folder.
    async fn add_item(
        &self,
        owner_id: Uuid,
        target: ItemTarget,
        item: FavoriteItem,
        mode: AddMode,
        notification: Option<InteractionNotification>,
    ) -> Result<ItemAdd>;

    async fn remove_item(&self, owner_id: Uuid, item_id: Uuid) -> Result<u64>;

    /// Oldest first.
    async fn list_items(&self, folder_id: Uuid) -> Result<Vec<FavoriteItem>>;

    /// Items across all of the owner's folders, newest first.
    async fn list_owner_items(&self, owner_id: Uuid, limit: i64, offset: i64) -> Result<Vec<FavoriteItem>>;
    async fn count_owner_items(&self, owner_id: Uuid) -> Result<i64>;

    async fn apply_batch(&self, owner_id: Uuid, action: BatchAction) -> Result<BatchOutcome>;
    async fn folder_stats(&self, owner_id: Uuid) -> Result<FolderStats>;
}

/// Public, token-based folder access.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ShareRepo: Send + Sync {
    /// Resolves a token to a *public* folder and counts the hit.
    async fn open_shared_folder(&self, token: &str) -> Result<Option<FavoriteFolder>>;
    async fn list_public_folders(&self, limit: i64) -> Result<Vec<FavoriteFolder>>;
}

/// Read side of the notification table.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait NotificationRepo: Send + Sync {
    async fn list_notifications(
        &self,
        recipient_user_id: &str,
        unread_only: bool,
        limit: i64,
    ) -> Result<Vec<InteractionNotification>>;

    /// Returns `false` when no notification with that id belongs to the recipient.
    async fn mark_notification_read(&self, recipient_user_id: &str, id: Uuid) -> Result<bool>;
    async fn count_unread(&self, recipient_user_id: &str) -> Result<i64>;
}

/// Aggregations over like rows.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait LeaderboardRepo: Send + Sync {
    /// Like totals per article, highest first (ties by article id), counting
    /// only likes created at or after `since` when given. `offset` pages
    /// through the same ordering.
    async fn top_liked_articles(
        &self,
        limit: i64,
        offset: i64,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<ArticleLikes>>;

    async fn count_likes_since(&self, article_id: ArticleId, since: DateTime<Utc>) -> Result<i64>;
}

/// Ownership rewrite used when an anonymous visitor signs in.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait MergeRepo: Send + Sync {
    /// Moves likes, folders and item authorship from `from` to `into`, then
    /// deletes `from`. Returns the number of reassigned rows.
    async fn merge_actor(&self, from: Uuid, into: Uuid) -> Result<u64>;
}

/// Article lookup provided by the publishing system.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ArticleDirectory: Send + Sync {
    /// Returns drafts as well as published articles.
    async fn get_article(&self, id: ArticleId) -> Result<Option<ArticleRef>>;
}

/// Identity helpers and random material for sessions and share links.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait IdentityProvider: Send + Sync {
    /// Hashes request metadata into a stable, non-identifying fingerprint.
    fn fingerprint(&self, user_agent: &str, accept: &str, accept_language: &str, ip: &str) -> String;

    /// Mints a fresh anonymous session key. Fails when no secure randomness
    /// is available.
    fn mint_anonymous_key(&self) -> Result<String>;

    /// Mints a fresh alphanumeric share token.
    fn mint_share_token(&self) -> Result<String>;
}

/// Everything a storage plugin has to provide.
pub trait InteractionStore:
    ActorRepo + LikeRepo + FavoriteRepo + ShareRepo + NotificationRepo + LeaderboardRepo + MergeRepo
{
}

impl<T> InteractionStore for T where
    T: ActorRepo + LikeRepo + FavoriteRepo + ShareRepo + NotificationRepo + LeaderboardRepo + MergeRepo
{
}
