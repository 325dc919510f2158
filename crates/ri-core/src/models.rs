//! # Domain Models
//!
//! These structs represent the core entities of Rusty-Interact.
//! Owned entities use UUID v7 for time-ordered, globally unique identification;
//! articles belong to the publishing system and keep its integer ids.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Longest folder name accepted (in characters).
pub const FOLDER_NAME_MAX: usize = 80;
/// Longest slug stored for a folder.
pub const FOLDER_SLUG_MAX: usize = 120;
/// Longest comma-delimited tag string accepted.
pub const FOLDER_TAGS_MAX: usize = 120;
/// Longest note accepted on a favorite item.
pub const ITEM_NOTE_MAX: usize = 120;
/// User agents are truncated to this many characters before storage.
pub const USER_AGENT_MAX: usize = 255;
/// Name of the folder every user gets on first visit to their favorites.
pub const DEFAULT_FOLDER_NAME: &str = "Default Favorites";
/// Items per page of the cross-folder favorites listing.
pub const MY_FAVORITES_PAGE_SIZE: i64 = 20;

/// Identifier type of articles owned by the publishing collaborator.
pub type ArticleId = i64;

/// One acting identity: either bound to a registered user or to an
/// anonymous client session. Exactly one of the two keys is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: Uuid,
    pub user_id: Option<String>,
    pub anonymous_key: Option<String>,
    /// Best-effort abuse signal, never used for identity
    pub fingerprint: String,
    pub created_at: DateTime<Utc>,
}

impl Actor {
    pub fn for_user(user_id: &str) -> Self {
        Self {
            id: Uuid::now_v7(),
            user_id: Some(user_id.to_string()),
            anonymous_key: None,
            fingerprint: String::new(),
            created_at: Utc::now(),
        }
    }

    pub fn for_anonymous(anonymous_key: &str, fingerprint: &str) -> Self {
        Self {
            id: Uuid::now_v7(),
            user_id: None,
            anonymous_key: Some(anonymous_key.to_string()),
            fingerprint: fingerprint.to_string(),
            created_at: Utc::now(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    pub fn display_name(&self) -> String {
        match &self.user_id {
            Some(user) => user.clone(),
            None => "Anonymous visitor".to_string(),
        }
    }
}

/// Publication state reported by the article collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArticleStatus {
    Draft,
    Published,
}

/// Read-only view of an article as exposed by the publishing system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleRef {
    pub id: ArticleId,
    pub title: String,
    pub author_user_id: Option<String>,
    pub url: String,
    pub status: ArticleStatus,
}

impl ArticleRef {
    pub fn is_published(&self) -> bool {
        self.status == ArticleStatus::Published
    }
}

/// A like relation between one actor and one article.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Like {
    pub id: Uuid,
    pub article_id: ArticleId,
    pub actor_id: Uuid,
    /// Reserved for downvotes; existence of the row is what counts today
    pub is_positive: bool,
    /// Cached from the actor for quick lookups, empty for registered users
    pub anonymous_key: String,
    pub user_agent: String,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Diagnostic request data stored alongside a like.
#[derive(Debug, Clone, Default)]
pub struct LikeContext {
    pub user_agent: String,
    pub ip_address: Option<String>,
}

impl Like {
    pub fn new(actor: &Actor, article_id: ArticleId, ctx: &LikeContext) -> Self {
        Self {
            id: Uuid::now_v7(),
            article_id,
            actor_id: actor.id,
            is_positive: true,
            anonymous_key: actor.anonymous_key.clone().unwrap_or_default(),
            user_agent: ctx.user_agent.chars().take(USER_AGENT_MAX).collect(),
            ip_address: ctx.ip_address.clone(),
            created_at: Utc::now(),
        }
    }
}

/// Outcome of a like toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeToggle {
    pub liked: bool,
    pub created: bool,
    pub like_count: i64,
}

/// A named collection of favorited articles, owned by one actor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FavoriteFolder {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub is_public: bool,
    pub allow_duplicates: bool,
    /// Comma-delimited label list, see [`FavoriteFolder::tag_list`]
    pub tags: String,
    pub pinned: bool,
    pub sort_order: i64,
    pub share_token: String,
    pub share_hits: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FavoriteFolder {
    pub fn new(owner_id: Uuid, input: NewFolder, share_token: String) -> Self {
        let now = Utc::now();
        let name = input.name.trim().to_string();
        Self {
            id: Uuid::now_v7(),
            owner_id,
            slug: slugify(&name),
            name,
            description: input.description,
            is_public: input.is_public,
            allow_duplicates: input.allow_duplicates,
            tags: input.tags.trim().to_string(),
            pinned: input.pinned,
            sort_order: input.sort_order,
            share_token,
            share_hits: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn tag_list(&self) -> Vec<String> {
        self.tags
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Applies a patch in place. The slug follows the name on every save.
    pub fn apply(&mut self, patch: &FolderPatch) {
        if let Some(name) = &patch.name {
            self.name = name.trim().to_string();
        }
        if let Some(description) = &patch.description {
            self.description = description.clone();
        }
        if let Some(is_public) = patch.is_public {
            self.is_public = is_public;
        }
        if let Some(allow) = patch.allow_duplicates {
            self.allow_duplicates = allow;
        }
        if let Some(tags) = &patch.tags {
            self.tags = tags.trim().to_string();
        }
        if let Some(pinned) = patch.pinned {
            self.pinned = pinned;
        }
        if let Some(order) = patch.sort_order {
            self.sort_order = order;
        }
        self.slug = slugify(&self.name);
        self.updated_at = Utc::now();
    }
}

/// Input for folder creation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NewFolder {
    pub name: String,
    pub description: String,
    pub is_public: bool,
    pub allow_duplicates: bool,
    pub tags: String,
    pub pinned: bool,
    pub sort_order: i64,
}

impl NewFolder {
    pub fn named(name: &str) -> Self {
        Self { name: name.to_string(), ..Default::default() }
    }
}

/// Partial folder update. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FolderPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_public: Option<bool>,
    pub allow_duplicates: Option<bool>,
    pub tags: Option<String>,
    pub pinned: Option<bool>,
    pub sort_order: Option<i64>,
    pub regenerate_share_token: bool,
}

/// One article placed into one folder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FavoriteItem {
    pub id: Uuid,
    pub folder_id: Uuid,
    pub article_id: ArticleId,
    /// Cleared when the adding actor is removed
    pub added_by: Option<Uuid>,
    pub note: String,
    /// Bumped every time the note content changes
    pub note_version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FavoriteItem {
    pub fn new(folder_id: Uuid, article_id: ArticleId, added_by: Uuid, note: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            folder_id,
            article_id,
            added_by: Some(added_by),
            note: note.to_string(),
            note_version: 1,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Which folder an item write lands in.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemTarget {
    /// An existing folder; it must belong to the writing actor.
    Folder(Uuid),
    /// The owner's folder with this folder's name, inserted when missing.
    Named(FavoriteFolder),
}

/// How an existing `(folder, article)` entry is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddMode {
    /// Reject duplicates unless the folder allows them, then hand back the existing item.
    Strict,
    /// Return the existing item and revise its note when a new one is supplied.
    Upsert,
}

/// Result of placing an article into a folder.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemAdd {
    pub item: FavoriteItem,
    pub folder: FavoriteFolder,
    pub created: bool,
}

/// Quick-save input: pick a folder by id or by name (creating it if needed).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QuickSave {
    pub article_id: ArticleId,
    pub folder_id: Option<Uuid>,
    pub folder_name: Option<String>,
    pub folder_description: String,
    pub folder_is_public: bool,
    pub allow_duplicates: bool,
    pub note: Option<String>,
}

/// Item enriched with article data for listings and exports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemView {
    pub id: Uuid,
    pub article_id: ArticleId,
    pub title: String,
    pub url: String,
    pub note: String,
    pub note_version: i64,
    pub created_time: DateTime<Utc>,
}

/// An item in the cross-folder listing, tagged with the folder holding it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MyItemView {
    pub folder_id: Uuid,
    pub folder_name: String,
    #[serde(flatten)]
    pub item: ItemView,
}

/// One page of a user's favorites across all folders.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MyFavorites {
    pub default_folder_id: Uuid,
    pub folders: Vec<FavoriteFolder>,
    pub items: Vec<MyItemView>,
    pub page: i64,
    pub total: i64,
    pub has_next: bool,
}

/// Per-owner counters shown on the favorites dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderStats {
    pub folder_count: i64,
    pub item_count: i64,
    pub public_count: i64,
    pub pinned_count: i64,
}

/// Kind of interaction a notification reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Like,
    Favorite,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Like => "like",
            NotificationKind::Favorite => "favorite",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "like" => Some(NotificationKind::Like),
            "favorite" => Some(NotificationKind::Favorite),
            _ => None,
        }
    }
}

/// A persisted, poll-able record of an interaction for the content owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionNotification {
    pub id: Uuid,
    pub recipient_user_id: String,
    pub article_id: Option<ArticleId>,
    pub folder_id: Option<Uuid>,
    pub kind: NotificationKind,
    /// Snapshot of display data at creation time
    pub payload: serde_json::Value,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Like totals for one article, as grouped by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArticleLikes {
    pub article_id: ArticleId,
    pub total: i64,
}

/// One ranked row of the like leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub article_id: ArticleId,
    pub title: String,
    pub url: String,
    pub total_likes: i64,
    pub delta_7d: i64,
    pub delta_30d: i64,
}

/// Derives a URL slug: lowercase, alphanumerics kept, every other run of
/// characters collapsed into a single `-`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.chars() {
        if c.is_alphanumeric() || c == '_' {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug.chars().take(FOLDER_SLUG_MAX).collect()
}
