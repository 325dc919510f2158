//! # Favorite Engine
//!
//! Folders (named, owned collections) and the items placed in them.
//!
//! Every operation is scoped by the acting owner: a folder or item that
//! belongs to somebody else behaves exactly like one that does not exist.
//! Two entry points write items with different duplicate policies:
//! [`FavoriteEngine::add_item`] is strict, [`FavoriteEngine::quick_save`]
//! behaves like an upsert and revises the note of an existing entry.

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, info, warn};
use uuid::Uuid;

use crate::batch::{BatchAction, BatchOutcome, BatchRequest};
use crate::error::{AppError, Result};
use crate::export::{self, Export, ExportFormat};
use crate::models::{
    Actor, AddMode, ArticleId, ArticleRef, FavoriteFolder, FavoriteItem, FolderPatch, FolderStats,
    ItemAdd, ItemTarget, ItemView, MyFavorites, MyItemView, NewFolder, QuickSave, DEFAULT_FOLDER_NAME,
    FOLDER_NAME_MAX, FOLDER_TAGS_MAX, ITEM_NOTE_MAX, MY_FAVORITES_PAGE_SIZE,
};
use crate::services::notify;
use crate::traits::{ArticleDirectory, FavoriteRepo, IdentityProvider};

/// Attempts at finding an unused share token.
const SHARE_TOKEN_ATTEMPTS: usize = 5;

pub struct FavoriteEngine {
    repo: Arc<dyn FavoriteRepo>,
    articles: Arc<dyn ArticleDirectory>,
    identity: Arc<dyn IdentityProvider>,
}

fn validate_name(name: &str) -> Result<()> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::ValidationError("folder name must not be empty".into()));
    }
    if name.chars().count() > FOLDER_NAME_MAX {
        return Err(AppError::ValidationError(format!(
            "folder name must be at most {FOLDER_NAME_MAX} characters"
        )));
    }
    Ok(())
}

fn validate_tags(tags: &str) -> Result<()> {
    if tags.chars().count() > FOLDER_TAGS_MAX {
        return Err(AppError::ValidationError(format!("tags must be at most {FOLDER_TAGS_MAX} characters")));
    }
    Ok(())
}

fn validate_note(note: &str) -> Result<()> {
    if note.chars().count() > ITEM_NOTE_MAX {
        return Err(AppError::ValidationError(format!("note must be at most {ITEM_NOTE_MAX} characters")));
    }
    Ok(())
}

fn require_user(actor: &Actor, what: &str) -> Result<()> {
    if actor.is_authenticated() {
        Ok(())
    } else {
        Err(AppError::Unauthorized(format!("{what} requires a signed-in user")))
    }
}

/// Joins items with article titles and urls. Articles that disappeared from
/// the publishing system render with empty fields.
pub(crate) async fn enrich_items(
    articles: &dyn ArticleDirectory,
    items: Vec<FavoriteItem>,
) -> Result<Vec<ItemView>> {
    let mut seen: HashMap<ArticleId, Option<ArticleRef>> = HashMap::new();
    let mut views = Vec::with_capacity(items.len());
    for item in items {
        if !seen.contains_key(&item.article_id) {
            let article = articles.get_article(item.article_id).await?;
            seen.insert(item.article_id, article);
        }
        let (title, url) = match seen.get(&item.article_id).and_then(Option::as_ref) {
            Some(article) => (article.title.clone(), article.url.clone()),
            None => (String::new(), String::new()),
        };
        views.push(ItemView {
            id: item.id,
            article_id: item.article_id,
            title,
            url,
            note: item.note,
            note_version: item.note_version,
            created_time: item.created_at,
        });
    }
    Ok(views)
}

impl FavoriteEngine {
    pub fn new(
        repo: Arc<dyn FavoriteRepo>,
        articles: Arc<dyn ArticleDirectory>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self { repo, articles, identity }
    }

    async fn owned_folder(&self, owner: &Actor, folder_id: Uuid) -> Result<FavoriteFolder> {
        self.repo
            .get_folder(owner.id, folder_id)
            .await?
            .ok_or_else(|| AppError::not_found("Folder", folder_id))
    }

    async fn article(&self, article_id: ArticleId) -> Result<ArticleRef> {
        self.articles
            .get_article(article_id)
            .await?
            .ok_or_else(|| AppError::not_found("Article", article_id))
    }

    async fn ensure_name_free(&self, owner: &Actor, name: &str, except: Option<Uuid>) -> Result<()> {
        match self.repo.find_folder_by_name(owner.id, name.trim()).await? {
            Some(existing) if Some(existing.id) != except => {
                Err(AppError::Conflict(format!("a folder named '{}' already exists", existing.name)))
            }
            _ => Ok(()),
        }
    }

    // ── Folders ─────────────────────────────────────────────────────────────

    pub async fn create_folder(&self, owner: &Actor, input: NewFolder) -> Result<FavoriteFolder> {
        validate_name(&input.name)?;
        validate_tags(&input.tags)?;
        self.ensure_name_free(owner, &input.name, None).await?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            let folder = FavoriteFolder::new(owner.id, input.clone(), self.identity.mint_share_token()?);
            match self.repo.insert_folder(folder).await {
                Ok(folder) => {
                    info!("actor {} created folder {} ({})", owner.id, folder.id, folder.name);
                    return Ok(folder);
                }
                Err(err) if err.is_conflict() => {
                    // Either a concurrent create took the name or the token collided.
                    self.ensure_name_free(owner, &input.name, None).await?;
                    if attempt >= SHARE_TOKEN_ATTEMPTS {
                        return Err(err);
                    }
                    warn!("share token collision while creating folder, retrying");
                }
                Err(err) => return Err(err),
            }
        }
    }

    pub async fn get_folder(&self, owner: &Actor, folder_id: Uuid) -> Result<FavoriteFolder> {
        self.owned_folder(owner, folder_id).await
    }

    pub async fn list_folders(&self, owner: &Actor) -> Result<Vec<FavoriteFolder>> {
        self.repo.list_folders(owner.id).await
    }

    /// Applies the patch in one write. A requested share token is minted up
    /// front and stored together with the other changes.
    pub async fn update_folder(&self, owner: &Actor, folder_id: Uuid, patch: FolderPatch) -> Result<FavoriteFolder> {
        let mut folder = self.owned_folder(owner, folder_id).await?;
        if let Some(name) = &patch.name {
            validate_name(name)?;
            self.ensure_name_free(owner, name, Some(folder.id)).await?;
        }
        if let Some(tags) = &patch.tags {
            validate_tags(tags)?;
        }
        folder.apply(&patch);

        let mut attempt = 0;
        loop {
            attempt += 1;
            if patch.regenerate_share_token {
                folder.share_token = self.identity.mint_share_token()?;
            }
            match self.repo.save_folder(folder.clone()).await {
                Ok(true) => {
                    debug!("actor {} updated folder {}", owner.id, folder_id);
                    return Ok(folder);
                }
                Ok(false) => return Err(AppError::not_found("Folder", folder_id)),
                Err(err) if err.is_conflict() && patch.regenerate_share_token => {
                    // A rename race surfaces here as well; only token collisions are retried.
                    self.ensure_name_free(owner, &folder.name, Some(folder.id)).await?;
                    if attempt >= SHARE_TOKEN_ATTEMPTS {
                        return Err(err);
                    }
                    warn!("share token collision on folder {} (attempt {})", folder_id, attempt);
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Deletes the folder together with all of its items.
    pub async fn delete_folder(&self, owner: &Actor, folder_id: Uuid) -> Result<()> {
        if self.repo.delete_folder(owner.id, folder_id).await? {
            info!("actor {} deleted folder {}", owner.id, folder_id);
            Ok(())
        } else {
            Err(AppError::not_found("Folder", folder_id))
        }
    }

    /// The owner's default folder, created on first use.
    pub async fn default_folder(&self, owner: &Actor) -> Result<FavoriteFolder> {
        if let Some(folder) = self.repo.find_folder_by_name(owner.id, DEFAULT_FOLDER_NAME).await? {
            return Ok(folder);
        }
        let input = NewFolder {
            name: DEFAULT_FOLDER_NAME.to_string(),
            description: DEFAULT_FOLDER_NAME.to_string(),
            ..Default::default()
        };
        match self.create_folder(owner, input).await {
            Ok(folder) => Ok(folder),
            // Lost the race against a concurrent first visit.
            Err(err) if err.is_conflict() => self
                .repo
                .find_folder_by_name(owner.id, DEFAULT_FOLDER_NAME)
                .await?
                .ok_or(err),
            Err(err) => Err(err),
        }
    }

    /// Replaces the share token; the previous one stops resolving immediately.
    pub async fn regenerate_share_token(&self, owner: &Actor, folder_id: Uuid) -> Result<String> {
        for attempt in 1..=SHARE_TOKEN_ATTEMPTS {
            let token = self.identity.mint_share_token()?;
            match self.repo.set_share_token(owner.id, folder_id, &token).await {
                Ok(true) => return Ok(token),
                Ok(false) => return Err(AppError::not_found("Folder", folder_id)),
                Err(err) if err.is_conflict() => {
                    warn!("share token collision on folder {} (attempt {})", folder_id, attempt);
                }
                Err(err) => return Err(err),
            }
        }
        Err(AppError::Conflict("could not allocate a unique share token".into()))
    }

    // ── Items ───────────────────────────────────────────────────────────────

    /// Strict add: a duplicate in a folder that disallows duplicates fails with
    /// [`AppError::DuplicateFavorite`]; otherwise the existing item is returned
    /// with `created = false`.
    pub async fn add_item(
        &self,
        actor: &Actor,
        folder_id: Uuid,
        article_id: ArticleId,
        note: Option<&str>,
    ) -> Result<ItemAdd> {
        let note = note.unwrap_or_default().trim();
        validate_note(note)?;
        let folder = self.owned_folder(actor, folder_id).await?;
        let article = self.article(article_id).await?;

        let item = FavoriteItem::new(folder.id, article.id, actor.id, note);
        let notification = notify::favorite_notification(&folder, actor, &article, actor);
        let added = self
            .repo
            .add_item(actor.id, ItemTarget::Folder(folder.id), item, AddMode::Strict, notification)
            .await?;
        if added.created {
            debug!("actor {} saved article {} into folder {}", actor.id, article.id, folder.id);
        }
        Ok(added)
    }

    /// Saves an article into a chosen folder, or into a folder picked by name
    /// (created on the fly). Re-saving revises the note.
    pub async fn quick_save(&self, actor: &Actor, input: QuickSave) -> Result<ItemAdd> {
        let note = input.note.as_deref().map(str::trim).unwrap_or_default().to_string();
        validate_note(&note)?;
        let article = self.article(input.article_id).await?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            let folder = match (input.folder_id, input.folder_name.as_deref().map(str::trim)) {
                (Some(id), _) => self.owned_folder(actor, id).await?,
                (None, Some(name)) if !name.is_empty() => {
                    validate_name(name)?;
                    FavoriteFolder::new(
                        actor.id,
                        NewFolder {
                            name: name.to_string(),
                            description: input.folder_description.clone(),
                            is_public: input.folder_is_public,
                            allow_duplicates: input.allow_duplicates,
                            ..Default::default()
                        },
                        self.identity.mint_share_token()?,
                    )
                }
                _ => {
                    return Err(AppError::ValidationError("please choose or create a folder".into()));
                }
            };
            let target = if input.folder_id.is_some() {
                ItemTarget::Folder(folder.id)
            } else {
                ItemTarget::Named(folder.clone())
            };
            let item = FavoriteItem::new(folder.id, article.id, actor.id, &note);
            let notification = notify::favorite_notification(&folder, actor, &article, actor);
            match self.repo.add_item(actor.id, target, item, AddMode::Upsert, notification).await {
                Ok(added) => return Ok(added),
                Err(err) if err.is_conflict() && attempt < SHARE_TOKEN_ATTEMPTS => {
                    warn!("quick save into '{}' raced (attempt {}), retrying", folder.name, attempt);
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Removes an item from one of the actor's folders. Items elsewhere are
    /// reported as zero removed rows, not as an error.
    pub async fn remove_item(&self, actor: &Actor, item_id: Uuid) -> Result<u64> {
        self.repo.remove_item(actor.id, item_id).await
    }

    pub async fn list_items(&self, actor: &Actor, folder_id: Uuid) -> Result<(FavoriteFolder, Vec<ItemView>)> {
        let folder = self.owned_folder(actor, folder_id).await?;
        let items = self.repo.list_items(folder.id).await?;
        let views = enrich_items(self.articles.as_ref(), items).await?;
        Ok((folder, views))
    }

    /// Everything the user saved across all folders, newest first, one page of
    /// [`MY_FAVORITES_PAGE_SIZE`] at a time. Pages start at 1; pages past the
    /// end are empty.
    pub async fn my_favorites(&self, owner: &Actor, page: i64) -> Result<MyFavorites> {
        require_user(owner, "the favorites overview")?;
        let default_folder = self.default_folder(owner).await?;
        let folders = self.repo.list_folders(owner.id).await?;

        let page = page.max(1);
        let total = self.repo.count_owner_items(owner.id).await?;
        let offset = (page - 1).saturating_mul(MY_FAVORITES_PAGE_SIZE);
        let items = self.repo.list_owner_items(owner.id, MY_FAVORITES_PAGE_SIZE, offset).await?;

        let names: HashMap<Uuid, &str> = folders.iter().map(|f| (f.id, f.name.as_str())).collect();
        let folder_ids: Vec<Uuid> = items.iter().map(|item| item.folder_id).collect();
        let views = enrich_items(self.articles.as_ref(), items).await?;
        let items = folder_ids
            .into_iter()
            .zip(views)
            .map(|(folder_id, item)| MyItemView {
                folder_id,
                folder_name: names.get(&folder_id).map(|n| n.to_string()).unwrap_or_default(),
                item,
            })
            .collect();

        Ok(MyFavorites {
            default_folder_id: default_folder.id,
            folders,
            items,
            page,
            total,
            has_next: page.saturating_mul(MY_FAVORITES_PAGE_SIZE) < total,
        })
    }

    pub async fn export_items(&self, actor: &Actor, folder_id: Uuid, format: ExportFormat) -> Result<Export> {
        require_user(actor, "export")?;
        let (folder, views) = self.list_items(actor, folder_id).await?;
        export::render(&folder, &views, format)
    }

    pub async fn batch(&self, actor: &Actor, request: BatchRequest) -> Result<BatchOutcome> {
        require_user(actor, "batch actions")?;
        let action = request.into_action()?;
        if let BatchAction::MoveItems { target_folder, .. } = &action {
            self.owned_folder(actor, *target_folder).await?;
        }
        let outcome = self.repo.apply_batch(actor.id, action).await?;
        info!("actor {} batch {:?}", actor.id, outcome);
        Ok(outcome)
    }

    pub async fn dashboard(&self, actor: &Actor) -> Result<FolderStats> {
        require_user(actor, "the favorites dashboard")?;
        self.repo.folder_stats(actor.id).await
    }
}
