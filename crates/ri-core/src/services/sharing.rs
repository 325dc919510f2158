//! # Sharing & Visibility
//!
//! Share tokens are opaque public identifiers, but a token alone never opens a
//! folder: the folder must also be flagged public. Private folders resolve as
//! `NotFound`, exactly like unknown tokens.

use std::sync::Arc;

use serde::Serialize;

use crate::error::{AppError, Result};
use crate::models::{FavoriteFolder, ItemView};
use crate::services::favorites::enrich_items;
use crate::traits::{ArticleDirectory, FavoriteRepo, ShareRepo};

/// Upper bound for the public folder listing.
pub const PUBLIC_LIST_MAX: i64 = 50;

/// A public folder as shown to anonymous readers of a share link.
#[derive(Debug, Clone, Serialize)]
pub struct SharedFolder {
    pub folder: FavoriteFolder,
    pub items: Vec<ItemView>,
}

/// Share tokens are 16 to 32 ASCII alphanumerics.
pub fn is_valid_share_token(token: &str) -> bool {
    (16..=32).contains(&token.len()) && token.bytes().all(|b| b.is_ascii_alphanumeric())
}

pub struct SharingService {
    shares: Arc<dyn ShareRepo>,
    favorites: Arc<dyn FavoriteRepo>,
    articles: Arc<dyn ArticleDirectory>,
    public_base_url: String,
}

impl SharingService {
    pub fn new(
        shares: Arc<dyn ShareRepo>,
        favorites: Arc<dyn FavoriteRepo>,
        articles: Arc<dyn ArticleDirectory>,
        public_base_url: &str,
    ) -> Self {
        Self {
            shares,
            favorites,
            articles,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Resolves a share token and counts the visit.
    pub async fn get_public_folder(&self, token: &str) -> Result<SharedFolder> {
        if !is_valid_share_token(token) {
            return Err(AppError::not_found("Shared folder", token));
        }
        let folder = self
            .shares
            .open_shared_folder(token)
            .await?
            .ok_or_else(|| AppError::not_found("Shared folder", token))?;
        let items = self.favorites.list_items(folder.id).await?;
        let items = enrich_items(self.articles.as_ref(), items).await?;
        Ok(SharedFolder { folder, items })
    }

    pub async fn list_public_folders(&self, limit: i64) -> Result<Vec<FavoriteFolder>> {
        self.shares.list_public_folders(limit.clamp(1, PUBLIC_LIST_MAX)).await
    }

    pub fn share_url(&self, token: &str) -> String {
        format!("{}/share/{}", self.public_base_url, token)
    }
}
