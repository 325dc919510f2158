//! # Services
//!
//! The interaction engines, each holding only the ports it needs.
//! [`Services::new`] wires them all from one storage plugin.

pub mod actors;
pub mod favorites;
pub mod leaderboard;
pub mod likes;
pub mod merge;
pub mod notify;
pub mod sharing;

use std::sync::Arc;
use std::time::Duration;

pub use actors::ActorRegistry;
pub use favorites::FavoriteEngine;
pub use leaderboard::LeaderboardService;
pub use likes::LikeEngine;
pub use merge::IdentityMerge;
pub use notify::NotificationService;
pub use sharing::{SharedFolder, SharingService};

use crate::traits::{ArticleDirectory, IdentityProvider, InteractionStore};

/// Runtime knobs for the services.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub public_base_url: String,
    pub leaderboard_ttl: Duration,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            public_base_url: "http://127.0.0.1:8080".to_string(),
            leaderboard_ttl: Duration::from_secs(300),
        }
    }
}

pub struct Services {
    pub actors: ActorRegistry,
    pub likes: LikeEngine,
    pub favorites: FavoriteEngine,
    pub sharing: SharingService,
    pub notifications: NotificationService,
    pub leaderboard: LeaderboardService,
    pub merge: IdentityMerge,
}

impl Services {
    pub fn new<S>(
        store: Arc<S>,
        articles: Arc<dyn ArticleDirectory>,
        identity: Arc<dyn IdentityProvider>,
        settings: &ServiceSettings,
    ) -> Self
    where
        S: InteractionStore + 'static,
    {
        Self {
            actors: ActorRegistry::new(store.clone()),
            likes: LikeEngine::new(store.clone(), articles.clone()),
            favorites: FavoriteEngine::new(store.clone(), articles.clone(), identity),
            sharing: SharingService::new(store.clone(), store.clone(), articles.clone(), &settings.public_base_url),
            notifications: NotificationService::new(store.clone()),
            leaderboard: LeaderboardService::new(store.clone(), articles, settings.leaderboard_ttl),
            merge: IdentityMerge::new(store.clone(), store),
        }
    }
}
