//! # Actor Registry
//!
//! Resolves "who is acting" into a stable [`Actor`], creating one on first
//! touch. Creation relies on the store's unique keys: concurrent first
//! requests for the same user converge on the same row.

use std::sync::Arc;

use log::{debug, warn};

use crate::error::{AppError, Result};
use crate::models::Actor;
use crate::traits::ActorRepo;

/// Upsert attempts before a conflict is surfaced.
const RESOLVE_ATTEMPTS: usize = 3;

pub struct ActorRegistry {
    repo: Arc<dyn ActorRepo>,
}

impl ActorRegistry {
    pub fn new(repo: Arc<dyn ActorRepo>) -> Self {
        Self { repo }
    }

    /// Returns the actor bound to `user_id`, creating it when absent.
    pub async fn resolve_for_user(&self, user_id: &str) -> Result<Actor> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(AppError::ValidationError("user id must not be empty".into()));
        }
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.repo.upsert_user_actor(Actor::for_user(user_id)).await {
                Ok(actor) => return Ok(actor),
                Err(err) if err.is_conflict() && attempt < RESOLVE_ATTEMPTS => {
                    warn!("actor upsert for user {} raced (attempt {}), retrying", user_id, attempt);
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Returns the actor bound to an anonymous session key, refreshing its
    /// fingerprint when the client presents a different one.
    pub async fn resolve_for_anonymous(&self, anonymous_key: &str, fingerprint: &str) -> Result<Actor> {
        if anonymous_key.trim().is_empty() {
            return Err(AppError::ValidationError("anonymous key must not be empty".into()));
        }
        let mut attempt = 0;
        loop {
            attempt += 1;
            let candidate = Actor::for_anonymous(anonymous_key, fingerprint);
            match self.repo.upsert_anonymous_actor(candidate).await {
                Ok(actor) => {
                    debug!("resolved anonymous actor {}", actor.id);
                    return Ok(actor);
                }
                Err(err) if err.is_conflict() && attempt < RESOLVE_ATTEMPTS => {
                    warn!("anonymous actor upsert raced (attempt {}), retrying", attempt);
                }
                Err(err) => return Err(err),
            }
        }
    }
}
