//! # Identity Merge
//!
//! After an anonymous visitor signs in, their likes, folders and item
//! authorship move to the user's actor and the anonymous actor is retired.

use std::sync::Arc;

use log::info;

use crate::error::{AppError, Result};
use crate::models::Actor;
use crate::traits::{ActorRepo, MergeRepo};

pub struct IdentityMerge {
    actors: Arc<dyn ActorRepo>,
    merge: Arc<dyn MergeRepo>,
}

impl IdentityMerge {
    pub fn new(actors: Arc<dyn ActorRepo>, merge: Arc<dyn MergeRepo>) -> Self {
        Self { actors, merge }
    }

    /// Returns the number of reassigned rows; 0 when the key is unknown or
    /// already belongs to a user.
    pub async fn merge_anonymous_into(&self, anonymous_key: &str, target: &Actor) -> Result<u64> {
        if !target.is_authenticated() {
            return Err(AppError::Unauthorized("merge target must be a signed-in user".into()));
        }
        let Some(anonymous) = self.actors.find_anonymous_actor(anonymous_key).await? else {
            return Ok(0);
        };
        if anonymous.id == target.id {
            return Ok(0);
        }
        let moved = self.merge.merge_actor(anonymous.id, target.id).await?;
        info!("merged anonymous actor {} into {} ({} rows)", anonymous.id, target.id, moved);
        Ok(moved)
    }
}
