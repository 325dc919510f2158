//! rusty-interact/crates/ri-core/src/lib.rs
//!
//! The central domain logic and interface definitions for Rusty-Interact:
//! actor resolution, likes, favorites, sharing, notifications, leaderboards
//! and identity merging over an externally owned article model.

pub mod batch;
pub mod error;
pub mod export;
pub mod models;
pub mod services;
pub mod traits;

// Re-exporting for easier access in other crates
pub use batch::*;
pub use error::*;
pub use models::*;
pub use traits::*;
