//! # AppError
//!
//! Centralized error handling for the Rusty-Interact ecosystem.
//! Ownership failures are reported as `NotFound` so callers cannot learn about
//! resources that belong to another actor.

use thiserror::Error;
use uuid::Uuid;

/// The primary error type for all ri-core operations.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found, or not owned by the caller (e.g., Folder, Item, Article)
    #[error("{0} not found with ID {1}")]
    NotFound(String, String),

    /// Validation failure (e.g., empty folder name, mismatched batch lists)
    #[error("validation error: {0}")]
    ValidationError(String),

    /// The action needs an authenticated (user-bound) actor
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Infrastructure failure (e.g., DB down, pool exhausted)
    #[error("internal service error: {0}")]
    Internal(String),

    /// Resource already exists (e.g., duplicate folder name, unique-constraint race)
    #[error("conflict: {0}")]
    Conflict(String),

    /// The article is already in a folder that does not allow duplicates.
    #[error("conflict: article already saved in this folder as item {item_id}")]
    DuplicateFavorite { item_id: Uuid },
}

impl AppError {
    pub fn not_found(kind: &str, id: impl ToString) -> Self {
        AppError::NotFound(kind.to_string(), id.to_string())
    }

    /// Machine-readable category used in API error payloads.
    pub fn category(&self) -> &'static str {
        match self {
            AppError::NotFound(..) => "not_found",
            AppError::ValidationError(_) => "validation_error",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Internal(_) => "internal",
            AppError::Conflict(_) | AppError::DuplicateFavorite { .. } => "conflict",
        }
    }

    pub fn is_conflict(&self) -> bool {
        self.category() == "conflict"
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(format!("payload encoding: {err}"))
    }
}

/// A specialized Result type for Rusty-Interact logic.
pub type Result<T> = std::result::Result<T, AppError>;
