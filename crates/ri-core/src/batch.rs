//! # Batch Actions
//!
//! Bulk favorite operations requested by dashboards in a single round trip.
//! Requests arrive with raw string ids; [`BatchRequest::into_action`] turns
//! them into a typed [`BatchAction`], dropping ids that do not parse.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, Result};

/// Wire form of a batch request, tagged by `action`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum BatchRequest {
    DeleteItems {
        #[serde(default)]
        item_ids: Vec<String>,
    },
    MoveItems {
        #[serde(default)]
        item_ids: Vec<String>,
        target_folder_id: Option<String>,
    },
    PinFolders {
        #[serde(default)]
        folder_ids: Vec<String>,
    },
    UnpinFolders {
        #[serde(default)]
        folder_ids: Vec<String>,
    },
    SortFolders {
        #[serde(default)]
        folder_ids: Vec<String>,
        #[serde(default)]
        sort_order: Vec<String>,
    },
}

/// A validated batch operation. Every variant is applied in one transaction
/// and only touches rows owned by the requesting actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchAction {
    DeleteItems(Vec<Uuid>),
    MoveItems { item_ids: Vec<Uuid>, target_folder: Uuid },
    SetPinned { folder_ids: Vec<Uuid>, pinned: bool },
    /// Parallel `(folder, sort_order)` pairs applied one by one
    SortFolders(Vec<(Uuid, i64)>),
}

/// Per-action result counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchOutcome {
    Deleted(u64),
    Moved(u64),
    Updated(u64),
}

impl BatchOutcome {
    pub fn count(&self) -> u64 {
        match self {
            BatchOutcome::Deleted(n) | BatchOutcome::Moved(n) | BatchOutcome::Updated(n) => *n,
        }
    }
}

fn parse_ids(raw: &[String]) -> Vec<Uuid> {
    raw.iter().filter_map(|id| Uuid::parse_str(id.trim()).ok()).collect()
}

impl BatchRequest {
    pub fn into_action(self) -> Result<BatchAction> {
        let action = match self {
            BatchRequest::DeleteItems { item_ids } => BatchAction::DeleteItems(parse_ids(&item_ids)),
            BatchRequest::MoveItems { item_ids, target_folder_id } => {
                let raw = target_folder_id
                    .filter(|t| !t.trim().is_empty())
                    .ok_or_else(|| AppError::ValidationError("target_folder_id required".into()))?;
                // An unparsable target can never be owned by the caller.
                let target_folder = Uuid::parse_str(raw.trim())
                    .map_err(|_| AppError::not_found("Folder", &raw))?;
                BatchAction::MoveItems { item_ids: parse_ids(&item_ids), target_folder }
            }
            BatchRequest::PinFolders { folder_ids } => {
                BatchAction::SetPinned { folder_ids: parse_ids(&folder_ids), pinned: true }
            }
            BatchRequest::UnpinFolders { folder_ids } => {
                BatchAction::SetPinned { folder_ids: parse_ids(&folder_ids), pinned: false }
            }
            BatchRequest::SortFolders { folder_ids, sort_order } => {
                if folder_ids.len() != sort_order.len() {
                    return Err(AppError::ValidationError(
                        "folder_ids and sort_order length mismatch".into(),
                    ));
                }
                let pairs = folder_ids
                    .iter()
                    .zip(sort_order.iter())
                    .filter_map(|(id, order)| {
                        let id = Uuid::parse_str(id.trim()).ok()?;
                        let order = order.trim().parse::<i64>().ok()?;
                        Some((id, order))
                    })
                    .collect();
                BatchAction::SortFolders(pairs)
            }
        };
        Ok(action)
    }
}
