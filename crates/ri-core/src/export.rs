//! # Folder Export
//!
//! Renders a folder's items for personal download as JSON or CSV.

use serde::Serialize;
use serde_json::json;

use crate::error::{AppError, Result};
use crate::models::{FavoriteFolder, ItemView};

const CSV_HEADER: [&str; 7] = ["id", "article_id", "title", "url", "note", "note_version", "created_time"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
}

impl ExportFormat {
    /// Case-insensitive; an absent or empty format means JSON.
    pub fn parse(raw: Option<&str>) -> Result<Self> {
        match raw.map(|f| f.trim().to_ascii_lowercase()).as_deref() {
            None | Some("") | Some("json") => Ok(ExportFormat::Json),
            Some("csv") => Ok(ExportFormat::Csv),
            Some(other) => Err(AppError::ValidationError(format!("unsupported export format: {other}"))),
        }
    }
}

/// A rendered export ready to be sent as a download.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Export {
    pub content_type: &'static str,
    pub filename: String,
    pub body: String,
}

pub fn render(folder: &FavoriteFolder, items: &[ItemView], format: ExportFormat) -> Result<Export> {
    match format {
        ExportFormat::Json => Ok(Export {
            content_type: "application/json",
            filename: format!("folder_{}.json", folder.id),
            body: serde_json::to_string(&json!({ "folder": folder.name, "items": items }))?,
        }),
        ExportFormat::Csv => {
            let mut body = String::new();
            push_row(&mut body, CSV_HEADER.iter().map(|h| h.to_string()));
            for item in items {
                push_row(
                    &mut body,
                    [
                        item.id.to_string(),
                        item.article_id.to_string(),
                        item.title.clone(),
                        item.url.clone(),
                        item.note.clone(),
                        item.note_version.to_string(),
                        item.created_time.to_rfc3339(),
                    ],
                );
            }
            Ok(Export {
                content_type: "text/csv; charset=utf-8",
                filename: format!("folder_{}.csv", folder.id),
                body,
            })
        }
    }
}

fn push_row(out: &mut String, fields: impl IntoIterator<Item = String>) {
    let row: Vec<String> = fields.into_iter().map(|f| escape_field(&f)).collect();
    out.push_str(&row.join(","));
    out.push_str("\r\n");
}

/// Quotes fields containing separators, quotes or line breaks (RFC 4180).
fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
