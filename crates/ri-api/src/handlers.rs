//! # ri-api Handlers
//!
//! This module coordinates the flow between HTTP requests and the core
//! services. Handlers parse input, call one service, and shape JSON.

use std::sync::Arc;

use actix_web::http::{header, StatusCode};
use actix_web::{web, HttpResponse};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use ri_core::batch::BatchRequest;
use ri_core::error::AppError;
use ri_core::export::ExportFormat;
use ri_core::models::{ArticleId, FavoriteFolder, FolderPatch, NewFolder, QuickSave};
use ri_core::services::leaderboard::DEFAULT_LIMIT as LEADERBOARD_DEFAULT_LIMIT;
use ri_core::services::Services;
use ri_core::traits::IdentityProvider;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::identity::RequestIdentity;

/// State shared across all Actix-web workers.
pub struct AppState {
    pub services: Services,
    pub identity: Arc<dyn IdentityProvider>,
}

#[derive(Debug, Deserialize)]
pub struct LikeRequest {
    pub article_id: ArticleId,
}

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub folder_id: Uuid,
    pub article_id: ArticleId,
    pub note: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExportQuery {
    pub format: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LeaderboardQuery {
    pub since: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread: bool,
    pub limit: Option<i64>,
}

/// Path ids that do not parse can never name an owned resource.
fn parse_id(kind: &str, raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| ApiError(AppError::not_found(kind, raw)))
}

/// JSON response that also carries a freshly minted session cookie.
fn reply(identity: &RequestIdentity, status: StatusCode, body: impl Serialize) -> HttpResponse {
    let mut builder = HttpResponse::build(status);
    identity.attach_session(&mut builder);
    builder.json(body)
}

fn created_or_ok(created: bool) -> StatusCode {
    if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    }
}

fn owner_folder_json(state: &AppState, folder: &FavoriteFolder) -> Value {
    let mut value = json!(folder);
    value["tag_list"] = json!(folder.tag_list());
    value["share_url"] = json!(state.services.sharing.share_url(&folder.share_token));
    value
}

/// What anonymous readers of a public folder may see.
fn public_folder_json(state: &AppState, folder: &FavoriteFolder) -> Value {
    json!({
        "id": folder.id,
        "name": folder.name,
        "slug": folder.slug,
        "description": folder.description,
        "tags": folder.tag_list(),
        "share_hits": folder.share_hits,
        "share_url": state.services.sharing.share_url(&folder.share_token),
        "updated_at": folder.updated_at,
    })
}

/// ISO-8601 instant, date-time without offset (taken as UTC), or bare date.
fn parse_since(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    // Query strings turn an unescaped '+' offset into a space.
    let candidates = [raw.to_string(), raw.replace(' ', "+")];
    for candidate in &candidates {
        if let Ok(dt) = DateTime::parse_from_rfc3339(candidate) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

// ── Likes ───────────────────────────────────────────────────────────────────

pub async fn toggle_like(
    data: web::Data<AppState>,
    identity: RequestIdentity,
    body: web::Json<LikeRequest>,
) -> ApiResult<HttpResponse> {
    let outcome = data
        .services
        .likes
        .toggle(&identity.actor, body.article_id, &identity.context)
        .await?;
    Ok(reply(&identity, StatusCode::OK, outcome))
}

pub async fn like_history(
    data: web::Data<AppState>,
    identity: RequestIdentity,
    query: web::Query<LimitQuery>,
) -> ApiResult<HttpResponse> {
    identity.user_id()?;
    let likes = data.services.likes.history(&identity.actor, query.limit.unwrap_or(20)).await?;
    let likes: Vec<Value> = likes
        .iter()
        .map(|like| json!({ "article_id": like.article_id, "liked_at": like.created_at }))
        .collect();
    Ok(reply(&identity, StatusCode::OK, json!({ "likes": likes })))
}

// ── Folders ─────────────────────────────────────────────────────────────────

pub async fn list_folders(data: web::Data<AppState>, identity: RequestIdentity) -> ApiResult<HttpResponse> {
    let folders = data.services.favorites.list_folders(&identity.actor).await?;
    let folders: Vec<Value> = folders.iter().map(|f| owner_folder_json(&data, f)).collect();
    Ok(reply(&identity, StatusCode::OK, json!({ "folders": folders })))
}

pub async fn create_folder(
    data: web::Data<AppState>,
    identity: RequestIdentity,
    body: web::Json<NewFolder>,
) -> ApiResult<HttpResponse> {
    let folder = data.services.favorites.create_folder(&identity.actor, body.into_inner()).await?;
    Ok(reply(&identity, StatusCode::CREATED, owner_folder_json(&data, &folder)))
}

pub async fn get_folder(
    data: web::Data<AppState>,
    identity: RequestIdentity,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let folder_id = parse_id("Folder", &path)?;
    let folder = data.services.favorites.get_folder(&identity.actor, folder_id).await?;
    Ok(reply(&identity, StatusCode::OK, owner_folder_json(&data, &folder)))
}

pub async fn update_folder(
    data: web::Data<AppState>,
    identity: RequestIdentity,
    path: web::Path<String>,
    body: web::Json<FolderPatch>,
) -> ApiResult<HttpResponse> {
    let folder_id = parse_id("Folder", &path)?;
    let folder = data
        .services
        .favorites
        .update_folder(&identity.actor, folder_id, body.into_inner())
        .await?;
    Ok(reply(&identity, StatusCode::OK, owner_folder_json(&data, &folder)))
}

pub async fn delete_folder(
    data: web::Data<AppState>,
    identity: RequestIdentity,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let folder_id = parse_id("Folder", &path)?;
    data.services.favorites.delete_folder(&identity.actor, folder_id).await?;
    Ok(reply(&identity, StatusCode::OK, json!({ "deleted": true })))
}

// ── Items ───────────────────────────────────────────────────────────────────

pub async fn add_item(
    data: web::Data<AppState>,
    identity: RequestIdentity,
    body: web::Json<AddItemRequest>,
) -> ApiResult<HttpResponse> {
    let added = data
        .services
        .favorites
        .add_item(&identity.actor, body.folder_id, body.article_id, body.note.as_deref())
        .await?;
    Ok(reply(
        &identity,
        created_or_ok(added.created),
        json!({ "created": added.created, "item_id": added.item.id }),
    ))
}

pub async fn remove_item(
    data: web::Data<AppState>,
    identity: RequestIdentity,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    // Unknown ids simply delete nothing.
    let removed = match Uuid::parse_str(path.trim()) {
        Ok(item_id) => data.services.favorites.remove_item(&identity.actor, item_id).await?,
        Err(_) => 0,
    };
    Ok(reply(&identity, StatusCode::OK, json!({ "deleted": removed > 0 })))
}

pub async fn folder_items(
    data: web::Data<AppState>,
    identity: RequestIdentity,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let folder_id = parse_id("Folder", &path)?;
    let (folder, items) = data.services.favorites.list_items(&identity.actor, folder_id).await?;
    Ok(reply(&identity, StatusCode::OK, json!({ "folder": folder.name, "items": items })))
}

/// All of the user's favorites, newest first, with the folder list. The
/// default folder is created on the first visit.
pub async fn my_favorites(
    data: web::Data<AppState>,
    identity: RequestIdentity,
    query: web::Query<PageQuery>,
) -> ApiResult<HttpResponse> {
    let mine = data
        .services
        .favorites
        .my_favorites(&identity.actor, query.page.unwrap_or(1))
        .await?;
    let folders: Vec<Value> = mine.folders.iter().map(|f| owner_folder_json(&data, f)).collect();
    Ok(reply(
        &identity,
        StatusCode::OK,
        json!({
            "default_folder_id": mine.default_folder_id,
            "folders": folders,
            "items": mine.items,
            "page": mine.page,
            "total": mine.total,
            "has_next": mine.has_next,
        }),
    ))
}

pub async fn export_folder(
    data: web::Data<AppState>,
    identity: RequestIdentity,
    path: web::Path<String>,
    query: web::Query<ExportQuery>,
) -> ApiResult<HttpResponse> {
    let folder_id = parse_id("Folder", &path)?;
    let format = ExportFormat::parse(query.format.as_deref())?;
    let export = data.services.favorites.export_items(&identity.actor, folder_id, format).await?;

    let mut builder = HttpResponse::Ok();
    identity.attach_session(&mut builder);
    Ok(builder
        .content_type(export.content_type)
        .insert_header((
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", export.filename),
        ))
        .body(export.body))
}

pub async fn batch(
    data: web::Data<AppState>,
    identity: RequestIdentity,
    body: web::Json<BatchRequest>,
) -> ApiResult<HttpResponse> {
    let outcome = data.services.favorites.batch(&identity.actor, body.into_inner()).await?;
    Ok(reply(&identity, StatusCode::OK, outcome))
}

pub async fn quick_save(
    data: web::Data<AppState>,
    identity: RequestIdentity,
    body: web::Json<QuickSave>,
) -> ApiResult<HttpResponse> {
    let saved = data.services.favorites.quick_save(&identity.actor, body.into_inner()).await?;
    Ok(reply(
        &identity,
        created_or_ok(saved.created),
        json!({
            "created": saved.created,
            "item_id": saved.item.id,
            "folder_id": saved.folder.id,
            "note_version": saved.item.note_version,
            "share_url": data.services.sharing.share_url(&saved.folder.share_token),
        }),
    ))
}

// ── Sharing ─────────────────────────────────────────────────────────────────

pub async fn shared_folder(data: web::Data<AppState>, path: web::Path<String>) -> ApiResult<HttpResponse> {
    let shared = data.services.sharing.get_public_folder(&path).await?;
    Ok(HttpResponse::Ok().json(json!({
        "folder": public_folder_json(&data, &shared.folder),
        "items": shared.items,
    })))
}

pub async fn public_folders(data: web::Data<AppState>, query: web::Query<LimitQuery>) -> ApiResult<HttpResponse> {
    let folders = data.services.sharing.list_public_folders(query.limit.unwrap_or(20)).await?;
    let folders: Vec<Value> = folders.iter().map(|f| public_folder_json(&data, f)).collect();
    Ok(HttpResponse::Ok().json(json!({ "folders": folders })))
}

// ── Leaderboard ─────────────────────────────────────────────────────────────

pub async fn leaderboard(data: web::Data<AppState>, query: web::Query<LeaderboardQuery>) -> ApiResult<HttpResponse> {
    let since = match query.since.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(
            parse_since(raw).ok_or_else(|| ApiError(AppError::ValidationError("invalid since parameter".into())))?,
        ),
    };
    let limit = query.limit.unwrap_or(LEADERBOARD_DEFAULT_LIMIT);
    let entries = data.services.leaderboard.top_articles(limit, since).await?;
    Ok(HttpResponse::Ok().json(json!({ "articles": entries })))
}

// ── Dashboard & notifications ───────────────────────────────────────────────

pub async fn dashboard(data: web::Data<AppState>, identity: RequestIdentity) -> ApiResult<HttpResponse> {
    let stats = data.services.favorites.dashboard(&identity.actor).await?;
    let unread = data.services.notifications.unread_count(&identity.actor).await?;
    let mut body = json!(stats);
    body["unread_notifications"] = json!(unread);
    Ok(reply(&identity, StatusCode::OK, body))
}

pub async fn notifications(
    data: web::Data<AppState>,
    identity: RequestIdentity,
    query: web::Query<NotificationQuery>,
) -> ApiResult<HttpResponse> {
    let limit = query.limit.unwrap_or(50);
    let items = data.services.notifications.list(&identity.actor, query.unread, limit).await?;
    let unread = data.services.notifications.unread_count(&identity.actor).await?;
    Ok(reply(&identity, StatusCode::OK, json!({ "notifications": items, "unread_count": unread })))
}

pub async fn mark_notification_read(
    data: web::Data<AppState>,
    identity: RequestIdentity,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let id = parse_id("Notification", &path)?;
    data.services.notifications.mark_read(&identity.actor, id).await?;
    Ok(reply(&identity, StatusCode::OK, json!({ "read": true })))
}

// ── Identity ────────────────────────────────────────────────────────────────

/// Folds the request's anonymous session into the signed-in user.
pub async fn merge_identity(data: web::Data<AppState>, identity: RequestIdentity) -> ApiResult<HttpResponse> {
    let reassigned = match identity.anonymous_key.as_deref() {
        Some(key) => data.services.merge.merge_anonymous_into(key, &identity.actor).await?,
        None => {
            identity.user_id()?;
            0
        }
    };
    Ok(reply(&identity, StatusCode::OK, json!({ "reassigned": reassigned })))
}
