//! # ri-api
//!
//! The web routing and orchestration layer for Rusty-Interact.

pub mod error;
pub mod handlers;
pub mod identity;
pub mod middleware;

use actix_web::{web, HttpRequest};
use ri_core::error::AppError;

use crate::error::ApiError;

fn bad_input(message: String, _req: &HttpRequest) -> actix_web::Error {
    ApiError(AppError::ValidationError(message)).into()
}

/// Configures the interaction routes.
///
/// # Developer Note
/// We use a scoped configuration to allow the main binary to mount
/// the API under different paths if needed (e.g., /api/v1/).
/// Malformed JSON bodies and query strings answer with the same error
/// payload as every other failure.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, req| bad_input(err.to_string(), req)))
        .app_data(web::QueryConfig::default().error_handler(|err, req| bad_input(err.to_string(), req)))
        .service(
            web::scope("")
                .route("/like", web::post().to(handlers::toggle_like))
                .route("/likes/history", web::get().to(handlers::like_history))
                .route("/folders", web::get().to(handlers::list_folders))
                .route("/folders", web::post().to(handlers::create_folder))
                .route("/folders/{id}", web::get().to(handlers::get_folder))
                .route("/folders/{id}", web::post().to(handlers::update_folder))
                .route("/folders/{id}", web::delete().to(handlers::delete_folder))
                .route("/folders/{id}/items", web::get().to(handlers::folder_items))
                .route("/folders/{id}/export", web::get().to(handlers::export_folder))
                .route("/favorites", web::get().to(handlers::my_favorites))
                .route("/items", web::post().to(handlers::add_item))
                .route("/items/{id}", web::delete().to(handlers::remove_item))
                .route("/batch", web::post().to(handlers::batch))
                .route("/quick-save", web::post().to(handlers::quick_save))
                .route("/share/{token}", web::get().to(handlers::shared_folder))
                .route("/public", web::get().to(handlers::public_folders))
                .route("/leaderboard", web::get().to(handlers::leaderboard))
                .route("/dashboard", web::get().to(handlers::dashboard))
                .route("/notifications", web::get().to(handlers::notifications))
                .route("/notifications/{id}/read", web::post().to(handlers::mark_notification_read))
                .route("/identity/merge", web::post().to(handlers::merge_identity)),
        );
}
