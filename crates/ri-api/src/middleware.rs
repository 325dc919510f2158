//! rusty-interact/crates/ri-api/src/middleware.rs Middleware
//!
//! Request logging, CORS and security headers for the interaction API.

use actix_cors::Cors;
use actix_web::http::header;
use actix_web::middleware::{DefaultHeaders, Logger};

/// Access log in the default format:
/// remote-ip "request-line" status-code response-size "referrer" "user-agent"
pub fn standard_middleware() -> Logger {
    Logger::default()
}

/// Interaction endpoints are called from article pages, which may live on a
/// different origin than the API. Only the listed origins get cross-origin
/// access; with none listed the browser's same-origin policy applies.
pub fn cors_policy(allowed_origins: &[String]) -> Cors {
    let cors = allowed_origins
        .iter()
        .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin));
    let cors = if allowed_origins.is_empty() { cors } else { cors.supports_credentials() };
    cors.allowed_methods(vec!["GET", "POST", "DELETE"])
        .allowed_headers(vec![header::CONTENT_TYPE, header::ACCEPT])
        .allowed_header("X-User-Id")
        .allowed_header("X-Anonymous-Key")
        .max_age(3600)
}

pub fn security_headers() -> DefaultHeaders {
    DefaultHeaders::new()
        .add((header::X_CONTENT_TYPE_OPTIONS, "nosniff"))
        .add((header::REFERRER_POLICY, "strict-origin-when-cross-origin"))
        .add((header::X_FRAME_OPTIONS, "DENY"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::header::{ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_ORIGIN, ORIGIN};
    use actix_web::{test, web, App, HttpResponse};

    async fn allow_origin_for(allowed: &[String], origin: &str) -> (Option<String>, Option<String>) {
        let app = test::init_service(
            App::new()
                .wrap(cors_policy(allowed))
                .route("/ping", web::get().to(|| async { HttpResponse::Ok().finish() })),
        )
        .await;
        let req = test::TestRequest::get().uri("/ping").insert_header((ORIGIN, origin)).to_request();
        let resp = test::call_service(&app, req).await;
        let read = |name| {
            resp.headers()
                .get(name)
                .and_then(|v: &header::HeaderValue| v.to_str().ok())
                .map(str::to_string)
        };
        (read(ACCESS_CONTROL_ALLOW_ORIGIN), read(ACCESS_CONTROL_ALLOW_CREDENTIALS))
    }

    #[actix_web::test]
    async fn foreign_sites_get_no_cors_grant_by_default() {
        let (origin, credentials) = allow_origin_for(&[], "https://evil.example").await;
        assert_eq!(origin, None);
        assert_eq!(credentials, None);
    }

    #[actix_web::test]
    async fn listed_origins_are_granted_with_credentials() {
        let allowed = vec!["https://blog.example".to_string()];
        let (origin, credentials) = allow_origin_for(&allowed, "https://blog.example").await;
        assert_eq!(origin.as_deref(), Some("https://blog.example"));
        assert_eq!(credentials.as_deref(), Some("true"));

        let (origin, _) = allow_origin_for(&allowed, "https://evil.example").await;
        assert_eq!(origin, None);
    }
}
