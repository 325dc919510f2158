//! # Request Identity
//!
//! Resolves "who is acting" for every interaction request.
//!
//! # Developer Note
//! A non-empty `X-User-Id` header (set by the upstream identity provider)
//! wins. Otherwise the anonymous session key comes from the `ri_session`
//! cookie or the `X-Anonymous-Key` header; when neither carries a usable key
//! a fresh one is minted and handed back as a cookie on the response.

use std::future::Future;
use std::pin::Pin;

use actix_web::cookie::{time, Cookie, SameSite};
use actix_web::dev::Payload;
use actix_web::http::header;
use actix_web::{web, FromRequest, HttpRequest, HttpResponseBuilder};
use ri_core::error::AppError;
use ri_core::models::{Actor, LikeContext};

use crate::error::{ApiError, ApiResult};
use crate::handlers::AppState;

pub const SESSION_COOKIE: &str = "ri_session";
pub const USER_HEADER: &str = "X-User-Id";
pub const ANONYMOUS_HEADER: &str = "X-Anonymous-Key";

/// Anonymous keys are 8 to 64 URL-safe characters.
fn is_usable_key(key: &str) -> bool {
    (8..=64).contains(&key.len()) && key.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

fn header_str<'a>(req: &'a HttpRequest, name: impl header::AsHeaderName) -> &'a str {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .unwrap_or_default()
}

pub struct RequestIdentity {
    pub actor: Actor,
    /// Anonymous key presented by the client, even when a user header won
    pub anonymous_key: Option<String>,
    /// Diagnostic request data for likes
    pub context: LikeContext,
    minted_key: Option<String>,
}

impl RequestIdentity {
    /// Sets the session cookie when this request minted a new key.
    pub fn attach_session(&self, builder: &mut HttpResponseBuilder) {
        if let Some(key) = &self.minted_key {
            builder.cookie(
                Cookie::build(SESSION_COOKIE, key.clone())
                    .path("/")
                    .http_only(true)
                    .same_site(SameSite::Lax)
                    .max_age(time::Duration::days(365))
                    .finish(),
            );
        }
    }

    pub fn user_id(&self) -> ApiResult<&str> {
        self.actor
            .user_id
            .as_deref()
            .ok_or_else(|| ApiError(AppError::Unauthorized("sign in required".into())))
    }
}

async fn resolve(req: HttpRequest) -> ApiResult<RequestIdentity> {
    let state = req
        .app_data::<web::Data<AppState>>()
        .cloned()
        .ok_or_else(|| ApiError(AppError::Internal("application state missing".into())))?;

    let ip = req.peer_addr().map(|a| a.ip().to_string());
    let user_agent = header_str(&req, header::USER_AGENT);
    let context = LikeContext { user_agent: user_agent.to_string(), ip_address: ip.clone() };

    let presented = req
        .cookie(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|k| is_usable_key(k))
        .or_else(|| {
            let key = header_str(&req, ANONYMOUS_HEADER);
            is_usable_key(key).then(|| key.to_string())
        });

    // 1. Signed-in user.
    let user_id = header_str(&req, USER_HEADER);
    if !user_id.is_empty() {
        let actor = state.services.actors.resolve_for_user(user_id).await?;
        return Ok(RequestIdentity { actor, anonymous_key: presented, context, minted_key: None });
    }

    // 2. Anonymous visitor, minting a session key on first contact.
    let (key, minted_key) = match presented {
        Some(key) => (key, None),
        None => {
            let key = state.identity.mint_anonymous_key()?;
            log::debug!("minted anonymous session key");
            (key.clone(), Some(key))
        }
    };
    let fingerprint = state.identity.fingerprint(
        user_agent,
        header_str(&req, header::ACCEPT),
        header_str(&req, header::ACCEPT_LANGUAGE),
        ip.as_deref().unwrap_or_default(),
    );
    let actor = state.services.actors.resolve_for_anonymous(&key, &fingerprint).await?;
    Ok(RequestIdentity { actor, anonymous_key: Some(key), context, minted_key })
}

impl FromRequest for RequestIdentity {
    type Error = ApiError;
    type Future = Pin<Box<dyn Future<Output = Result<Self, Self::Error>>>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        Box::pin(resolve(req.clone()))
    }
}
