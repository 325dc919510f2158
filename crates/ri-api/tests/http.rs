//! End-to-end checks of the HTTP surface over an in-memory store.

use std::sync::Arc;

use actix_web::cookie::Cookie;
use actix_web::dev::ServiceResponse;
use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use ri_api::configure_routes;
use ri_api::handlers::AppState;
use ri_api::identity::{SESSION_COOKIE, USER_HEADER};
use ri_core::models::{ArticleRef, ArticleStatus};
use ri_core::services::{ServiceSettings, Services};
use ri_core::traits::IdentityProvider;
use ri_db_sqlite::SqliteStore;
use ri_identity_simple::SimpleIdentityProvider;
use serde_json::{json, Value};

async fn state() -> web::Data<AppState> {
    let store = Arc::new(SqliteStore::new("sqlite::memory:").await.unwrap());
    for (id, author) in [(1, Some("alice")), (2, Some("alice")), (3, None)] {
        store
            .upsert_article(&ArticleRef {
                id,
                title: format!("Article {id}"),
                author_user_id: author.map(str::to_string),
                url: format!("/article/{id}.html"),
                status: ArticleStatus::Published,
            })
            .await
            .unwrap();
    }
    let identity: Arc<dyn IdentityProvider> = Arc::new(SimpleIdentityProvider::new("test-salt"));
    let services = Services::new(store.clone(), store, identity.clone(), &ServiceSettings::default());
    web::Data::new(AppState { services, identity })
}

macro_rules! app {
    ($data:expr) => {
        test::init_service(App::new().app_data($data).configure(configure_routes)).await
    };
}

fn session_cookie(resp: &ServiceResponse) -> Option<Cookie<'static>> {
    resp.response()
        .cookies()
        .find(|c| c.name() == SESSION_COOKIE)
        .map(|c| c.into_owned())
}

#[actix_web::test]
async fn anonymous_like_toggle_mints_one_session() {
    let app = app!(state().await);

    let req = test::TestRequest::post().uri("/like").set_json(json!({ "article_id": 1 })).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let cookie = session_cookie(&resp).expect("session cookie");
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({ "liked": true, "created": true, "like_count": 1 }));

    let req = test::TestRequest::post()
        .uri("/like")
        .cookie(cookie)
        .set_json(json!({ "article_id": 1 }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(session_cookie(&resp).is_none());
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({ "liked": false, "created": false, "like_count": 0 }));
}

#[actix_web::test]
async fn liking_a_missing_article_is_not_found() {
    let app = app!(state().await);
    let req = test::TestRequest::post().uri("/like").set_json(json!({ "article_id": 404 })).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["category"], "not_found");
}

#[actix_web::test]
async fn reading_list_duplicate_is_a_conflict_with_item_id() {
    let app = app!(state().await);

    let req = test::TestRequest::post()
        .uri("/folders")
        .insert_header((USER_HEADER, "bob"))
        .set_json(json!({ "name": "Reading List" }))
        .to_request();
    let folder: Value = test::call_and_read_body_json(&app, req).await;
    let folder_id = folder["id"].as_str().unwrap().to_string();

    let add = || {
        test::TestRequest::post()
            .uri("/items")
            .insert_header((USER_HEADER, "bob"))
            .set_json(json!({ "folder_id": folder_id, "article_id": 1 }))
            .to_request()
    };
    let resp = test::call_service(&app, add()).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let first: Value = test::read_body_json(resp).await;
    assert_eq!(first["created"], true);

    let resp = test::call_service(&app, add()).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["category"], "conflict");
    assert_eq!(body["error"]["item_id"], first["item_id"]);
}

#[actix_web::test]
async fn share_links_only_open_public_folders() {
    let app = app!(state().await);

    let req = test::TestRequest::post()
        .uri("/folders")
        .insert_header((USER_HEADER, "bob"))
        .set_json(json!({ "name": "Weekend" }))
        .to_request();
    let folder: Value = test::call_and_read_body_json(&app, req).await;
    let token = folder["share_token"].as_str().unwrap().to_string();
    let folder_id = folder["id"].as_str().unwrap().to_string();

    let req = test::TestRequest::get().uri(&format!("/share/{token}")).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::post()
        .uri(&format!("/folders/{folder_id}"))
        .insert_header((USER_HEADER, "bob"))
        .set_json(json!({ "is_public": true }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = test::TestRequest::get().uri(&format!("/share/{token}")).to_request();
    let shared: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(shared["folder"]["share_hits"], 1);
    assert!(shared["folder"].get("owner_id").is_none());

    let req = test::TestRequest::get().uri("/share/not-a-token").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn quick_save_then_export_csv() {
    let app = app!(state().await);
    let save = |note: &str| {
        test::TestRequest::post()
            .uri("/quick-save")
            .insert_header((USER_HEADER, "bob"))
            .set_json(json!({ "article_id": 2, "folder_name": "Inbox", "note": note }))
            .to_request()
    };

    let resp = test::call_service(&app, save("first")).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let first: Value = test::read_body_json(resp).await;
    assert!(first["share_url"].as_str().unwrap().contains("/share/"));

    let resp = test::call_service(&app, save("second")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let second: Value = test::read_body_json(resp).await;
    assert_eq!(second["item_id"], first["item_id"]);
    assert_eq!(second["note_version"], 2);

    let folder_id = first["folder_id"].as_str().unwrap();
    let req = test::TestRequest::get()
        .uri(&format!("/folders/{folder_id}/export?format=csv"))
        .insert_header((USER_HEADER, "bob"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().get("content-disposition").is_some());
    let body = test::read_body(resp).await;
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.starts_with("id,article_id,title,url,note,note_version,created_time\r\n"));
    assert!(text.contains("Article 2"));
}

#[actix_web::test]
async fn account_only_endpoints_reject_anonymous_visitors() {
    let app = app!(state().await);

    let req = test::TestRequest::get().uri("/dashboard").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::post()
        .uri("/batch")
        .set_json(json!({ "action": "pin_folders", "folder_ids": [] }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["category"], "unauthorized");
}

#[actix_web::test]
async fn leaderboard_rejects_bad_since() {
    let app = app!(state().await);

    let req = test::TestRequest::post()
        .uri("/like")
        .insert_header((USER_HEADER, "bob"))
        .set_json(json!({ "article_id": 2 }))
        .to_request();
    test::call_service(&app, req).await;

    let req = test::TestRequest::get().uri("/leaderboard?since=yesterday").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["category"], "validation_error");

    let req = test::TestRequest::get().uri("/leaderboard?since=2000-01-01").to_request();
    let board: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(board["articles"][0]["article_id"], 2);
    assert_eq!(board["articles"][0]["total_likes"], 1);
}

#[actix_web::test]
async fn signing_in_merges_the_anonymous_session() {
    let app = app!(state().await);

    let req = test::TestRequest::post().uri("/like").set_json(json!({ "article_id": 3 })).to_request();
    let resp = test::call_service(&app, req).await;
    let cookie = session_cookie(&resp).expect("session cookie");

    let req = test::TestRequest::post()
        .uri("/identity/merge")
        .insert_header((USER_HEADER, "carol"))
        .cookie(cookie)
        .to_request();
    let merged: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(merged["reassigned"], 1);

    let req = test::TestRequest::get()
        .uri("/likes/history")
        .insert_header((USER_HEADER, "carol"))
        .to_request();
    let history: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(history["likes"][0]["article_id"], 3);
}

#[actix_web::test]
async fn authors_see_like_notifications() {
    let app = app!(state().await);

    let req = test::TestRequest::post().uri("/like").set_json(json!({ "article_id": 1 })).to_request();
    test::call_service(&app, req).await;

    let req = test::TestRequest::get()
        .uri("/notifications?unread=true")
        .insert_header((USER_HEADER, "alice"))
        .to_request();
    let inbox: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(inbox["unread_count"], 1);
    let id = inbox["notifications"][0]["id"].as_str().unwrap().to_string();
    assert_eq!(inbox["notifications"][0]["payload"]["actor"], "Anonymous visitor");

    let req = test::TestRequest::post()
        .uri(&format!("/notifications/{id}/read"))
        .insert_header((USER_HEADER, "alice"))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = test::TestRequest::post()
        .uri(&format!("/notifications/{id}/read"))
        .insert_header((USER_HEADER, "mallory"))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn my_favorites_opens_the_default_folder() {
    let app = app!(state().await);

    let req = test::TestRequest::get()
        .uri("/favorites")
        .insert_header((USER_HEADER, "dora"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let mine: Value = test::read_body_json(resp).await;
    assert_eq!(mine["page"], 1);
    assert_eq!(mine["total"], 0);
    assert_eq!(mine["has_next"], false);
    let default_id = mine["default_folder_id"].as_str().unwrap().to_string();

    let req = test::TestRequest::post()
        .uri("/items")
        .insert_header((USER_HEADER, "dora"))
        .set_json(json!({ "folder_id": default_id, "article_id": 2 }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);

    let req = test::TestRequest::get()
        .uri("/favorites?page=1")
        .insert_header((USER_HEADER, "dora"))
        .to_request();
    let mine: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(mine["default_folder_id"], default_id.as_str());
    assert_eq!(mine["total"], 1);
    assert_eq!(mine["items"][0]["article_id"], 2);
    assert_eq!(mine["items"][0]["folder_name"], "Default Favorites");

    let req = test::TestRequest::get()
        .uri("/folders")
        .insert_header((USER_HEADER, "dora"))
        .to_request();
    let listed: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(listed["folders"].as_array().unwrap().len(), 1);

    let req = test::TestRequest::get().uri("/favorites").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}
