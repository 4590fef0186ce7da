//! Shared harness for the API integration tests: builds the full router
//! against a throwaway store and drives it in-process with
//! `tower::ServiceExt::oneshot`.

#![allow(dead_code)]

use axum::body::{Body, Bytes};
use axum::http::{self, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;
use worldaipedia_backend::api::{build_router, AppState};
use worldaipedia_backend::config::{WorldaiConfig, WorldaiPaths};
use worldaipedia_backend::notifications::spawn_fanout_worker;
use worldaipedia_backend::store::Store;

pub const ADMIN_EMAIL: &str = "admin@worldai.example";
pub const PASSWORD: &str = "correct horse battery";

pub struct TestApp {
    pub router: Router,
    _base: TempDir,
}

pub async fn test_app() -> TestApp {
    test_app_with(|_| {}).await
}

/// Builds the app over a temp data directory and an in-memory store. The
/// tweak hook runs before the outbound clients are constructed, so tests
/// can repoint the assistant or payment endpoints at a local stub.
pub async fn test_app_with(tweak: impl FnOnce(&mut WorldaiConfig)) -> TestApp {
    let base = tempfile::tempdir().expect("temp base dir");
    let paths = WorldaiPaths::from_base_dir(base.path()).expect("paths");
    paths.ensure_directories().expect("data dirs");
    let mut config = WorldaiConfig::with_paths(paths);
    config.admin_emails = vec![ADMIN_EMAIL.to_string()];
    tweak(&mut config);

    let store = Store::in_memory().expect("store");
    let fanout = spawn_fanout_worker(store.clone());
    let state = AppState::new(config, store, fanout).expect("app state");
    TestApp {
        router: build_router(state),
        _base: base,
    }
}

// ----------------------------------------------------------------------
// Request builders

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method(http::Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn get_auth(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(http::Method::GET)
        .uri(uri)
        .header(http::header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

pub fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(http::Method::POST)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, mime::APPLICATION_JSON.as_ref())
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn post_json_auth(uri: &str, token: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(http::Method::POST)
        .uri(uri)
        .header(http::header::AUTHORIZATION, format!("Bearer {token}"))
        .header(http::header::CONTENT_TYPE, mime::APPLICATION_JSON.as_ref())
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Bodyless authorized POST, for routes like likes and follows.
pub fn post_auth(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(http::Method::POST)
        .uri(uri)
        .header(http::header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

pub fn put_json_auth(uri: &str, token: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(http::Method::PUT)
        .uri(uri)
        .header(http::header::AUTHORIZATION, format!("Bearer {token}"))
        .header(http::header::CONTENT_TYPE, mime::APPLICATION_JSON.as_ref())
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn delete_auth(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(http::Method::DELETE)
        .uri(uri)
        .header(http::header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

/// Runs one request and returns the status plus the parsed JSON body
/// (`Value::Null` when the body is empty or not JSON).
pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, bytes) = send_raw(router, request).await;
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

pub async fn send_raw(router: &Router, request: Request<Body>) -> (StatusCode, Bytes) {
    let response = router.clone().oneshot(request).await.expect("request ran");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body collected")
        .to_bytes();
    (status, bytes)
}

// ----------------------------------------------------------------------
// Account fixtures

/// Signs up a fresh member and returns its bearer token and uid.
pub async fn signup(app: &TestApp, email: &str, username: &str) -> (String, String) {
    let (status, body) = send(
        &app.router,
        post_json(
            "/auth/signup",
            json!({ "email": email, "password": PASSWORD, "username": username }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "signup failed: {body}");
    let token = body["token"].as_str().expect("session token").to_string();
    let uid = body["user"]["uid"].as_str().expect("uid").to_string();
    (token, uid)
}

pub async fn signup_admin(app: &TestApp) -> String {
    let (token, _) = signup(app, ADMIN_EMAIL, "site-admin").await;
    token
}

/// Signs up and immediately subscribes, returning a PRO member.
pub async fn signup_pro(app: &TestApp, email: &str, username: &str) -> (String, String) {
    let (token, uid) = signup(app, email, username).await;
    let (status, body) = send(
        &app.router,
        post_json_auth(
            "/account/subscription",
            &token,
            json!({ "planId": "pro-monthly", "planName": "PRO Monthly" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "subscribe failed: {body}");
    (token, uid)
}
