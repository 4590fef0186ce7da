mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::{
    delete_auth, get, get_auth, post_auth, post_json, post_json_auth, put_json_auth, send, signup,
    signup_admin, test_app, PASSWORD,
};

#[tokio::test]
async fn signup_returns_a_working_session() {
    let app = test_app().await;

    let (status, body) = send(
        &app.router,
        post_json(
            "/auth/signup",
            json!({ "email": "Nina@Example.com", "password": PASSWORD, "username": "nina" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["user"]["email"], "nina@example.com");
    assert_eq!(body["user"]["username"], "nina");
    let token = body["token"].as_str().unwrap();
    let uid = body["user"]["uid"].as_str().unwrap();

    let (status, me) = send(&app.router, get_auth("/account/me", token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["uid"], uid);

    let (status, _) = send(&app.router, get("/account/me")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn signin_rejects_bad_credentials() {
    let app = test_app().await;
    signup(&app, "nina@example.com", "nina").await;

    let (status, body) = send(
        &app.router,
        post_json(
            "/auth/signin",
            json!({ "email": "nina@example.com", "password": "not the password" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "invalid email or password");

    let (status, body) = send(
        &app.router,
        post_json(
            "/auth/signin",
            json!({ "email": "nina@example.com", "password": PASSWORD }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let token = body["token"].as_str().unwrap();
    let (status, _) = send(&app.router, get_auth("/account/me", token)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn duplicate_signup_is_rejected() {
    let app = test_app().await;
    signup(&app, "nina@example.com", "nina").await;

    let (status, body) = send(
        &app.router,
        post_json(
            "/auth/signup",
            json!({ "email": "NINA@example.com", "password": PASSWORD }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "email is already registered");
}

#[tokio::test]
async fn signout_revokes_the_session() {
    let app = test_app().await;
    let (token, _) = signup(&app, "nina@example.com", "nina").await;

    let (status, _) = send(&app.router, post_auth("/auth/signout", &token)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app.router, get_auth("/account/me", &token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn profile_updates_show_in_the_public_view() {
    let app = test_app().await;
    let (token, uid) = signup(&app, "nina@example.com", "nina").await;

    let (status, body) = send(
        &app.router,
        put_json_auth(
            "/account/profile",
            &token,
            json!({ "displayName": "Nina K", "description": "Writes about image tools" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["displayName"], "Nina K");

    // Public profile carries no email and no saved list.
    let (status, public) = send(&app.router, get(&format!("/users/{uid}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(public["displayName"], "Nina K");
    assert_eq!(public["followerCount"], 0);
    assert!(public.get("email").is_none());
    assert!(public.get("saved").is_none());

    let (status, results) = send(&app.router, get("/users?search=nin")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(results
        .as_array()
        .unwrap()
        .iter()
        .any(|entry| entry["uid"] == uid));

    let (status, _) = send(&app.router, get("/users")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn subscription_toggles_pro_access() {
    let app = test_app().await;
    let (token, _) = signup(&app, "nina@example.com", "nina").await;

    let (status, _) = send(&app.router, get_auth("/feed", &token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app.router,
        post_json_auth(
            "/account/subscription",
            &token,
            json!({ "planId": "pro-monthly", "planName": "PRO Monthly" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["isSubscribed"], true);
    assert_eq!(body["plan"]["planId"], "pro-monthly");

    let (status, _) = send(&app.router, get_auth("/feed", &token)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app.router, delete_auth("/account/subscription", &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isSubscribed"], false);

    let (status, _) = send(&app.router, get_auth("/feed", &token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn subscribing_requires_a_plan() {
    let app = test_app().await;
    let (token, _) = signup(&app, "nina@example.com", "nina").await;

    let (status, _) = send(
        &app.router,
        post_json_auth(
            "/account/subscription",
            &token,
            json!({ "planId": "", "planName": "PRO Monthly" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn admins_hold_pro_access_without_subscribing() {
    let app = test_app().await;
    let admin = signup_admin(&app).await;

    let (status, me) = send(&app.router, get_auth("/account/me", &admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["isAdmin"], true);
    assert_eq!(me["isSubscribed"], false);

    let (status, _) = send(&app.router, get_auth("/feed", &admin)).await;
    assert_eq!(status, StatusCode::OK);
}
