mod common;

use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::json;

use common::{post_json, post_json_auth, send, signup, signup_admin, test_app_with};

/// Serves a canned OpenAI-style completion on a loopback port and
/// returns the base URL to point the assistant config at.
async fn spawn_completion_stub(reply: &'static str) -> String {
    let stub = Router::new().route(
        "/chat/completions",
        post(move || async move {
            Json(json!({
                "choices": [{ "message": { "role": "assistant", "content": reply } }]
            }))
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub");
    let addr = listener.local_addr().expect("stub addr");
    tokio::spawn(async move {
        axum::serve(listener, stub.into_make_service()).await.ok();
    });
    format!("http://{addr}")
}

/// A loopback address nothing listens on.
async fn dead_endpoint() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind probe");
    let addr = listener.local_addr().expect("probe addr");
    drop(listener);
    format!("http://{addr}")
}

#[tokio::test]
async fn welcome_and_chat_proxy_the_prompt_service() {
    let api_url = spawn_completion_stub("Welcome to WorldAIPedia!").await;
    let app = test_app_with(move |config| config.assistant.api_url = api_url).await;

    let (status, body) = send(
        &app.router,
        post_json("/assistant/welcome", json!({ "page": "home", "language": "en" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["reply"], "Welcome to WorldAIPedia!");

    let (status, body) = send(
        &app.router,
        post_json(
            "/assistant/tool-welcome",
            json!({ "toolName": "PixelForge", "shortDescription": "paints pixels" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["reply"], "Welcome to WorldAIPedia!");

    let (status, body) = send(
        &app.router,
        post_json(
            "/assistant/chat",
            json!({
                "message": "what changed this week?",
                "history": [
                    { "role": "user", "text": "hello" },
                    { "role": "assistant", "text": "hi there" },
                ],
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["reply"], "Welcome to WorldAIPedia!");
}

#[tokio::test]
async fn blank_prompts_are_rejected_before_any_call() {
    // No stub: validation must fail before the client is used.
    let app = test_app_with(|_| {}).await;

    let (status, _) = send(
        &app.router,
        post_json("/assistant/chat", json!({ "message": "   " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app.router,
        post_json("/assistant/welcome", json!({ "page": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app.router,
        post_json("/assistant/tool-welcome", json!({ "toolName": " " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn translation_is_admin_only_and_parses_the_reply() {
    let api_url =
        spawn_completion_stub(r#"{"title": {"es": "Mago de Fotos", "fr": "Magicien Photo"}}"#)
            .await;
    let app = test_app_with(move |config| config.assistant.api_url = api_url).await;
    let request = json!({
        "fields": { "title": "Photo Wizard" },
        "sourceLanguage": "en",
        "targetLanguages": ["es", "fr"],
    });

    let (member, _) = signup(&app, "member@example.com", "member").await;
    let (status, _) = send(
        &app.router,
        post_json_auth("/assistant/translate", &member, request.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let admin = signup_admin(&app).await;
    let (status, map) = send(
        &app.router,
        post_json_auth("/assistant/translate", &admin, request),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{map}");
    assert_eq!(map["title"]["es"], "Mago de Fotos");
    assert_eq!(map["title"]["fr"], "Magicien Photo");

    let (status, _) = send(
        &app.router,
        post_json_auth(
            "/assistant/translate",
            &admin,
            json!({ "fields": {}, "targetLanguages": ["es"] }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn incomplete_translations_do_not_pass_through() {
    // The stub answers without the requested French column.
    let api_url = spawn_completion_stub(r#"{"title": {"es": "Mago de Fotos"}}"#).await;
    let app = test_app_with(move |config| config.assistant.api_url = api_url).await;
    let admin = signup_admin(&app).await;

    let (status, body) = send(
        &app.router,
        post_json_auth(
            "/assistant/translate",
            &admin,
            json!({
                "fields": { "title": "Photo Wizard" },
                "targetLanguages": ["es", "fr"],
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "{body}");
}

#[tokio::test]
async fn upstream_failures_surface_as_internal_errors() {
    let api_url = dead_endpoint().await;
    let app = test_app_with(move |config| config.assistant.api_url = api_url).await;

    let (status, body) = send(
        &app.router,
        post_json("/assistant/chat", json!({ "message": "hi" })),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "internal server error");
}
