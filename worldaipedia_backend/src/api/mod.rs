mod accounts;
mod assistant;
mod content;
mod events;
mod leaderboard;
mod media;
mod notifications;
mod payments;
mod social;

use crate::accounts::AccountService;
use crate::assistant::PromptClient;
use crate::auth::AuthService;
use crate::config::WorldaiConfig;
use crate::content::ContentService;
use crate::leaderboard::LeaderboardService;
use crate::media::MediaStorage;
use crate::notifications::{NotificationQueue, NotificationService};
use crate::payments::PaymentClient;
use crate::social::SocialService;
use crate::store::{Store, StoreError};
use anyhow::{Context, Result};
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use serde::Serialize;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

#[derive(Clone)]
pub struct AppState {
    pub config: WorldaiConfig,
    pub store: Store,
    pub media: MediaStorage,
    pub prompts: PromptClient,
    pub payments: PaymentClient,
    pub fanout: NotificationQueue,
}

impl AppState {
    pub fn new(config: WorldaiConfig, store: Store, fanout: NotificationQueue) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent("WorldAIPedia/0.1.0")
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("failed to build shared HTTP client")?;

        let media = MediaStorage::new(
            config.paths.media_dir.clone(),
            config.media.max_upload_bytes,
        );
        let prompts = PromptClient::new(config.assistant.clone(), http_client.clone());
        let payments = PaymentClient::new(
            config.payments.api_url.clone(),
            config.payments.secret_key.clone(),
            http_client,
        );

        Ok(Self {
            config,
            store,
            media,
            prompts,
            payments,
            fanout,
        })
    }

    pub fn auth_service(&self) -> AuthService {
        AuthService::new(self.store.clone(), self.config.auth.session_ttl_hours)
    }

    pub fn account_service(&self) -> AccountService {
        AccountService::new(self.store.clone(), self.config.admin_emails.clone())
    }

    pub fn content_service(&self) -> ContentService {
        ContentService::new(self.store.clone(), self.config.content.clone())
    }

    pub fn social_service(&self) -> SocialService {
        SocialService::new(self.store.clone(), self.fanout.clone())
    }

    pub fn notification_service(&self) -> NotificationService {
        NotificationService::new(self.store.clone())
    }

    pub fn leaderboard_service(&self) -> LeaderboardService {
        LeaderboardService::new(self.store.clone())
    }
}

pub(crate) type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    PermissionDenied(String),
    NotFound(String),
    Internal(anyhow::Error),
}

impl ApiError {
    fn into_response_parts(self) -> (StatusCode, ErrorResponse) {
        match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, ErrorResponse { message: msg }),
            ApiError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, ErrorResponse { message: msg })
            }
            ApiError::PermissionDenied(msg) => {
                (StatusCode::FORBIDDEN, ErrorResponse { message: msg })
            }
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, ErrorResponse { message: msg }),
            ApiError::Internal(err) => {
                tracing::error!(error = ?err, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse {
                        message: "internal server error".into(),
                    },
                )
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = self.into_response_parts();
        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err)
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    message: String,
}

/// Maps a service error from a write path: store or codec failures stay
/// internal, anything else was caused by the request.
pub(crate) fn write_error(err: anyhow::Error) -> ApiError {
    if err.downcast_ref::<StoreError>().is_some()
        || err.downcast_ref::<serde_json::Error>().is_some()
    {
        ApiError::Internal(err)
    } else {
        ApiError::BadRequest(err.to_string())
    }
}

/// Owner-or-admin delete results as HTTP codes.
pub(crate) fn deletion_response(
    outcome: crate::content::DeleteOutcome,
    noun: &str,
) -> Result<StatusCode, ApiError> {
    match outcome {
        crate::content::DeleteOutcome::Deleted => Ok(StatusCode::OK),
        crate::content::DeleteOutcome::NotFound => {
            Err(ApiError::NotFound(format!("{noun} not found")))
        }
        crate::content::DeleteOutcome::Denied => Err(ApiError::PermissionDenied(format!(
            "not allowed to delete this {noun}"
        ))),
    }
}

pub fn build_router(state: AppState) -> Router {
    let media_dir = state.config.paths.media_dir.clone();
    let body_limit = state.config.media.max_upload_bytes * 2 + 1024 * 1024;

    Router::new()
        .route("/health", get(health_handler))
        // Accounts and sessions
        .route("/auth/signup", post(accounts::signup))
        .route("/auth/signin", post(accounts::signin))
        .route("/auth/signout", post(accounts::signout))
        .route("/account/me", get(accounts::me))
        .route("/account/profile", put(accounts::update_profile))
        .route(
            "/account/subscription",
            post(accounts::subscribe).delete(accounts::unsubscribe),
        )
        .route("/users", get(accounts::search_users))
        .route("/users/:uid", get(accounts::get_user))
        .route("/users/:uid/follow", post(social::follow))
        .route("/users/:uid/unfollow", post(social::unfollow))
        .route("/users/:uid/publications", get(social::list_by_author))
        // Blog posts and their review comments
        .route("/posts", get(content::list_posts).post(content::create_post))
        .route(
            "/posts/:id",
            get(content::get_post)
                .put(content::update_post)
                .delete(content::delete_post),
        )
        .route(
            "/posts/:id/comments",
            get(content::list_comments).post(content::add_comment),
        )
        .route(
            "/posts/:id/comments/:comment_id",
            delete(content::delete_comment),
        )
        // Storefront
        .route("/books", get(content::list_books).post(content::create_book))
        .route(
            "/books/:id",
            get(content::get_book)
                .put(content::update_book)
                .delete(content::delete_book),
        )
        .route(
            "/products",
            get(content::list_products).post(content::create_product),
        )
        .route(
            "/products/:id",
            get(content::get_product)
                .put(content::update_product)
                .delete(content::delete_product),
        )
        .route(
            "/donations",
            get(content::donation_settings).put(content::update_donation_settings),
        )
        // PRO publications
        .route("/feed", get(social::list_feed))
        .route("/publications", post(social::create_publication))
        .route("/publications/:id", delete(social::delete_publication))
        .route("/publications/:id/like", post(social::like))
        .route("/publications/:id/unlike", post(social::unlike))
        .route("/publications/:id/save", post(social::save))
        .route("/publications/:id/unsave", post(social::unsave))
        .route(
            "/publications/:id/comments",
            get(social::list_comments).post(social::add_comment),
        )
        .route(
            "/publications/:id/comments/:comment_id",
            delete(social::delete_comment),
        )
        .route(
            "/publications/:id/comments/:comment_id/replies",
            get(social::list_replies).post(social::add_reply),
        )
        .route(
            "/publications/:id/comments/:comment_id/replies/:reply_id",
            delete(social::delete_reply),
        )
        // Notifications
        .route("/notifications", get(notifications::list))
        .route("/notifications/unread", get(notifications::unread_count))
        .route("/notifications/:id/read", post(notifications::mark_read))
        // Leaderboard, assistant, payments, uploads
        .route(
            "/leaderboard",
            get(leaderboard::top).post(leaderboard::submit),
        )
        .route("/assistant/welcome", post(assistant::page_welcome))
        .route("/assistant/tool-welcome", post(assistant::tool_welcome))
        .route("/assistant/chat", post(assistant::chat))
        .route("/assistant/translate", post(assistant::translate))
        .route("/payments/intent", post(payments::create_intent))
        .route("/uploads", post(media::upload))
        .nest_service("/media", ServeDir::new(media_dir))
        // Live change streams
        .route("/live/feed", get(events::feed))
        .route("/live/posts/:id/comments", get(events::post_comments))
        .route("/live/notifications", get(events::notifications))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

async fn health_handler() -> StatusCode {
    StatusCode::OK
}

/// Tries to bind to the given port, or finds the next available port
async fn find_available_port(start_port: u16) -> Result<(TcpListener, u16)> {
    const MAX_PORT_ATTEMPTS: u16 = 100;

    for offset in 0..MAX_PORT_ATTEMPTS {
        let port = start_port + offset;
        let addr = SocketAddr::from(([0, 0, 0, 0], port));

        match TcpListener::bind(addr).await {
            Ok(listener) => return Ok((listener, port)),
            Err(e) => {
                if offset == 0 {
                    tracing::debug!(port, error = %e, "Port in use, trying next port");
                }
                continue;
            }
        }
    }

    anyhow::bail!(
        "Could not find available port in range {}-{}",
        start_port,
        start_port + MAX_PORT_ATTEMPTS - 1
    )
}

pub async fn serve_http(
    config: WorldaiConfig,
    store: Store,
    fanout: NotificationQueue,
) -> Result<()> {
    let api_port = config.api_port;
    let state = AppState::new(config, store, fanout)?;
    let router = build_router(state);

    let (listener, actual_port) = find_available_port(api_port).await?;
    let addr = SocketAddr::from(([0, 0, 0, 0], actual_port));

    if actual_port != api_port {
        tracing::warn!(
            requested_port = api_port,
            actual_port = actual_port,
            "Configured port was in use, bound to next available port"
        );
    }

    tracing::info!(?addr, "HTTP server listening");
    axum::serve(listener, router.into_make_service()).await?;
    Ok(())
}
