use super::{deletion_response, write_error, ApiError, ApiResult, AppState};
use crate::accounts::UserView;
use crate::auth::{AuthSession, ProSession};
use crate::models::{ProComment, ProPost, ProReply, User};
use crate::social::PublicationInput;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(crate) struct FeedParams {
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TextBody {
    text: String,
}

// ----------------------------------------------------------------------
// Publications

pub(crate) async fn list_feed(
    State(state): State<AppState>,
    _pro: ProSession,
    Query(params): Query<FeedParams>,
) -> ApiResult<Vec<ProPost>> {
    Ok(Json(state.social_service().list_feed(params.limit)?))
}

pub(crate) async fn list_by_author(
    State(state): State<AppState>,
    _pro: ProSession,
    Path(uid): Path<String>,
) -> ApiResult<Vec<ProPost>> {
    Ok(Json(state.social_service().list_by_author(&uid)?))
}

pub(crate) async fn create_publication(
    State(state): State<AppState>,
    ProSession(author): ProSession,
    Json(payload): Json<PublicationInput>,
) -> ApiResult<ProPost> {
    let post = state
        .social_service()
        .create_publication(&author, payload)
        .map_err(write_error)?;
    Ok(Json(post))
}

pub(crate) async fn delete_publication(
    State(state): State<AppState>,
    session: AuthSession,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let outcome = state
        .social_service()
        .delete_publication(&id, &session.user)?;
    deletion_response(outcome, "publication")
}

// ----------------------------------------------------------------------
// Likes and saves

pub(crate) async fn like(
    State(state): State<AppState>,
    session: AuthSession,
    Path(id): Path<String>,
) -> ApiResult<ProPost> {
    let post = state
        .social_service()
        .like(&id, &session.user)?
        .ok_or_else(|| ApiError::NotFound(format!("publication {id} not found")))?;
    Ok(Json(post))
}

pub(crate) async fn unlike(
    State(state): State<AppState>,
    session: AuthSession,
    Path(id): Path<String>,
) -> ApiResult<ProPost> {
    let post = state
        .social_service()
        .unlike(&id, &session.user)?
        .ok_or_else(|| ApiError::NotFound(format!("publication {id} not found")))?;
    Ok(Json(post))
}

/// Returns the caller's refreshed profile so the client can swap its
/// saved list in place.
pub(crate) async fn save(
    State(state): State<AppState>,
    session: AuthSession,
    Path(id): Path<String>,
) -> ApiResult<User> {
    let me = state
        .social_service()
        .save(&id, &session.user)?
        .ok_or_else(|| ApiError::NotFound(format!("publication {id} not found")))?;
    Ok(Json(me))
}

pub(crate) async fn unsave(
    State(state): State<AppState>,
    session: AuthSession,
    Path(id): Path<String>,
) -> ApiResult<User> {
    let me = state
        .social_service()
        .unsave(&id, &session.user)?
        .ok_or_else(|| ApiError::NotFound("profile not found".into()))?;
    Ok(Json(me))
}

// ----------------------------------------------------------------------
// Comments and replies

pub(crate) async fn list_comments(
    State(state): State<AppState>,
    _pro: ProSession,
    Path(id): Path<String>,
) -> ApiResult<Vec<ProComment>> {
    Ok(Json(state.social_service().list_comments(&id)?))
}

pub(crate) async fn add_comment(
    State(state): State<AppState>,
    ProSession(author): ProSession,
    Path(id): Path<String>,
    Json(payload): Json<TextBody>,
) -> ApiResult<ProComment> {
    let comment = state
        .social_service()
        .add_comment(&id, &author, &payload.text)
        .map_err(write_error)?
        .ok_or_else(|| ApiError::NotFound(format!("publication {id} not found")))?;
    Ok(Json(comment))
}

pub(crate) async fn delete_comment(
    State(state): State<AppState>,
    session: AuthSession,
    Path((post_id, comment_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let outcome =
        state
            .social_service()
            .delete_comment(&post_id, &comment_id, &session.user)?;
    deletion_response(outcome, "comment")
}

pub(crate) async fn list_replies(
    State(state): State<AppState>,
    _pro: ProSession,
    Path((post_id, comment_id)): Path<(String, String)>,
) -> ApiResult<Vec<ProReply>> {
    Ok(Json(
        state.social_service().list_replies(&post_id, &comment_id)?,
    ))
}

pub(crate) async fn add_reply(
    State(state): State<AppState>,
    ProSession(author): ProSession,
    Path((post_id, comment_id)): Path<(String, String)>,
    Json(payload): Json<TextBody>,
) -> ApiResult<ProReply> {
    let reply = state
        .social_service()
        .add_reply(&post_id, &comment_id, &author, &payload.text)
        .map_err(write_error)?
        .ok_or_else(|| ApiError::NotFound(format!("comment {comment_id} not found")))?;
    Ok(Json(reply))
}

pub(crate) async fn delete_reply(
    State(state): State<AppState>,
    session: AuthSession,
    Path((post_id, comment_id, reply_id)): Path<(String, String, String)>,
) -> Result<StatusCode, ApiError> {
    let outcome = state.social_service().delete_reply(
        &post_id,
        &comment_id,
        &reply_id,
        &session.user,
    )?;
    deletion_response(outcome, "reply")
}

// ----------------------------------------------------------------------
// Follow graph

pub(crate) async fn follow(
    State(state): State<AppState>,
    session: AuthSession,
    Path(uid): Path<String>,
) -> ApiResult<UserView> {
    let followee = state
        .social_service()
        .follow(&session.user, &uid)
        .map_err(write_error)?
        .ok_or_else(|| ApiError::NotFound(format!("user {uid} not found")))?;
    Ok(Json(UserView::from_user(&followee)))
}

pub(crate) async fn unfollow(
    State(state): State<AppState>,
    session: AuthSession,
    Path(uid): Path<String>,
) -> ApiResult<UserView> {
    let followee = state
        .social_service()
        .unfollow(&session.user, &uid)
        .map_err(write_error)?
        .ok_or_else(|| ApiError::NotFound(format!("user {uid} not found")))?;
    Ok(Json(UserView::from_user(&followee)))
}
