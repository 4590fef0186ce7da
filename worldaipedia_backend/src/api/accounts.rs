use super::{write_error, ApiError, ApiResult, AppState};
use crate::accounts::{ProfileInput, UserView};
use crate::auth::AuthSession;
use crate::models::User;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SignupRequest {
    email: String,
    password: String,
    #[serde(default)]
    username: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SigninRequest {
    email: String,
    password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SessionResponse {
    token: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    expires_at: DateTime<Utc>,
    user: User,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SubscribeRequest {
    plan_id: String,
    plan_name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchParams {
    #[serde(default)]
    search: Option<String>,
}

pub(crate) async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> ApiResult<SessionResponse> {
    let identity = state
        .auth_service()
        .signup(&payload.email, &payload.password)
        .map_err(write_error)?;
    let user = state.account_service().ensure_user(
        &identity.uid,
        &identity.email,
        payload.username.as_deref(),
    )?;
    let issued = state.auth_service().issue_session(&identity.uid)?;
    Ok(Json(SessionResponse {
        token: issued.token,
        expires_at: issued.expires_at,
        user,
    }))
}

pub(crate) async fn signin(
    State(state): State<AppState>,
    Json(payload): Json<SigninRequest>,
) -> ApiResult<SessionResponse> {
    let identity = state
        .auth_service()
        .signin(&payload.email, &payload.password)?
        .ok_or_else(|| ApiError::Unauthorized("invalid email or password".into()))?;
    let user = state
        .account_service()
        .ensure_user(&identity.uid, &identity.email, None)?;
    let issued = state.auth_service().issue_session(&identity.uid)?;
    Ok(Json(SessionResponse {
        token: issued.token,
        expires_at: issued.expires_at,
        user,
    }))
}

pub(crate) async fn signout(
    State(state): State<AppState>,
    session: AuthSession,
) -> Result<StatusCode, ApiError> {
    state.auth_service().revoke(&session.token)?;
    Ok(StatusCode::OK)
}

/// The caller's own profile, email and saved list included.
pub(crate) async fn me(session: AuthSession) -> ApiResult<User> {
    Ok(Json(session.user))
}

pub(crate) async fn update_profile(
    State(state): State<AppState>,
    session: AuthSession,
    Json(payload): Json<ProfileInput>,
) -> ApiResult<User> {
    let updated = state
        .account_service()
        .update_profile(&session.user.uid, payload)
        .map_err(write_error)?
        .ok_or_else(|| ApiError::NotFound("profile not found".into()))?;
    Ok(Json(updated))
}

pub(crate) async fn subscribe(
    State(state): State<AppState>,
    session: AuthSession,
    Json(payload): Json<SubscribeRequest>,
) -> ApiResult<User> {
    if payload.plan_id.trim().is_empty() || payload.plan_name.trim().is_empty() {
        return Err(ApiError::BadRequest("plan id and name are required".into()));
    }
    let updated = state
        .account_service()
        .set_subscription(&session.user.uid, &payload.plan_id, &payload.plan_name)?
        .ok_or_else(|| ApiError::NotFound("profile not found".into()))?;
    Ok(Json(updated))
}

pub(crate) async fn unsubscribe(
    State(state): State<AppState>,
    session: AuthSession,
) -> ApiResult<User> {
    let updated = state
        .account_service()
        .clear_subscription(&session.user.uid)?
        .ok_or_else(|| ApiError::NotFound("profile not found".into()))?;
    Ok(Json(updated))
}

pub(crate) async fn get_user(
    State(state): State<AppState>,
    Path(uid): Path<String>,
) -> ApiResult<UserView> {
    let user = state
        .account_service()
        .get_user(&uid)?
        .ok_or_else(|| ApiError::NotFound(format!("user {uid} not found")))?;
    Ok(Json(UserView::from_user(&user)))
}

pub(crate) async fn search_users(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Vec<UserView>> {
    let fragment = params
        .search
        .as_deref()
        .map(str::trim)
        .filter(|fragment| !fragment.is_empty())
        .ok_or_else(|| ApiError::BadRequest("missing search parameter".into()))?;
    Ok(Json(state.account_service().search_users(fragment)?))
}
