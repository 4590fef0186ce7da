use super::{ApiError, ApiResult, AppState};
use crate::auth::AuthSession;
use crate::models::Notification;
use crate::notifications::MarkReadOutcome;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub(crate) struct UnreadResponse {
    count: usize,
}

pub(crate) async fn list(
    State(state): State<AppState>,
    session: AuthSession,
) -> ApiResult<Vec<Notification>> {
    Ok(Json(
        state.notification_service().list_for(&session.user.uid)?,
    ))
}

pub(crate) async fn unread_count(
    State(state): State<AppState>,
    session: AuthSession,
) -> ApiResult<UnreadResponse> {
    let count = state
        .notification_service()
        .unread_count(&session.user.uid)?;
    Ok(Json(UnreadResponse { count }))
}

pub(crate) async fn mark_read(
    State(state): State<AppState>,
    session: AuthSession,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    match state
        .notification_service()
        .mark_read(&id, &session.user.uid)?
    {
        MarkReadOutcome::Marked => Ok(StatusCode::OK),
        MarkReadOutcome::NotFound => {
            Err(ApiError::NotFound(format!("notification {id} not found")))
        }
        MarkReadOutcome::Denied => Err(ApiError::PermissionDenied(
            "not your notification".into(),
        )),
    }
}
