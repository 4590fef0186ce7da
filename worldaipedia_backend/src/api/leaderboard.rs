use super::{write_error, ApiResult, AppState};
use crate::auth::ProSession;
use crate::models::GameHighScore;
use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(crate) struct TopParams {
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ScoreSubmission {
    score: i64,
}

pub(crate) async fn top(
    State(state): State<AppState>,
    Query(params): Query<TopParams>,
) -> ApiResult<Vec<GameHighScore>> {
    Ok(Json(state.leaderboard_service().top(params.limit)?))
}

pub(crate) async fn submit(
    State(state): State<AppState>,
    ProSession(player): ProSession,
    Json(payload): Json<ScoreSubmission>,
) -> ApiResult<GameHighScore> {
    let entry = state
        .leaderboard_service()
        .submit(&player, payload.score)
        .map_err(write_error)?;
    Ok(Json(entry))
}
