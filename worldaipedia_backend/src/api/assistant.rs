use super::{ApiError, ApiResult, AppState};
use crate::assistant::{ChatTurn, TranslationMap};
use crate::auth::AdminSession;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn default_language() -> String {
    crate::localize::ENGLISH.to_string()
}

#[derive(Debug, Deserialize)]
pub(crate) struct WelcomeRequest {
    page: String,
    #[serde(default = "default_language")]
    language: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ToolWelcomeRequest {
    tool_name: String,
    #[serde(default)]
    short_description: String,
    #[serde(default = "default_language")]
    language: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatRequest {
    message: String,
    #[serde(default)]
    history: Vec<ChatTurn>,
    #[serde(default = "default_language")]
    language: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TranslateRequest {
    fields: BTreeMap<String, String>,
    #[serde(default = "default_language")]
    source_language: String,
    target_languages: Vec<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct AssistantReply {
    reply: String,
}

pub(crate) async fn page_welcome(
    State(state): State<AppState>,
    Json(payload): Json<WelcomeRequest>,
) -> ApiResult<AssistantReply> {
    if payload.page.trim().is_empty() {
        return Err(ApiError::BadRequest("page is required".into()));
    }
    let reply = state
        .prompts
        .page_welcome(&payload.page, &payload.language)
        .await?;
    Ok(Json(AssistantReply { reply }))
}

pub(crate) async fn tool_welcome(
    State(state): State<AppState>,
    Json(payload): Json<ToolWelcomeRequest>,
) -> ApiResult<AssistantReply> {
    if payload.tool_name.trim().is_empty() {
        return Err(ApiError::BadRequest("toolName is required".into()));
    }
    let reply = state
        .prompts
        .tool_welcome(
            &payload.tool_name,
            &payload.short_description,
            &payload.language,
        )
        .await?;
    Ok(Json(AssistantReply { reply }))
}

pub(crate) async fn chat(
    State(state): State<AppState>,
    Json(payload): Json<ChatRequest>,
) -> ApiResult<AssistantReply> {
    if payload.message.trim().is_empty() {
        return Err(ApiError::BadRequest("message is required".into()));
    }
    let reply = state
        .prompts
        .chat(&payload.message, &payload.history, &payload.language)
        .await?;
    Ok(Json(AssistantReply { reply }))
}

pub(crate) async fn translate(
    State(state): State<AppState>,
    _admin: AdminSession,
    Json(payload): Json<TranslateRequest>,
) -> ApiResult<TranslationMap> {
    if payload.fields.is_empty() {
        return Err(ApiError::BadRequest("fields are required".into()));
    }
    if payload.target_languages.is_empty() {
        return Err(ApiError::BadRequest("targetLanguages are required".into()));
    }
    let map = state
        .prompts
        .translate_fields(
            &payload.fields,
            &payload.source_language,
            &payload.target_languages,
        )
        .await?;
    Ok(Json(map))
}
