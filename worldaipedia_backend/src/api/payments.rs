use super::{ApiError, ApiResult, AppState};
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

fn default_currency() -> String {
    "usd".to_string()
}

#[derive(Debug, Deserialize)]
pub(crate) struct IntentRequest {
    amount: i64,
    #[serde(default = "default_currency")]
    currency: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct IntentResponse {
    client_secret: String,
}

pub(crate) async fn create_intent(
    State(state): State<AppState>,
    Json(payload): Json<IntentRequest>,
) -> ApiResult<IntentResponse> {
    if payload.amount <= 0 {
        return Err(ApiError::BadRequest(
            "amount must be a positive number of minor units".into(),
        ));
    }
    let currency = payload.currency.trim();
    if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ApiError::BadRequest(
            "currency must be a three-letter code".into(),
        ));
    }
    let intent = state.payments.create_intent(payload.amount, currency).await?;
    Ok(Json(IntentResponse {
        client_secret: intent.client_secret,
    }))
}
