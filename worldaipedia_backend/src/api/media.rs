use super::{ApiError, ApiResult, AppState};
use crate::auth::ProSession;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UploadRequest {
    data_uri: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct UploadResponse {
    url: String,
}

pub(crate) async fn upload(
    State(state): State<AppState>,
    _pro: ProSession,
    Json(payload): Json<UploadRequest>,
) -> ApiResult<UploadResponse> {
    match state.media.save_data_uri(&payload.data_uri).await {
        Ok(url) => Ok(Json(UploadResponse { url })),
        Err(err) if err.downcast_ref::<std::io::Error>().is_some() => {
            Err(ApiError::Internal(err))
        }
        Err(err) => Err(ApiError::BadRequest(err.to_string())),
    }
}
