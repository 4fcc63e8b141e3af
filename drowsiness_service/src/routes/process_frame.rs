use crate::{
    inference_service::{ClassifyError, FrameStatus},
    model_service::ModelService,
    server::SharedState,
};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

#[derive(Debug, Deserialize)]
pub struct ProcessFrameRequest {
    /// Data URL, e.g. `data:image/jpeg;base64,/9j/4AAQ...`
    pub frame: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Error, Debug)]
pub enum ProcessFrameError {
    #[error("invalid request body: {0}")]
    InvalidBody(#[from] JsonRejection),
    #[error(transparent)]
    Classify(#[from] ClassifyError),
}

impl IntoResponse for ProcessFrameError {
    fn into_response(self) -> Response {
        tracing::warn!("Rejecting frame: {}", self);
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

#[instrument(skip(state, payload))]
pub async fn process_frame<M: ModelService>(
    State(state): State<SharedState<M>>,
    payload: Result<Json<ProcessFrameRequest>, JsonRejection>,
) -> Result<Json<FrameStatus>, ProcessFrameError> {
    let Json(request) = payload?;
    let status = state.inference_service.classify(request.frame).await?;

    Ok(Json(status))
}
