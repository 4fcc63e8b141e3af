mod health;
mod process_frame;

use crate::{model_service::ModelService, server::SharedState};
use axum::{
    routing::{get, post},
    Router,
};

pub fn api_routes<M: ModelService>() -> Router<SharedState<M>> {
    Router::new()
        .route("/health", get(health::healthcheck))
        .route("/process_frame", post(process_frame::process_frame::<M>))
}
