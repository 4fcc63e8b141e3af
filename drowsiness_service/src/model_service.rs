use crate::detection::Detection;
use image::RgbImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("failed to build input tensor: {0}")]
    Preprocess(String),
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("unexpected model output: {0}")]
    Output(String),
}

/// Object detector shared read-only by every request.
///
/// Implementations are called from tokio's blocking pool and must be safe to
/// call concurrently.
pub trait ModelService: Send + Sync + 'static {
    fn predict(&self, image: &RgbImage) -> Result<Vec<Detection>, ModelError>;
}
