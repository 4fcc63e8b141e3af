use crate::{
    detection::Detection,
    frame::{decode_frame, FrameError},
    model_service::{ModelError, ModelService},
};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

/// Class emitted by the model when the driver shows signs of drowsiness.
pub const DROWSY_LABEL: &str = "drowsy";

#[derive(Error, Debug)]
pub enum ClassifyError {
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("inference task failed: {0}")]
    Internal(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DrowsinessStatus {
    Alert,
    Drowsy,
}

impl DrowsinessStatus {
    pub fn from_detections(detections: &[Detection]) -> Self {
        if detections
            .iter()
            .any(|detection| detection.label == DROWSY_LABEL)
        {
            DrowsinessStatus::Drowsy
        } else {
            DrowsinessStatus::Alert
        }
    }

    pub fn advice(&self) -> &'static str {
        match self {
            DrowsinessStatus::Alert => "Keep going!",
            DrowsinessStatus::Drowsy => "Take a break!",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrameStatus {
    pub status: DrowsinessStatus,
    pub advice: &'static str,
}

impl From<DrowsinessStatus> for FrameStatus {
    fn from(status: DrowsinessStatus) -> Self {
        Self {
            status,
            advice: status.advice(),
        }
    }
}

pub struct InferenceService<M: ModelService> {
    model_service: Arc<M>,
}

impl<M: ModelService> Clone for InferenceService<M> {
    fn clone(&self) -> Self {
        Self {
            model_service: self.model_service.clone(),
        }
    }
}

impl<M: ModelService> InferenceService<M> {
    pub fn new(model_service: M) -> Self {
        Self {
            model_service: Arc::new(model_service),
        }
    }

    /// Decodes a data URL frame, runs the detector on it and reduces the
    /// detections to a drowsiness status. Decoding and inference both run on
    /// the blocking pool.
    #[instrument(skip(self, frame), fields(frame_len = frame.len()))]
    pub async fn classify(&self, frame: String) -> Result<FrameStatus, ClassifyError> {
        let model_service = self.model_service.clone();

        let detections = tokio::task::spawn_blocking(move || -> Result<_, ClassifyError> {
            let image = decode_frame(&frame)?;
            Ok(model_service.predict(&image)?)
        })
        .await
        .map_err(|e| ClassifyError::Internal(e.to_string()))??;

        let status = DrowsinessStatus::from_detections(&detections);
        tracing::debug!(
            "Classified frame as {:?} from {} detections",
            status,
            detections.len()
        );

        Ok(status.into())
    }
}
