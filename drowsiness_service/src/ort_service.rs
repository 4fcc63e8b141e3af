use crate::{
    config::{ModelConfig, ResizeMode, Validatable},
    detection::Detection,
    labels::ClassLabels,
    model_service::{ModelError, ModelService},
    postprocess::PostProcessor,
    preprocess::transform_image,
};
use image::RgbImage;
use ndarray::{Array, Ix4};
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::TensorRef,
};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex, MutexGuard,
};

/// Round-robin pool of inference sessions. A lock poisoned by a panicking
/// request is cleared and its session handed out again.
pub struct SessionPool<S> {
    sessions: Vec<Mutex<S>>,
    counter: AtomicUsize,
}

impl<S> SessionPool<S> {
    pub fn new(sessions: Vec<S>) -> Self {
        Self {
            sessions: sessions.into_iter().map(Mutex::new).collect(),
            counter: AtomicUsize::new(0),
        }
    }

    pub fn acquire(&self) -> (usize, MutexGuard<'_, S>) {
        let index = self.counter.fetch_add(1, Ordering::SeqCst) % self.sessions.len();
        let guard = self.sessions[index].lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Session {} was poisoned by a panicking request, reusing it", index);
            self.sessions[index].clear_poison();
            poisoned.into_inner()
        });
        (index, guard)
    }
}

#[derive(Clone)]
pub struct OrtModelService {
    sessions: Arc<SessionPool<Session>>,
    output_name: String,
    input_size: u32,
    resize_mode: ResizeMode,
    post_processor: PostProcessor,
}

impl OrtModelService {
    pub fn new(model_config: &ModelConfig) -> Result<Self, Box<dyn std::error::Error>> {
        model_config.validate()?;

        let labels = ClassLabels::from_file(&model_config.get_labels_path())?;
        tracing::info!("Loaded {} class labels", labels.len());

        #[cfg(feature = "tensorrt")]
        ort::init()
            .with_execution_providers([
                ort::execution_providers::TensorRTExecutionProvider::default()
                    .with_engine_cache(true)
                    .build(),
            ])
            .commit()?;

        let num_instances = model_config.num_instances;
        let sessions = (0..num_instances)
            .map(|_| {
                let session = Session::builder()?
                    .with_optimization_level(GraphOptimizationLevel::Level3)?
                    .commit_from_file(model_config.get_path())?;
                Ok(session)
            })
            .collect::<Result<Vec<_>, ort::Error>>()?;

        let output_name = sessions[0]
            .outputs
            .first()
            .map(|output| output.name.clone())
            .ok_or_else(|| ModelError::Output("model declares no outputs".to_string()))?;

        tracing::info!(
            "Created {} ONNX sessions from {:?}",
            num_instances,
            model_config.get_path()
        );

        Ok(Self {
            sessions: Arc::new(SessionPool::new(sessions)),
            output_name,
            input_size: model_config.input_size,
            resize_mode: model_config.resize_mode,
            post_processor: PostProcessor::new(model_config, labels),
        })
    }

    pub fn run_inference(&self, input: &Array<f32, Ix4>) -> Result<ndarray::ArrayD<f32>, ModelError> {
        let (index, mut session) = self.sessions.acquire();
        tracing::debug!("Handling request with session {}", index);

        let tensor_ref = TensorRef::from_array_view(input.view())
            .map_err(|e| ModelError::Preprocess(e.to_string()))?;

        let outputs = session
            .run(ort::inputs![tensor_ref])
            .map_err(|e| ModelError::Inference(e.to_string()))?;

        let (shape, data) = outputs[self.output_name.as_str()]
            .try_extract_tensor::<f32>()
            .map_err(|e| ModelError::Output(format!("failed to extract tensor: {}", e)))?;

        ndarray::ArrayD::from_shape_vec(shape.to_ixdyn(), data.to_vec())
            .map_err(|e| ModelError::Output(format!("invalid tensor shape: {}", e)))
    }
}

impl ModelService for OrtModelService {
    fn predict(&self, image: &RgbImage) -> Result<Vec<Detection>, ModelError> {
        let (img_width, img_height) = image.dimensions();
        let (input, transform) = transform_image(image, self.input_size, self.resize_mode);

        let output = self.run_inference(&input)?;
        let detections = self
            .post_processor
            .process(output.view(), &transform, img_width, img_height)?;

        tracing::debug!("Model returned {} detections", detections.len());
        for (i, detection) in detections.iter().enumerate() {
            tracing::debug!(
                "Detection {}: label={}, confidence={:.3}, bbox=({:.1}, {:.1}, {:.1}, {:.1})",
                i,
                detection.label,
                detection.confidence,
                detection.bbox.x1,
                detection.bbox.y1,
                detection.bbox.x2,
                detection.bbox.y2
            );
        }

        Ok(detections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_pool_round_robin() {
        let pool = SessionPool::new(vec![10, 20, 30]);

        let handed_out: Vec<i32> = (0..6).map(|_| *pool.acquire().1).collect();

        assert_eq!(handed_out, vec![10, 20, 30, 10, 20, 30]);
    }

    #[test]
    fn test_pool_recovers_from_poisoned_session() {
        let pool = Arc::new(SessionPool::new(vec![0u32]));

        let panicking = pool.clone();
        let result = std::thread::spawn(move || {
            let (_, mut session) = panicking.acquire();
            *session += 1;
            panic!("inference blew up");
        })
        .join();
        assert!(result.is_err());
        assert!(pool.sessions[0].is_poisoned());

        let (index, mut session) = pool.acquire();
        *session += 1;
        drop(session);

        assert_eq!(index, 0);
        assert!(!pool.sessions[0].is_poisoned());
        assert_eq!(*pool.acquire().1, 2);
    }

    #[test]
    fn test_pool_serves_concurrent_callers() {
        let pool = Arc::new(SessionPool::new(vec![0usize, 1, 2, 3]));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let pool = pool.clone();
                std::thread::spawn(move || *pool.acquire().1)
            })
            .collect();
        let seen: HashSet<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(seen, HashSet::from([0, 1, 2, 3]));
    }
}
