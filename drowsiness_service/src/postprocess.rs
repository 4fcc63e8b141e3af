use crate::{
    config::{ModelConfig, OutputLayout},
    detection::{non_max_suppression, BoundingBox, Detection},
    labels::ClassLabels,
    model_service::ModelError,
    preprocess::InputTransform,
};
use ndarray::{s, ArrayViewD, Axis, Ix2};

/// Turns the raw YOLO output tensor into labeled detections in the
/// coordinate space of the original image.
#[derive(Debug, Clone)]
pub struct PostProcessor {
    layout: OutputLayout,
    min_probability: f32,
    iou_threshold: f32,
    labels: ClassLabels,
}

impl PostProcessor {
    pub fn new(model_config: &ModelConfig, labels: ClassLabels) -> Self {
        Self {
            layout: model_config.output_layout,
            min_probability: model_config.min_probability,
            iou_threshold: model_config.iou_threshold,
            labels,
        }
    }

    pub fn process(
        &self,
        output: ArrayViewD<'_, f32>,
        transform: &InputTransform,
        img_width: u32,
        img_height: u32,
    ) -> Result<Vec<Detection>, ModelError> {
        if output.ndim() != 3 || output.shape()[0] != 1 {
            return Err(ModelError::Output(format!(
                "expected a [1, _, _] tensor, got {:?}",
                output.shape()
            )));
        }

        let batch = output
            .index_axis(Axis(0), 0)
            .into_dimensionality::<Ix2>()
            .map_err(|e| ModelError::Output(e.to_string()))?;

        // One row per candidate box.
        let (rows, scores_start) = match self.layout {
            OutputLayout::Yolov5 => (batch, 5),
            OutputLayout::Yolov8 => (batch.reversed_axes(), 4),
        };

        if rows.ncols() <= scores_start {
            return Err(ModelError::Output(format!(
                "{:?} output needs more than {} values per box, got {}",
                self.layout,
                scores_start,
                rows.ncols()
            )));
        }

        let mut boxes = Vec::new();

        for row in rows.axis_iter(Axis(0)) {
            let (class_id, class_score) = row
                .slice(s![scores_start..])
                .iter()
                .copied()
                .enumerate()
                .reduce(|accum, item| if item.1 > accum.1 { item } else { accum })
                .unwrap_or((0, 0.));

            let confidence = match self.layout {
                OutputLayout::Yolov5 => row[4] * class_score,
                OutputLayout::Yolov8 => class_score,
            };

            if confidence.is_nan() || confidence < self.min_probability {
                continue;
            }

            let bbox = transform.box_to_original(row[0], row[1], row[2], row[3]);

            boxes.push(Detection {
                label: self.labels.get(class_id),
                class_id,
                confidence,
                bbox: BoundingBox {
                    x1: bbox.x1.clamp(0., img_width as f32),
                    y1: bbox.y1.clamp(0., img_height as f32),
                    x2: bbox.x2.clamp(0., img_width as f32),
                    y2: bbox.y2.clamp(0., img_height as f32),
                },
            });
        }

        Ok(non_max_suppression(boxes, self.iou_threshold))
    }
}
