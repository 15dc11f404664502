use std::sync::{Arc, Mutex};

use image::RgbImage;
use tch::{CModule, Device, Kind, Tensor};

use crate::config::AppConfig;
use crate::detect::classes::NUM_CLASSES;

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("Model error: {0}")]
    Model(#[from] tch::TchError),
    #[error("Unexpected model output shape {0:?}")]
    OutputShape(Vec<i64>),
}

/// One bounding box from the model, in original-image pixel coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub class_id: usize,
    pub confidence: f32,
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl Detection {
    /// Vertical box center, used to rank detections top to bottom.
    pub fn center_y(&self) -> i32 {
        (self.y1 + self.y2) / 2
    }
}

#[derive(Clone)]
pub struct Detector {
    model: Arc<Mutex<CModule>>,
    device: Device,
    input_size: u32,
    conf_threshold: f32,
    iou_threshold: f32,
}

impl Detector {
    pub fn load(config: &AppConfig) -> Result<Self, InferenceError> {
        let device = Device::cuda_if_available();
        let model = CModule::load_on_device(&config.model_path, device)?;
        Ok(Self {
            model: Arc::new(Mutex::new(model)),
            device,
            input_size: config.input_size,
            conf_threshold: config.conf_threshold,
            iou_threshold: config.iou_threshold,
        })
    }

    /// Run the model on one image and return suppressed detections in
    /// original-image coordinates.
    pub fn inference(&self, image: &RgbImage) -> Result<Vec<Detection>, InferenceError> {
        let input = self.preprocess(image).to_device(self.device);
        let output = self.model.lock().unwrap().forward_ts(&[input])?;

        // YOLO-style export: [batch, 4 + num_classes, num_predictions]
        let size = output.size();
        if size.len() != 3 || size[1] != (4 + NUM_CLASSES) as i64 {
            return Err(InferenceError::OutputShape(size));
        }
        let num_attrs = size[1] as usize;
        let num_preds = size[2] as usize;

        let flat = output.to_kind(Kind::Float).contiguous().view([-1]);
        let mut data = vec![0f32; num_attrs * num_preds];
        flat.copy_data(&mut data, num_attrs * num_preds);

        let scale_x = image.width() as f32 / self.input_size as f32;
        let scale_y = image.height() as f32 / self.input_size as f32;
        let detections = decode_predictions(
            &data,
            num_attrs,
            num_preds,
            self.conf_threshold,
            scale_x,
            scale_y,
            image.width() as i32,
            image.height() as i32,
        );
        Ok(nms(detections, self.iou_threshold))
    }

    fn preprocess(&self, image: &RgbImage) -> Tensor {
        let size = self.input_size;
        let resized =
            image::imageops::resize(image, size, size, image::imageops::FilterType::Triangle);
        let plane = (size * size) as usize;
        let mut chw = vec![0f32; 3 * plane];
        for (x, y, pixel) in resized.enumerate_pixels() {
            let idx = (y * size + x) as usize;
            chw[idx] = pixel[0] as f32 / 255.0;
            chw[plane + idx] = pixel[1] as f32 / 255.0;
            chw[2 * plane + idx] = pixel[2] as f32 / 255.0;
        }
        Tensor::from_slice(&chw).view([1, 3, size as i64, size as i64])
    }
}

fn round4(v: f32) -> f32 {
    (v * 10_000.0).round() / 10_000.0
}

/// Decode a flattened `[num_attrs, num_preds]` prediction grid (cx, cy, w, h,
/// then per-class scores) into boxes in original-image coordinates.
pub(crate) fn decode_predictions(
    data: &[f32],
    num_attrs: usize,
    num_preds: usize,
    conf_threshold: f32,
    scale_x: f32,
    scale_y: f32,
    orig_w: i32,
    orig_h: i32,
) -> Vec<Detection> {
    let num_classes = num_attrs - 4;
    let mut detections = Vec::new();

    for i in 0..num_preds {
        let mut best_score = 0.0f32;
        let mut best_class = 0usize;
        for class_id in 0..num_classes {
            let score = data[(4 + class_id) * num_preds + i];
            if score > best_score {
                best_score = score;
                best_class = class_id;
            }
        }
        if best_score < conf_threshold {
            continue;
        }

        let cx = data[i];
        let cy = data[num_preds + i];
        let w = data[2 * num_preds + i];
        let h = data[3 * num_preds + i];

        let x1 = (((cx - w / 2.0) * scale_x) as i32).clamp(0, orig_w - 1);
        let y1 = (((cy - h / 2.0) * scale_y) as i32).clamp(0, orig_h - 1);
        let x2 = (((cx + w / 2.0) * scale_x) as i32).clamp(0, orig_w - 1);
        let y2 = (((cy + h / 2.0) * scale_y) as i32).clamp(0, orig_h - 1);

        detections.push(Detection {
            class_id: best_class,
            confidence: round4(best_score),
            x1,
            y1,
            x2,
            y2,
        });
    }

    detections
}

/// Greedy class-aware non-maximum suppression.
pub(crate) fn nms(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    let mut kept: Vec<Detection> = Vec::new();
    for det in detections {
        let suppressed = kept
            .iter()
            .any(|k| k.class_id == det.class_id && iou(k, &det) >= iou_threshold);
        if !suppressed {
            kept.push(det);
        }
    }
    kept
}

pub(crate) fn iou(a: &Detection, b: &Detection) -> f32 {
    let x1 = a.x1.max(b.x1) as f32;
    let y1 = a.y1.max(b.y1) as f32;
    let x2 = a.x2.min(b.x2) as f32;
    let y2 = a.y2.min(b.y2) as f32;
    let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let area_a = ((a.x2 - a.x1) * (a.y2 - a.y1)) as f32;
    let area_b = ((b.x2 - b.x1) * (b.y2 - b.y1)) as f32;
    let union = area_a + area_b - intersection;
    if union > 0.0 { intersection / union } else { 0.0 }
}
