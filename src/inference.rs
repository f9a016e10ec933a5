//! Gesture classification on camera frames.
//!
//! The classifier is an ONNX export of the trained Keras model. It takes one
//! NHWC image (`1 x 128 x 128 x 3`, RGB, `f32`) and returns one softmax score
//! per gesture class.

use std::path::Path;

use image::imageops::{self, FilterType};
use image::RgbImage;
use log::info;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;

use crate::config::InferenceConfig;
use crate::dataset::GestureClass;
use crate::error::{GestureError, Result};

#[derive(Clone, Debug, PartialEq)]
pub struct Prediction {
    pub class: GestureClass,
    /// Score of `class`, in percent.
    pub confidence: f32,
    pub scores: Vec<f32>,
}

impl Prediction {
    pub fn from_scores(scores: &[f32]) -> Result<Self> {
        if scores.len() != GestureClass::ALL.len() {
            return Err(GestureError::Inference(format!(
                "expected {} scores, model returned {}",
                GestureClass::ALL.len(),
                scores.len()
            )));
        }
        // First maximum wins on ties.
        let (index, best) = scores
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, s)| !s.is_nan())
            .fold(None, |best: Option<(usize, f32)>, (i, s)| match best {
                Some((_, b)) if b >= s => best,
                _ => Some((i, s)),
            })
            .ok_or_else(|| GestureError::Inference("scores are not numbers".to_string()))?;
        let class = GestureClass::from_index(index)
            .ok_or_else(|| GestureError::Inference(format!("no gesture class for output {index}")))?;

        Ok(Self { class, confidence: best * 100.0, scores: scores.to_vec() })
    }

    pub fn is_confident(&self, threshold: f32) -> bool {
        self.confidence > threshold
    }
}

/// Runs inference on a frame.
pub trait Classifier {
    fn classify(&mut self, image: &RgbImage) -> Result<Prediction>;
}

/// Resizes to the model input and flattens to NHWC, scaling each channel value.
pub fn preprocess(image: &RgbImage, width: u32, height: u32, scale: f32) -> Vec<f32> {
    let resized = if image.dimensions() == (width, height) {
        image.clone()
    } else {
        imageops::resize(image, width, height, FilterType::Triangle)
    };
    resized.into_raw().into_iter().map(|v| v as f32 * scale).collect()
}

pub struct OnnxClassifier {
    session: Session,
    input_name: String,
    input_width: u32,
    input_height: u32,
    input_scale: f32,
}

impl OnnxClassifier {
    pub fn load(config: &InferenceConfig) -> Result<Self> {
        if !config.model_path.is_file() {
            return Err(GestureError::ModelLoad {
                path: config.model_path.clone(),
                reason: "no such file".to_string(),
            });
        }
        let session = Self::build_session(&config.model_path).map_err(|e| GestureError::ModelLoad {
            path: config.model_path.clone(),
            reason: e.to_string(),
        })?;
        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .ok_or_else(|| GestureError::ModelLoad {
                path: config.model_path.clone(),
                reason: "model declares no inputs".to_string(),
            })?;
        info!("Model {} loaded, input '{}'", config.model_path.display(), input_name);

        Ok(Self {
            session,
            input_name,
            input_width: config.input_width,
            input_height: config.input_height,
            input_scale: config.input_scale,
        })
    }

    fn build_session(path: &Path) -> ort::Result<Session> {
        Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .commit_from_file(path)
    }
}

impl Classifier for OnnxClassifier {
    fn classify(&mut self, image: &RgbImage) -> Result<Prediction> {
        let data = preprocess(image, self.input_width, self.input_height, self.input_scale);
        let shape = [1usize, self.input_height as usize, self.input_width as usize, 3];
        let input = Tensor::from_array((shape, data)).map_err(|e| GestureError::Inference(e.to_string()))?;

        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => input])
            .map_err(|e| GestureError::Inference(e.to_string()))?;
        let (_, scores) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| GestureError::Inference(e.to_string()))?;

        Prediction::from_scores(scores)
    }
}
