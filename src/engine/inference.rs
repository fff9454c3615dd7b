//! Classifier inference - ONNX Runtime integration
//!
//! The `Classifier` trait is the seam between the serving path and the
//! model runtime, so tests can substitute instrumented classifiers and the
//! runtime can be swapped without touching the prediction flow.

use ndarray::Array2;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use parking_lot::Mutex;
use std::path::Path;
use thiserror::Error;

use super::features::{FeatureVector, FEATURE_COUNT};

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("model session error: {0}")]
    Session(String),
    #[error("classifier returned {actual} probabilities for {expected} categories")]
    OutputArity { expected: usize, actual: usize },
}

/// A loaded classifier: feature vector in, probability vector out.
///
/// The output length must equal the class count of the label set the model
/// was trained against.
pub trait Classifier: Send + Sync + std::fmt::Debug {
    fn infer(&self, features: &FeatureVector) -> Result<Vec<f32>, InferenceError>;
}

/// ONNX-backed classifier. The session is guarded because `run` needs
/// exclusive access; contexts themselves are shared read-only.
pub struct OnnxClassifier {
    session: Mutex<Session>,
}

impl std::fmt::Debug for OnnxClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxClassifier").finish_non_exhaustive()
    }
}

impl OnnxClassifier {
    pub fn from_file(path: &Path) -> Result<Self, InferenceError> {
        let session = Session::builder()
            .map_err(|e| InferenceError::Session(format!("failed to create session builder: {e}")))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| InferenceError::Session(format!("failed to set optimization level: {e}")))?
            .commit_from_file(path)
            .map_err(|e| InferenceError::Session(format!("failed to load model: {e}")))?;

        Ok(Self {
            session: Mutex::new(session),
        })
    }
}

impl Classifier for OnnxClassifier {
    fn infer(&self, features: &FeatureVector) -> Result<Vec<f32>, InferenceError> {
        let input_array = Array2::<f32>::from_shape_vec((1, FEATURE_COUNT), features.to_vec())
            .map_err(|e| InferenceError::Session(format!("input shape error: {e}")))?;
        let input_tensor = Value::from_array(input_array)
            .map_err(|e| InferenceError::Session(format!("tensor error: {e}")))?;

        let mut session = self.session.lock();

        let output_name = session
            .outputs()
            .first()
            .map(|o| o.name().to_string())
            .ok_or_else(|| InferenceError::Session("model defines no outputs".to_string()))?;

        let outputs = session
            .run(ort::inputs![input_tensor])
            .map_err(|e| InferenceError::Session(format!("inference failed: {e}")))?;

        let output = outputs
            .get(&output_name)
            .ok_or_else(|| InferenceError::Session("no output tensor".to_string()))?;

        let output_tensor = output
            .try_extract_tensor::<f32>()
            .map_err(|e| InferenceError::Session(format!("extract error: {e}")))?;

        Ok(output_tensor.1.to_vec())
    }
}
