//! Prediction orchestration
//!
//! Snapshot the active context, extract features, time the inference call,
//! and decode the winning class. The snapshot pins one {classifier, codec}
//! pair for the whole request regardless of concurrent swaps.

use std::time::Instant;
use thiserror::Error;

use super::context::{ActiveContext, ActiveSlot};
use super::features;
use super::inference::InferenceError;
use super::keypoints::{ExtractError, KeypointSet};

#[derive(Debug, Error)]
pub enum PredictError {
    #[error("no classifier is active")]
    Unavailable,
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error(transparent)]
    Inference(#[from] InferenceError),
}

#[derive(Debug, Clone)]
pub struct Prediction {
    pub category: String,
    pub confidence: f32,
    pub probabilities: Vec<f32>,
    /// Wall-clock seconds spent strictly inside classifier inference.
    pub latency_seconds: f64,
    pub version_id: i64,
}

pub fn run(slot: &ActiveSlot, keypoints: &KeypointSet) -> Result<Prediction, PredictError> {
    let context = slot.snapshot().ok_or(PredictError::Unavailable)?;
    classify(&context, keypoints)
}

pub fn classify(
    context: &ActiveContext,
    keypoints: &KeypointSet,
) -> Result<Prediction, PredictError> {
    let features = features::extract(keypoints)?;

    let start = Instant::now();
    let probabilities = context.classifier.infer(&features)?;
    let latency_seconds = start.elapsed().as_secs_f64();

    if probabilities.len() != context.codec.len() {
        return Err(PredictError::Inference(InferenceError::OutputArity {
            expected: context.codec.len(),
            actual: probabilities.len(),
        }));
    }

    // Arity check above guarantees the winning index decodes.
    let (index, confidence) = argmax(&probabilities)
        .ok_or_else(|| InferenceError::Session("empty probability vector".to_string()))?;
    let category = context
        .codec
        .decode(index)
        .ok_or_else(|| InferenceError::Session("class index out of range".to_string()))?
        .to_string();

    Ok(Prediction {
        category,
        confidence,
        probabilities,
        latency_seconds,
        version_id: context.version_id,
    })
}

/// Index and value of the maximum entry; ties keep the lowest index.
fn argmax(probabilities: &[f32]) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for (index, &p) in probabilities.iter().enumerate() {
        match best {
            None => best = Some((index, p)),
            Some((_, top)) if p > top => best = Some((index, p)),
            _ => {}
        }
    }
    best
}
