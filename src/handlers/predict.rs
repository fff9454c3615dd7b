//! Prediction handler

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::engine::keypoints::{Keypoint, KeypointSet};
use crate::engine::predict;
use crate::models::{NewPredictionRecord, PredictionRecord};
use crate::{AppError, AppResult, AppState};

#[derive(Debug, Deserialize, Validate)]
pub struct PredictRequest {
    #[validate(length(min = 16, message = "at least 16 keypoints are required"))]
    pub keypoints: Vec<Keypoint>,
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub prediction: String,
    pub confidence: f32,
    pub prediction_time: f64,
}

/// Classify one keypoint set against the active model.
pub async fn predict(
    State(state): State<AppState>,
    Json(req): Json<PredictRequest>,
) -> AppResult<Json<PredictResponse>> {
    req.validate()
        .map_err(|e| AppError::ValidationError(e.to_string()))?;

    let keypoints = KeypointSet::from(req.keypoints);
    let outcome = predict::run(&state.engine, &keypoints)?;

    tracing::info!(
        category = %outcome.category,
        confidence = outcome.confidence,
        prediction_time = outcome.latency_seconds,
        version_id = outcome.version_id,
        "prediction served"
    );

    // History is an audit side effect; it must never block or fail the
    // caller's response.
    let record = NewPredictionRecord {
        probabilities: outcome.probabilities.clone(),
        category: outcome.category.clone(),
        confidence: outcome.confidence,
        prediction_time: outcome.latency_seconds,
        keypoints: keypoints.0,
    };
    let pool = state.pool.clone();
    tokio::spawn(async move {
        if let Err(e) = PredictionRecord::append(&pool, record).await {
            tracing::error!("failed to store prediction history: {}", e);
        }
    });

    Ok(Json(PredictResponse {
        prediction: outcome.category,
        confidence: outcome.confidence,
        prediction_time: outcome.latency_seconds,
    }))
}
