//! Prediction history handler

use axum::{extract::State, Json};
use serde::Serialize;

use crate::models::PredictionRecord;
use crate::{AppResult, AppState};

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub count: usize,
    pub histories: Vec<PredictionRecord>,
}

/// All prediction records, in insertion order.
pub async fn list(State(state): State<AppState>) -> AppResult<Json<HistoryResponse>> {
    let histories = PredictionRecord::list_all(&state.pool).await?;
    Ok(Json(HistoryResponse {
        count: histories.len(),
        histories,
    }))
}
