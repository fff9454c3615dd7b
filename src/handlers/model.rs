//! Model upgrade handlers
//!
//! An upgrade is two phases: a synchronous, transactional registry write,
//! then a background build-and-install of the new serving context. A
//! failure in the second phase is logged and leaves the previous model
//! serving; the recorded version stays available for a later activation.

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

use crate::engine::artifact::ArtifactLoader;
use crate::engine::swap;
use crate::models::ModelVersion;
use crate::{AppError, AppResult, AppState};

#[derive(Debug, Serialize)]
pub struct ModelUpdateResponse {
    pub version_id: i64,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ModelStatusResponse {
    pub model_loaded: bool,
    pub version_id: Option<i64>,
    pub categories: Vec<String>,
    pub loaded_at: Option<DateTime<Utc>>,
}

/// Upload a new classifier artifact plus its category file.
///
/// Multipart parts: `model` (.onnx bytes) and `category` (.txt, one name
/// per line). All validation happens before anything is persisted.
pub async fn update(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<ModelUpdateResponse>)> {
    let mut model_bytes = None;
    let mut category_text = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::ValidationError(format!("invalid multipart payload: {e}")))?
    {
        match field.name().map(str::to_owned).as_deref() {
            Some("model") => {
                let filename = field.file_name().unwrap_or_default().to_owned();
                if !has_extension(&filename, "onnx") {
                    return Err(AppError::ValidationError(format!(
                        "invalid file type for 'model': {filename:?}; expected .onnx"
                    )));
                }
                model_bytes = Some(field.bytes().await.map_err(|e| {
                    AppError::ValidationError(format!("failed to read 'model' part: {e}"))
                })?);
            }
            Some("category") => {
                let filename = field.file_name().unwrap_or_default().to_owned();
                if !has_extension(&filename, "txt") {
                    return Err(AppError::ValidationError(format!(
                        "invalid file type for 'category': {filename:?}; expected .txt"
                    )));
                }
                category_text = Some(field.text().await.map_err(|e| {
                    AppError::ValidationError(format!("failed to read 'category' part: {e}"))
                })?);
            }
            _ => {}
        }
    }

    let model_bytes =
        model_bytes.ok_or_else(|| AppError::ValidationError("missing 'model' file part".into()))?;
    if model_bytes.is_empty() {
        return Err(AppError::ValidationError("'model' file is empty".into()));
    }
    let category_text = category_text
        .ok_or_else(|| AppError::ValidationError("missing 'category' file part".into()))?;
    let categories = parse_categories(&category_text)?;

    let stored = state.artifacts.save(&model_bytes)?;
    let version =
        match ModelVersion::record(&state.pool, &stored.location, &stored.sha256, &categories).await
        {
            Ok(version) => version,
            Err(e) => {
                // The registry transaction rolled back; reclaim the artifact
                // so the failed upgrade leaves no orphan on disk.
                state.artifacts.remove(&stored.location);
                return Err(e.into());
            }
        };

    let version_id = version.id;
    tracing::info!(version_id, "model version recorded, activating");

    let slot = Arc::clone(&state.engine);
    let loader: Arc<dyn ArtifactLoader> = state.artifacts.clone();
    let spec = version.activation_spec();
    tokio::spawn(async move {
        if let Err(e) = swap::activate(&slot, loader, spec).await {
            tracing::error!(
                version_id,
                "model activation failed, previous model retained: {e}"
            );
        }
    });

    Ok((
        StatusCode::CREATED,
        Json(ModelUpdateResponse {
            version_id,
            message: "model and categories update initiated",
        }),
    ))
}

/// Report the currently serving model, if any.
pub async fn current(State(state): State<AppState>) -> Json<ModelStatusResponse> {
    match state.engine.snapshot() {
        Some(context) => Json(ModelStatusResponse {
            model_loaded: true,
            version_id: Some(context.version_id),
            categories: context.codec.labels().to_vec(),
            loaded_at: Some(context.loaded_at),
        }),
        None => Json(ModelStatusResponse {
            model_loaded: false,
            version_id: None,
            categories: Vec::new(),
            loaded_at: None,
        }),
    }
}

fn parse_categories(text: &str) -> Result<Vec<String>, AppError> {
    let names: Vec<String> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect();
    if names.is_empty() {
        return Err(AppError::ValidationError("'category' file is empty".into()));
    }
    Ok(names)
}

fn has_extension(filename: &str, extension: &str) -> bool {
    Path::new(filename)
        .extension()
        .map(|e| e.eq_ignore_ascii_case(extension))
        .unwrap_or(false)
}
