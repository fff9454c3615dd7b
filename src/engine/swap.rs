//! Swap protocol
//!
//! A new context is built entirely off to the side: artifact load and codec
//! construction never touch the slot that is serving traffic. Only once the
//! replacement is complete and its output arity matches the codec does it
//! get installed, in a single atomic store. Any failure on the way leaves
//! the previous context serving.

use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;

use super::artifact::{ArtifactError, ArtifactLoader};
use super::context::{ActiveContext, ActiveSlot};
use super::features::FEATURE_COUNT;
use super::inference::InferenceError;
use super::labels::{CodecError, LabelCodec};

/// Everything needed to build and install a context for one model version.
#[derive(Debug, Clone)]
pub struct ActivationSpec {
    pub version_id: i64,
    pub location: String,
    pub sha256: String,
    pub categories: Vec<String>,
}

#[derive(Debug, Error)]
pub enum SwapError {
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Inference(#[from] InferenceError),
    #[error("classifier produces {actual} outputs for {expected} categories")]
    ArityMismatch { expected: usize, actual: usize },
}

/// Load a version's classifier, pair it with its codec, and install the
/// pair atomically. On error the slot is untouched.
pub async fn activate(
    slot: &ActiveSlot,
    loader: Arc<dyn ArtifactLoader>,
    spec: ActivationSpec,
) -> Result<(), SwapError> {
    let codec = LabelCodec::new(spec.categories)?;

    let location = spec.location.clone();
    let sha256 = spec.sha256.clone();
    let loaded =
        tokio::task::spawn_blocking(move || loader.load(&location, &sha256)).await;
    let classifier = match loaded {
        Ok(result) => result?,
        Err(e) => {
            return Err(SwapError::Artifact(ArtifactError::Load(format!(
                "loader task aborted: {e}"
            ))))
        }
    };

    // Probe inference doubles as a warmup and proves the artifact was
    // trained against a label set of this size.
    let probe = classifier.infer(&[0.0; FEATURE_COUNT])?;
    if probe.len() != codec.len() {
        return Err(SwapError::ArityMismatch {
            expected: codec.len(),
            actual: probe.len(),
        });
    }

    slot.install(ActiveContext {
        version_id: spec.version_id,
        classifier,
        codec,
        loaded_at: Utc::now(),
    });
    tracing::info!(version_id = spec.version_id, "model version activated");
    Ok(())
}
