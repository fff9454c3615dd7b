//! Artifact storage
//!
//! Model artifacts live on disk under the configured model directory. Each
//! saved artifact gets a uuid filename and a sha256 checksum; the checksum
//! is recorded alongside the version row and re-verified before any load,
//! so a corrupted or substituted file can never reach the serving slot.

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use super::inference::{Classifier, OnnxClassifier};

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact not found: {0}")]
    NotFound(String),
    #[error("artifact checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },
    #[error("artifact io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to load classifier: {0}")]
    Load(String),
}

/// Resolves an opaque artifact location into a ready classifier.
pub trait ArtifactLoader: Send + Sync {
    fn load(&self, location: &str, sha256: &str) -> Result<Arc<dyn Classifier>, ArtifactError>;
}

pub struct StoredArtifact {
    pub location: String,
    pub sha256: String,
}

pub struct DiskArtifactStore {
    dir: PathBuf,
}

impl DiskArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, ArtifactError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Write artifact bytes under a fresh uuid filename.
    pub fn save(&self, bytes: &[u8]) -> Result<StoredArtifact, ArtifactError> {
        let path = self.dir.join(format!("model-{}.onnx", Uuid::new_v4()));
        std::fs::write(&path, bytes)?;
        Ok(StoredArtifact {
            location: path.to_string_lossy().into_owned(),
            sha256: sha256_hex(bytes),
        })
    }

    /// Best-effort removal, used to reclaim an artifact whose registry
    /// transaction failed.
    pub fn remove(&self, location: &str) {
        if let Err(e) = std::fs::remove_file(location) {
            tracing::warn!("failed to remove orphaned artifact {location}: {e}");
        }
    }
}

impl ArtifactLoader for DiskArtifactStore {
    fn load(&self, location: &str, sha256: &str) -> Result<Arc<dyn Classifier>, ArtifactError> {
        let path = Path::new(location);
        if !path.exists() {
            return Err(ArtifactError::NotFound(location.to_string()));
        }
        let bytes = std::fs::read(path)?;
        let actual = sha256_hex(&bytes);
        if !actual.eq_ignore_ascii_case(sha256) {
            return Err(ArtifactError::ChecksumMismatch {
                expected: sha256.to_string(),
                actual,
            });
        }
        let classifier =
            OnnxClassifier::from_file(path).map_err(|e| ArtifactError::Load(e.to_string()))?;
        Ok(Arc::new(classifier))
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
