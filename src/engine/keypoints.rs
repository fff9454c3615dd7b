//! Keypoint input handling
//!
//! Raw detector output is an ordered list of body-joint samples in MoveNet
//! order. The extractor only touches a fixed subset of joints, so the set
//! must be at least long enough to cover the highest referenced index.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Joint indices in MoveNet keypoint order.
pub mod joint {
    pub const LEFT_SHOULDER: usize = 5;
    pub const RIGHT_SHOULDER: usize = 6;
    pub const LEFT_ELBOW: usize = 7;
    pub const LEFT_WRIST: usize = 9;
    pub const LEFT_HIP: usize = 11;
    pub const RIGHT_HIP: usize = 12;
    pub const LEFT_KNEE: usize = 13;
    pub const LEFT_ANKLE: usize = 15;
}

/// Minimum number of keypoints the extractor can work with.
pub const MIN_KEYPOINTS: usize = joint::LEFT_ANKLE + 1;

/// One body-joint sample: `(x, y, score)`.
pub type Keypoint = [f32; 3];

#[derive(Debug, Error, PartialEq)]
pub enum ExtractError {
    #[error("malformed keypoint input: {0}")]
    MalformedInput(String),
    #[error("degenerate keypoint input: coordinate maximum is zero")]
    DegenerateInput,
}

/// Ordered set of detected keypoints for one body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeypointSet(pub Vec<Keypoint>);

impl KeypointSet {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Divide every component by the single global maximum across the set.
    ///
    /// A maximum of exactly zero has no defined scale and is rejected
    /// rather than allowed to produce NaN downstream.
    pub fn normalized(&self) -> Result<KeypointSet, ExtractError> {
        if self.0.is_empty() {
            return Err(ExtractError::MalformedInput("empty keypoint set".into()));
        }
        let max = self
            .0
            .iter()
            .flat_map(|kp| kp.iter())
            .copied()
            .fold(f32::NEG_INFINITY, f32::max);
        if max == 0.0 {
            return Err(ExtractError::DegenerateInput);
        }
        Ok(KeypointSet(
            self.0
                .iter()
                .map(|kp| [kp[0] / max, kp[1] / max, kp[2] / max])
                .collect(),
        ))
    }

    /// 2-D projection of one joint. Callers check bounds via `MIN_KEYPOINTS`.
    pub(crate) fn point(&self, index: usize) -> [f32; 2] {
        let kp = &self.0[index];
        [kp[0], kp[1]]
    }
}

impl From<Vec<Keypoint>> for KeypointSet {
    fn from(keypoints: Vec<Keypoint>) -> Self {
        KeypointSet(keypoints)
    }
}
