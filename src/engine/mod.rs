//! Pose classification engine
//!
//! The core pipeline: keypoints → features → classifier → category, plus
//! the atomically swappable model slot that lets a new classifier/codec
//! pair replace the serving one without blocking in-flight predictions.

pub mod artifact;
pub mod context;
pub mod features;
pub mod inference;
pub mod keypoints;
pub mod labels;
pub mod predict;
pub mod swap;

pub use context::{ActiveContext, ActiveSlot};
pub use features::{FeatureVector, FEATURE_COUNT};
pub use inference::Classifier;
pub use keypoints::KeypointSet;
pub use labels::LabelCodec;

#[cfg(test)]
mod tests;
