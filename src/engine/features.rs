//! Feature extraction
//!
//! Turns a normalized keypoint set into the fixed-length numeric vector the
//! classifier was trained on. Pure function: no I/O, no randomness, no
//! suspension points.

use super::keypoints::{joint, ExtractError, KeypointSet, MIN_KEYPOINTS};

pub const FEATURE_COUNT: usize = 9;

/// Classifier input vector. The entry order is the model input schema: a
/// classifier must have been trained against exactly this layout, and any
/// change to the formula set requires a newly trained model.
pub type FeatureVector = [f32; FEATURE_COUNT];

/// Extract the feature vector from raw keypoints.
///
/// Entries, in order: shoulder width, hip width, shoulder-to-hip,
/// shoulder/hip/shoulder angle, elbow-to-wrist, shoulder-to-waist,
/// hip-to-ankle, elbow/wrist/shoulder angle, shoulder/hip/knee angle.
pub fn extract(keypoints: &KeypointSet) -> Result<FeatureVector, ExtractError> {
    if keypoints.len() < MIN_KEYPOINTS {
        return Err(ExtractError::MalformedInput(format!(
            "expected at least {MIN_KEYPOINTS} keypoints, got {}",
            keypoints.len()
        )));
    }
    let kp = keypoints.normalized()?;

    let l_shoulder = kp.point(joint::LEFT_SHOULDER);
    let r_shoulder = kp.point(joint::RIGHT_SHOULDER);
    let l_elbow = kp.point(joint::LEFT_ELBOW);
    let l_wrist = kp.point(joint::LEFT_WRIST);
    let l_hip = kp.point(joint::LEFT_HIP);
    let r_hip = kp.point(joint::RIGHT_HIP);
    let l_knee = kp.point(joint::LEFT_KNEE);
    let l_ankle = kp.point(joint::LEFT_ANKLE);

    Ok([
        distance(l_shoulder, r_shoulder),
        distance(l_hip, r_hip),
        distance(l_shoulder, l_hip),
        angle(l_shoulder, l_hip, r_shoulder),
        distance(l_elbow, l_wrist),
        // waist reference shares the shoulder/hip joints with entry #3
        distance(l_shoulder, l_hip),
        distance(l_hip, l_ankle),
        angle(l_elbow, l_wrist, l_shoulder),
        angle(l_shoulder, l_hip, l_knee),
    ])
}

fn distance(a: [f32; 2], b: [f32; 2]) -> f32 {
    ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2)).sqrt()
}

/// Signed planar angle between the vectors `p1 - vertex` and `p3 - vertex`.
fn angle(p1: [f32; 2], vertex: [f32; 2], p3: [f32; 2]) -> f32 {
    let a = [p1[0] - vertex[0], p1[1] - vertex[1]];
    let b = [p3[0] - vertex[0], p3[1] - vertex[1]];
    b[1].atan2(b[0]) - a[1].atan2(a[0])
}
