//! Engine integration tests
//!
//! Exercises the swap protocol and the full upgrade flow with instrumented
//! classifiers, so provenance of every prediction can be asserted.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;

use crate::db::test_pool;
use crate::models::{ModelVersion, NewPredictionRecord, PredictionRecord};

use super::artifact::{ArtifactError, ArtifactLoader};
use super::context::{ActiveContext, ActiveSlot};
use super::features::FeatureVector;
use super::inference::{Classifier, InferenceError};
use super::keypoints::{KeypointSet, MIN_KEYPOINTS};
use super::labels::LabelCodec;
use super::predict;
use super::swap::{self, ActivationSpec, SwapError};

#[derive(Debug)]
struct FixedClassifier(Vec<f32>);

impl Classifier for FixedClassifier {
    fn infer(&self, _features: &FeatureVector) -> Result<Vec<f32>, InferenceError> {
        Ok(self.0.clone())
    }
}

/// Maps artifact locations to canned probability outputs.
struct ScriptedLoader(HashMap<String, Vec<f32>>);

impl ScriptedLoader {
    fn new(entries: &[(&str, &[f32])]) -> Arc<dyn ArtifactLoader> {
        Arc::new(Self(
            entries
                .iter()
                .map(|(location, probs)| (location.to_string(), probs.to_vec()))
                .collect(),
        ))
    }
}

impl ArtifactLoader for ScriptedLoader {
    fn load(&self, location: &str, _sha256: &str) -> Result<Arc<dyn Classifier>, ArtifactError> {
        self.0
            .get(location)
            .map(|probs| Arc::new(FixedClassifier(probs.clone())) as Arc<dyn Classifier>)
            .ok_or_else(|| ArtifactError::NotFound(location.to_string()))
    }
}

struct FailingLoader;

impl ArtifactLoader for FailingLoader {
    fn load(&self, _location: &str, _sha256: &str) -> Result<Arc<dyn Classifier>, ArtifactError> {
        Err(ArtifactError::Load("corrupt artifact".to_string()))
    }
}

fn sample_keypoints() -> KeypointSet {
    KeypointSet(
        (0..MIN_KEYPOINTS + 1)
            .map(|i| [0.1 + 0.05 * i as f32, 0.2 + 0.03 * i as f32, 0.9])
            .collect(),
    )
}

fn context(version_id: i64, probabilities: Vec<f32>, names: &[&str]) -> ActiveContext {
    ActiveContext {
        version_id,
        classifier: Arc::new(FixedClassifier(probabilities)),
        codec: LabelCodec::new(names.iter().map(|s| s.to_string())).unwrap(),
        loaded_at: Utc::now(),
    }
}

fn spec(version_id: i64, location: &str, categories: &[&str]) -> ActivationSpec {
    ActivationSpec {
        version_id,
        location: location.to_string(),
        sha256: "00".to_string(),
        categories: categories.iter().map(|s| s.to_string()).collect(),
    }
}

#[tokio::test]
async fn failed_activation_keeps_previous_context() {
    let slot = ActiveSlot::empty();
    let loader = ScriptedLoader::new(&[("stub:v1", &[0.9, 0.1][..])]);
    swap::activate(&slot, loader, spec(1, "stub:v1", &["idle", "walk"]))
        .await
        .unwrap();

    let err = swap::activate(&slot, Arc::new(FailingLoader), spec(2, "stub:v2", &["run"]))
        .await
        .unwrap_err();
    assert!(matches!(err, SwapError::Artifact(ArtifactError::Load(_))));

    let snapshot = slot.snapshot().unwrap();
    assert_eq!(snapshot.version_id, 1, "old context must keep serving");
}

#[tokio::test]
async fn arity_mismatch_aborts_the_swap() {
    let slot = ActiveSlot::empty();
    let loader = ScriptedLoader::new(&[("stub:v1", &[0.9, 0.1][..])]);

    let err = swap::activate(&slot, loader, spec(1, "stub:v1", &["a", "b", "c"]))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SwapError::ArityMismatch { expected: 3, actual: 2 }
    ));
    assert!(slot.snapshot().is_none(), "nothing may be installed");
}

#[tokio::test]
async fn blank_category_aborts_before_any_load() {
    let slot = ActiveSlot::empty();

    let err = swap::activate(
        &slot,
        Arc::new(FailingLoader),
        spec(1, "stub:v1", &["idle", " "]),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, SwapError::Codec(_)));
    assert!(slot.snapshot().is_none());
}

/// Concurrent predictions racing with repeated swaps must always observe a
/// matched {classifier, codec} pair. Each version's classifier output is
/// instrumented so a torn pair would either misdecode or fail the arity
/// check inside `classify`.
#[test]
fn swaps_never_yield_mismatched_pairs() {
    let slot = Arc::new(ActiveSlot::empty());
    slot.install(context(1, vec![0.9, 0.1], &["idle", "walk"]));

    let stop = Arc::new(AtomicBool::new(false));
    let keypoints = sample_keypoints();

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let slot = Arc::clone(&slot);
            let stop = Arc::clone(&stop);
            let keypoints = keypoints.clone();
            std::thread::spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    let p = predict::run(&slot, &keypoints)
                        .expect("a matched pair can never fail");
                    match p.version_id {
                        1 => {
                            assert_eq!(p.category, "idle");
                            assert!((p.confidence - 0.9).abs() < 1e-6);
                        }
                        2 => {
                            assert_eq!(p.category, "stretch");
                            assert!((p.confidence - 0.7).abs() < 1e-6);
                        }
                        other => panic!("unknown version {other}"),
                    }
                }
            })
        })
        .collect();

    for round in 0..500 {
        if round % 2 == 0 {
            slot.install(context(2, vec![0.1, 0.2, 0.7], &["lunge", "squat", "stretch"]));
        } else {
            slot.install(context(1, vec![0.9, 0.1], &["idle", "walk"]));
        }
        std::thread::yield_now();
    }

    stop.store(true, Ordering::Relaxed);
    for reader in readers {
        reader.join().unwrap();
    }
}

/// The full upgrade scenario: record v1, serve, record v2, serve, and the
/// ledger holds both predictions in call order.
#[tokio::test]
async fn end_to_end_upgrade_scenario() {
    let pool = test_pool().await;
    let slot = ActiveSlot::empty();
    let loader = ScriptedLoader::new(&[
        ("stub:v1", &[0.9, 0.1][..]),
        ("stub:v2", &[0.2, 0.8][..]),
    ]);

    let v1 = ModelVersion::record(
        &pool,
        "stub:v1",
        "aaaa",
        &["idle".to_string(), "walk".to_string()],
    )
    .await
    .unwrap();
    swap::activate(&slot, Arc::clone(&loader), v1.activation_spec())
        .await
        .unwrap();

    let keypoints = sample_keypoints();
    let first = predict::run(&slot, &keypoints).unwrap();
    assert_eq!(first.category, "idle");
    assert!((first.confidence - 0.9).abs() < 1e-6);
    PredictionRecord::append(&pool, record_of(&first, &keypoints))
        .await
        .unwrap();

    let v2 = ModelVersion::record(
        &pool,
        "stub:v2",
        "bbbb",
        &["run".to_string(), "idle".to_string()],
    )
    .await
    .unwrap();
    assert!(v2.id > v1.id, "version ids are monotonic");
    swap::activate(&slot, loader, v2.activation_spec())
        .await
        .unwrap();

    // Codec order for v2 is ["idle", "run"], so [0.2, 0.8] decodes to "run".
    let second = predict::run(&slot, &keypoints).unwrap();
    assert_eq!(second.category, "run");
    assert!((second.confidence - 0.8).abs() < 1e-6);
    assert_eq!(second.version_id, v2.id);
    PredictionRecord::append(&pool, record_of(&second, &keypoints))
        .await
        .unwrap();

    let history = PredictionRecord::list_all(&pool).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].category, "idle");
    assert_eq!(history[1].category, "run");
    assert!(history[0].id < history[1].id);
    assert_eq!(history[0].probabilities.0, vec![0.9, 0.1]);
    assert_eq!(history[1].probabilities.0, vec![0.2, 0.8]);
}

fn record_of(prediction: &predict::Prediction, keypoints: &KeypointSet) -> NewPredictionRecord {
    NewPredictionRecord {
        probabilities: prediction.probabilities.clone(),
        category: prediction.category.clone(),
        confidence: prediction.confidence,
        prediction_time: prediction.latency_seconds,
        keypoints: keypoints.0.clone(),
    }
}
