//! Prediction history ledger
//!
//! Append-only record of served predictions. Bulk fields (probability
//! vector, raw keypoints) are stored as JSON text so they read back as the
//! same numeric values they were written with.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::types::Json;
use sqlx::{FromRow, SqlitePool};

use crate::engine::keypoints::Keypoint;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PredictionRecord {
    pub id: i64,
    pub probabilities: Json<Vec<f32>>,
    pub category: String,
    pub confidence: f32,
    /// Seconds spent in classifier inference only.
    pub prediction_time: f64,
    pub keypoints: Json<Vec<Keypoint>>,
    pub created_at: DateTime<Utc>,
}

/// Fields of a record before it is assigned an id and timestamp.
#[derive(Debug, Clone)]
pub struct NewPredictionRecord {
    pub probabilities: Vec<f32>,
    pub category: String,
    pub confidence: f32,
    pub prediction_time: f64,
    pub keypoints: Vec<Keypoint>,
}

impl PredictionRecord {
    /// Append one immutable record. Past rows are never touched.
    pub async fn append(
        pool: &SqlitePool,
        record: NewPredictionRecord,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r#"
            INSERT INTO prediction_history
                (probabilities, category, confidence, prediction_time, keypoints, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            RETURNING id, probabilities, category, confidence, prediction_time, keypoints, created_at
            "#,
        )
        .bind(Json(record.probabilities))
        .bind(&record.category)
        .bind(record.confidence)
        .bind(record.prediction_time)
        .bind(Json(record.keypoints))
        .bind(Utc::now())
        .fetch_one(pool)
        .await
    }

    /// Every record, in insertion order.
    pub async fn list_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT id, probabilities, category, confidence, prediction_time, keypoints, created_at
            FROM prediction_history
            ORDER BY id
            "#,
        )
        .fetch_all(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    fn sample() -> NewPredictionRecord {
        NewPredictionRecord {
            probabilities: vec![0.123456789, 0.5, 0.376543211],
            category: "idle".to_string(),
            confidence: 0.5,
            prediction_time: 0.004213,
            keypoints: vec![[0.123456, -7.25, 0.5], [1.0, 2.0, 0.99]],
        }
    }

    #[tokio::test]
    async fn bulk_fields_round_trip_losslessly() {
        let pool = test_pool().await;
        let written = sample();
        PredictionRecord::append(&pool, written.clone()).await.unwrap();

        let read = &PredictionRecord::list_all(&pool).await.unwrap()[0];
        assert_eq!(read.probabilities.0, written.probabilities);
        assert_eq!(read.keypoints.0, written.keypoints);
        assert_eq!(read.category, written.category);
        assert_eq!(read.confidence, written.confidence);
        assert_eq!(read.prediction_time, written.prediction_time);
    }

    #[tokio::test]
    async fn list_all_preserves_insertion_order() {
        let pool = test_pool().await;
        for category in ["first", "second", "third"] {
            let mut record = sample();
            record.category = category.to_string();
            PredictionRecord::append(&pool, record).await.unwrap();
        }

        let history = PredictionRecord::list_all(&pool).await.unwrap();
        let categories: Vec<_> = history.iter().map(|r| r.category.as_str()).collect();
        assert_eq!(categories, ["first", "second", "third"]);
        assert!(history.windows(2).all(|w| w[0].id < w[1].id));
    }
}
