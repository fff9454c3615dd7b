//! Model version registry
//!
//! Durable, append-only catalog of classifier generations. Versions are
//! never mutated or deleted; `latest` is the single source of truth for
//! what should be serving.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};

use crate::engine::swap::ActivationSpec;

#[derive(Debug, Clone, FromRow)]
struct VersionRow {
    id: i64,
    artifact_path: String,
    sha256: String,
    created_at: DateTime<Utc>,
}

/// One immutable generation: artifact handle plus its label set.
#[derive(Debug, Clone, Serialize)]
pub struct ModelVersion {
    pub id: i64,
    pub artifact_path: String,
    pub sha256: String,
    pub created_at: DateTime<Utc>,
    pub categories: Vec<String>,
}

impl ModelVersion {
    /// Persist a new version and its categories as a single transaction.
    ///
    /// Nothing becomes visible to `latest` unless every row lands; SQLite's
    /// single-writer transactions serialize concurrent `record` calls.
    pub async fn record(
        pool: &SqlitePool,
        artifact_path: &str,
        sha256: &str,
        categories: &[String],
    ) -> Result<Self, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let now = Utc::now();

        let row: VersionRow = sqlx::query_as(
            r#"
            INSERT INTO model_versions (artifact_path, sha256, created_at)
            VALUES (?1, ?2, ?3)
            RETURNING id, artifact_path, sha256, created_at
            "#,
        )
        .bind(artifact_path)
        .bind(sha256)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        for name in categories {
            sqlx::query(
                "INSERT INTO model_categories (version_id, name, created_at) VALUES (?1, ?2, ?3)",
            )
            .bind(row.id)
            .bind(name.as_str())
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(Self::from_parts(row, categories.to_vec()))
    }

    /// Most recently recorded version, if any.
    pub async fn latest(pool: &SqlitePool) -> Result<Option<Self>, sqlx::Error> {
        let row: Option<VersionRow> = sqlx::query_as(
            "SELECT id, artifact_path, sha256, created_at FROM model_versions ORDER BY id DESC LIMIT 1",
        )
        .fetch_optional(pool)
        .await?;

        match row {
            Some(row) => Ok(Some(Self::with_categories(pool, row).await?)),
            None => Ok(None),
        }
    }

    async fn with_categories(pool: &SqlitePool, row: VersionRow) -> Result<Self, sqlx::Error> {
        let categories: Vec<String> =
            sqlx::query_scalar("SELECT name FROM model_categories WHERE version_id = ?1 ORDER BY id")
                .bind(row.id)
                .fetch_all(pool)
                .await?;
        Ok(Self::from_parts(row, categories))
    }

    fn from_parts(row: VersionRow, categories: Vec<String>) -> Self {
        Self {
            id: row.id,
            artifact_path: row.artifact_path,
            sha256: row.sha256,
            created_at: row.created_at,
            categories,
        }
    }

    pub fn activation_spec(&self) -> ActivationSpec {
        ActivationSpec {
            version_id: self.id,
            location: self.artifact_path.clone(),
            sha256: self.sha256.clone(),
            categories: self.categories.clone(),
        }
    }
}
