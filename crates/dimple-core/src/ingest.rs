//! Ingestion pipeline: load CSV → build embedding text → embed → upload.
//!
//! All or nothing up to the upload: an empty catalog, a duplicate id or any failed
//! embedding aborts the run before a single document is sent.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use futures::stream::{self, StreamExt, TryStreamExt};

use crate::catalog::{load_catalog, LoadError};
use crate::embedding_text::embedding_texts;
use crate::provider::{DocumentStatus, DocumentUploader, EmbeddingProvider, ProviderError};
use crate::record::GolfBall;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestOptions {
    /// Vector length every embedding must have.
    pub dimensions: usize,
    /// Embedding requests in flight at once. Results keep input order regardless.
    pub embed_concurrency: usize,
}

impl IngestOptions {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            embed_concurrency: 1,
        }
    }

    pub fn with_embed_concurrency(mut self, n: usize) -> Self {
        self.embed_concurrency = n.max(1);
        self
    }
}

/// Pipeline stages, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestStage {
    Loaded,
    Embedding,
    Uploaded,
}

impl fmt::Display for IngestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IngestStage::Loaded => "loaded",
            IngestStage::Embedding => "embedding",
            IngestStage::Uploaded => "uploaded",
        })
    }
}

/// Outcome of a completed ingestion.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestReport {
    /// Records sent in the upload batch.
    pub records: usize,
    /// What the service said about each document.
    pub statuses: Vec<DocumentStatus>,
}

impl IngestReport {
    /// Documents the service accepted.
    pub fn accepted(&self) -> usize {
        self.statuses.iter().filter(|s| s.succeeded).count()
    }

    /// Documents the service rejected.
    pub fn failures(&self) -> Vec<&DocumentStatus> {
        self.statuses.iter().filter(|s| !s.succeeded).collect()
    }

    pub fn is_complete(&self) -> bool {
        self.accepted() == self.records
    }
}

/// Runs the full pipeline for the catalog at `csv_path`.
pub async fn ingest_catalog<E, U>(
    csv_path: &Path,
    embedder: &E,
    uploader: &U,
    options: &IngestOptions,
) -> Result<IngestReport, IngestError>
where
    E: EmbeddingProvider + ?Sized,
    U: DocumentUploader + ?Sized,
{
    let balls = load_catalog(csv_path)?;
    tracing::info!(
        stage = %IngestStage::Loaded,
        records = balls.len(),
        path = %csv_path.display(),
        "catalog loaded"
    );

    ingest_records(balls, embedder, uploader, options).await
}

/// Embeds and uploads already-loaded records. `balls` must be non-empty.
pub async fn ingest_records<E, U>(
    mut balls: Vec<GolfBall>,
    embedder: &E,
    uploader: &U,
    options: &IngestOptions,
) -> Result<IngestReport, IngestError>
where
    E: EmbeddingProvider + ?Sized,
    U: DocumentUploader + ?Sized,
{
    if balls.is_empty() {
        return Err(IngestError::NoRecords);
    }
    ensure_unique_ids(&balls)?;

    tracing::info!(
        stage = %IngestStage::Embedding,
        records = balls.len(),
        concurrency = options.embed_concurrency,
        "generating embeddings"
    );
    let vectors = embed_all(embedder, &embedding_texts(&balls), options).await?;
    for (ball, vector) in balls.iter_mut().zip(vectors) {
        ball.vector_content = vector;
    }

    let statuses = uploader.upload_batch(&balls).await.map_err(IngestError::Upload)?;
    let report = IngestReport {
        records: balls.len(),
        statuses,
    };
    for failure in report.failures() {
        tracing::warn!(
            key = %failure.key,
            status = failure.status_code,
            error = failure.error_message.as_deref().unwrap_or(""),
            "document rejected"
        );
    }
    tracing::info!(
        stage = %IngestStage::Uploaded,
        records = report.records,
        accepted = report.accepted(),
        "batch uploaded"
    );
    Ok(report)
}

/// One embedding per text, in input order. The first failure by input order wins.
async fn embed_all<E>(
    embedder: &E,
    texts: &[String],
    options: &IngestOptions,
) -> Result<Vec<Vec<f32>>, IngestError>
where
    E: EmbeddingProvider + ?Sized,
{
    let dimensions = options.dimensions;
    stream::iter(texts.iter().enumerate())
        .map(move |(i, text)| async move {
            let record = i + 1;
            let vector = embedder
                .embed(text)
                .await
                .map_err(|source| IngestError::Embedding { record, source })?;
            if vector.len() != dimensions {
                return Err(IngestError::DimensionMismatch {
                    record,
                    expected: dimensions,
                    actual: vector.len(),
                });
            }
            tracing::debug!(record, "embedded");
            Ok(vector)
        })
        .buffered(options.embed_concurrency.max(1))
        .try_collect()
        .await
}

fn ensure_unique_ids(balls: &[GolfBall]) -> Result<(), IngestError> {
    let mut seen = HashSet::with_capacity(balls.len());
    for ball in balls {
        if !seen.insert(ball.id.as_str()) {
            return Err(IngestError::DuplicateId(ball.id.clone()));
        }
    }
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("load error: {0}")]
    Load(#[from] LoadError),
    #[error("no records to ingest")]
    NoRecords,
    #[error("duplicate document id in batch: {0}")]
    DuplicateId(String),
    #[error("embedding failed for record {record}: {source}")]
    Embedding { record: usize, source: ProviderError },
    #[error("embedding for record {record} has {actual} dimensions, expected {expected}")]
    DimensionMismatch {
        record: usize,
        expected: usize,
        actual: usize,
    },
    #[error("upload failed: {0}")]
    Upload(ProviderError),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ball(id: &str) -> GolfBall {
        GolfBall {
            id: id.into(),
            ..GolfBall::default()
        }
    }

    #[test]
    fn duplicate_ids_rejected() {
        let err = ensure_unique_ids(&[ball("a"), ball("b"), ball("a")]).unwrap_err();
        assert!(matches!(err, IngestError::DuplicateId(id) if id == "a"));
        assert!(ensure_unique_ids(&[ball("a"), ball("b")]).is_ok());
    }

    #[test]
    fn report_counts() {
        let report = IngestReport {
            records: 3,
            statuses: vec![
                DocumentStatus::accepted("a"),
                DocumentStatus::rejected("b", 400, "bad"),
                DocumentStatus::accepted("c"),
            ],
        };
        assert_eq!(report.accepted(), 2);
        assert_eq!(report.failures().len(), 1);
        assert_eq!(report.failures()[0].key, "b");
        assert!(!report.is_complete());
    }

    #[test]
    fn concurrency_never_zero() {
        assert_eq!(IngestOptions::new(2).with_embed_concurrency(0).embed_concurrency, 1);
        assert_eq!(IngestOptions::new(2).embed_concurrency, 1);
    }

    #[test]
    fn stage_names() {
        assert_eq!(IngestStage::Loaded.to_string(), "loaded");
        assert_eq!(IngestStage::Uploaded.to_string(), "uploaded");
    }
}
