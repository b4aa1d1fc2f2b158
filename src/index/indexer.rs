//! Embedding generation and vector index upkeep.
//!
//! Runs after a transcript is committed. Per-segment embedding failures and
//! empty text degrade to a zero vector of the configured dimension; a
//! missing embedding is less harmful than losing a completed transcript.
//! The vector index and the media store are not transactionally linked.

use std::sync::Arc;

use uuid::Uuid;

use crate::domain::{Segment, SegmentMetadata, TranscriptionRecord, VectorEntry};
use crate::index::vector_index::{IndexError, VectorIndex};
use crate::services::EmbeddingService;
use crate::store::MediaStore;

/// Counters from one indexing pass
#[derive(Debug, Clone, Default)]
pub struct IndexReport {
    /// Segments upserted into the vector index
    pub indexed: usize,

    /// Segments that fell back to the zero vector
    pub zero_vectors: usize,
}

/// Projects transcript segments into the vector index.
pub struct EmbeddingIndexer {
    embedder: Arc<dyn EmbeddingService>,
    index: Arc<VectorIndex>,
    store: Arc<MediaStore>,
}

impl EmbeddingIndexer {
    pub fn new(
        embedder: Arc<dyn EmbeddingService>,
        index: Arc<VectorIndex>,
        store: Arc<MediaStore>,
    ) -> Self {
        Self {
            embedder,
            index,
            store,
        }
    }

    /// Embed and index every segment of a committed transcription.
    ///
    /// Index write failures propagate (nothing was indexed for the segment
    /// and the condition is operational, not per-segment); embedding service
    /// failures degrade to the zero vector.
    pub async fn embed_and_index(
        &self,
        transcription: &TranscriptionRecord,
        segments: &[Segment],
    ) -> Result<IndexReport, IndexError> {
        let mut report = IndexReport::default();

        for segment in segments {
            let embedding = self.embed_or_zero(&segment.text).await;
            if embedding.iter().all(|v| *v == 0.0) {
                report.zero_vectors += 1;
            }

            let entry = VectorEntry {
                id: segment.id,
                document: segment.text.clone(),
                embedding: embedding.clone(),
                metadata: SegmentMetadata {
                    media_id: transcription.media_id,
                    start_time: segment.start_time,
                    end_time: segment.end_time,
                    confidence: segment.confidence,
                },
            };
            self.index.upsert(&entry)?;
            report.indexed += 1;

            // Audit copy next to the segment; best-effort
            if let Err(e) = self
                .store
                .backfill_segment_embedding(transcription.media_id, segment.id, &embedding)
                .await
            {
                tracing::warn!(
                    segment_id = %segment.id,
                    error = %e,
                    "Failed to back-fill segment embedding"
                );
            }
        }

        tracing::info!(
            transcription_id = %transcription.id,
            indexed = report.indexed,
            zero_vectors = report.zero_vectors,
            "Segments indexed"
        );

        Ok(report)
    }

    /// Encode text, falling back to the zero vector for empty input or a
    /// failing service, and normalizing a non-conforming dimension.
    async fn embed_or_zero(&self, text: &str) -> Vec<f32> {
        let dimension = self.embedder.dimension();
        if text.trim().is_empty() {
            return vec![0.0; dimension];
        }

        match self.embedder.encode(text).await {
            Ok(mut embedding) => {
                if embedding.len() != dimension {
                    tracing::warn!(
                        got = embedding.len(),
                        expected = dimension,
                        "Embedding dimension mismatch, normalizing"
                    );
                    embedding.resize(dimension, 0.0);
                }
                embedding
            }
            Err(e) => {
                tracing::warn!(error = %e, "Embedding failed, using zero vector");
                vec![0.0; dimension]
            }
        }
    }

    /// Remove every index entry for the given media file.
    /// Zero matches is not an error.
    pub fn delete_media_embeddings(&self, media_id: Uuid) -> Result<usize, IndexError> {
        let deleted = self.index.delete_media(media_id)?;
        tracing::info!(media_id = %media_id, deleted, "Media embeddings deleted");
        Ok(deleted)
    }
}
