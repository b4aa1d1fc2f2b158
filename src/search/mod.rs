//! Similarity search and recommendations over indexed segments.
//!
//! Reads the vector index independently of ingestion. This surface never
//! propagates a raw service or store error: failures degrade to an empty
//! result list with a logged warning.

use std::sync::Arc;

use uuid::Uuid;

use crate::domain::SearchHit;
use crate::index::VectorIndex;
use crate::services::EmbeddingService;

/// Free-text similarity search and per-segment recommendation.
pub struct SearchEngine {
    embedder: Arc<dyn EmbeddingService>,
    index: Arc<VectorIndex>,
}

impl SearchEngine {
    pub fn new(embedder: Arc<dyn EmbeddingService>, index: Arc<VectorIndex>) -> Self {
        Self { embedder, index }
    }

    /// Nearest segments for a free-text query.
    ///
    /// Returns at most `limit` hits with `similarity ≥ threshold`, ordered
    /// descending by similarity; ties keep index insertion order.
    pub async fn search(&self, query: &str, limit: usize, threshold: f64) -> Vec<SearchHit> {
        let query_embedding = match self.embedder.encode(query).await {
            Ok(embedding) => embedding,
            Err(e) => {
                tracing::warn!(error = %e, "Query embedding failed");
                return Vec::new();
            }
        };

        let neighbors = match self.index.nearest(&query_embedding, limit) {
            Ok(neighbors) => neighbors,
            Err(e) => {
                tracing::warn!(error = %e, "Vector query failed");
                return Vec::new();
            }
        };

        let hits: Vec<SearchHit> = neighbors
            .into_iter()
            .map(|(entry, distance)| SearchHit {
                segment_id: entry.id,
                text: entry.document,
                similarity: 1.0 - distance,
                metadata: entry.metadata,
            })
            .filter(|hit| hit.similarity >= threshold)
            .collect();

        tracing::debug!(results = hits.len(), "Search completed");
        hits
    }

    /// Segments similar to an already-indexed segment.
    ///
    /// The query segment itself is excluded from the results; without that
    /// exclusion it would always be its own top hit.
    pub async fn recommend(&self, segment_id: Uuid, limit: usize) -> Vec<SearchHit> {
        let entry = match self.index.get(segment_id) {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                tracing::warn!(segment_id = %segment_id, "Segment not indexed, no recommendations");
                return Vec::new();
            }
            Err(e) => {
                tracing::warn!(segment_id = %segment_id, error = %e, "Vector lookup failed");
                return Vec::new();
            }
        };

        let neighbors = match self.index.nearest(&entry.embedding, limit + 1) {
            Ok(neighbors) => neighbors,
            Err(e) => {
                tracing::warn!(error = %e, "Vector query failed");
                return Vec::new();
            }
        };

        neighbors
            .into_iter()
            .filter(|(candidate, _)| candidate.id != segment_id)
            .take(limit)
            .map(|(entry, distance)| SearchHit {
                segment_id: entry.id,
                text: entry.document,
                similarity: 1.0 - distance,
                metadata: entry.metadata,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{SegmentMetadata, VectorEntry};
    use crate::services::MockEmbedder;

    fn entry(id: Uuid, embedding: Vec<f32>, text: &str) -> VectorEntry {
        VectorEntry {
            id,
            document: text.to_string(),
            embedding,
            metadata: SegmentMetadata {
                media_id: Uuid::new_v4(),
                start_time: 0.0,
                end_time: 1.0,
                confidence: 0.9,
            },
        }
    }

    fn engine_with(
        entries: &[VectorEntry],
        embedder: MockEmbedder,
    ) -> (SearchEngine, Arc<VectorIndex>) {
        let index = Arc::new(VectorIndex::open_in_memory().unwrap());
        for entry in entries {
            index.upsert(entry).unwrap();
        }
        (SearchEngine::new(Arc::new(embedder), index.clone()), index)
    }

    #[tokio::test]
    async fn test_search_filters_by_threshold_and_orders() {
        // cos(query, high) ≈ 0.7, cos(query, low) ≈ 0.4
        let high = entry(Uuid::new_v4(), vec![0.7, 0.714_142_9], "refund policy");
        let low = entry(Uuid::new_v4(), vec![0.4, 0.916_515_1], "unrelated");
        let embedder = MockEmbedder::new(2).with_response("refunds", vec![1.0, 0.0]);
        let (engine, _) = engine_with(&[low.clone(), high.clone()], embedder);

        let hits = engine.search("refunds", 5, 0.6).await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].segment_id, high.id);
        assert!((hits[0].similarity - 0.7).abs() < 1e-3);

        // Lower threshold lets both through, ordered descending
        let hits = engine.search("refunds", 5, 0.0).await;
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].segment_id, high.id);
        assert_eq!(hits[1].segment_id, low.id);
        assert!(hits[0].similarity > hits[1].similarity);
    }

    #[tokio::test]
    async fn test_search_respects_limit() {
        let entries: Vec<VectorEntry> = (0..5)
            .map(|i| entry(Uuid::new_v4(), vec![1.0, i as f32 * 0.01], &format!("e{}", i)))
            .collect();
        let embedder = MockEmbedder::new(2).with_response("q", vec![1.0, 0.0]);
        let (engine, _) = engine_with(&entries, embedder);

        let hits = engine.search("q", 3, 0.0).await;
        assert_eq!(hits.len(), 3);
    }

    #[tokio::test]
    async fn test_search_degrades_on_embedding_failure() {
        let seeded = entry(Uuid::new_v4(), vec![1.0, 0.0], "something");
        let (engine, _) = engine_with(&[seeded], MockEmbedder::failing(2));

        assert!(engine.search("anything", 5, 0.0).await.is_empty());
    }

    #[tokio::test]
    async fn test_recommend_excludes_self() {
        let target = entry(Uuid::new_v4(), vec![1.0, 0.0], "target");
        let near = entry(Uuid::new_v4(), vec![0.9, 0.1], "near");
        let far = entry(Uuid::new_v4(), vec![0.0, 1.0], "far");
        let (engine, _) = engine_with(
            &[target.clone(), near.clone(), far.clone()],
            MockEmbedder::new(2),
        );

        let hits = engine.recommend(target.id, 2).await;
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h.segment_id != target.id));
        // The raw query would rank the target first; the nearest other wins
        assert_eq!(hits[0].segment_id, near.id);
    }

    #[tokio::test]
    async fn test_recommend_missing_segment_is_empty() {
        let seeded = entry(Uuid::new_v4(), vec![1.0, 0.0], "something");
        let (engine, _) = engine_with(&[seeded], MockEmbedder::new(2));

        assert!(engine.recommend(Uuid::new_v4(), 5).await.is_empty());
    }
}
