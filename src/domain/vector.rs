//! Vector index entry types and search results.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Retrieval metadata stored alongside each indexed vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentMetadata {
    /// The media file the segment came from
    pub media_id: Uuid,

    /// Segment start time in seconds (absolute)
    pub start_time: f64,

    /// Segment end time in seconds (absolute)
    pub end_time: f64,

    /// Transcription confidence for the segment
    pub confidence: f64,
}

/// External projection of a segment into the vector index.
///
/// Lifecycle mirrors the segment, but the index and the media store are not
/// transactionally linked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorEntry {
    /// Segment id (index key)
    pub id: Uuid,

    /// Segment text (payload)
    pub document: String,

    /// Fixed-dimension embedding
    pub embedding: Vec<f32>,

    /// Retrieval metadata
    pub metadata: SegmentMetadata,
}

/// One result row from a similarity or recommendation query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    /// Matching segment id
    pub segment_id: Uuid,

    /// Segment text
    pub text: String,

    /// Similarity in [0, 1] (1 − cosine distance)
    pub similarity: f64,

    /// Retrieval metadata
    pub metadata: SegmentMetadata,
}
