//! Media records, transcriptions, and timestamped segments.
//!
//! A `MediaRecord` is created once per distinct file path and driven through
//! its processing state machine by the ingestion coordinator. Transcriptions
//! and their segments are immutable once saved, except for the embedding
//! back-fill on segments.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Processing status of a media file.
///
/// Transitions: `Pending → Processing → {Completed, Failed}`. There is no
/// automatic transition out of `Failed`; re-ingesting the same path returns
/// the existing record unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl fmt::Display for MediaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MediaStatus::Pending => "pending",
            MediaStatus::Processing => "processing",
            MediaStatus::Completed => "completed",
            MediaStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// A media file known to the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaRecord {
    /// Unique identifier
    pub id: Uuid,

    /// Canonical file path (unique key for ingestion)
    pub file_path: PathBuf,

    /// Original filename including extension
    pub file_name: String,

    /// Human-readable title derived from the filename
    pub title: String,

    /// File size in bytes
    pub file_size: u64,

    /// Guessed MIME type (e.g. "audio/mp3", "video/mkv")
    pub mime_type: String,

    /// Duration in seconds, when cheaply available at ingest time
    pub duration: Option<f64>,

    /// Short SHA256 content hash (12 hex chars), informational
    pub content_hash: String,

    /// Current processing status
    pub status: MediaStatus,

    /// When the file was detected
    pub detected_at: DateTime<Utc>,
}

impl MediaRecord {
    /// Whether the MIME type names an audio container.
    pub fn is_audio(&self) -> bool {
        self.mime_type.starts_with("audio/")
    }
}

/// A completed transcription of one media file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionRecord {
    /// Unique identifier
    pub id: Uuid,

    /// The media file this transcription belongs to (one-to-one)
    pub media_id: Uuid,

    /// Full concatenated transcript text (space-joined chunk texts)
    pub full_text: String,

    /// Detected or declared language code
    pub language: String,

    /// Mean of segment confidences; 0.0 when there are no segments
    pub confidence: f64,

    /// Identifier of the ASR model/service that produced the transcript
    pub model: String,

    /// When the transcription was created
    pub created_at: DateTime<Utc>,
}

/// A timestamped span of transcript text.
///
/// Times are absolute seconds relative to the full media file, never to the
/// chunk the text came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    /// Unique identifier (also the vector index key)
    pub id: Uuid,

    /// The transcription this segment belongs to
    pub transcription_id: Uuid,

    /// Start time in seconds
    pub start_time: f64,

    /// End time in seconds
    pub end_time: f64,

    /// Transcript text for this span
    pub text: String,

    /// Confidence in [0, 1]
    pub confidence: f64,

    /// Optional speaker label
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,

    /// Embedding back-filled after indexing, kept for audit/reindexing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&MediaStatus::Processing).unwrap();
        assert_eq!(json, "\"processing\"");
        assert_eq!(MediaStatus::Failed.to_string(), "failed");
    }

    #[test]
    fn audio_mime_detection() {
        let mut record = MediaRecord {
            id: Uuid::new_v4(),
            file_path: PathBuf::from("/media/ep1.mp3"),
            file_name: "ep1.mp3".to_string(),
            title: "Ep1".to_string(),
            file_size: 10,
            mime_type: "audio/mp3".to_string(),
            duration: None,
            content_hash: "abc123def456".to_string(),
            status: MediaStatus::Pending,
            detected_at: Utc::now(),
        };
        assert!(record.is_audio());

        record.mime_type = "video/mkv".to_string();
        assert!(!record.is_audio());
    }
}
