//! JSONL-based media store with state derived from replay.
//!
//! Append-only event log: every state change (record creation, status
//! transition, transcription save, embedding back-fill) is one JSON line.
//! Current state is rebuilt by replaying the log. The store is the single
//! owner of media mutation; components go through its narrow write methods.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::{MediaRecord, MediaStatus, Segment, TranscriptionRecord};

/// Errors from the media store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("State directory is locked by another process: {0}")]
    Locked(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// An event in the media log (append-only)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaEvent {
    /// When this event occurred
    pub timestamp: DateTime<Utc>,

    /// The media record this event belongs to
    pub media_id: Uuid,

    /// Type of event
    pub event_type: MediaEventType,

    /// Additional data (depends on event type)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Types of media events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaEventType {
    /// Record created (data: the full MediaRecord)
    Created,

    /// Processing status changed (data: {"status": ...})
    StatusChanged,

    /// Transcription and segments saved in one unit
    /// (data: {"transcription": ..., "segments": [...]})
    TranscriptionSaved,

    /// Embedding back-filled onto a segment
    /// (data: {"segment_id": ..., "embedding": [...]})
    SegmentEmbedded,
}

/// Current state of one media file (derived from replaying events)
#[derive(Debug, Clone)]
pub struct MediaEntry {
    pub record: MediaRecord,
    pub transcription: Option<TranscriptionRecord>,
    pub segments: Vec<Segment>,
}

/// Outcome of an idempotent create
#[derive(Debug, Clone)]
pub enum CreateOutcome {
    /// A new record was created
    Created(MediaRecord),

    /// The path was already ingested; the existing record is returned unchanged
    Existing(MediaRecord),
}

impl CreateOutcome {
    pub fn record(&self) -> &MediaRecord {
        match self {
            Self::Created(r) | Self::Existing(r) => r,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// Store status summary
#[derive(Debug, Clone, Default)]
pub struct StoreSummary {
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

impl StoreSummary {
    pub fn total(&self) -> usize {
        self.pending + self.processing + self.completed + self.failed
    }
}

/// JSONL-based media store
pub struct MediaStore {
    /// Path to the media JSONL log
    log_path: PathBuf,

    /// Serializes check-and-append sequences so path-idempotent creation
    /// stays atomic under concurrent tasks
    write_lock: Mutex<()>,

    /// Advisory lock against a second writer process (held while the store
    /// lives; `None` for read-only opens)
    _process_lock: Option<std::fs::File>,
}

impl MediaStore {
    /// Open the store for writing, taking the process-level advisory lock.
    pub async fn open(log_path: PathBuf, lock_path: PathBuf) -> Result<Self, StoreError> {
        if let Some(parent) = log_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let lock_file = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .open(&lock_path)?;
        lock_file
            .try_lock_exclusive()
            .map_err(|_| StoreError::Locked(lock_path))?;

        Ok(Self {
            log_path,
            write_lock: Mutex::new(()),
            _process_lock: Some(lock_file),
        })
    }

    /// Open the store for replay-only access (no lock, no writes expected).
    pub fn open_read_only(log_path: PathBuf) -> Self {
        Self {
            log_path,
            write_lock: Mutex::new(()),
            _process_lock: None,
        }
    }

    /// Append an event to the log
    async fn append_event(&self, event: &MediaEvent) -> Result<(), StoreError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .await?;

        let json = serde_json::to_string(event)?;
        file.write_all(format!("{}\n", json).as_bytes()).await?;
        file.flush().await?;

        Ok(())
    }

    /// Replay all events to build current state
    pub async fn replay(&self) -> Result<HashMap<Uuid, MediaEntry>, StoreError> {
        let mut entries: HashMap<Uuid, MediaEntry> = HashMap::new();

        if !self.log_path.exists() {
            return Ok(entries);
        }

        let file = File::open(&self.log_path).await?;
        let reader = BufReader::new(file);
        let mut lines = reader.lines();

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }

            let event: MediaEvent = serde_json::from_str(&line)?;
            Self::apply_event(&mut entries, event);
        }

        Ok(entries)
    }

    /// Apply a single event to the state
    fn apply_event(entries: &mut HashMap<Uuid, MediaEntry>, event: MediaEvent) {
        match event.event_type {
            MediaEventType::Created => {
                if let Some(data) = event.data {
                    if let Ok(record) = serde_json::from_value::<MediaRecord>(data) {
                        entries.insert(
                            event.media_id,
                            MediaEntry {
                                record,
                                transcription: None,
                                segments: Vec::new(),
                            },
                        );
                    }
                }
            }
            MediaEventType::StatusChanged => {
                if let Some(entry) = entries.get_mut(&event.media_id) {
                    if let Some(data) = event.data {
                        if let Some(status) = data
                            .get("status")
                            .and_then(|s| serde_json::from_value::<MediaStatus>(s.clone()).ok())
                        {
                            entry.record.status = status;
                        }
                    }
                }
            }
            MediaEventType::TranscriptionSaved => {
                if let Some(entry) = entries.get_mut(&event.media_id) {
                    if let Some(data) = event.data {
                        let transcription = data
                            .get("transcription")
                            .and_then(|t| {
                                serde_json::from_value::<TranscriptionRecord>(t.clone()).ok()
                            });
                        let segments = data
                            .get("segments")
                            .and_then(|s| serde_json::from_value::<Vec<Segment>>(s.clone()).ok());
                        if let (Some(transcription), Some(segments)) = (transcription, segments) {
                            entry.transcription = Some(transcription);
                            entry.segments = segments;
                        }
                    }
                }
            }
            MediaEventType::SegmentEmbedded => {
                if let Some(entry) = entries.get_mut(&event.media_id) {
                    if let Some(data) = event.data {
                        let segment_id = data
                            .get("segment_id")
                            .and_then(|s| serde_json::from_value::<Uuid>(s.clone()).ok());
                        let embedding = data
                            .get("embedding")
                            .and_then(|e| serde_json::from_value::<Vec<f32>>(e.clone()).ok());
                        if let (Some(segment_id), Some(embedding)) = (segment_id, embedding) {
                            if let Some(segment) =
                                entry.segments.iter_mut().find(|s| s.id == segment_id)
                            {
                                segment.embedding = Some(embedding);
                            }
                        }
                    }
                }
            }
        }
    }

    /// Create a media record, idempotent on file path.
    ///
    /// The lookup and the append happen under one lock, so two concurrent
    /// calls for the same path produce exactly one record.
    pub async fn create(&self, record: MediaRecord) -> Result<CreateOutcome, StoreError> {
        let _guard = self.write_lock.lock().await;

        let entries = self.replay().await?;
        if let Some(existing) = entries
            .values()
            .find(|e| e.record.file_path == record.file_path)
        {
            return Ok(CreateOutcome::Existing(existing.record.clone()));
        }

        let event = MediaEvent {
            timestamp: Utc::now(),
            media_id: record.id,
            event_type: MediaEventType::Created,
            data: Some(serde_json::to_value(&record)?),
        };
        self.append_event(&event).await?;

        Ok(CreateOutcome::Created(record))
    }

    /// Get a media record by its canonical file path
    pub async fn get_by_path(&self, path: &Path) -> Result<Option<MediaRecord>, StoreError> {
        let entries = self.replay().await?;
        Ok(entries
            .into_values()
            .find(|e| e.record.file_path == path)
            .map(|e| e.record))
    }

    /// Get a media record by id
    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<MediaRecord>, StoreError> {
        let entries = self.replay().await?;
        Ok(entries.get(&id).map(|e| e.record.clone()))
    }

    /// Update the processing status of a record.
    /// Returns `false` when the record does not exist.
    pub async fn update_status(&self, id: Uuid, status: MediaStatus) -> Result<bool, StoreError> {
        let _guard = self.write_lock.lock().await;

        let entries = self.replay().await?;
        if !entries.contains_key(&id) {
            return Ok(false);
        }

        let event = MediaEvent {
            timestamp: Utc::now(),
            media_id: id,
            event_type: MediaEventType::StatusChanged,
            data: Some(serde_json::json!({ "status": status })),
        };
        self.append_event(&event).await?;

        Ok(true)
    }

    /// Save a transcription and its segments as a single logical unit.
    pub async fn save_transcription(
        &self,
        transcription: &TranscriptionRecord,
        segments: &[Segment],
    ) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;

        let event = MediaEvent {
            timestamp: Utc::now(),
            media_id: transcription.media_id,
            event_type: MediaEventType::TranscriptionSaved,
            data: Some(serde_json::json!({
                "transcription": transcription,
                "segments": segments,
            })),
        };
        self.append_event(&event).await?;

        Ok(())
    }

    /// Get the transcription and segments for a media file
    pub async fn get_transcription(
        &self,
        media_id: Uuid,
    ) -> Result<Option<(TranscriptionRecord, Vec<Segment>)>, StoreError> {
        let entries = self.replay().await?;
        Ok(entries
            .get(&media_id)
            .and_then(|e| e.transcription.clone().map(|t| (t, e.segments.clone()))))
    }

    /// Back-fill a segment's embedding for audit/reindexing
    pub async fn backfill_segment_embedding(
        &self,
        media_id: Uuid,
        segment_id: Uuid,
        embedding: &[f32],
    ) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;

        let event = MediaEvent {
            timestamp: Utc::now(),
            media_id,
            event_type: MediaEventType::SegmentEmbedded,
            data: Some(serde_json::json!({
                "segment_id": segment_id,
                "embedding": embedding,
            })),
        };
        self.append_event(&event).await?;

        Ok(())
    }

    /// Status summary across all records
    pub async fn summary(&self) -> Result<StoreSummary, StoreError> {
        let entries = self.replay().await?;

        let mut summary = StoreSummary::default();
        for entry in entries.values() {
            match entry.record.status {
                MediaStatus::Pending => summary.pending += 1,
                MediaStatus::Processing => summary.processing += 1,
                MediaStatus::Completed => summary.completed += 1,
                MediaStatus::Failed => summary.failed += 1,
            }
        }

        Ok(summary)
    }

    /// All entries, newest first
    pub async fn list(&self) -> Result<Vec<MediaEntry>, StoreError> {
        let entries = self.replay().await?;
        let mut all: Vec<MediaEntry> = entries.into_values().collect();
        all.sort_by(|a, b| b.record.detected_at.cmp(&a.record.detected_at));
        Ok(all)
    }
}

/// Compute SHA256 hash of file content (first 12 hex chars)
pub async fn compute_file_hash(path: &Path) -> Result<String, std::io::Error> {
    let content = tokio::fs::read(path).await?;
    let mut hasher = Sha256::new();
    hasher.update(&content);
    let result = hasher.finalize();

    Ok(format!("{:x}", result)[..12].to_string())
}
