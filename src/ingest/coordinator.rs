//! Ingestion coordination: one file path in, one media record out.
//!
//! The coordinator owns the media record lifecycle. Ingestion is idempotent
//! on the canonical file path; re-processing an ingested path is a no-op
//! that returns the existing record unchanged. Errors never cross this
//! boundary: callers get a record or `None`, and failures surface as the
//! record's `Failed` status.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

use crate::config::Config;
use crate::domain::{MediaRecord, MediaStatus};
use crate::index::{EmbeddingIndexer, IndexError};
use crate::ingest::audio;
use crate::ingest::filter::MediaFilter;
use crate::ingest::transcriber::{TranscribeError, Transcriber};
use crate::store::{compute_file_hash, MediaStore, StoreError};

/// Errors inside the ingestion pipeline (converted to `Failed` status at the
/// coordinator boundary, never returned to callers)
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Transcription error: {0}")]
    Transcribe(#[from] TranscribeError),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),
}

/// File facts gathered before a record is created
struct FileMetadata {
    file_size: u64,
    mime_type: String,
    duration: Option<f64>,
    content_hash: String,
}

/// Drives a file path through the processing state machine.
pub struct IngestCoordinator {
    store: Arc<MediaStore>,
    transcriber: Transcriber,
    indexer: EmbeddingIndexer,
    filter: MediaFilter,
}

impl IngestCoordinator {
    pub fn new(
        store: Arc<MediaStore>,
        transcriber: Transcriber,
        indexer: EmbeddingIndexer,
        config: &Config,
    ) -> Self {
        Self {
            store,
            transcriber,
            indexer,
            filter: MediaFilter::new(&config.extensions),
        }
    }

    /// Process a newly detected media file.
    ///
    /// Returns the existing record unchanged when the path was already
    /// ingested, the new record (status `Completed` or `Failed`) after a
    /// processing run, or `None` when no record could be created.
    pub async fn process_new_media_file(&self, path: &Path) -> Option<MediaRecord> {
        match self.store.get_by_path(path).await {
            Ok(Some(existing)) => {
                tracing::info!(
                    path = %path.display(),
                    media_id = %existing.id,
                    "File already ingested"
                );
                return Some(existing);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Store lookup failed");
                return None;
            }
        }

        let metadata = match self.extract_metadata(path).await {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Metadata extraction failed");
                return None;
            }
        };

        let file_name = path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        let stem = path
            .file_stem()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();

        let record = MediaRecord {
            id: Uuid::new_v4(),
            file_path: path.to_path_buf(),
            file_name,
            title: derive_title(&stem),
            file_size: metadata.file_size,
            mime_type: metadata.mime_type,
            duration: metadata.duration,
            content_hash: metadata.content_hash,
            status: MediaStatus::Pending,
            detected_at: Utc::now(),
        };

        let mut record = match self.store.create(record).await {
            Ok(outcome) => {
                if !outcome.is_new() {
                    // Lost a creation race; the winner's run owns processing
                    return Some(outcome.record().clone());
                }
                outcome.record().clone()
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Record creation failed");
                return None;
            }
        };

        tracing::info!(
            media_id = %record.id,
            path = %path.display(),
            hash = %record.content_hash,
            "Media record created"
        );

        match self.run_pipeline(&mut record).await {
            Ok(()) => {
                record.status = MediaStatus::Completed;
                tracing::info!(media_id = %record.id, "Processing completed");
            }
            Err(e) => {
                tracing::error!(media_id = %record.id, error = %e, "Processing failed");
                if let Err(e) = self
                    .store
                    .update_status(record.id, MediaStatus::Failed)
                    .await
                {
                    tracing::error!(media_id = %record.id, error = %e, "Failed-status update failed");
                }
                record.status = MediaStatus::Failed;
            }
        }

        Some(record)
    }

    /// Whether the path is already known to the store. Pure lookup.
    pub async fn is_file_processed(&self, path: &Path) -> bool {
        match self.store.get_by_path(path).await {
            Ok(existing) => existing.is_some(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Store lookup failed");
                false
            }
        }
    }

    /// Transcribe, index, and mark the record completed.
    async fn run_pipeline(&self, record: &mut MediaRecord) -> Result<(), IngestError> {
        self.store
            .update_status(record.id, MediaStatus::Processing)
            .await?;
        record.status = MediaStatus::Processing;

        let (transcription, segments) = self.transcriber.transcribe(record).await?;
        self.indexer
            .embed_and_index(&transcription, &segments)
            .await?;

        self.store
            .update_status(record.id, MediaStatus::Completed)
            .await?;
        Ok(())
    }

    async fn extract_metadata(&self, path: &Path) -> Result<FileMetadata, IngestError> {
        let fs_metadata = tokio::fs::metadata(path).await?;
        let content_hash = compute_file_hash(path).await?;

        Ok(FileMetadata {
            file_size: fs_metadata.len(),
            mime_type: self.filter.guess_mime_type(path),
            // Cheap probe only; non-WAV durations stay unknown
            duration: audio::wav_duration(path),
            content_hash,
        })
    }
}

/// Derive a human-readable title from a file stem: separators become
/// spaces, each word is capitalized.
pub fn derive_title(stem: &str) -> String {
    stem.replace(['_', '-'], " ")
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::VectorIndex;
    use crate::ingest::audio::write_test_wav;
    use crate::services::{MockAsr, MockEmbedder};
    use tempfile::TempDir;

    async fn test_coordinator(
        temp: &TempDir,
    ) -> (Arc<IngestCoordinator>, Arc<MediaStore>, Arc<MockAsr>) {
        let config = Config {
            state_dir: temp.path().join("state"),
            media_root: temp.path().to_path_buf(),
            ..Config::default()
        };
        let store = Arc::new(
            MediaStore::open(config.media_log_path(), config.lock_path())
                .await
                .unwrap(),
        );
        let index = Arc::new(VectorIndex::open_in_memory().unwrap());
        let asr = Arc::new(MockAsr::new());
        let embedder = Arc::new(MockEmbedder::new(8));

        let transcriber = Transcriber::new(asr.clone(), store.clone(), &config);
        let indexer = EmbeddingIndexer::new(embedder, index, store.clone());
        let coordinator = Arc::new(IngestCoordinator::new(
            store.clone(),
            transcriber,
            indexer,
            &config,
        ));
        (coordinator, store, asr)
    }

    #[test]
    fn test_derive_title() {
        assert_eq!(derive_title("episode_1"), "Episode 1");
        assert_eq!(derive_title("my-podcast-finale"), "My Podcast Finale");
        assert_eq!(derive_title("Already Nice"), "Already Nice");
        assert_eq!(derive_title("__"), "");
    }

    #[tokio::test]
    async fn test_process_happy_path() {
        let temp = TempDir::new().unwrap();
        let (coordinator, store, _) = test_coordinator(&temp).await;

        let path = temp.path().join("episode_1.wav");
        write_test_wav(&path, 3.0);

        let record = coordinator.process_new_media_file(&path).await.unwrap();
        assert_eq!(record.status, MediaStatus::Completed);
        assert_eq!(record.title, "Episode 1");
        assert_eq!(record.mime_type, "audio/wav");
        assert!(record.duration.is_some());
        assert!(record.file_size > 0);

        let stored = store.get_by_id(record.id).await.unwrap().unwrap();
        assert_eq!(stored.status, MediaStatus::Completed);
        assert!(store.get_transcription(record.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_second_ingest_is_noop() {
        let temp = TempDir::new().unwrap();
        let (coordinator, store, asr) = test_coordinator(&temp).await;

        let path = temp.path().join("episode_1.wav");
        write_test_wav(&path, 3.0);

        let first = coordinator.process_new_media_file(&path).await.unwrap();
        let calls_after_first = asr.call_count();

        let second = coordinator.process_new_media_file(&path).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.status, MediaStatus::Completed);
        // No second processing run
        assert_eq!(asr.call_count(), calls_after_first);
        assert_eq!(store.replay().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_file_yields_none() {
        let temp = TempDir::new().unwrap();
        let (coordinator, store, _) = test_coordinator(&temp).await;

        let result = coordinator
            .process_new_media_file(&temp.path().join("ghost.mp3"))
            .await;

        assert!(result.is_none());
        assert!(store.replay().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_is_file_processed_does_not_mutate() {
        let temp = TempDir::new().unwrap();
        let (coordinator, store, _) = test_coordinator(&temp).await;

        let path = temp.path().join("episode_1.wav");
        write_test_wav(&path, 1.0);

        assert!(!coordinator.is_file_processed(&path).await);
        assert!(store.replay().await.unwrap().is_empty());

        coordinator.process_new_media_file(&path).await.unwrap();
        assert!(coordinator.is_file_processed(&path).await);
    }
}
