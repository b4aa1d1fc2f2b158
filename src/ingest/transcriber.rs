//! Chunked, time-aligned transcription.
//!
//! Audio is partitioned into bounded-length chunks (the ASR service has a
//! practical input-size limit) and transcribed sequentially. The running
//! offset accumulates each chunk's actual duration, so stored segment times
//! are absolute and correct even though the final chunk is shorter. Any
//! chunk failure aborts the whole transcription; nothing partial is saved.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

use crate::config::Config;
use crate::domain::{MediaRecord, Segment, TranscriptionRecord};
use crate::ingest::audio::{self, AudioError};
use crate::services::{AsrService, ServiceError};
use crate::store::{MediaStore, StoreError};

/// Errors that abort a transcription
#[derive(Debug, Error)]
pub enum TranscribeError {
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("ASR service error: {0}")]
    Service(#[from] ServiceError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Turns a media record into a persisted transcription with segments.
pub struct Transcriber {
    asr: Arc<dyn AsrService>,
    store: Arc<MediaStore>,
    chunk_seconds: f64,
    language: String,
}

impl Transcriber {
    pub fn new(asr: Arc<dyn AsrService>, store: Arc<MediaStore>, config: &Config) -> Self {
        Self {
            asr,
            store,
            chunk_seconds: config.chunk_seconds,
            language: config.language.clone(),
        }
    }

    /// Transcribe the media file and persist the result as one unit.
    pub async fn transcribe(
        &self,
        record: &MediaRecord,
    ) -> Result<(TranscriptionRecord, Vec<Segment>), TranscribeError> {
        let source = audio::ensure_audio(record).await?;
        let chunks = audio::load_chunks(&source.path, self.chunk_seconds).await?;

        tracing::debug!(
            media_id = %record.id,
            chunks = chunks.len(),
            "Transcribing in {}s chunks",
            self.chunk_seconds
        );

        let transcription_id = Uuid::new_v4();
        let mut segments: Vec<Segment> = Vec::new();
        let mut offset = 0.0f64;

        for chunk in &chunks {
            let returned = self.asr.transcribe_chunk(&chunk.wav_bytes, offset).await?;

            for asr_segment in returned {
                let (start, end) = absolute_times(asr_segment.start, asr_segment.end, offset);
                let end = match record.duration {
                    Some(duration) => end.min(duration),
                    None => end,
                };
                if end <= start {
                    tracing::debug!(
                        media_id = %record.id,
                        start,
                        end,
                        "Dropping degenerate segment span"
                    );
                    continue;
                }

                segments.push(Segment {
                    id: Uuid::new_v4(),
                    transcription_id,
                    start_time: start,
                    end_time: end,
                    text: asr_segment.text.trim().to_string(),
                    confidence: asr_segment.confidence,
                    speaker: asr_segment.speaker,
                    embedding: None,
                });
            }

            // Actual duration, not chunk index: the last chunk is shorter.
            offset += chunk.duration;
        }

        let full_text = segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        let confidence = if segments.is_empty() {
            0.0
        } else {
            segments.iter().map(|s| s.confidence).sum::<f64>() / segments.len() as f64
        };

        let transcription = TranscriptionRecord {
            id: transcription_id,
            media_id: record.id,
            full_text,
            language: self.language.clone(),
            confidence,
            model: self.asr.model_id(),
            created_at: Utc::now(),
        };

        self.store
            .save_transcription(&transcription, &segments)
            .await?;

        tracing::info!(
            media_id = %record.id,
            transcription_id = %transcription.id,
            segments = segments.len(),
            "Transcription saved"
        );

        Ok((transcription, segments))
    }
}

/// Shift chunk-relative times onto the media timeline.
///
/// Services are expected to echo offset-adjusted timestamps. A start earlier
/// than the supplied offset means the service answered chunk-relative, so
/// both times are shifted by the offset.
fn absolute_times(start: f64, end: f64, offset: f64) -> (f64, f64) {
    if start + 1e-9 < offset {
        (start + offset, end + offset)
    } else {
        (start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::audio::write_test_wav;
    use crate::services::{AsrSegment, MockAsr};
    use async_trait::async_trait;
    use tempfile::TempDir;

    fn wav_record(path: &std::path::Path, duration: Option<f64>) -> MediaRecord {
        MediaRecord {
            id: Uuid::new_v4(),
            file_path: path.to_path_buf(),
            file_name: path
                .file_name()
                .unwrap_or_default()
                .to_string_lossy()
                .to_string(),
            title: "Test".to_string(),
            file_size: 0,
            mime_type: "audio/wav".to_string(),
            duration,
            content_hash: "000000000000".to_string(),
            status: crate::domain::MediaStatus::Processing,
            detected_at: Utc::now(),
        }
    }

    async fn open_store(temp: &TempDir) -> Arc<MediaStore> {
        Arc::new(
            MediaStore::open(temp.path().join("media.jsonl"), temp.path().join(".lock"))
                .await
                .unwrap(),
        )
    }

    #[test]
    fn test_absolute_times_normalization() {
        // Offset-echoing service: pass through
        assert_eq!(absolute_times(60.0, 62.0, 60.0), (60.0, 62.0));
        // Chunk-relative service: shift by offset
        assert_eq!(absolute_times(0.0, 2.0, 60.0), (60.0, 62.0));
        // First chunk: either way
        assert_eq!(absolute_times(0.0, 2.0, 0.0), (0.0, 2.0));
    }

    #[tokio::test]
    async fn test_offsets_accumulate_from_actual_durations() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("long.wav");
        write_test_wav(&path, 72.0);

        let store = open_store(&temp).await;
        let asr = Arc::new(MockAsr::new());
        let config = Config::default();
        let transcriber = Transcriber::new(asr.clone(), store, &config);

        let record = wav_record(&path, Some(72.0));
        let (transcription, segments) = transcriber.transcribe(&record).await.unwrap();

        assert_eq!(asr.call_count(), 3);
        assert_eq!(segments.len(), 3);

        // Chunk durations [30, 30, 12] → third chunk starts at 60
        assert!((segments[0].start_time - 0.0).abs() < 0.01);
        assert!((segments[1].start_time - 30.0).abs() < 0.01);
        assert!(segments[2].start_time >= 60.0);
        assert!((segments[2].end_time - 72.0).abs() < 0.01);

        // Monotone, well-formed spans
        for pair in segments.windows(2) {
            assert!(pair[0].start_time <= pair[1].start_time);
        }
        for segment in &segments {
            assert!(segment.start_time < segment.end_time);
            assert!(segment.end_time <= 72.01);
        }

        assert_eq!(transcription.media_id, record.id);
        assert!((transcription.confidence - 0.95).abs() < 1e-9);
        assert_eq!(transcription.model, "mock-asr");
    }

    #[tokio::test]
    async fn test_chunk_relative_service_still_yields_absolute_times() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("long.wav");
        write_test_wav(&path, 72.0);

        let store = open_store(&temp).await;
        let config = Config::default();
        let transcriber = Transcriber::new(Arc::new(MockAsr::chunk_relative()), store, &config);

        let record = wav_record(&path, Some(72.0));
        let (_, segments) = transcriber.transcribe(&record).await.unwrap();

        assert!(segments[2].start_time >= 60.0);
    }

    #[tokio::test]
    async fn test_chunk_failure_aborts_without_partial_persist() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("long.wav");
        write_test_wav(&path, 72.0);

        let store = open_store(&temp).await;
        let asr = Arc::new(MockAsr::failing_on_call(2));
        let config = Config::default();
        let transcriber = Transcriber::new(asr.clone(), store.clone(), &config);

        let record = wav_record(&path, Some(72.0));
        let result = transcriber.transcribe(&record).await;

        assert!(matches!(result, Err(TranscribeError::Service(_))));
        assert_eq!(asr.call_count(), 2);
        assert!(store.get_transcription(record.id).await.unwrap().is_none());
    }

    /// ASR that hears nothing.
    struct SilentAsr;

    #[async_trait]
    impl AsrService for SilentAsr {
        async fn transcribe_chunk(
            &self,
            _wav_bytes: &[u8],
            _offset_seconds: f64,
        ) -> Result<Vec<AsrSegment>, ServiceError> {
            Ok(Vec::new())
        }

        fn model_id(&self) -> String {
            "silent".to_string()
        }
    }

    #[tokio::test]
    async fn test_zero_segments_mean_zero_confidence() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("short.wav");
        write_test_wav(&path, 3.0);

        let store = open_store(&temp).await;
        let config = Config::default();
        let transcriber = Transcriber::new(Arc::new(SilentAsr), store, &config);

        let record = wav_record(&path, Some(3.0));
        let (transcription, segments) = transcriber.transcribe(&record).await.unwrap();

        assert!(segments.is_empty());
        assert_eq!(transcription.confidence, 0.0);
        assert_eq!(transcription.full_text, "");
    }
}
