//! Deterministic mock services for tests.
//!
//! `MockAsr` derives segment timing from the actual WAV chunk it receives,
//! so offset-stitching behavior can be asserted precisely. `MockEmbedder`
//! produces a deterministic vector from the text. Both log calls and can be
//! scripted to fail on specific calls.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::asr::{AsrSegment, AsrService};
use super::embedding::EmbeddingService;
use super::ServiceError;

/// Mock ASR service.
///
/// Each call yields one segment spanning the chunk it was given, starting at
/// the supplied offset, with text naming the offset.
pub struct MockAsr {
    calls: AtomicUsize,
    fail_on_call: Option<usize>,
    echo_offset: bool,
}

impl MockAsr {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_on_call: None,
            echo_offset: true,
        }
    }

    /// Fail the nth call (1-based) with a service error.
    pub fn failing_on_call(n: usize) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_on_call: Some(n),
            echo_offset: true,
        }
    }

    /// Return chunk-relative timestamps instead of offset-adjusted ones,
    /// imitating a service that ignores the supplied offset.
    pub fn chunk_relative() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_on_call: None,
            echo_offset: false,
        }
    }

    /// Number of chunks transcribed so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockAsr {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AsrService for MockAsr {
    async fn transcribe_chunk(
        &self,
        wav_bytes: &[u8],
        offset_seconds: f64,
    ) -> Result<Vec<AsrSegment>, ServiceError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on_call == Some(call) {
            return Err(ServiceError::Request(format!(
                "scripted failure on call {}",
                call
            )));
        }

        let reader = hound::WavReader::new(Cursor::new(wav_bytes))
            .map_err(|e| ServiceError::InvalidResponse(e.to_string()))?;
        let spec = reader.spec();
        let duration = reader.duration() as f64 / spec.sample_rate as f64;

        let base = if self.echo_offset { offset_seconds } else { 0.0 };
        Ok(vec![AsrSegment {
            start: base,
            end: base + duration,
            text: format!("chunk at {:.1}s", offset_seconds),
            confidence: 0.95,
            speaker: None,
        }])
    }

    fn model_id(&self) -> String {
        "mock-asr".to_string()
    }
}

/// Mock embedding service with deterministic output.
pub struct MockEmbedder {
    dimension: usize,
    calls: AtomicUsize,
    fail_always: bool,
    responses: Mutex<HashMap<String, Vec<f32>>>,
}

impl MockEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            calls: AtomicUsize::new(0),
            fail_always: false,
            responses: Mutex::new(HashMap::new()),
        }
    }

    /// Every call fails with a service error.
    pub fn failing(dimension: usize) -> Self {
        Self {
            dimension,
            calls: AtomicUsize::new(0),
            fail_always: true,
            responses: Mutex::new(HashMap::new()),
        }
    }

    /// Pin the vector returned for a specific input.
    pub fn with_response(self, input: impl Into<String>, vector: Vec<f32>) -> Self {
        self.responses.lock().unwrap().insert(input.into(), vector);
        self
    }

    /// Number of encode calls so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The deterministic vector for a given text: a byte histogram folded
    /// into `dimension` buckets, normalized to unit length.
    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        for (i, byte) in text.bytes().enumerate() {
            vector[(byte as usize + i) % self.dimension] += 1.0;
        }
        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl EmbeddingService for MockEmbedder {
    async fn encode(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_always {
            return Err(ServiceError::Request("scripted embedding failure".to_string()));
        }

        if let Some(pinned) = self.responses.lock().unwrap().get(text) {
            return Ok(pinned.clone());
        }

        Ok(self.vector_for(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
