//! ASR service contract and HTTP client.
//!
//! The service receives one audio chunk (WAV bytes) plus the chunk's time
//! offset within the full media file, and returns timestamped segments. It
//! is expected to use the supplied offset as the baseline for the times it
//! returns; the transcriber normalizes chunk-relative answers anyway.

use async_trait::async_trait;
use serde::Deserialize;

use super::ServiceError;

/// One timestamped span returned by the ASR service.
#[derive(Debug, Clone, Deserialize)]
pub struct AsrSegment {
    /// Start time in seconds
    pub start: f64,

    /// End time in seconds
    pub end: f64,

    /// Transcribed text
    pub text: String,

    /// Confidence in [0, 1]
    #[serde(default = "default_confidence")]
    pub confidence: f64,

    /// Optional speaker label
    #[serde(default)]
    pub speaker: Option<String>,
}

fn default_confidence() -> f64 {
    0.8
}

/// Speech-to-text collaborator.
#[async_trait]
pub trait AsrService: Send + Sync {
    /// Transcribe one audio chunk. `offset_seconds` is where the chunk
    /// starts within the full media file.
    async fn transcribe_chunk(
        &self,
        wav_bytes: &[u8],
        offset_seconds: f64,
    ) -> Result<Vec<AsrSegment>, ServiceError>;

    /// Identifier of the model/service, recorded on transcriptions.
    fn model_id(&self) -> String;
}

/// Response body of the transcription endpoint
#[derive(Debug, Deserialize)]
struct AsrResponse {
    #[serde(default)]
    segments: Vec<AsrSegment>,
}

/// HTTP client for an OpenAI-compatible transcription endpoint.
pub struct HttpAsrClient {
    endpoint: String,
    model: String,
    language: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl HttpAsrClient {
    pub fn new(
        endpoint: String,
        model: String,
        language: String,
        timeout_secs: u64,
    ) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            endpoint,
            model,
            language,
            api_key: std::env::var("EARSHOT_ASR_API_KEY").ok(),
            client,
        })
    }
}

#[async_trait]
impl AsrService for HttpAsrClient {
    async fn transcribe_chunk(
        &self,
        wav_bytes: &[u8],
        offset_seconds: f64,
    ) -> Result<Vec<AsrSegment>, ServiceError> {
        let part = reqwest::multipart::Part::bytes(wav_bytes.to_vec())
            .file_name("chunk.wav")
            .mime_str("audio/wav")
            .map_err(|e| ServiceError::Request(e.to_string()))?;

        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("model", self.model.clone())
            .text("language", self.language.clone())
            .text("offset", format!("{}", offset_seconds));

        let mut request = self.client.post(&self.endpoint).multipart(form);
        if let Some(ref key) = self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ServiceError::Request(format!(
                "ASR endpoint returned {}: {}",
                status, text
            )));
        }

        let body: AsrResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::InvalidResponse(e.to_string()))?;

        Ok(body.segments)
    }

    fn model_id(&self) -> String {
        self.model.clone()
    }
}
