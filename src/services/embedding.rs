//! Embedding service contract and HTTP client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::ServiceError;

/// Text-to-vector collaborator.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// Encode text into a fixed-length vector.
    async fn encode(&self, text: &str) -> Result<Vec<f32>, ServiceError>;

    /// Dimensionality of the vectors this service produces.
    fn dimension(&self) -> usize;
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// HTTP client for an OpenAI-compatible embeddings endpoint.
pub struct HttpEmbeddingClient {
    endpoint: String,
    model: String,
    dimension: usize,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl HttpEmbeddingClient {
    pub fn new(
        endpoint: String,
        model: String,
        dimension: usize,
        timeout_secs: u64,
    ) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            endpoint,
            model,
            dimension,
            api_key: std::env::var("EARSHOT_EMBEDDING_API_KEY").ok(),
            client,
        })
    }
}

#[async_trait]
impl EmbeddingService for HttpEmbeddingClient {
    async fn encode(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
        let payload = EmbeddingRequest {
            model: &self.model,
            input: text,
        };

        let mut request = self.client.post(&self.endpoint).json(&payload);
        if let Some(ref key) = self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ServiceError::Request(format!(
                "Embedding endpoint returned {}: {}",
                status, text
            )));
        }

        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::InvalidResponse(e.to_string()))?;

        body.data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| ServiceError::InvalidResponse("empty data array".to_string()))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
