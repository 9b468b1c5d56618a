//! Embedding model boundary.
//!
//! The model itself is an external collaborator. [`EmbeddingClient`] is the
//! seam the pipeline and the search command depend on; [`HttpEmbeddingClient`]
//! is the adapter for a CLIP service reachable over HTTP.
//!
//! Service protocol:
//! - `GET  {endpoint}/info` returns `{"model": "...", "dimension": 512}`
//! - `POST {endpoint}/embed/image` with the raw image bytes
//! - `POST {endpoint}/embed/text` with `{"text": "..."}`
//!
//! Both embed calls return `{"embedding": [f32, ...]}`.

use std::time::Duration;

use async_trait::async_trait;
use glimpse_core::model::Vector;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};

use crate::error::{EmbedError, IngestError, IngestResult};

const USER_AGENT: &str = "glimpse/0.1.0 (https://github.com/oxur/glimpse)";

/// Produces unit-length vectors of a fixed dimension from images or text.
///
/// The underlying model is a single shared resource: callers must not issue
/// overlapping requests through one client.
#[async_trait]
pub trait EmbeddingClient: Send + Sync + std::fmt::Debug {
    /// Number of components in every vector this client returns.
    fn dimension(&self) -> usize;

    /// Embed raw, encoded image bytes (JPEG, PNG, ...).
    async fn embed_image(&self, bytes: &[u8]) -> Result<Vector, EmbedError>;

    /// Embed a text query.
    async fn embed_text(&self, text: &str) -> Result<Vector, EmbedError>;
}

#[derive(Debug, Deserialize)]
struct ModelInfo {
    model: String,
    dimension: usize,
}

#[derive(Debug, Serialize)]
struct TextRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

/// Embedding client for a CLIP service reachable over HTTP.
#[derive(Debug, Clone)]
pub struct HttpEmbeddingClient {
    http: Client,
    endpoint: String,
    model: String,
    dimension: usize,
}

impl HttpEmbeddingClient {
    /// Load the model: build the HTTP client and probe the service once.
    ///
    /// This is the one-time, possibly slow initialization step; do it once
    /// per process and share the client.
    ///
    /// # Errors
    /// Returns [`IngestError::ModelInit`] if the service is unreachable or
    /// reports an unusable model.
    pub async fn connect(endpoint: &str, timeout: Duration) -> IngestResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| IngestError::ModelInit(e.into()))?;
        let endpoint = endpoint.trim_end_matches('/').to_string();

        log::info!("Loading embedding model from {endpoint}");
        let info = Self::probe(&http, &endpoint)
            .await
            .map_err(IngestError::ModelInit)?;
        if info.dimension == 0 {
            return Err(IngestError::ModelInit(EmbedError::Response(format!(
                "model '{}' reports dimension 0",
                info.model
            ))));
        }
        log::info!(
            "Embedding model '{}' ready (dimension {})",
            info.model,
            info.dimension
        );

        Ok(Self {
            http,
            endpoint,
            model: info.model,
            dimension: info.dimension,
        })
    }

    async fn probe(http: &Client, endpoint: &str) -> Result<ModelInfo, EmbedError> {
        let info = http
            .get(format!("{endpoint}/info"))
            .send()
            .await?
            .error_for_status()?
            .json::<ModelInfo>()
            .await?;
        Ok(info)
    }

    /// Name reported by the service.
    pub fn model(&self) -> &str {
        &self.model
    }

    async fn request_embedding(&self, request: RequestBuilder) -> Result<Vector, EmbedError> {
        let response = request.send().await?.error_for_status()?;
        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbedError::Response(e.to_string()))?;

        if body.embedding.len() != self.dimension {
            return Err(EmbedError::Dimension {
                expected: self.dimension,
                actual: body.embedding.len(),
            });
        }
        Ok(Vector::normalize(body.embedding)?)
    }
}

#[async_trait]
impl EmbeddingClient for HttpEmbeddingClient {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_image(&self, bytes: &[u8]) -> Result<Vector, EmbedError> {
        let request = self
            .http
            .post(format!("{}/embed/image", self.endpoint))
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(bytes.to_vec());
        self.request_embedding(request).await
    }

    async fn embed_text(&self, text: &str) -> Result<Vector, EmbedError> {
        let request = self
            .http
            .post(format!("{}/embed/text", self.endpoint))
            .json(&TextRequest { text });
        self.request_embedding(request).await
    }
}
