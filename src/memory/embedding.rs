//! Text embeddings for conversation memory
//!
//! - `VertexEmbedding` calls the hosted `textembedding-gecko` family.
//! - `HashEmbedding` hashes words into buckets; deterministic and offline,
//!   for tests and machines without credentials.

use crate::{ChronosError, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;
use tracing::debug;

/// Converts text into fixed-dimensional vectors
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Dimensionality of produced vectors
    fn dimensions(&self) -> usize;
}

/// Vertex AI text embedding model
pub struct VertexEmbedding {
    project: String,
    location: String,
    model: String,
    endpoint: Option<String>,
    access_token: Option<String>,
    http: reqwest::Client,
}

impl VertexEmbedding {
    pub const DEFAULT_MODEL: &'static str = "textembedding-gecko@001";
    const DIMENSIONS: usize = 768;

    pub fn new(project: impl Into<String>, location: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ChronosError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            project: project.into(),
            location: location.into(),
            model: Self::DEFAULT_MODEL.to_string(),
            endpoint: None,
            access_token: None,
            http,
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn predict_url(&self) -> String {
        let base = match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://{}-aiplatform.googleapis.com", self.location),
        };
        format!(
            "{}/v1/projects/{}/locations/{}/publishers/google/models/{}:predict",
            base, self.project, self.location, self.model
        )
    }
}

#[async_trait]
impl EmbeddingService for VertexEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut builder = self
            .http
            .post(self.predict_url())
            .json(&json!({ "instances": [{ "content": text }] }));
        if let Some(token) = &self.access_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ChronosError::EmbeddingError(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ChronosError::EmbeddingError(format!(
                "Embedding model returned {}: {}",
                status, text
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ChronosError::EmbeddingError(format!("Invalid response: {}", e)))?;

        let values = body
            .pointer("/predictions/0/embeddings/values")
            .and_then(Value::as_array)
            .ok_or_else(|| ChronosError::EmbeddingError("Response has no embedding values".into()))?;

        let vector: Vec<f32> = values
            .iter()
            .filter_map(Value::as_f64)
            .map(|v| v as f32)
            .collect();

        debug!(dims = vector.len(), "Embedded text");
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        Self::DIMENSIONS
    }
}

/// Deterministic bag-of-words embedding.
///
/// Every lowercased word is hashed into one of `dimensions` buckets with a
/// hashed sign, and the result is L2-normalised. Texts sharing words score
/// higher under cosine similarity, which is enough for local search.
#[derive(Debug, Clone)]
pub struct HashEmbedding {
    dimensions: usize,
}

impl HashEmbedding {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];

        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            word.to_lowercase().hash(&mut hasher);
            let h = hasher.finish();
            let bucket = (h % self.dimensions as u64) as usize;
            let sign = if (h >> 63) == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        vector
    }
}

impl Default for HashEmbedding {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl EmbeddingService for HashEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Cosine similarity; 0.0 when either vector is zero or lengths differ
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}
