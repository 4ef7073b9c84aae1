//! Vector indexes for conversation entries

use crate::memory::embedding::cosine_similarity;
use crate::memory::types::Neighbor;
use crate::{ChronosError, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Stores vectors under datapoint ids and answers nearest-neighbour queries
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or replace the vector stored under `datapoint_id`
    async fn upsert(&self, datapoint_id: &str, vector: &[f32]) -> Result<()>;

    /// Up to `k` nearest datapoints, best first
    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<Neighbor>>;
}

/// Process-local index scored by cosine similarity
#[derive(Debug, Default)]
pub struct InMemoryIndex {
    vectors: RwLock<HashMap<String, Vec<f32>>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.vectors.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.read().is_empty()
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn upsert(&self, datapoint_id: &str, vector: &[f32]) -> Result<()> {
        self.vectors
            .write()
            .insert(datapoint_id.to_string(), vector.to_vec());
        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        let mut scored: Vec<Neighbor> = self
            .vectors
            .read()
            .iter()
            .map(|(id, v)| Neighbor {
                datapoint_id: id.clone(),
                score: cosine_similarity(vector, v),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.datapoint_id.cmp(&b.datapoint_id))
        });
        scored.truncate(k);
        Ok(scored)
    }
}

/// Vertex AI Vector Search (Matching Engine)
///
/// Writes go to the index resource with streaming updates; reads go to the
/// deployed index behind an index endpoint.
pub struct MatchingEngineIndex {
    /// `projects/{p}/locations/{l}/indexes/{id}`
    index: String,
    /// `projects/{p}/locations/{l}/indexEndpoints/{id}`
    index_endpoint: Option<String>,
    deployed_index_id: String,
    api_base: String,
    query_base: Option<String>,
    access_token: Option<String>,
    http: reqwest::Client,
}

impl MatchingEngineIndex {
    pub fn new(location: &str, index: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ChronosError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            index: index.into(),
            index_endpoint: None,
            deployed_index_id: "conversation_vectors".to_string(),
            api_base: format!("https://{}-aiplatform.googleapis.com", location),
            query_base: None,
            access_token: None,
            http,
        })
    }

    /// Enable queries against a deployed index
    pub fn with_index_endpoint(
        mut self,
        index_endpoint: impl Into<String>,
        deployed_index_id: impl Into<String>,
    ) -> Self {
        self.index_endpoint = Some(index_endpoint.into());
        self.deployed_index_id = deployed_index_id.into();
        self
    }

    /// Override the API host (also used for queries unless set separately)
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    /// Public endpoint domain of the deployed index
    pub fn with_query_base(mut self, base: impl Into<String>) -> Self {
        self.query_base = Some(base.into().trim_end_matches('/').to_string());
        self
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    async fn post(&self, url: String, body: Value) -> Result<Value> {
        let mut builder = self.http.post(&url).json(&body);
        if let Some(token) = &self.access_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ChronosError::StorageError(format!("Vector index request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ChronosError::StorageError(format!(
                "Vector index returned {}: {}",
                status, text
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ChronosError::StorageError(format!("Invalid vector index response: {}", e)))
    }
}

#[async_trait]
impl VectorIndex for MatchingEngineIndex {
    async fn upsert(&self, datapoint_id: &str, vector: &[f32]) -> Result<()> {
        let url = format!("{}/v1/{}:upsertDatapoints", self.api_base, self.index);
        let body = json!({
            "datapoints": [{
                "datapointId": datapoint_id,
                "featureVector": vector,
            }]
        });
        self.post(url, body).await?;
        debug!(datapoint = %datapoint_id, "Upserted datapoint");
        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        let Some(endpoint) = &self.index_endpoint else {
            return Err(ChronosError::ConfigError(
                "Vector index has no endpoint configured for queries".into(),
            ));
        };

        let base = self.query_base.as_deref().unwrap_or(&self.api_base);
        let url = format!("{}/v1/{}:findNeighbors", base, endpoint);
        let body = json!({
            "deployedIndexId": self.deployed_index_id,
            "queries": [{
                "datapoint": { "featureVector": vector },
                "neighborCount": k,
            }],
        });

        let response = self.post(url, body).await?;
        Ok(parse_neighbors(&response))
    }
}

fn parse_neighbors(response: &Value) -> Vec<Neighbor> {
    response
        .pointer("/nearestNeighbors/0/neighbors")
        .and_then(Value::as_array)
        .map(|neighbors| {
            neighbors
                .iter()
                .filter_map(|n| {
                    let id = n.pointer("/datapoint/datapointId")?.as_str()?;
                    let distance = n.get("distance").and_then(Value::as_f64).unwrap_or(0.0);
                    Some(Neighbor {
                        datapoint_id: id.to_string(),
                        score: distance as f32,
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}
