use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, warn};

use crate::config::EmbeddingConfig;
use crate::error::{ReviewError, Result};

/// Capability interface for turning text into vectors. Selected once at
/// startup; a `None` backend means the store runs pattern-only.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Embed a batch of texts, one vector per input, in input order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| ReviewError::Backend("embedding service returned no vector".into()))
    }

    /// Get the model name being used
    fn model_name(&self) -> &str;
}

/// Factory selecting the embedding backend from configuration. Missing
/// credentials downgrade capability instead of failing startup.
pub fn create_embedder(config: &EmbeddingConfig) -> Option<Box<dyn EmbeddingBackend>> {
    if !config.enabled {
        debug!("Embedding backend disabled; similarity retrieval unavailable");
        return None;
    }
    if config.api_key.is_none() {
        warn!("Embedding backend enabled but no API key is set; continuing pattern-only");
        return None;
    }

    match HttpEmbedder::new(config) {
        Ok(embedder) => {
            debug!("Embedding backend ready: {}", embedder.model_name());
            Some(Box::new(embedder))
        }
        Err(e) => {
            warn!("Failed to initialize embedding backend: {}", e);
            None
        }
    }
}

/// Embedding backend speaking the OpenAI-compatible `/embeddings` protocol
pub struct HttpEmbedder {
    config: EmbeddingConfig,
    client: reqwest::Client,
}

impl HttpEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ReviewError::Backend(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            config: config.clone(),
            client,
        })
    }
}

#[async_trait]
impl EmbeddingBackend for HttpEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let api_key = self
            .config
            .api_key
            .as_ref()
            .ok_or_else(|| ReviewError::Backend("embedding API key not set".into()))?;

        let payload = json!({
            "model": self.config.model,
            "input": texts,
        });

        let response = self
            .client
            .post(format!("{}/embeddings", self.config.base_url.trim_end_matches('/')))
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| ReviewError::Backend(format!("embedding request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(ReviewError::Backend(format!(
                "embedding API error {}: {}",
                status, error_text
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ReviewError::Backend(format!("failed to parse embedding response: {}", e)))?;

        let data = body["data"]
            .as_array()
            .ok_or_else(|| ReviewError::Backend("embedding response missing data array".into()))?;

        let mut vectors = Vec::with_capacity(data.len());
        for entry in data {
            let vector = entry["embedding"]
                .as_array()
                .ok_or_else(|| ReviewError::Backend("embedding entry missing vector".into()))?
                .iter()
                .map(|v| v.as_f64().unwrap_or(0.0) as f32)
                .collect();
            vectors.push(vector);
        }

        if vectors.len() != texts.len() {
            return Err(ReviewError::Backend(format!(
                "embedding service returned {} vectors for {} inputs",
                vectors.len(),
                texts.len()
            )));
        }

        Ok(vectors)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_disabled_config_yields_no_backend() {
        let config = Config::default().embedding;
        assert!(create_embedder(&config).is_none());
    }

    #[test]
    fn test_missing_key_downgrades_instead_of_failing() {
        let mut config = Config::default().embedding;
        config.enabled = true;
        config.api_key = None;
        assert!(create_embedder(&config).is_none());
    }

    #[test]
    fn test_configured_backend_is_created() {
        let mut config = Config::default().embedding;
        config.enabled = true;
        config.api_key = Some("key".to_string());
        assert!(create_embedder(&config).is_some());
    }
}
