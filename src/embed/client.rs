//! Embedding client for hosted model APIs

use crate::config::{EmbeddingConfig, EmbeddingProviderKind};
use crate::embed::{EmbedError, EmbedResult, EmbeddingProvider};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Client for interacting with model APIs to generate embeddings
pub struct EmbeddingClient {
    client: Client,
    provider: EmbeddingProviderKind,
    model: String,
    api_key: Option<String>,
    api_base_url: String,
    dimensions: usize,
}

impl std::fmt::Debug for EmbeddingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingClient")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_base_url", &self.api_base_url)
            .field("dimensions", &self.dimensions)
            .finish()
    }
}

impl EmbeddingClient {
    /// Create a new embedding client based on configuration
    pub fn new(config: &EmbeddingConfig) -> EmbedResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| EmbedError::ConfigError(e.to_string()))?;

        let api_base_url = config
            .api_base_url
            .clone()
            .unwrap_or_else(|| config.provider.default_base_url().to_string())
            .trim_end_matches('/')
            .to_string();

        if config.provider == EmbeddingProviderKind::OpenAI && config.api_key.is_none() {
            return Err(EmbedError::ConfigError("OpenAI requires API key".to_string()));
        }
        if config.dimensions == 0 {
            return Err(EmbedError::ConfigError("dimensions must be positive".to_string()));
        }

        Ok(Self {
            client,
            provider: config.provider,
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            api_base_url,
            dimensions: config.dimensions,
        })
    }

    /// Generate embeddings for a batch of texts, in input order
    pub async fn generate_embeddings(&self, texts: &[String]) -> EmbedResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let embeddings = match self.provider {
            EmbeddingProviderKind::OpenAI => self.openai_embeddings(texts).await?,
            EmbeddingProviderKind::Ollama => self.ollama_embeddings(texts).await?,
        };
        if embeddings.len() != texts.len() {
            return Err(EmbedError::SerializationError(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                embeddings.len()
            )));
        }
        for embedding in &embeddings {
            self.check_dimensions(embedding)?;
        }
        Ok(embeddings)
    }

    fn check_dimensions(&self, embedding: &[f32]) -> EmbedResult<()> {
        if embedding.len() != self.dimensions {
            return Err(EmbedError::DimensionMismatch {
                expected: self.dimensions,
                got: embedding.len(),
            });
        }
        Ok(())
    }

    async fn openai_embeddings(&self, texts: &[String]) -> EmbedResult<Vec<Vec<f32>>> {
        #[derive(Serialize)]
        struct OpenAIRequest<'a> {
            input: &'a [String],
            model: &'a str,
        }

        #[derive(Deserialize)]
        struct OpenAIResponse {
            data: Vec<OpenAIData>,
        }

        #[derive(Deserialize)]
        struct OpenAIData {
            #[serde(default)]
            index: usize,
            embedding: Vec<f32>,
        }

        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| EmbedError::ConfigError("OpenAI requires API key".to_string()))?;

        let url = format!("{}/embeddings", self.api_base_url);
        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&OpenAIRequest {
                input: texts,
                model: &self.model,
            })
            .send()
            .await
            .map_err(|e| EmbedError::NetworkError(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let error_text = resp.text().await.unwrap_or_default();
            return Err(EmbedError::ApiError(format!(
                "OpenAI returned {}: {}",
                status, error_text
            )));
        }

        let mut result: OpenAIResponse = resp
            .json()
            .await
            .map_err(|e| EmbedError::SerializationError(e.to_string()))?;
        result.data.sort_by_key(|d| d.index);
        debug!(count = result.data.len(), model = %self.model, "OpenAI embeddings received");
        Ok(result.data.into_iter().map(|d| d.embedding).collect())
    }

    async fn ollama_embeddings(&self, texts: &[String]) -> EmbedResult<Vec<Vec<f32>>> {
        #[derive(Serialize)]
        struct OllamaRequest<'a> {
            model: &'a str,
            prompt: &'a str,
        }

        #[derive(Deserialize)]
        struct OllamaResponse {
            embedding: Vec<f32>,
        }

        let url = format!("{}/api/embeddings", self.api_base_url);
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            let resp = self
                .client
                .post(&url)
                .json(&OllamaRequest {
                    model: &self.model,
                    prompt: text,
                })
                .send()
                .await
                .map_err(|e| EmbedError::NetworkError(e.to_string()))?;

            if !resp.status().is_success() {
                let status = resp.status();
                let error_text = resp.text().await.unwrap_or_default();
                return Err(EmbedError::ApiError(format!(
                    "Ollama returned {}: {}",
                    status, error_text
                )));
            }

            let result: OllamaResponse = resp
                .json()
                .await
                .map_err(|e| EmbedError::SerializationError(e.to_string()))?;
            results.push(result.embedding);
        }

        Ok(results)
    }
}

#[async_trait]
impl EmbeddingProvider for EmbeddingClient {
    async fn embed(&self, text: &str) -> EmbedResult<Vec<f32>> {
        let mut embeddings = self.generate_embeddings(&[text.to_string()]).await?;
        embeddings
            .pop()
            .ok_or_else(|| EmbedError::SerializationError("empty embedding response".to_string()))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(provider: EmbeddingProviderKind, api_key: Option<&str>) -> EmbeddingConfig {
        EmbeddingConfig {
            provider,
            model: "text-embedding-ada-002".to_string(),
            api_key: api_key.map(str::to_string),
            api_base_url: Some("http://localhost:9999/v1/".to_string()),
            dimensions: 3,
        }
    }

    #[test]
    fn test_openai_requires_key() {
        let err = EmbeddingClient::new(&config(EmbeddingProviderKind::OpenAI, None)).unwrap_err();
        assert!(matches!(err, EmbedError::ConfigError(_)));
        assert!(EmbeddingClient::new(&config(EmbeddingProviderKind::Ollama, None)).is_ok());
    }

    #[test]
    fn test_debug_hides_key() {
        let client =
            EmbeddingClient::new(&config(EmbeddingProviderKind::OpenAI, Some("sk-secret"))).unwrap();
        let rendered = format!("{:?}", client);
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("http://localhost:9999/v1\""));
        assert_eq!(client.dimensions(), 3);
    }
}
