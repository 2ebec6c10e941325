//! Embedding Provider
//!
//! Maps text to a fixed-length vector. `EmbeddingClient` calls a hosted
//! model over HTTP; anything else implementing `EmbeddingProvider` (a test
//! double, a local model) can stand in for it.

pub mod client;

pub use client::EmbeddingClient;

use async_trait::async_trait;
use thiserror::Error;

/// Embed errors
#[derive(Error, Debug)]
pub enum EmbedError {
    /// API error from the model provider
    #[error("Embedding API error: {0}")]
    ApiError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    /// Serialization/Deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Embedding has {got} dimensions, expected {expected}")]
    DimensionMismatch { expected: usize, got: usize },
}

pub type EmbedResult<T> = Result<T, EmbedError>;

/// Text to fixed-length vector
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> EmbedResult<Vec<f32>>;

    /// Length of every vector `embed` returns
    fn dimensions(&self) -> usize;
}
