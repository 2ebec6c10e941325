//! Runtime configuration
//!
//! Built once at startup and passed by reference to the components that need
//! it. Sources: process environment (after loading `.env`) or a YAML file.
//! Secrets are never rendered by `Debug`.

use crate::ingest::VectorIndexSpec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use thiserror::Error;

const DEFAULT_OPENAI_MODEL: &str = "text-embedding-ada-002";
const DEFAULT_OPENAI_DIMENSIONS: usize = 1536;
const DEFAULT_OLLAMA_MODEL: &str = "nomic-embed-text";
const DEFAULT_OLLAMA_DIMENSIONS: usize = 768;

#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required value is absent
    #[error("Missing required configuration value: {0}")]
    Missing(String),

    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Connection settings for a Neo4j database
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Neo4jConfig {
    pub uri: String,
    pub username: String,
    pub password: String,
    #[serde(default = "default_database")]
    pub database: String,
    /// Aura instance name, informational only
    #[serde(default)]
    pub instance_name: Option<String>,
}

fn default_database() -> String {
    "neo4j".to_string()
}

impl fmt::Debug for Neo4jConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Neo4jConfig")
            .field("uri", &self.uri)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("instance_name", &self.instance_name)
            .finish()
    }
}

/// Which Graph Store to talk to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackendConfig {
    /// In-process store, nothing to connect to
    Embedded,
    Neo4j(Neo4jConfig),
}

/// Hosted embedding API flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmbeddingProviderKind {
    #[serde(rename = "openai")]
    OpenAI,
    #[serde(rename = "ollama")]
    Ollama,
}

impl EmbeddingProviderKind {
    pub fn parse(name: &str) -> ConfigResult<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Invalid {
                key: "EMBEDDING_PROVIDER".to_string(),
                reason: format!("unknown provider '{}'", other),
            }),
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::OpenAI => "https://api.openai.com/v1",
            Self::Ollama => "http://localhost:11434",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Self::OpenAI => DEFAULT_OPENAI_MODEL,
            Self::Ollama => DEFAULT_OLLAMA_MODEL,
        }
    }

    pub fn default_dimensions(&self) -> usize {
        match self {
            Self::OpenAI => DEFAULT_OPENAI_DIMENSIONS,
            Self::Ollama => DEFAULT_OLLAMA_DIMENSIONS,
        }
    }
}

/// Embedding Provider settings
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProviderKind,
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_base_url: Option<String>,
    pub dimensions: usize,
}

impl fmt::Debug for EmbeddingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbeddingConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_base_url", &self.api_base_url)
            .field("dimensions", &self.dimensions)
            .finish()
    }
}

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub backend: BackendConfig,
    /// Absent when similarity search and embedding backfill are not used
    #[serde(default)]
    pub embedding: Option<EmbeddingConfig>,
    #[serde(default)]
    pub vector_index: VectorIndexSpec,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::Embedded,
            embedding: None,
            vector_index: VectorIndexSpec::default(),
        }
    }
}

impl AppConfig {
    /// Load from the process environment, reading `.env` first if present
    pub fn from_env() -> ConfigResult<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from any key lookup (the environment, a map in tests)
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &str| get(key).ok_or_else(|| ConfigError::Missing(key.to_string()));

        let backend_kind = match get("CAREGRAPH_BACKEND") {
            Some(kind) => kind.to_ascii_lowercase(),
            None if get("NEO4J_URI").is_some() => "neo4j".to_string(),
            None => "embedded".to_string(),
        };
        let backend = match backend_kind.as_str() {
            "embedded" => BackendConfig::Embedded,
            "neo4j" => BackendConfig::Neo4j(Neo4jConfig {
                uri: require("NEO4J_URI")?,
                username: require("NEO4J_USERNAME")?,
                password: require("NEO4J_PASSWORD")?,
                database: get("NEO4J_DATABASE").unwrap_or_else(default_database),
                instance_name: get("AURA_INSTANCENAME"),
            }),
            other => {
                return Err(ConfigError::Invalid {
                    key: "CAREGRAPH_BACKEND".to_string(),
                    reason: format!("expected 'embedded' or 'neo4j', got '{}'", other),
                })
            }
        };

        let api_key = get("OPENAI_API_KEY");
        let provider = match get("EMBEDDING_PROVIDER") {
            Some(name) => Some(EmbeddingProviderKind::parse(&name)?),
            None if api_key.is_some() => Some(EmbeddingProviderKind::OpenAI),
            None => None,
        };
        let embedding = match provider {
            None => None,
            Some(provider) => {
                let dimensions = match get("EMBEDDING_DIMENSIONS") {
                    Some(raw) => raw.parse::<usize>().map_err(|e| ConfigError::Invalid {
                        key: "EMBEDDING_DIMENSIONS".to_string(),
                        reason: e.to_string(),
                    })?,
                    None => provider.default_dimensions(),
                };
                Some(EmbeddingConfig {
                    provider,
                    model: get("EMBEDDING_MODEL")
                        .unwrap_or_else(|| provider.default_model().to_string()),
                    api_key: if provider == EmbeddingProviderKind::OpenAI {
                        api_key
                    } else {
                        None
                    },
                    api_base_url: get("OPENAI_ENDPOINT")
                        .filter(|_| provider == EmbeddingProviderKind::OpenAI)
                        .or_else(|| get("EMBEDDING_BASE_URL"))
                        .map(|url| normalize_base_url(&url)),
                    dimensions,
                })
            }
        };

        let mut vector_index = VectorIndexSpec::default();
        if let Some(embedding) = &embedding {
            vector_index.dimensions = embedding.dimensions;
        }

        let config = Self {
            backend,
            embedding,
            vector_index,
        };
        config.validate()?;
        Ok(config)
    }

    /// Load from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Fail fast on values that would only surface later as connection errors
    pub fn validate(&self) -> ConfigResult<()> {
        if let BackendConfig::Neo4j(neo4j) = &self.backend {
            for (key, value) in [
                ("NEO4J_URI", &neo4j.uri),
                ("NEO4J_USERNAME", &neo4j.username),
                ("NEO4J_PASSWORD", &neo4j.password),
                ("NEO4J_DATABASE", &neo4j.database),
            ] {
                if value.trim().is_empty() {
                    return Err(ConfigError::Missing(key.to_string()));
                }
            }
        }

        if let Some(embedding) = &self.embedding {
            if embedding.provider == EmbeddingProviderKind::OpenAI && embedding.api_key.is_none() {
                return Err(ConfigError::Missing("OPENAI_API_KEY".to_string()));
            }
            if embedding.dimensions == 0 {
                return Err(ConfigError::Invalid {
                    key: "EMBEDDING_DIMENSIONS".to_string(),
                    reason: "must be positive".to_string(),
                });
            }
            if embedding.dimensions != self.vector_index.dimensions {
                return Err(ConfigError::Invalid {
                    key: "vector_index.dimensions".to_string(),
                    reason: format!(
                        "index expects {} dimensions but the embedding model produces {}",
                        self.vector_index.dimensions, embedding.dimensions
                    ),
                });
            }
        }

        self.vector_index.validate().map_err(|reason| ConfigError::Invalid {
            key: "vector_index".to_string(),
            reason,
        })
    }

    /// The embedding settings, or an error naming what to set
    pub fn require_embedding(&self) -> ConfigResult<&EmbeddingConfig> {
        self.embedding
            .as_ref()
            .ok_or_else(|| ConfigError::Missing("EMBEDDING_PROVIDER or OPENAI_API_KEY".to_string()))
    }
}

/// `OPENAI_ENDPOINT` may name the embeddings route itself; keep only the base
fn normalize_base_url(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    trimmed
        .strip_suffix("/embeddings")
        .unwrap_or(trimmed)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_to_embedded_without_neo4j() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.backend, BackendConfig::Embedded);
        assert!(config.embedding.is_none());
        assert!(config.require_embedding().is_err());
    }

    #[test]
    fn test_neo4j_from_env_names() {
        let config = AppConfig::from_lookup(lookup(&[
            ("NEO4J_URI", "neo4j+s://abc.databases.neo4j.io"),
            ("NEO4J_USERNAME", "neo4j"),
            ("NEO4J_PASSWORD", "hunter2"),
            ("AURA_INSTANCENAME", "Instance01"),
            ("OPENAI_API_KEY", "sk-test"),
            ("OPENAI_ENDPOINT", "https://api.openai.com/v1/embeddings"),
        ]))
        .unwrap();

        match &config.backend {
            BackendConfig::Neo4j(neo4j) => {
                assert_eq!(neo4j.database, "neo4j");
                assert_eq!(neo4j.instance_name.as_deref(), Some("Instance01"));
            }
            other => panic!("unexpected backend {:?}", other),
        }
        let embedding = config.embedding.as_ref().unwrap();
        assert_eq!(embedding.provider, EmbeddingProviderKind::OpenAI);
        assert_eq!(embedding.api_base_url.as_deref(), Some("https://api.openai.com/v1"));
        assert_eq!(embedding.dimensions, 1536);

        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("sk-test"));
    }

    #[test]
    fn test_missing_password_fails_fast() {
        let err = AppConfig::from_lookup(lookup(&[
            ("CAREGRAPH_BACKEND", "neo4j"),
            ("NEO4J_URI", "bolt://localhost:7687"),
            ("NEO4J_USERNAME", "neo4j"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Missing(key) if key == "NEO4J_PASSWORD"));
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            AppConfig::from_lookup(lookup(&[("CAREGRAPH_BACKEND", "sqlite")])),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            AppConfig::from_lookup(lookup(&[("EMBEDDING_PROVIDER", "openai")])),
            Err(ConfigError::Missing(key)) if key == "OPENAI_API_KEY"
        ));
        assert!(matches!(
            AppConfig::from_lookup(lookup(&[
                ("EMBEDDING_PROVIDER", "ollama"),
                ("EMBEDDING_DIMENSIONS", "many"),
            ])),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_ollama_defaults() {
        let config =
            AppConfig::from_lookup(lookup(&[("EMBEDDING_PROVIDER", "Ollama")])).unwrap();
        let embedding = config.embedding.unwrap();
        assert_eq!(embedding.model, "nomic-embed-text");
        assert_eq!(config.vector_index.dimensions, 768);
    }

    #[test]
    fn test_from_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
backend:
  kind: neo4j
  uri: bolt://localhost:7687
  username: neo4j
  password: secret
embedding:
  provider: ollama
  model: nomic-embed-text
  dimensions: 768
vector_index:
  dimensions: 768
"#
        )
        .unwrap();

        let config = AppConfig::from_yaml_file(file.path()).unwrap();
        assert!(matches!(config.backend, BackendConfig::Neo4j(ref n) if n.database == "neo4j"));
        assert_eq!(config.vector_index.name, "health_providers_embeddings");
        assert_eq!(config.vector_index.dimensions, 768);
    }

    #[test]
    fn test_yaml_dimension_mismatch_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "backend:\n  kind: embedded\nembedding:\n  provider: ollama\n  model: m\n  dimensions: 768\n"
        )
        .unwrap();
        assert!(matches!(
            AppConfig::from_yaml_file(file.path()),
            Err(ConfigError::Invalid { .. })
        ));
    }
}
