use agents::AzureOpenAiSettings;
use anyhow::{Context, Result};
use database::{AuthMode, DatabaseSettings};
use index::EmbeddingSettings;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub llm: AzureOpenAiSettings,
    pub embeddings: EmbeddingSettings,
    pub vector: VectorConfig,
    pub database: DatabaseSettings,
    pub auth_mode: AuthMode,
    pub retry: RetryConfig,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorConfig {
    pub qdrant_url: String,
    pub collection: String,
    pub top_k: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_retries: usize,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_backoff_ms: 1000,
            max_backoff_ms: 10000,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty, // Human-readable, default
    Json,   // One JSON object per event
}

/// Reads settings through `lookup` so tests can supply their own values.
struct Source<F> {
    lookup: F,
}

impl<F> Source<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|v| !v.trim().is_empty())
    }

    fn required(&self, key: &str) -> Result<String> {
        self.optional(key).with_context(|| format!("{key} must be set"))
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    fn parsed<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.optional(key) {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid value for {key}: {e}")),
            None => Ok(default),
        }
    }

    fn flag(&self, key: &str) -> bool {
        self.optional(key)
            .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false)
    }
}

impl AppConfig {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Source { lookup };

        let insecure_tls = env.flag("HTTP_INSECURE_TLS");
        let timeout_secs = env.parsed("HTTP_TIMEOUT_SECS", 60)?;

        let llm = AzureOpenAiSettings {
            endpoint: env.required("AZURE_OPENAI_ENDPOINT")?,
            api_key: env.required("AZURE_OPENAI_KEY")?,
            deployment: env.required("AZURE_OPENAI_DEPLOYMENT_NAME")?,
            api_version: env.or("AZURE_OPENAI_VERSION", "2024-02-01"),
            insecure_tls,
            timeout_secs,
        };

        // The embedding deployment may live on the same resource as chat.
        let embeddings = EmbeddingSettings {
            endpoint: env.or("AZURE_OPENAI_EMBEDDING_ENDPOINT", &llm.endpoint),
            api_key: env.or("AZURE_OPENAI_EMBEDDING_KEY", &llm.api_key),
            deployment: env.or("AZURE_OPENAI_EMBEDDING_DEPLOYMENT_NAME", "text-embedding-ada-002"),
            api_version: env.or("AZURE_OPENAI_EMBEDDING_API_VERSION", "2023-05-15"),
            insecure_tls,
            timeout_secs,
        };

        let log_format = match env.or("LOG_FORMAT", "pretty").to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Ok(Self {
            server: ServerConfig {
                host: env.or("SERVER_HOST", "0.0.0.0"),
                port: env.parsed("SERVER_PORT", 8000)?,
            },
            llm,
            embeddings,
            vector: VectorConfig {
                qdrant_url: env.or("QDRANT_URL", "http://localhost:6333"),
                collection: env.or("VECTOR_COLLECTION", "sql_tables_metadata"),
                top_k: env.parsed("VECTOR_TOP_K", 10)?,
            },
            database: DatabaseSettings {
                host: env.or("DB_SERVER", "localhost"),
                port: env.parsed("DB_PORT", 5432)?,
                database: env.or("DB_DATABASE", "postgres"),
                user: env.or("DB_USER", "postgres"),
                password: env.or("DB_PASSWORD", ""),
                connect_timeout_secs: timeout_secs,
            },
            auth_mode: env.parsed("DB_AUTH_TYPE", AuthMode::Integrated)?,
            retry: RetryConfig {
                max_retries: env.parsed("LLM_MAX_RETRIES", 0)?,
                initial_backoff_ms: env.parsed("LLM_INITIAL_BACKOFF_MS", 1000)?,
                max_backoff_ms: env.parsed("LLM_MAX_BACKOFF_MS", 10000)?,
            },
            log_format,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
