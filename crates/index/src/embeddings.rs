use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct EmbeddingSettings {
    pub endpoint: String,
    pub api_key: String,
    pub deployment: String,
    pub api_version: String,
    pub insecure_tls: bool,
    pub timeout_secs: u64,
}

/// Azure OpenAI embeddings deployment
#[derive(Clone)]
pub struct EmbeddingClient {
    settings: EmbeddingSettings,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl EmbeddingClient {
    pub fn new(settings: EmbeddingSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(settings.insecure_tls)
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .context("Failed to build embedding HTTP client")?;

        Ok(Self { settings, client })
    }

    fn embeddings_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/embeddings?api-version={}",
            self.settings.endpoint.trim_end_matches('/'),
            self.settings.deployment,
            self.settings.api_version
        )
    }

    /// Generate embedding for text
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let response = self
            .client
            .post(self.embeddings_url())
            .header("api-key", &self.settings.api_key)
            .json(&EmbeddingRequest { input: text })
            .send()
            .await
            .context("Failed to send embedding request")?;

        if !response.status().is_success() {
            anyhow::bail!("Embedding request failed: {}", response.status());
        }

        let embedding_response: EmbeddingResponse = response
            .json()
            .await
            .context("Failed to parse embedding response")?;

        embedding_response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .context("Embedding response contained no data")
    }

    /// Get embedding dimension
    pub async fn get_dimension(&self) -> Result<usize> {
        let test_embedding = self.embed("test").await?;
        Ok(test_embedding.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_targets_embedding_deployment() {
        let client = EmbeddingClient::new(EmbeddingSettings {
            endpoint: "https://emb.example.com".into(),
            api_key: "k".into(),
            deployment: "text-embedding-3-small".into(),
            api_version: "2023-05-15".into(),
            insecure_tls: true,
            timeout_secs: 10,
        })
        .unwrap();

        assert_eq!(
            client.embeddings_url(),
            "https://emb.example.com/openai/deployments/text-embedding-3-small/embeddings?api-version=2023-05-15"
        );
    }

    #[test]
    fn parses_azure_embedding_payload() {
        let parsed: EmbeddingResponse =
            serde_json::from_str(r#"{"data": [{"embedding": [0.1, 0.2], "index": 0}], "model": "m"}"#).unwrap();
        assert_eq!(parsed.data[0].embedding, vec![0.1, 0.2]);
    }
}
