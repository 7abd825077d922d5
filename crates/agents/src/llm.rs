use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::schema::{AssistantMessage, ChatCompletionResponse, ChatRequest};

/// A chat-completion backend.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// One completion; returns the assistant message of the first choice.
    async fn complete(&self, request: ChatRequest) -> Result<AssistantMessage>;

    /// Deployment or model name, for logs and health output.
    fn model(&self) -> &str;
}

#[derive(Debug, Clone)]
pub struct AzureOpenAiSettings {
    pub endpoint: String,
    pub api_key: String,
    pub deployment: String,
    pub api_version: String,
    pub insecure_tls: bool,
    pub timeout_secs: u64,
}

/// reqwest client shared by the Azure calls.
///
/// Certificate verification is only disabled when `insecure_tls` is set.
pub fn build_http_client(insecure_tls: bool, timeout_secs: u64) -> Result<reqwest::Client> {
    if insecure_tls {
        tracing::warn!("TLS certificate verification is disabled for outbound HTTP");
    }

    reqwest::Client::builder()
        .danger_accept_invalid_certs(insecure_tls)
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .context("Failed to build HTTP client")
}

#[derive(Clone)]
pub struct AzureChatClient {
    settings: AzureOpenAiSettings,
    client: reqwest::Client,
}

impl AzureChatClient {
    pub fn new(settings: AzureOpenAiSettings) -> Result<Self> {
        let client = build_http_client(settings.insecure_tls, settings.timeout_secs)?;
        Ok(Self { settings, client })
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.settings.endpoint.trim_end_matches('/'),
            self.settings.deployment,
            self.settings.api_version
        )
    }
}

#[async_trait]
impl ChatClient for AzureChatClient {
    async fn complete(&self, request: ChatRequest) -> Result<AssistantMessage> {
        let response = self
            .client
            .post(self.completions_url())
            .header("api-key", &self.settings.api_key)
            .header("Ocp-Apim-Subscription-Key", &self.settings.api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to send request to Azure OpenAI")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Azure OpenAI request failed: {} {}", status, body);
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .context("Failed to parse Azure OpenAI response")?;

        let message = completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .context("Azure OpenAI response contained no choices")?;

        tracing::debug!(
            deployment = %self.settings.deployment,
            tool_calls = message.calls().len(),
            "Chat completion successful"
        );

        Ok(message)
    }

    fn model(&self) -> &str {
        &self.settings.deployment
    }
}
