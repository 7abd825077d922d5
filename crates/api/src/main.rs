mod config;
mod metrics;
mod retry;
mod routes;

use agents::{Agents, AzureChatClient, ChatClient};
use anyhow::{Context, Result};
use database::PgExecutor;
use engine::{EngineServices, Text2SqlEngine, TracingObserver};
use index::{EmbeddingClient, TableIndex, TableSearch};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::config::{AppConfig, LogFormat};
use crate::metrics::Metrics;
use crate::retry::{RetryPolicy, RetryingChatClient};
use crate::routes::AppState;

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));

    match format {
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::from_env()?;
    init_tracing(config.log_format);

    // Chat completions, retried per policy
    let azure: Arc<dyn ChatClient> = Arc::new(AzureChatClient::new(config.llm.clone())?);
    let chat_client = Arc::new(RetryingChatClient::new(
        azure,
        RetryPolicy::from_config(&config.retry),
    ));

    // Table metadata index (using REST API)
    let embedding_client = EmbeddingClient::new(config.embeddings.clone())?;
    let table_search: Arc<dyn TableSearch> = Arc::new(TableIndex::new(
        config.vector.qdrant_url.clone(),
        embedding_client,
        config.vector.collection.clone(),
        config.vector.top_k,
    ));

    let engine = Text2SqlEngine::new(EngineServices {
        agents: Agents::new(chat_client),
        table_search: table_search.clone(),
        executor: Arc::new(PgExecutor::new(config.database.clone())),
        observer: Arc::new(TracingObserver),
        auth_mode: config.auth_mode,
    });

    let state = Arc::new(AppState {
        engine,
        table_search,
        metrics: Metrics::new(),
    });

    let app = routes::build_router(state);

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;

    tracing::info!(
        %address,
        deployment = %config.llm.deployment,
        collection = %config.vector.collection,
        auth = %config.auth_mode,
        max_retries = config.retry.max_retries,
        "Server listening"
    );

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
