use anyhow::{Context, Result};
use index::{EmbeddingClient, EmbeddingSettings, TableIndex, TableSearch};
use std::path::PathBuf;

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "index=info,ingest=info,index_tables=info".into()),
        )
        .init();

    let metadata_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(env_or("METADATA_DIR", "data/table_metadata")));

    let settings = EmbeddingSettings {
        endpoint: std::env::var("AZURE_OPENAI_EMBEDDING_ENDPOINT")
            .context("AZURE_OPENAI_EMBEDDING_ENDPOINT is not set")?,
        api_key: std::env::var("AZURE_OPENAI_EMBEDDING_KEY")
            .context("AZURE_OPENAI_EMBEDDING_KEY is not set")?,
        deployment: env_or("AZURE_OPENAI_EMBEDDING_DEPLOYMENT_NAME", "text-embedding-ada-002"),
        api_version: env_or("AZURE_OPENAI_EMBEDDING_API_VERSION", "2023-05-15"),
        insecure_tls: env_or("HTTP_INSECURE_TLS", "false").eq_ignore_ascii_case("true"),
        timeout_secs: env_or("HTTP_TIMEOUT_SECS", "60").parse().unwrap_or(60),
    };

    let index = TableIndex::new(
        env_or("QDRANT_URL", "http://localhost:6333"),
        EmbeddingClient::new(settings)?,
        env_or("VECTOR_COLLECTION", "sql_tables_metadata"),
        env_or("VECTOR_TOP_K", "10").parse().unwrap_or(10),
    );

    let docs = ingest::ingest_directory(&metadata_dir)
        .await
        .with_context(|| format!("Failed to read metadata from {}", metadata_dir.display()))?;

    if docs.is_empty() {
        anyhow::bail!("No metadata files found in {}", metadata_dir.display());
    }

    index.init_collection().await?;
    let indexed = index::index_documents(&index, &docs).await;

    let stats = index.stats().await?;
    tracing::info!(
        indexed,
        total = docs.len(),
        collection = %stats.collection,
        documents = stats.documents,
        "Indexing complete"
    );

    Ok(())
}
