pub mod embeddings;
pub mod table_index;

pub use embeddings::{EmbeddingClient, EmbeddingSettings};
pub use table_index::TableIndex;

use anyhow::Result;
use async_trait::async_trait;

/// One stored metadata document returned by a similarity search.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct TableMatch {
    pub table_name: String,
    pub text: String,
    pub score: f32,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct IndexStats {
    pub collection: String,
    pub documents: usize,
}

/// Similarity search over stored table metadata.
#[async_trait]
pub trait TableSearch: Send + Sync {
    /// Search `query`, restricted to documents of the named tables when
    /// `tables` is non-empty. Hits come back in score order.
    async fn search_tables(&self, query: &str, tables: &[String]) -> Result<Vec<TableMatch>>;

    async fn stats(&self) -> Result<IndexStats>;
}

/// Index every document, logging and skipping the ones that fail.
/// Returns the number indexed.
pub async fn index_documents(index: &TableIndex, docs: &[ingest::TableDocument]) -> usize {
    let mut indexed = 0;

    for doc in docs {
        match index.index_table(doc).await {
            Ok(()) => {
                indexed += 1;
                tracing::info!(table = %doc.table_name, doc_id = %doc.doc_id, "Indexed table metadata");
            }
            Err(e) => {
                tracing::warn!(table = %doc.table_name, error = %e, "Failed to index table metadata");
            }
        }
    }

    indexed
}
