use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;

use crate::embeddings::EmbeddingClient;
use crate::{IndexStats, TableMatch, TableSearch};

/// Table-metadata collection in Qdrant, accessed over its REST API.
pub struct TableIndex {
    base_url: String,
    client: reqwest::Client,
    embedding_client: EmbeddingClient,
    collection_name: String,
    top_k: usize,
}

#[derive(Serialize)]
struct CreateCollection {
    vectors: VectorParams,
}

#[derive(Serialize)]
struct VectorParams {
    size: usize,
    distance: String,
}

#[derive(Serialize)]
struct UpsertPoints {
    points: Vec<Point>,
}

#[derive(Serialize)]
struct Point {
    id: u64,
    vector: Vec<f32>,
    payload: HashMap<String, serde_json::Value>,
}

#[derive(Deserialize)]
struct CollectionInfo {
    result: CollectionResult,
}

#[derive(Deserialize)]
struct CollectionResult {
    collections: Vec<Collection>,
}

#[derive(Deserialize)]
struct Collection {
    name: String,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    result: Vec<ScoredPoint>,
}

#[derive(Deserialize)]
struct ScoredPoint {
    #[serde(default)]
    score: f32,
    #[serde(default)]
    payload: HashMap<String, serde_json::Value>,
}

#[derive(Deserialize)]
struct CountResponse {
    result: CountResult,
}

#[derive(Deserialize)]
struct CountResult {
    count: usize,
}

impl TableIndex {
    pub fn new(
        base_url: String,
        embedding_client: EmbeddingClient,
        collection_name: String,
        top_k: usize,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            embedding_client,
            collection_name,
            top_k,
        }
    }

    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    /// Create the collection if it does not exist yet
    pub async fn init_collection(&self) -> Result<()> {
        let url = format!("{}/collections", self.base_url);
        let response = self.client.get(&url).send().await
            .context("Failed to reach Qdrant")?;

        if !response.status().is_success() {
            anyhow::bail!("Failed to list collections: {}", response.status());
        }

        let info: CollectionInfo = response.json().await?;
        let exists = info.result.collections.iter()
            .any(|c| c.name == self.collection_name);

        if exists {
            tracing::info!(collection = %self.collection_name, "Collection already exists");
            return Ok(());
        }

        let dimension = self.embedding_client.get_dimension().await?;
        tracing::info!(collection = %self.collection_name, dimension, "Creating collection");

        let url = format!("{}/collections/{}", self.base_url, self.collection_name);
        let create_req = CreateCollection {
            vectors: VectorParams {
                size: dimension,
                distance: "Cosine".to_string(),
            },
        };

        let response = self.client
            .put(&url)
            .json(&create_req)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            anyhow::bail!("Failed to create collection: {}", error_text);
        }

        Ok(())
    }

    /// Embed and upsert one table document
    pub async fn index_table(&self, doc: &ingest::TableDocument) -> Result<()> {
        let embedding = self.embedding_client
            .embed(&doc.text)
            .await
            .with_context(|| format!("Failed to embed metadata for {}", doc.table_name))?;

        let mut payload = HashMap::new();
        payload.insert("table_name".to_string(), json!(doc.table_name));
        payload.insert("doc_id".to_string(), json!(doc.doc_id));
        payload.insert("text".to_string(), json!(doc.text));
        payload.insert("source".to_string(), json!(doc.source));
        if let Some(description) = &doc.description {
            payload.insert("description".to_string(), json!(description));
        }
        if let Some(category) = &doc.category {
            payload.insert("category".to_string(), json!(category));
        }

        let url = format!(
            "{}/collections/{}/points?wait=true",
            self.base_url, self.collection_name
        );

        let upsert_req = UpsertPoints {
            points: vec![Point {
                id: doc.point_id(),
                vector: embedding,
                payload,
            }],
        };

        let response = self.client
            .put(&url)
            .json(&upsert_req)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            anyhow::bail!("Failed to upsert point: {}", error_text);
        }

        Ok(())
    }

    pub(crate) fn search_body(&self, query_embedding: Vec<f32>, tables: &[String]) -> serde_json::Value {
        let mut body = json!({
            "vector": query_embedding,
            "limit": self.top_k,
            "with_payload": true
        });

        if !tables.is_empty() {
            body["filter"] = json!({
                "must": [
                    { "key": "table_name", "match": { "any": tables } }
                ]
            });
        }

        body
    }

    async fn search_points(&self, query: &str, tables: &[String]) -> Result<Vec<TableMatch>> {
        let query_embedding = self.embedding_client.embed(query).await
            .context("Failed to embed query")?;

        let url = format!(
            "{}/collections/{}/points/search",
            self.base_url, self.collection_name
        );

        let response = self.client
            .post(&url)
            .json(&self.search_body(query_embedding, tables))
            .send()
            .await
            .context("Failed to send search request to Qdrant")?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            anyhow::bail!("Qdrant search failed: {}", error_text);
        }

        let result: SearchResponse = response.json().await
            .context("Failed to parse Qdrant response")?;

        Ok(result.result.into_iter().filter_map(to_match).collect())
    }
}

fn to_match(point: ScoredPoint) -> Option<TableMatch> {
    let text = point.payload.get("text")?.as_str()?.to_string();
    if text.trim().is_empty() {
        return None;
    }

    let table_name = point.payload.get("table_name")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    Some(TableMatch {
        table_name,
        text,
        score: point.score,
    })
}

#[async_trait]
impl TableSearch for TableIndex {
    async fn search_tables(&self, query: &str, tables: &[String]) -> Result<Vec<TableMatch>> {
        self.search_points(query, tables).await
    }

    async fn stats(&self) -> Result<IndexStats> {
        let url = format!(
            "{}/collections/{}/points/count",
            self.base_url, self.collection_name
        );

        let response = self.client
            .post(&url)
            .json(&json!({ "exact": true }))
            .send()
            .await
            .context("Failed to reach Qdrant")?;

        if !response.status().is_success() {
            anyhow::bail!("Failed to count points: {}", response.status());
        }

        let count: CountResponse = response.json().await?;

        Ok(IndexStats {
            collection: self.collection_name.clone(),
            documents: count.result.count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::EmbeddingSettings;

    fn index() -> TableIndex {
        let embeddings = EmbeddingClient::new(EmbeddingSettings {
            endpoint: "http://localhost".into(),
            api_key: String::new(),
            deployment: "emb".into(),
            api_version: "v".into(),
            insecure_tls: false,
            timeout_secs: 5,
        })
        .unwrap();
        TableIndex::new("http://localhost:6333/".into(), embeddings, "sql_tables_metadata".into(), 10)
    }

    #[test]
    fn search_is_scoped_to_requested_tables() {
        let body = index().search_body(vec![0.5], &["transaction_history".to_string()]);
        assert_eq!(body["limit"], 10);
        assert_eq!(body["filter"]["must"][0]["key"], "table_name");
        assert_eq!(body["filter"]["must"][0]["match"]["any"][0], "transaction_history");
    }

    #[test]
    fn unscoped_search_has_no_filter() {
        let body = index().search_body(vec![0.5], &[]);
        assert!(body.get("filter").is_none());
    }

    #[test]
    fn points_without_text_are_dropped() {
        let response: SearchResponse = serde_json::from_str(
            r#"{"result": [
                {"id": 1, "score": 0.9, "payload": {"table_name": "customer_information", "text": "customer_information: id, name"}},
                {"id": 2, "score": 0.4, "payload": {"table_name": "empty", "text": "  "}},
                {"id": 3, "score": 0.3, "payload": {}}
            ]}"#,
        )
        .unwrap();

        let matches: Vec<_> = response.result.into_iter().filter_map(to_match).collect();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].table_name, "customer_information");
    }
}
