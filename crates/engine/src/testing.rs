//! Hand-written mocks for the engine's service seams.

pub use agents::testing::ScriptedClient;
use anyhow::{Context, Result};
use async_trait::async_trait;
use database::{AuthMode, SqlExecutor, StatementResult};
use index::{IndexStats, TableMatch, TableSearch};
use std::sync::{Arc, Mutex};

/// Canned search results; `None` means the index is unreachable.
#[derive(Clone)]
pub struct CannedSearch {
    hits: Option<Vec<TableMatch>>,
    calls: Arc<Mutex<Vec<(String, Vec<String>)>>>,
}

impl CannedSearch {
    pub fn hits(hits: Vec<TableMatch>) -> Self {
        Self {
            hits: Some(hits),
            calls: Arc::default(),
        }
    }

    pub fn failing() -> Self {
        Self {
            hits: None,
            calls: Arc::default(),
        }
    }

    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TableSearch for CannedSearch {
    async fn search_tables(&self, query: &str, tables: &[String]) -> Result<Vec<TableMatch>> {
        self.calls.lock().unwrap().push((query.to_string(), tables.to_vec()));
        self.hits.clone().context("connection refused")
    }

    async fn stats(&self) -> Result<IndexStats> {
        Ok(IndexStats {
            collection: "sql_tables_metadata".into(),
            documents: self.hits.as_ref().map_or(0, Vec::len),
        })
    }
}

/// Returns the same statement results for every batch, or fails to connect.
pub struct CannedExecutor {
    results: Option<Vec<StatementResult>>,
    pub executed: Mutex<Vec<(String, AuthMode)>>,
}

impl CannedExecutor {
    pub fn new(results: Vec<StatementResult>) -> Arc<Self> {
        Arc::new(Self {
            results: Some(results),
            executed: Mutex::new(Vec::new()),
        })
    }

    pub fn unreachable() -> Arc<Self> {
        Arc::new(Self {
            results: None,
            executed: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl SqlExecutor for CannedExecutor {
    async fn execute(&self, sql: &str, auth: AuthMode) -> Result<Vec<StatementResult>> {
        self.executed.lock().unwrap().push((sql.to_string(), auth));
        self.results.clone().context("Failed to connect to database")
    }

    async fn ping(&self, _auth: AuthMode) -> Result<()> {
        self.results.as_ref().map(|_| ()).context("Failed to connect to database")
    }
}
