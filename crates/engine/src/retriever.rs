use agents::Agents;
use index::TableSearch;
use std::sync::Arc;

use crate::observer::RunObserver;

/// Metadata used when the table router itself fails.
pub const ROUTER_FALLBACK: &str = "Mock table metadata: customer_information(id, name, email), transaction_history(id, customer_id, amount, date)";

const CUSTOMER_METADATA: &str = "customer_information:
- id (int, primary key)
- name (varchar(100))
- email (varchar(255))
- phone (varchar(20))
- created_date (datetime)";

const TRANSACTION_METADATA: &str = "transaction_history:
- id (int, primary key)
- customer_id (int, foreign key)
- amount (decimal(10,2))
- transaction_date (datetime)
- transaction_type (varchar(50))";

/// Keyword table consulted, in order, when the index has nothing.
const STATIC_METADATA: [(&str, &str); 2] = [
    ("customer", CUSTOMER_METADATA),
    ("transaction", TRANSACTION_METADATA),
];

/// Search text sent to the index for the requested tables
pub fn metadata_query(tables: &str) -> String {
    format!(
        "retrieve the full tables metadata without intepreting or editing anything for the following given tables: {tables}"
    )
}

/// Keyword match against the built-in schemas, else a generic description
/// that embeds the query. Never empty.
pub fn static_metadata(query: &str) -> String {
    let lowered = query.to_lowercase();

    STATIC_METADATA
        .iter()
        .find(|(keyword, _)| lowered.contains(keyword))
        .map(|(_, metadata)| metadata.to_string())
        .unwrap_or_else(|| {
            format!(
                "Mock table metadata for query: {query} - customer_information(id, name, email), transaction_history(id, customer_id, amount, date)"
            )
        })
}

/// Finds schema text for the tables a request needs. Never fails.
#[derive(Clone)]
pub struct TableRetriever {
    agents: Agents,
    search: Arc<dyn TableSearch>,
    observer: Arc<dyn RunObserver>,
}

impl TableRetriever {
    pub fn new(agents: Agents, search: Arc<dyn TableSearch>, observer: Arc<dyn RunObserver>) -> Self {
        Self {
            agents,
            search,
            observer,
        }
    }

    pub async fn retrieve(&self, user_request: &str) -> String {
        let args = match self.agents.route_tables(user_request).await {
            Ok(args) => args,
            Err(e) => {
                tracing::error!(error = %e, "Table router failed");
                return ROUTER_FALLBACK.to_string();
            }
        };

        self.observer.required_tables(&args.relevant_tables);
        self.lookup(&args.relevant_tables).await
    }

    /// Index first, then the static fallbacks.
    pub async fn lookup(&self, tables: &[String]) -> String {
        let requested = tables.join(", ");

        match self.search.search_tables(&metadata_query(&requested), tables).await {
            Ok(hits) if !hits.is_empty() => {
                tracing::debug!(hits = hits.len(), "Table metadata from index");
                hits.into_iter()
                    .map(|hit| hit.text)
                    .collect::<Vec<_>>()
                    .join("\n\n")
            }
            Ok(_) => {
                tracing::warn!(tables = %requested, "Index returned no metadata, using fallback");
                static_metadata(&requested)
            }
            Err(e) => {
                tracing::error!(error = %e, "Vector search failed, using fallback");
                static_metadata(&requested)
            }
        }
    }
}
