use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Schema description of one database table, as stored in the vector index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TableDocument {
    pub doc_id: String,
    pub table_name: String,
    pub text: String,
    pub source: String,
    pub description: Option<String>,
    pub category: Option<String>,
}

impl TableDocument {
    pub fn new(table_name: String, text: String, source: String) -> Self {
        let doc_id = Self::generate_doc_id(&table_name, &source);
        let description = header_field(&text, "Description");
        let category = header_field(&text, "Category");

        Self {
            doc_id,
            table_name,
            text,
            source,
            description,
            category,
        }
    }

    fn generate_doc_id(table_name: &str, source: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(source.as_bytes());
        hasher.update(b"#");
        hasher.update(table_name.as_bytes());
        let result = hasher.finalize();
        hex::encode(&result[..16]) // Use first 16 bytes (32 hex chars)
    }

    /// Stable numeric point id for the vector store
    pub fn point_id(&self) -> u64 {
        let bytes = hex::decode(&self.doc_id[..16]).unwrap_or_default();
        bytes.iter().fold(0u64, |acc, b| (acc << 8) | *b as u64)
    }
}

/// Value of the first `Key:` line of the metadata text, key matched case-insensitively
fn header_field(text: &str, key: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.trim().eq_ignore_ascii_case(key).then(|| value.trim().to_string())
        })
        .filter(|value| !value.is_empty())
}
