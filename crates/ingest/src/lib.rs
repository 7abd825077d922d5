pub mod document;
pub mod reader;
pub mod splitter;

pub use document::TableDocument;
pub use reader::FileReader;
pub use splitter::MetadataSplitter;

use anyhow::Result;
use std::path::Path;

/// Derive the table name from a metadata file path.
///
/// `metadata_transaction_history.txt` -> `transaction_history`
pub fn table_name_from_path(path: &Path) -> String {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown_table");
    stem.strip_prefix("metadata_")
        .unwrap_or(stem)
        .to_lowercase()
}

/// Load one metadata file
pub async fn ingest_file(file_path: &Path) -> Result<Vec<TableDocument>> {
    let content = FileReader::read_file(file_path).await?;
    let path_str = file_path.to_string_lossy().to_string();
    let table = table_name_from_path(file_path);

    let docs = MetadataSplitter::default().split(&table, &content, &path_str);
    tracing::debug!(source = %path_str, tables = docs.len(), "Loaded metadata file");

    Ok(docs)
}

/// Load every metadata file in a directory tree
pub async fn ingest_directory(dir_path: &Path) -> Result<Vec<TableDocument>> {
    let files = FileReader::read_directory(dir_path).await?;
    let splitter = MetadataSplitter::default();

    let mut all_docs = Vec::new();

    for (path, content) in files {
        let table = table_name_from_path(Path::new(&path));
        all_docs.extend(splitter.split(&table, &content, &path));
    }

    tracing::info!(
        dir = %dir_path.display(),
        tables = all_docs.len(),
        "Loaded table metadata"
    );

    Ok(all_docs)
}
