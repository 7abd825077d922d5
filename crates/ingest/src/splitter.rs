use crate::document::TableDocument;

/// Splits a metadata file into one document per table.
///
/// A file may describe several tables, each introduced by a markdown heading
/// (`# customer_information`). Text before the first heading, or a file with
/// no headings at all, belongs to the table named after the file.
pub struct MetadataSplitter {
    min_section_chars: usize,
}

impl Default for MetadataSplitter {
    fn default() -> Self {
        Self {
            min_section_chars: 1,
        }
    }
}

impl MetadataSplitter {
    pub fn new(min_section_chars: usize) -> Self {
        Self { min_section_chars }
    }

    pub fn split(&self, default_table: &str, text: &str, source: &str) -> Vec<TableDocument> {
        self.split_by_headings(default_table, text)
            .into_iter()
            .filter(|(_, body)| body.trim().len() >= self.min_section_chars)
            .map(|(table, body)| {
                TableDocument::new(table, body.trim().to_string(), source.to_string())
            })
            .collect()
    }

    fn split_by_headings(&self, default_table: &str, text: &str) -> Vec<(String, String)> {
        let mut sections = Vec::new();
        let mut current_table = default_table.to_string();
        let mut current_section = String::new();

        for line in text.lines() {
            if let Some(heading) = Self::heading_name(line) {
                if !current_section.trim().is_empty() {
                    sections.push((current_table, current_section));
                }
                current_table = heading;
                current_section = String::new();
            }
            current_section.push_str(line);
            current_section.push('\n');
        }

        if !current_section.trim().is_empty() {
            sections.push((current_table, current_section));
        }

        sections
    }

    fn heading_name(line: &str) -> Option<String> {
        let trimmed = line.trim_start();
        if !trimmed.starts_with('#') {
            return None;
        }
        let name = trimmed.trim_start_matches('#').trim();
        let name = name.trim_end_matches(':').trim();
        if name.is_empty() {
            None
        } else {
            Some(name.to_lowercase().replace(' ', "_"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_file_without_headings() {
        let splitter = MetadataSplitter::default();
        let docs = splitter.split(
            "transaction_history",
            "- id (int)\n- amount (decimal)",
            "metadata_transaction_history.txt",
        );

        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].table_name, "transaction_history");
        assert!(docs[0].text.contains("amount"));
    }

    #[test]
    fn one_document_per_heading() {
        let splitter = MetadataSplitter::default();
        let text = "# CRS Account Report\n- account_id (int)\n\n# crs_country_code:\n- alpha2 (char(2))\n";
        let docs = splitter.split("crs", text, "metadata_crs.txt");

        let names: Vec<_> = docs.iter().map(|d| d.table_name.as_str()).collect();
        assert_eq!(names, vec!["crs_account_report", "crs_country_code"]);
        assert!(docs[1].text.starts_with("# crs_country_code"));
    }
}
