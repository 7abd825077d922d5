use serde::{Deserialize, Serialize};

pub const MAX_QUERY_CHARS: usize = 1000;

/// Keywords that mark a request as data-mutating, checked in this order.
pub const DANGEROUS_KEYWORDS: [&str; 7] = [
    "DROP", "DELETE", "INSERT", "UPDATE", "ALTER", "CREATE", "TRUNCATE",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryValidation {
    pub is_valid: bool,
    pub warnings: Vec<String>,
}

impl QueryValidation {
    fn valid() -> Self {
        Self {
            is_valid: true,
            warnings: Vec::new(),
        }
    }

    fn invalid(warning: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            warnings: vec![warning.into()],
        }
    }
}

/// Advisory pre-check on a user request. Plain substring matching, not a
/// SQL parser; it does not stop anything from reaching the executor.
pub fn validate_query(query: &str) -> QueryValidation {
    if query.trim().is_empty() {
        return QueryValidation::invalid("Query is empty");
    }

    if query.chars().count() > MAX_QUERY_CHARS {
        return QueryValidation::invalid(format!(
            "Query is too long (max {MAX_QUERY_CHARS} characters)"
        ));
    }

    let upper = query.to_uppercase();
    if let Some(keyword) = DANGEROUS_KEYWORDS.iter().find(|kw| upper.contains(*kw)) {
        return QueryValidation::invalid(format!("Dangerous SQL keyword detected: {keyword}"));
    }

    QueryValidation::valid()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_blank_queries() {
        assert_eq!(validate_query("").warnings, vec!["Query is empty"]);
        assert!(!validate_query("   \n").is_valid);
    }

    #[test]
    fn long_queries_are_rejected_regardless_of_content() {
        let query = "a".repeat(MAX_QUERY_CHARS + 1);
        let validation = validate_query(&query);
        assert!(!validation.is_valid);
        assert_eq!(validation.warnings, vec!["Query is too long (max 1000 characters)"]);

        assert!(validate_query(&"a".repeat(MAX_QUERY_CHARS)).is_valid);
    }

    #[test]
    fn every_keyword_is_caught_in_any_case() {
        for keyword in DANGEROUS_KEYWORDS {
            for query in [
                format!("please {} the customers table", keyword.to_lowercase()),
                format!("{keyword} everything"),
            ] {
                let validation = validate_query(&query);
                assert!(!validation.is_valid, "{query}");
                assert!(validation.warnings[0].contains(keyword));
            }
        }
    }

    #[test]
    fn first_keyword_in_list_order_wins() {
        let validation = validate_query("create then drop");
        assert_eq!(validation.warnings, vec!["Dangerous SQL keyword detected: DROP"]);
    }

    #[test]
    fn ordinary_question_is_valid() {
        let validation = validate_query("Total transaction amount per customer last month?");
        assert_eq!(validation, QueryValidation::valid());
    }
}
