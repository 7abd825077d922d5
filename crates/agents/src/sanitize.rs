use regex::Regex;
use std::sync::LazyLock;

static FENCE_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^```[A-Za-z0-9_+-]*[ \t]*\r?\n?").expect("valid regex"));
static FENCE_CLOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\r?\n?```\s*$").expect("valid regex"));

/// Remove one surrounding markdown code fence, if present.
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }

    let without_open = FENCE_OPEN.replace(trimmed, "");
    FENCE_CLOSE.replace(&without_open, "").trim().to_string()
}

/// Clean up model-generated SQL: fences, `SQL:` echo, surrounding whitespace.
pub fn clean_sql(raw: &str) -> String {
    let sql = strip_code_fences(raw);
    let sql = sql
        .strip_prefix("SQL:")
        .or_else(|| sql.strip_prefix("sql:"))
        .unwrap_or(&sql);
    sql.trim().to_string()
}
