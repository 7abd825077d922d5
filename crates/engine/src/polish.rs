use database::StatementResult;
use serde_json::Value;

use crate::types::{ChartOutcome, SqlResultEntry, SqlResultKind};

/// Turn executor output into pipeline result entries.
pub fn process_results(results: &[StatementResult], user_request: &Value) -> Vec<SqlResultEntry> {
    results
        .iter()
        .map(|res| {
            if !res.is_success() {
                return SqlResultEntry {
                    kind: SqlResultKind::SqlError,
                    query_info: format!("Query failed with status: {}", res.status),
                    data: Value::String(res.result.clone()),
                    user_request: user_request.clone(),
                };
            }

            match serde_json::from_str::<Value>(&res.result) {
                Ok(data) if res.columns.is_empty() => SqlResultEntry {
                    kind: SqlResultKind::SqlSuccess,
                    query_info: format!("Query returned {} rows", res.row_count),
                    data,
                    user_request: user_request.clone(),
                },
                Ok(data) => SqlResultEntry {
                    kind: SqlResultKind::SqlSuccess,
                    query_info: format!(
                        "Query returned {} rows with columns: {}",
                        res.row_count,
                        res.columns.join(", ")
                    ),
                    data,
                    user_request: user_request.clone(),
                },
                Err(_) => SqlResultEntry {
                    kind: SqlResultKind::SqlSuccess,
                    query_info: format!("Query returned {} rows", res.row_count),
                    data: Value::String(res.result.clone()),
                    user_request: user_request.clone(),
                },
            }
        })
        .collect()
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Prompt for the final-response agent. `None` when there is nothing to
/// summarize.
pub fn build_polish_prompt(
    user_input: &str,
    sql_results: &[SqlResultEntry],
    chart: Option<&ChartOutcome>,
) -> Option<String> {
    if sql_results.is_empty() && chart.is_none() {
        return None;
    }

    let mut parts = vec![format!("User Query: '{user_input}'\n")];

    let (successes, failures): (Vec<_>, Vec<_>) = sql_results.iter().partition(|r| r.is_success());

    if !successes.is_empty() {
        parts.push("SQL Query Results:".to_string());
        for result in successes {
            parts.push(format!("- {}", result.query_info));
            parts.push(format!("  Data: {}", display_value(&result.data)));
        }
    }

    if !failures.is_empty() {
        parts.push("SQL Query Errors:".to_string());
        for result in failures {
            parts.push(format!("- {}", result.query_info));
        }
    }

    match chart {
        Some(ChartOutcome::Rendered { user_request, .. }) => {
            parts.push("Chart Generation Results:".to_string());
            parts.push(format!("- Successfully generated chart for: {user_request}"));
        }
        Some(ChartOutcome::Failed { error, .. }) => {
            parts.push("Chart Generation Errors:".to_string());
            parts.push(format!("- Failed to generate chart: {error}"));
        }
        None => {}
    }

    parts.push("\nPlease provide a clear, friendly summary of these results.".to_string());

    Some(parts.join("\n"))
}

/// Answer used when the final-response agent returns nothing.
pub fn fallback_message(sql_results: &[SqlResultEntry], chart: Option<&ChartOutcome>) -> String {
    let mut parts = vec!["I've analyzed your request but encountered an issue formatting the results.".to_string()];

    if !sql_results.is_empty() {
        let succeeded = sql_results.iter().filter(|r| r.is_success()).count();
        parts.push(format!("Successfully executed {succeeded} SQL queries."));
    }

    if let Some(chart) = chart {
        let rendered = usize::from(chart.is_rendered());
        parts.push(format!("Successfully generated {rendered} charts."));
    }

    parts.join(" ")
}
