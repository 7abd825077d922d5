pub mod convert;
pub mod executor;
pub mod split;

pub use executor::{DatabaseSettings, PgExecutor};
pub use split::split_statements;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How the executor authenticates against the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    /// Trust the server's own identity mapping; no password is sent.
    Integrated,
    /// Configured user name and password.
    SqlLogin,
}

impl FromStr for AuthMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "windows" | "integrated" => Ok(Self::Integrated),
            "sql" | "sql_login" => Ok(Self::SqlLogin),
            other => anyhow::bail!("Unknown auth type: {}", other),
        }
    }
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integrated => write!(f, "windows"),
            Self::SqlLogin => write!(f, "sql"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecStatus {
    Success,
    Error,
}

impl fmt::Display for ExecStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Outcome of one executed statement.
///
/// On success `result` is a JSON array of row objects; on error it holds the
/// database error message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementResult {
    pub statement: String,
    pub status: ExecStatus,
    pub row_count: usize,
    pub columns: Vec<String>,
    pub result: String,
}

impl StatementResult {
    pub fn success(statement: impl Into<String>, columns: Vec<String>, rows: Vec<serde_json::Value>) -> Self {
        let row_count = rows.len();
        Self {
            statement: statement.into(),
            status: ExecStatus::Success,
            row_count,
            columns,
            result: serde_json::Value::Array(rows).to_string(),
        }
    }

    pub fn error(statement: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            statement: statement.into(),
            status: ExecStatus::Error,
            row_count: 0,
            columns: Vec::new(),
            result: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ExecStatus::Success
    }
}

/// Runs generated SQL. Each statement is reported on its own; one failing
/// statement does not stop the rest.
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    async fn execute(&self, sql: &str, auth: AuthMode) -> Result<Vec<StatementResult>>;

    /// Round-trip check used by health endpoints
    async fn ping(&self, auth: AuthMode) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_mode_parses_config_names() {
        assert_eq!("windows".parse::<AuthMode>().unwrap(), AuthMode::Integrated);
        assert_eq!("SQL".parse::<AuthMode>().unwrap(), AuthMode::SqlLogin);
        assert!("kerberos".parse::<AuthMode>().is_err());
        assert_eq!(AuthMode::Integrated.to_string(), "windows");
    }

    #[test]
    fn success_result_serializes_rows() {
        let result = StatementResult::success(
            "SELECT id FROM t",
            vec!["id".into()],
            vec![serde_json::json!({"id": 1}), serde_json::json!({"id": 2})],
        );
        assert_eq!(result.row_count, 2);
        assert_eq!(result.result, r#"[{"id":1},{"id":2}]"#);

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "success");
    }
}
