use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::{Column, Connection, Executor, Row};
use std::time::Duration;

use crate::convert::{column_names, row_to_json};
use crate::split::split_statements;
use crate::{AuthMode, SqlExecutor, StatementResult};

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    pub connect_timeout_secs: u64,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            database: "postgres".to_string(),
            user: "postgres".to_string(),
            password: String::new(),
            connect_timeout_secs: 30,
        }
    }
}

impl DatabaseSettings {
    pub fn connect_options(&self, auth: AuthMode) -> PgConnectOptions {
        let options = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.database)
            .application_name("text2sql");

        match auth {
            AuthMode::Integrated => options,
            AuthMode::SqlLogin => options.username(&self.user).password(&self.password),
        }
    }
}

/// Postgres executor. Opens one connection per batch and closes it afterwards.
pub struct PgExecutor {
    settings: DatabaseSettings,
}

impl PgExecutor {
    pub fn new(settings: DatabaseSettings) -> Self {
        Self { settings }
    }

    async fn connect(&self, auth: AuthMode) -> Result<PgConnection> {
        let options = self.settings.connect_options(auth);
        let timeout = Duration::from_secs(self.settings.connect_timeout_secs);

        tokio::time::timeout(timeout, PgConnection::connect_with(&options))
            .await
            .with_context(|| format!("Timed out connecting to {}:{}", self.settings.host, self.settings.port))?
            .with_context(|| format!("Failed to connect to database {}", self.settings.database))
    }

    async fn run_statement(conn: &mut PgConnection, statement: &str) -> StatementResult {
        match (&mut *conn).fetch_all(sqlx::raw_sql(statement)).await {
            Ok(rows) => {
                let columns = match rows.first() {
                    Some(row) => column_names(row),
                    None => Self::describe_columns(conn, statement).await,
                };
                let records = rows.iter().map(row_to_json).collect();
                StatementResult::success(statement, columns, records)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Statement failed");
                StatementResult::error(statement, e.to_string())
            }
        }
    }
}

impl PgExecutor {
    /// Column names from preparing the statement, for results with no rows.
    /// Empty when the statement returns no columns or cannot be prepared.
    async fn describe_columns(conn: &mut PgConnection, statement: &str) -> Vec<String> {
        match (&mut *conn).describe(statement).await {
            Ok(described) => described
                .columns()
                .iter()
                .map(|column| column.name().to_string())
                .collect(),
            Err(e) => {
                tracing::debug!(error = %e, "Could not describe statement");
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl SqlExecutor for PgExecutor {
    async fn execute(&self, sql: &str, auth: AuthMode) -> Result<Vec<StatementResult>> {
        let statements = split_statements(sql);
        if statements.is_empty() {
            anyhow::bail!("No SQL statements to execute");
        }

        let mut conn = self.connect(auth).await?;
        let mut results = Vec::with_capacity(statements.len());

        for statement in &statements {
            let result = Self::run_statement(&mut conn, statement).await;
            tracing::debug!(
                status = %result.status,
                rows = result.row_count,
                "Executed statement"
            );
            results.push(result);
        }

        if let Err(e) = conn.close().await {
            tracing::debug!(error = %e, "Error closing database connection");
        }

        Ok(results)
    }

    async fn ping(&self, auth: AuthMode) -> Result<()> {
        let mut conn = self.connect(auth).await?;
        let row = sqlx::query("SELECT 1 AS ok")
            .fetch_one(&mut conn)
            .await
            .context("Database ping failed")?;
        let _: i32 = row.try_get("ok")?;
        conn.close().await.ok();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sql_login_sends_credentials() {
        let settings = DatabaseSettings {
            user: "report".into(),
            password: "secret".into(),
            ..Default::default()
        };

        let options = settings.connect_options(AuthMode::SqlLogin);
        assert_eq!(options.get_username(), "report");
        assert_eq!(options.get_port(), 5432);
        assert_eq!(options.get_database(), Some("postgres"));
    }

    #[tokio::test]
    async fn empty_batch_is_rejected_before_connecting() {
        let executor = PgExecutor::new(DatabaseSettings::default());
        let err = executor.execute(" ; -- nothing", AuthMode::Integrated).await.unwrap_err();
        assert!(err.to_string().contains("No SQL statements"));
    }
}
