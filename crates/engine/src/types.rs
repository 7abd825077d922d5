use agents::ChatMessage;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QueryOptions {
    /// Allow chart generation when the request asks for one
    pub include_charts: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self { include_charts: true }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SqlResultKind {
    SqlSuccess,
    SqlError,
}

/// One executed (or failed) statement as reported back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlResultEntry {
    #[serde(rename = "type")]
    pub kind: SqlResultKind,
    pub query_info: String,
    pub data: Value,
    pub user_request: Value,
}

impl SqlResultEntry {
    pub fn is_success(&self) -> bool {
        self.kind == SqlResultKind::SqlSuccess
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallSummary {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoutingInfo {
    pub requires_sql: bool,
    pub requires_chart: bool,
    pub tool_calls: Vec<ToolCallSummary>,
}

/// Result of a chart attempt; failures still carry displayable markup.
#[derive(Debug, Clone, PartialEq)]
pub enum ChartOutcome {
    Rendered { user_request: String, html: String },
    Failed { error: String, html: String },
}

impl ChartOutcome {
    pub fn html(&self) -> &str {
        match self {
            ChartOutcome::Rendered { html, .. } | ChartOutcome::Failed { html, .. } => html,
        }
    }

    pub fn is_rendered(&self) -> bool {
        matches!(self, ChartOutcome::Rendered { .. })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResponse {
    pub success: bool,
    pub response: String,
    pub sql_results: Vec<SqlResultEntry>,
    pub chart_html: Option<String>,
    /// `chart_html` holds a rendered figure rather than an error fragment.
    #[serde(skip)]
    pub chart_rendered: bool,
    pub chat_history: Vec<ChatMessage>,
    pub routing_info: Option<RoutingInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
