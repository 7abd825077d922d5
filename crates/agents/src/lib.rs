pub mod llm;
pub mod prompts;
pub mod sanitize;
pub mod schema;
pub mod tools;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use llm::{AzureChatClient, AzureOpenAiSettings, ChatClient, build_http_client};
pub use schema::{
    AssistantMessage, ChatMessage, ChatRequest, MessageContent, Role, ToolCall, ToolChoice,
    ToolDefinition, WireMessage,
};
pub use tools::{ChartArgs, SqlAnalysisArgs, TableRagArgs, ToolInvocation, ToolKind, parse_arguments};

use anyhow::{Context, Result};
use serde_json::Value;
use std::sync::Arc;

/// What the routing agent decided to do with a request.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteDecision {
    /// Plain-text answer; may be empty if the model sent nothing.
    Answer(String),
    /// At least one tool call.
    ToolCalls(Vec<ToolCall>),
}

/// Build `[system] + history + user`, skipping the user turn when the
/// history already ends with it.
pub fn build_messages(system: String, history: &[ChatMessage], user_request: &str) -> Vec<WireMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(WireMessage::from(&ChatMessage::system(system)));
    messages.extend(history.iter().map(WireMessage::from));

    let already_last = history.last().is_some_and(|last| last.is_user_turn(user_request));
    if !already_last {
        messages.push(WireMessage::from(&ChatMessage::user(user_request)));
    }

    messages
}

/// The LLM-driven agents of the pipeline. Each issues one templated prompt.
#[derive(Clone)]
pub struct Agents {
    client: Arc<dyn ChatClient>,
}

impl Agents {
    pub fn new(client: Arc<dyn ChatClient>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Arc<dyn ChatClient> {
        &self.client
    }

    /// Route the request to a tool or answer it directly
    pub async fn route(&self, user_request: &str, history: &[ChatMessage]) -> Result<RouteDecision> {
        let messages = build_messages(prompts::build_router_prompt(), history, user_request);
        let request = ChatRequest::new(messages).with_tools(tools::router_tools(), ToolChoice::Auto);

        let message = self.client.complete(request).await?;

        if message.calls().is_empty() {
            Ok(RouteDecision::Answer(message.content.unwrap_or_default()))
        } else {
            Ok(RouteDecision::ToolCalls(message.calls().to_vec()))
        }
    }

    /// Ask which tables are needed; the model must answer with `agent_table_rag`
    pub async fn route_tables(&self, user_request: &str) -> Result<TableRagArgs> {
        let messages = vec![
            WireMessage::from(&ChatMessage::system(prompts::build_table_router_prompt())),
            WireMessage::from(&ChatMessage::user(user_request)),
        ];
        let request = ChatRequest::new(messages)
            .with_tools(vec![ToolKind::TableRag.definition()], ToolChoice::Required);

        let message = self.client.complete(request).await?;
        let call = message
            .calls()
            .first()
            .context("Table router returned no tool call")?;

        match ToolInvocation::parse(call)? {
            ToolInvocation::TableRag(args) => Ok(args),
            other => anyhow::bail!("Unexpected tool call name: {}", other.name()),
        }
    }

    /// Generate SQL for the request given the retrieved table metadata
    pub async fn generate_sql(&self, user_request: &Value, required_tables: &str) -> Result<String> {
        let serialized = match user_request {
            Value::String(text) => text.clone(),
            other => serde_json::to_string(other).context("Failed to serialize user request")?,
        };

        let messages = vec![
            WireMessage::from(&ChatMessage::system(prompts::build_sql_analysis_prompt(required_tables))),
            WireMessage::from(&ChatMessage::user(serialized)),
        ];

        let message = self.client.complete(ChatRequest::new(messages)).await?;
        let sql = message.content.unwrap_or_default();

        Ok(sanitize::clean_sql(&sql))
    }

    /// Generate a chart figure spec for the request and its data
    pub async fn generate_chart(&self, request_with_data: &str) -> Result<String> {
        let messages = vec![
            WireMessage::from(&ChatMessage::system(prompts::build_chart_prompt())),
            WireMessage::from(&ChatMessage::user(request_with_data)),
        ];

        let message = self.client.complete(ChatRequest::new(messages)).await?;
        message
            .content
            .filter(|code| !code.trim().is_empty())
            .context("Chart agent returned no content")
    }

    /// Polish the results into a natural-language answer. `None` if the model
    /// returned no text.
    pub async fn final_response(&self, user_request: &str, history: &[ChatMessage]) -> Result<Option<String>> {
        let messages = build_messages(prompts::build_final_response_prompt(), history, user_request);
        let message = self.client.complete(ChatRequest::new(messages)).await?;

        Ok(message.content.filter(|text| !text.trim().is_empty()))
    }

    /// Cheap completion used by health checks
    pub async fn validate_connection(&self) -> Result<()> {
        let request = ChatRequest::new(vec![WireMessage::from(&ChatMessage::user("Hello"))]).with_max_tokens(10);
        self.client.complete(request).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedClient;

    #[test]
    fn user_turn_is_not_duplicated() {
        let history = vec![ChatMessage::user("total sales?")];
        let messages = build_messages("sys".into(), &history, "total sales?");
        assert_eq!(messages.len(), 2);

        let history = vec![ChatMessage::user("hi"), ChatMessage::assistant("hello")];
        let messages = build_messages("sys".into(), &history, "total sales?");
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[3].content, "total sales?");
    }

    #[tokio::test]
    async fn route_returns_answer_without_tool_calls() {
        let client = ScriptedClient::new(vec![AssistantMessage::text("Hello there")]);
        let agents = Agents::new(client.clone());

        let decision = agents.route("hi", &[]).await.unwrap();
        assert_eq!(decision, RouteDecision::Answer("Hello there".into()));

        let requests = client.requests.lock().unwrap();
        assert_eq!(requests[0].tool_choice, Some(ToolChoice::Auto));
        assert_eq!(requests[0].tools.len(), 2);
    }

    #[tokio::test]
    async fn route_tables_requires_table_rag() {
        let client = ScriptedClient::new(vec![
            AssistantMessage::tool_calls(vec![ToolCall::function(
                "agent_table_rag",
                r#"{"relevant_tables": ["transaction_history"]}"#,
            )]),
            AssistantMessage::tool_calls(vec![ToolCall::function("agent_sql_analysis", "{}")]),
        ]);
        let agents = Agents::new(client.clone());

        let args = agents.route_tables("monthly volume").await.unwrap();
        assert_eq!(args.relevant_tables, vec!["transaction_history"]);
        assert!(agents.route_tables("monthly volume").await.is_err());

        let requests = client.requests.lock().unwrap();
        assert_eq!(requests[0].tool_choice, Some(ToolChoice::Required));
        assert_eq!(requests[0].tools.len(), 1);
    }

    #[tokio::test]
    async fn generate_sql_serializes_structured_requests() {
        let client = ScriptedClient::new(vec![AssistantMessage::text("```sql\nSELECT 1\n```")]);
        let agents = Agents::new(client.clone());

        let sql = agents
            .generate_sql(&serde_json::json!({"intent": "balance"}), "customer_information(id)")
            .await
            .unwrap();
        assert_eq!(sql, "SELECT 1");

        let requests = client.requests.lock().unwrap();
        assert!(requests[0].messages[0].content.contains("customer_information(id)"));
        assert_eq!(requests[0].messages[1].content, r#"{"intent":"balance"}"#);
        assert!(requests[0].tools.is_empty());
    }

    #[tokio::test]
    async fn empty_final_response_is_none() {
        let client = ScriptedClient::new(vec![AssistantMessage::text("   ")]);
        let agents = Agents::new(client);

        assert_eq!(agents.final_response("summary", &[]).await.unwrap(), None);
    }
}
