use agents::{Agents, ChatMessage, RouteDecision, SqlAnalysisArgs, ToolKind, parse_arguments};
use anyhow::Result;
use database::{AuthMode, SqlExecutor, StatementResult};
use index::TableSearch;
use serde_json::Value;
use std::sync::Arc;

use crate::observer::{RunGuard, RunObserver};
use crate::polish::{build_polish_prompt, fallback_message, process_results};
use crate::retriever::TableRetriever;
use crate::types::{
    ChartOutcome, PipelineResponse, QueryOptions, RoutingInfo, SqlResultEntry, SqlResultKind,
    ToolCallSummary,
};

pub const NO_ANSWER: &str = "I don't have a response for that.";
pub const NO_RESULTS: &str = "I couldn't process your request. Please try again.";
pub const APOLOGY: &str =
    "I encountered an error processing your request. Please try again or rephrase your question.";

/// Everything the engine talks to. Built once at startup.
#[derive(Clone)]
pub struct EngineServices {
    pub agents: Agents,
    pub table_search: Arc<dyn TableSearch>,
    pub executor: Arc<dyn SqlExecutor>,
    pub observer: Arc<dyn RunObserver>,
    pub auth_mode: AuthMode,
}

/// The answer for one request, minus the history it gets appended to.
struct Reply {
    success: bool,
    response: String,
    sql_results: Vec<SqlResultEntry>,
    chart_html: Option<String>,
    chart_rendered: bool,
    routing_info: Option<RoutingInfo>,
    error: Option<String>,
    turn: ChatMessage,
}

#[derive(Clone)]
pub struct Text2SqlEngine {
    agents: Agents,
    retriever: TableRetriever,
    executor: Arc<dyn SqlExecutor>,
    observer: Arc<dyn RunObserver>,
    auth_mode: AuthMode,
}

impl Text2SqlEngine {
    pub fn new(services: EngineServices) -> Self {
        let retriever = TableRetriever::new(
            services.agents.clone(),
            services.table_search,
            services.observer.clone(),
        );

        Self {
            agents: services.agents,
            retriever,
            executor: services.executor,
            observer: services.observer,
            auth_mode: services.auth_mode,
        }
    }

    pub fn agents(&self) -> &Agents {
        &self.agents
    }

    pub fn executor(&self) -> &Arc<dyn SqlExecutor> {
        &self.executor
    }

    pub fn auth_mode(&self) -> AuthMode {
        self.auth_mode
    }

    /// Run the full pipeline for one request. Never fails: errors become an
    /// apology with `success = false`.
    pub async fn process_query(
        &self,
        user_input: &str,
        chat_history: Vec<ChatMessage>,
        options: QueryOptions,
    ) -> PipelineResponse {
        let mut chat_history = chat_history;
        if !chat_history.last().is_some_and(|last| last.is_user_turn(user_input)) {
            chat_history.push(ChatMessage::user(user_input));
        }

        let _run = RunGuard::start(self.observer.clone(), user_input);

        let reply = match self.run(user_input, &chat_history, options).await {
            Ok(reply) => reply,
            Err(e) => {
                let message = format!("Text2SQL Engine Error: {e}");
                tracing::error!(error = %e, "Pipeline failed");
                self.observer.error(&message);

                Reply {
                    success: false,
                    response: APOLOGY.to_string(),
                    sql_results: Vec::new(),
                    chart_html: None,
                    chart_rendered: false,
                    routing_info: None,
                    error: Some(e.to_string()),
                    turn: ChatMessage::assistant(APOLOGY),
                }
            }
        };

        chat_history.push(reply.turn);

        PipelineResponse {
            success: reply.success,
            response: reply.response,
            sql_results: reply.sql_results,
            chart_html: reply.chart_html,
            chart_rendered: reply.chart_rendered,
            chat_history,
            routing_info: reply.routing_info,
            error: reply.error,
        }
    }

    async fn run(&self, user_input: &str, history: &[ChatMessage], options: QueryOptions) -> Result<Reply> {
        // Step 1: Route the request
        let calls = match self.agents.route(user_input, history).await? {
            RouteDecision::Answer(content) => {
                self.observer.router_response(Some(&content), &[]);
                return Ok(self.direct_answer(content));
            }
            RouteDecision::ToolCalls(calls) => calls,
        };

        let names: Vec<String> = calls.iter().map(|c| c.function.name.clone()).collect();
        self.observer.router_response(None, &names);
        tracing::info!(count = calls.len(), "Processing tool calls");

        // Step 2: Dispatch tool calls
        let mut sql_results = Vec::new();
        let mut chart = None;

        // Only the dispatched call has its arguments decoded
        for call in &calls {
            match ToolKind::from_name(&call.function.name) {
                Some(ToolKind::SqlAnalysis) => {
                    let args: SqlAnalysisArgs = parse_arguments(call)?;
                    let user_request = match args.user_requests {
                        Value::Null => Value::String(user_input.to_string()),
                        other => other,
                    };
                    (sql_results, chart) = self.sql_analysis(user_input, &user_request, options).await;
                }
                _ => {
                    tracing::warn!(tool = %call.function.name, "Ignoring tool call at routing level");
                }
            }
        }

        let chart_html = chart.as_ref().map(|c| c.html().to_string());
        let chart_rendered = chart.as_ref().is_some_and(ChartOutcome::is_rendered);
        let routing_info = RoutingInfo {
            requires_sql: true,
            requires_chart: chart_html.is_some(),
            tool_calls: names.into_iter().map(|name| ToolCallSummary { name }).collect(),
        };

        // Step 3: Polish the results
        let prompt = build_polish_prompt(user_input, &sql_results, chart.as_ref());
        self.observer.polish_prompt(prompt.as_deref());

        let Some(prompt) = prompt else {
            return Ok(Reply {
                success: false,
                response: NO_RESULTS.to_string(),
                sql_results,
                chart_html,
                chart_rendered,
                routing_info: Some(routing_info),
                error: Some("Could not build polish prompt".to_string()),
                turn: ChatMessage::assistant(NO_RESULTS),
            });
        };

        let response = match self.agents.final_response(&prompt, &[]).await? {
            Some(text) => text,
            None => fallback_message(&sql_results, chart.as_ref()),
        };
        self.observer.final_response(&response);

        let turn = match &chart_html {
            Some(html) => ChatMessage::assistant_with_chart(response.clone(), html.clone()),
            None => ChatMessage::assistant(response.clone()),
        };

        Ok(Reply {
            success: true,
            response,
            sql_results,
            chart_html,
            chart_rendered,
            routing_info: Some(routing_info),
            error: None,
            turn,
        })
    }

    fn direct_answer(&self, content: String) -> Reply {
        let content = if content.trim().is_empty() {
            NO_ANSWER.to_string()
        } else {
            content
        };
        self.observer.final_response(&content);

        Reply {
            success: true,
            response: content.clone(),
            sql_results: Vec::new(),
            chart_html: None,
            chart_rendered: false,
            routing_info: Some(RoutingInfo::default()),
            error: None,
            turn: ChatMessage::assistant(content),
        }
    }

    /// Tables, SQL, execution and optional chart. Failures become a single
    /// `sql_error` entry.
    async fn sql_analysis(
        &self,
        user_input: &str,
        user_request: &Value,
        options: QueryOptions,
    ) -> (Vec<SqlResultEntry>, Option<ChartOutcome>) {
        match self.analyze(user_input, user_request, options).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(error = %e, "SQL analysis failed");
                self.observer.error(&format!("Error in SQL analysis: {e}"));

                let entry = SqlResultEntry {
                    kind: SqlResultKind::SqlError,
                    query_info: format!("SQL analysis failed: {e}"),
                    data: Value::Null,
                    user_request: user_request.clone(),
                };
                (vec![entry], None)
            }
        }
    }

    async fn analyze(
        &self,
        user_input: &str,
        user_request: &Value,
        options: QueryOptions,
    ) -> Result<(Vec<SqlResultEntry>, Option<ChartOutcome>)> {
        // Step 1: Find the tables
        let metadata = self.retriever.retrieve(user_input).await;
        self.observer.table_metadata(&metadata);

        // Step 2: Generate SQL
        let sql = self
            .agents
            .generate_sql(&Value::String(user_input.to_string()), &metadata)
            .await?;
        self.observer.sql_code(&sql);

        // Step 3: Execute
        let results = self.executor.execute(&sql, self.auth_mode).await?;
        self.observer.sql_results(&results);

        // Step 4: Process results
        let entries = process_results(&results, user_request);

        // Step 5: Chart, if asked for
        let chart = if options.include_charts && charts::is_chart_request(user_input) {
            Some(self.chart(user_input, &results).await)
        } else {
            None
        };

        Ok((entries, chart))
    }

    async fn chart(&self, user_input: &str, results: &[StatementResult]) -> ChartOutcome {
        let data = serde_json::to_string(results).unwrap_or_default();
        let request = format!("User Query: {user_input}\nHere is the data: \n {data}");

        let rendered = self
            .agents
            .generate_chart(&request)
            .await
            .and_then(|spec| charts::build_chart_html(&spec));

        let outcome = match rendered {
            Ok(html) => ChartOutcome::Rendered {
                user_request: user_input.to_string(),
                html,
            },
            Err(e) => {
                tracing::warn!(error = %e, "Chart generation failed");
                let error = e.to_string();
                ChartOutcome::Failed {
                    html: charts::error_html(&error),
                    error,
                }
            }
        };

        self.observer.chart(outcome.is_rendered());
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::testing::RecordingObserver;
    use crate::testing::{CannedExecutor, CannedSearch, ScriptedClient};
    use agents::{AssistantMessage, MessageContent, Role, ToolCall};
    use index::TableMatch;
    use serde_json::json;

    struct Harness {
        engine: Text2SqlEngine,
        client: Arc<ScriptedClient>,
        executor: Arc<CannedExecutor>,
        observer: Arc<RecordingObserver>,
    }

    fn harness(replies: Vec<AssistantMessage>, executor: Arc<CannedExecutor>) -> Harness {
        let client = ScriptedClient::new(replies);
        let observer = Arc::new(RecordingObserver::default());
        let search = CannedSearch::hits(vec![TableMatch {
            table_name: "customer_information".into(),
            text: "customer_information(id, name, email)".into(),
            score: 0.8,
        }]);

        let engine = Text2SqlEngine::new(EngineServices {
            agents: Agents::new(client.clone()),
            table_search: Arc::new(search),
            executor: executor.clone(),
            observer: observer.clone(),
            auth_mode: AuthMode::Integrated,
        });

        Harness {
            engine,
            client,
            executor,
            observer,
        }
    }

    fn sql_call() -> AssistantMessage {
        AssistantMessage::tool_calls(vec![ToolCall::function(
            "agent_sql_analysis",
            r#"{"user_requests": "count customers"}"#,
        )])
    }

    fn table_call() -> AssistantMessage {
        AssistantMessage::tool_calls(vec![ToolCall::function(
            "agent_table_rag",
            r#"{"relevant_tables": ["customer_information"]}"#,
        )])
    }

    fn one_row() -> Vec<StatementResult> {
        vec![StatementResult::success(
            "SELECT COUNT(*) AS total FROM customer_information",
            vec!["total".into()],
            vec![json!({"total": 3})],
        )]
    }

    fn assistant_turns(history: &[ChatMessage]) -> usize {
        history.iter().filter(|m| m.role == Role::Assistant).count()
    }

    #[tokio::test]
    async fn direct_answer_skips_sql() {
        let h = harness(vec![AssistantMessage::text("Hello! Ask me about your data.")], CannedExecutor::new(vec![]));

        let response = h.engine.process_query("hi", vec![], QueryOptions::default()).await;

        assert!(response.success);
        assert_eq!(response.response, "Hello! Ask me about your data.");
        assert_eq!(response.routing_info.as_ref().map(|r| r.requires_sql), Some(false));
        assert_eq!(response.chat_history.len(), 2);
        assert_eq!(assistant_turns(&response.chat_history), 1);
        assert!(h.executor.executed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_direct_answer_gets_default_text() {
        let h = harness(vec![AssistantMessage::text("")], CannedExecutor::new(vec![]));
        let response = h.engine.process_query("hi", vec![], QueryOptions::default()).await;
        assert_eq!(response.response, NO_ANSWER);
    }

    #[tokio::test]
    async fn sql_request_runs_full_pipeline() {
        let h = harness(
            vec![
                sql_call(),
                table_call(),
                AssistantMessage::text("```sql\nSELECT COUNT(*) AS total FROM customer_information\n```"),
                AssistantMessage::text("You have 3 customers."),
            ],
            CannedExecutor::new(one_row()),
        );

        let response = h
            .engine
            .process_query("How many customers do we have?", vec![], QueryOptions::default())
            .await;

        assert!(response.success);
        assert_eq!(response.response, "You have 3 customers.");
        assert_eq!(response.chart_html, None);
        assert_eq!(response.sql_results.len(), 1);
        assert_eq!(response.sql_results[0].kind, SqlResultKind::SqlSuccess);
        assert!(response.sql_results[0].query_info.contains("1 rows"));
        assert_eq!(response.sql_results[0].user_request, json!("count customers"));

        let routing = response.routing_info.unwrap();
        assert!(routing.requires_sql);
        assert!(!routing.requires_chart);
        assert_eq!(routing.tool_calls[0].name, "agent_sql_analysis");

        let executed = h.executor.executed.lock().unwrap();
        assert_eq!(executed[0].0, "SELECT COUNT(*) AS total FROM customer_information");
        assert_eq!(executed[0].1, AuthMode::Integrated);

        assert!(h.client.last_message(3).contains("Query returned 1 rows with columns: total"));
        assert_eq!(h.observer.events(), vec!["start", "sql_results", "final_response", "end"]);
    }

    #[tokio::test]
    async fn failed_statement_still_reaches_final_response() {
        let h = harness(
            vec![
                sql_call(),
                table_call(),
                AssistantMessage::text("SELECT nope FROM customer_information"),
                AssistantMessage::text("That query failed."),
            ],
            CannedExecutor::new(vec![StatementResult::error(
                "SELECT nope FROM customer_information",
                "column \"nope\" does not exist",
            )]),
        );

        let response = h.engine.process_query("list customers", vec![], QueryOptions::default()).await;

        assert!(response.success);
        assert_eq!(response.sql_results[0].kind, SqlResultKind::SqlError);
        assert_eq!(response.sql_results[0].data, json!("column \"nope\" does not exist"));
        assert_eq!(h.client.request_count(), 4);
        assert!(h.client.last_message(3).contains("SQL Query Errors:"));
    }

    #[tokio::test]
    async fn unreachable_database_becomes_sql_error() {
        let h = harness(
            vec![
                sql_call(),
                table_call(),
                AssistantMessage::text("SELECT 1"),
                AssistantMessage::text("The database is unavailable."),
            ],
            CannedExecutor::unreachable(),
        );

        let response = h.engine.process_query("list customers", vec![], QueryOptions::default()).await;

        assert!(response.success);
        assert_eq!(response.sql_results[0].data, Value::Null);
        assert!(response.sql_results[0].query_info.starts_with("SQL analysis failed: "));
        assert_eq!(response.response, "The database is unavailable.");
    }

    #[tokio::test]
    async fn chart_request_renders_chart() {
        let figure = r#"{"data": [{"type": "bar", "x": ["2024-01"], "y": [1200]}], "layout": {"height": 700}}"#;
        let h = harness(
            vec![
                sql_call(),
                table_call(),
                AssistantMessage::text("SELECT 1"),
                AssistantMessage::text(figure),
                AssistantMessage::text("Here is your chart."),
            ],
            CannedExecutor::new(one_row()),
        );

        let response = h
            .engine
            .process_query("bar chart of monthly amount", vec![], QueryOptions::default())
            .await;

        assert!(response.chart_rendered);
        let html = response.chart_html.clone().unwrap();
        assert!(html.contains("Plotly.newPlot"));
        assert!(html.contains(r#""height":350"#));
        assert!(response.routing_info.unwrap().requires_chart);
        assert!(h.client.last_message(3).starts_with("User Query: bar chart of monthly amount\nHere is the data: \n "));
        assert!(h.client.last_message(4).contains("Successfully generated chart for: bar chart of monthly amount"));

        let last = response.chat_history.last().unwrap();
        assert_eq!(
            last.content,
            MessageContent::Chart {
                text: "Here is your chart.".into(),
                chart_html: html,
            }
        );
    }

    #[tokio::test]
    async fn charts_can_be_disabled() {
        let h = harness(
            vec![
                sql_call(),
                table_call(),
                AssistantMessage::text("SELECT 1"),
                AssistantMessage::text("Totals by month."),
            ],
            CannedExecutor::new(one_row()),
        );

        let response = h
            .engine
            .process_query("bar chart of monthly amount", vec![], QueryOptions { include_charts: false })
            .await;

        assert!(response.success);
        assert_eq!(response.chart_html, None);
        assert_eq!(h.client.request_count(), 4);
    }

    #[tokio::test]
    async fn broken_chart_becomes_error_markup() {
        let h = harness(
            vec![
                sql_call(),
                table_call(),
                AssistantMessage::text("SELECT 1"),
                AssistantMessage::text("fig = px.line(df)\nfig.show()"),
                AssistantMessage::text("Chart failed but here are the numbers."),
            ],
            CannedExecutor::new(one_row()),
        );

        let response = h.engine.process_query("line graph of totals", vec![], QueryOptions::default()).await;

        assert!(response.success);
        assert!(!response.chart_rendered);
        assert!(response.chart_html.unwrap().starts_with(r#"<div class="chart-error">"#));
        assert!(h.client.last_message(4).contains("Chart Generation Errors:"));
    }

    #[tokio::test]
    async fn empty_final_response_uses_fallback() {
        let h = harness(
            vec![sql_call(), table_call(), AssistantMessage::text("SELECT 1"), AssistantMessage::text(" ")],
            CannedExecutor::new(one_row()),
        );

        let response = h.engine.process_query("count customers", vec![], QueryOptions::default()).await;

        assert!(response.success);
        assert_eq!(
            response.response,
            "I've analyzed your request but encountered an issue formatting the results. Successfully executed 1 SQL queries."
        );
    }

    #[tokio::test]
    async fn numeric_identifier_does_not_fail_the_request() {
        let h = harness(
            vec![
                AssistantMessage::tool_calls(vec![ToolCall::function(
                    "agent_sql_analysis",
                    r#"{"user_requests": "balance for customer", "identifier": 12345}"#,
                )]),
                table_call(),
                AssistantMessage::text("SELECT 1"),
                AssistantMessage::text("Your balance is 3."),
            ],
            CannedExecutor::new(one_row()),
        );

        let response = h.engine.process_query("balance for 12345", vec![], QueryOptions::default()).await;

        assert!(response.success);
        assert_eq!(response.error, None);
        assert_eq!(response.sql_results[0].kind, SqlResultKind::SqlSuccess);
    }

    #[tokio::test]
    async fn ignored_tool_arguments_are_never_decoded() {
        let h = harness(
            vec![
                AssistantMessage::tool_calls(vec![
                    ToolCall::function("agent_sql_analysis", r#"{"user_requests": "count customers"}"#),
                    ToolCall::function("agent_generate_charts", r#"{"user_request": ["bar of counts"]}"#),
                    ToolCall::function("agent_table_rag", "{not json"),
                ]),
                table_call(),
                AssistantMessage::text("SELECT 1"),
                AssistantMessage::text("You have 3 customers."),
            ],
            CannedExecutor::new(one_row()),
        );

        let response = h.engine.process_query("count customers", vec![], QueryOptions::default()).await;

        assert!(response.success);
        assert_eq!(response.sql_results.len(), 1);
        assert_eq!(response.response, "You have 3 customers.");

        let names: Vec<_> = response.routing_info.unwrap().tool_calls.into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["agent_sql_analysis", "agent_generate_charts", "agent_table_rag"]);
    }

    #[tokio::test]
    async fn non_sql_tool_calls_leave_nothing_to_polish() {
        let h = harness(vec![table_call()], CannedExecutor::new(vec![]));

        let response = h.engine.process_query("which tables?", vec![], QueryOptions::default()).await;

        assert!(!response.success);
        assert_eq!(response.response, NO_RESULTS);
        assert_eq!(response.error.as_deref(), Some("Could not build polish prompt"));
        assert_eq!(h.client.request_count(), 1);
    }

    #[tokio::test]
    async fn router_failure_returns_apology_and_ends_run() {
        let h = harness(vec![], CannedExecutor::new(vec![]));

        let response = h.engine.process_query("hi", vec![], QueryOptions::default()).await;

        assert!(!response.success);
        assert_eq!(response.response, APOLOGY);
        assert!(response.error.unwrap().contains("no scripted reply left"));
        assert_eq!(response.chat_history.last().unwrap().content.as_text(), APOLOGY);
        assert_eq!(h.observer.events(), vec!["start", "error", "end"]);
    }

    #[tokio::test]
    async fn repeated_user_turn_is_not_duplicated() {
        let h = harness(vec![AssistantMessage::text("Hi again")], CannedExecutor::new(vec![]));
        let history = vec![ChatMessage::user("hello")];

        let response = h.engine.process_query("hello", history, QueryOptions::default()).await;

        assert_eq!(response.chat_history.len(), 2);
        assert_eq!(h.client.requests.lock().unwrap()[0].messages.len(), 2);
    }
}
