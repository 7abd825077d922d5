use agents::ChatMessage;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use database::StatementResult;
use engine::{PipelineResponse, QueryOptions, QueryValidation, Text2SqlEngine, validate_query};
use index::{IndexStats, TableSearch};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::metrics::{Metrics, MetricsSnapshot, TimedOperation};

pub struct AppState {
    pub engine: Text2SqlEngine,
    pub table_search: Arc<dyn TableSearch>,
    pub metrics: Arc<Metrics>,
}

#[derive(Deserialize)]
pub struct GenerateRequest {
    pub query: String,
    #[serde(default = "default_true")]
    pub include_charts: bool,
    #[serde(default)]
    pub chat_history: Vec<ChatMessage>,
}

fn default_true() -> bool {
    true
}

#[derive(Deserialize)]
pub struct ExecuteRequest {
    pub sql_query: String,
    #[serde(default)]
    pub validate: bool,
}

#[derive(Serialize, Deserialize)]
pub struct ExecuteResponse {
    pub success: bool,
    pub results: Vec<StatementResult>,
    pub execution_time_ms: f64,
    pub warnings: Vec<String>,
}

#[derive(Deserialize)]
pub struct ValidateRequest {
    pub query: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    llm: String,
    vector_index: String,
    database: String,
}

#[derive(Serialize)]
pub struct StatsResponse {
    metrics: MetricsSnapshot,
    index: Option<IndexStats>,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/stats", get(get_stats))
        .route("/api/v1/text2sql/generate", post(generate))
        .route("/api/v1/text2sql/execute", post(execute_sql))
        .route("/api/v1/text2sql/validate", post(validate))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn status_text(result: anyhow::Result<()>) -> String {
    match result {
        Ok(()) => "ok".to_string(),
        Err(e) => format!("error: {}", e),
    }
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let llm = status_text(state.engine.agents().validate_connection().await);
    let vector_index = status_text(state.table_search.stats().await.map(|_| ()));
    let database = status_text(state.engine.executor().ping(state.engine.auth_mode()).await);

    let healthy = [&llm, &vector_index, &database].iter().all(|s| *s == "ok");

    Json(HealthResponse {
        status: if healthy { "ok" } else { "degraded" }.to_string(),
        llm,
        vector_index,
        database,
    })
}

async fn get_stats(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    let index = match state.table_search.stats().await {
        Ok(stats) => Some(stats),
        Err(e) => {
            tracing::warn!(error = %e, "Index stats unavailable");
            None
        }
    };

    Json(StatsResponse {
        metrics: state.metrics.snapshot(),
        index,
    })
}

async fn generate(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GenerateRequest>,
) -> Result<Json<PipelineResponse>, (StatusCode, Json<QueryValidation>)> {
    let validation = validate_query(&req.query);
    if !validation.is_valid {
        state.metrics.record_rejected();
        return Err((StatusCode::BAD_REQUEST, Json(validation)));
    }

    let timer = TimedOperation::start();
    let options = QueryOptions {
        include_charts: req.include_charts,
    };

    let response = state
        .engine
        .process_query(&req.query, req.chat_history, options)
        .await;

    state.metrics.record_request(response.success);
    state.metrics.record_generate(
        timer.elapsed(),
        response.sql_results.len(),
        response.chart_rendered,
    );

    Ok(Json(response))
}

async fn execute_sql(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ExecuteRequest>,
) -> Result<Json<ExecuteResponse>, StatusCode> {
    if req.validate {
        let validation = validate_query(&req.sql_query);
        if !validation.is_valid {
            state.metrics.record_rejected();
            return Ok(Json(ExecuteResponse {
                success: false,
                results: Vec::new(),
                execution_time_ms: 0.0,
                warnings: validation.warnings,
            }));
        }
    }

    let timer = TimedOperation::start();

    let results = state
        .engine
        .executor()
        .execute(&req.sql_query, state.engine.auth_mode())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "SQL execution failed");
            state.metrics.record_request(false);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    let elapsed = timer.elapsed();
    let success = results.iter().all(StatementResult::is_success);
    let warnings = results
        .iter()
        .filter(|r| !r.is_success())
        .map(|r| r.result.clone())
        .collect();

    state.metrics.record_request(success);
    state.metrics.record_execute(elapsed, results.len());

    Ok(Json(ExecuteResponse {
        success,
        results,
        execution_time_ms: elapsed.as_secs_f64() * 1000.0,
        warnings,
    }))
}

async fn validate(Json(req): Json<ValidateRequest>) -> Json<QueryValidation> {
    Json(validate_query(&req.query))
}
