pub mod engine;
pub mod observer;
pub mod polish;
pub mod retriever;
pub mod types;
pub mod validation;

#[cfg(test)]
pub(crate) mod testing;

pub use engine::{APOLOGY, EngineServices, NO_ANSWER, NO_RESULTS, Text2SqlEngine};
pub use observer::{RunObserver, TracingObserver};
pub use retriever::{ROUTER_FALLBACK, TableRetriever, static_metadata};
pub use types::{
    ChartOutcome, PipelineResponse, QueryOptions, RoutingInfo, SqlResultEntry, SqlResultKind,
    ToolCallSummary,
};
pub use validation::{QueryValidation, validate_query};
