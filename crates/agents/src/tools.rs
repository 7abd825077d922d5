use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::{Value, json};

use crate::schema::{FunctionDefinition, ToolCall, ToolDefinition};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    SqlAnalysis,
    TableRag,
    GenerateCharts,
}

impl ToolKind {
    pub const ALL: [ToolKind; 3] = [ToolKind::SqlAnalysis, ToolKind::TableRag, ToolKind::GenerateCharts];

    pub const fn name(self) -> &'static str {
        match self {
            ToolKind::SqlAnalysis => "agent_sql_analysis",
            ToolKind::TableRag => "agent_table_rag",
            ToolKind::GenerateCharts => "agent_generate_charts",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    pub fn definition(self) -> ToolDefinition {
        let (description, parameters) = match self {
            ToolKind::SqlAnalysis => (
                "multi-intent sql analysis. Generates executable SQL queries based on user requests for database operations. \
                 The 'user_requests' parameter can be any data type (string, list, dictionary, JSON object, etc.), \
                 including natural language, structured instructions, or outputs from other agents. \
                 The function can handle complex queries involving multiple tables, aggregations, and conditions. \
                 The function should interpret the intent or intents and generate an appropriate SQL query.",
                json!({
                    "type": "object",
                    "properties": {
                        "user_requests": {
                            "type": "string",
                            "description": "The user's request/s, which can be natural language, structured input, or the output \
                                            from the router agent about what database operation to perform. \
                                            Multi-intent example: 1. What is my account balance? 2. How much loan do I qualify for? Here is my id: 12345."
                        },
                        "identifier": {
                            "type": "string",
                            "description": "Optional: The customer ID or account number if specified in the request"
                        }
                    },
                    "required": ["user_requests"]
                }),
            ),
            ToolKind::TableRag => (
                "Identifies the necessary database tables that contain information relevant to solving a user query. \
                 The output will be a list of table names identified as relevant. \
                 Examples: ['customer_information', 'transaction_history'].",
                json!({
                    "type": "object",
                    "properties": {
                        "relevant_tables": {
                            "type": "array",
                            "items": { "type": "string" },
                            "description": "A list of table names identified as relevant to the user's query. \
                                            Single intent with a single table: ['customer_information']. \
                                            Multiple intents: relevant_tables: ['customer_information', 'transaction_history']"
                        },
                        "original_user_query": {
                            "type": "string",
                            "description": "The original natural language query from the user that triggered the table identification."
                        }
                    },
                    "required": ["relevant_tables"]
                }),
            ),
            ToolKind::GenerateCharts => (
                "Generates one or more charts based on user input. Accepts natural language, structured data, \
                 or lists of chart specifications. Supports bar charts, line graphs, pie charts, scatter plots, \
                 histograms, and more.",
                json!({
                    "type": "object",
                    "properties": {
                        "user_request": {
                            "type": "string",
                            "description": "The user's request describing the desired chart(s): chart types, data to be visualized, \
                                            labels, titles, and other customization options. \
                                            Examples: 'Plot a bar chart of sales by region', 'Show a line graph of temperature over time'."
                        },
                        "identifier": {
                            "type": "string",
                            "description": "Optional: A unique identifier for the chart request, such as a dataset name or user session ID."
                        }
                    },
                    "required": ["user_request"]
                }),
            ),
        };

        ToolDefinition {
            kind: "function".to_string(),
            function: FunctionDefinition {
                name: self.name().to_string(),
                description: description.to_string(),
                parameters,
            },
        }
    }
}

/// Tools offered to the routing agent.
pub fn router_tools() -> Vec<ToolDefinition> {
    vec![ToolKind::SqlAnalysis.definition(), ToolKind::TableRag.definition()]
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct SqlAnalysisArgs {
    #[serde(default)]
    pub user_requests: Value,
    #[serde(default)]
    pub identifier: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct TableRagArgs {
    #[serde(default, deserialize_with = "string_or_list")]
    pub relevant_tables: Vec<String>,
    #[serde(default)]
    pub original_user_query: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ChartArgs {
    #[serde(default)]
    pub user_request: Value,
    #[serde(default)]
    pub identifier: Option<Value>,
}

/// Models sometimes send a single table as a bare string.
fn string_or_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        Some(OneOrMany::One(table)) => vec![table],
        Some(OneOrMany::Many(tables)) => tables,
        None => Vec::new(),
    })
}

/// Decode the JSON arguments of a call. Blank arguments read as `{}`.
pub fn parse_arguments<T: DeserializeOwned>(call: &ToolCall) -> Result<T> {
    let raw = call.function.arguments.trim();
    let raw = if raw.is_empty() { "{}" } else { raw };

    serde_json::from_str(raw).with_context(|| format!("Invalid arguments for {}", call.function.name))
}

/// A tool call resolved against the closed set of known tools.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolInvocation {
    SqlAnalysis(SqlAnalysisArgs),
    TableRag(TableRagArgs),
    GenerateCharts(ChartArgs),
    Unknown { name: String },
}

impl ToolInvocation {
    pub fn parse(call: &ToolCall) -> Result<Self> {
        let name = call.function.name.as_str();
        let Some(kind) = ToolKind::from_name(name) else {
            return Ok(ToolInvocation::Unknown {
                name: name.to_string(),
            });
        };

        Ok(match kind {
            ToolKind::SqlAnalysis => ToolInvocation::SqlAnalysis(parse_arguments(call)?),
            ToolKind::TableRag => ToolInvocation::TableRag(parse_arguments(call)?),
            ToolKind::GenerateCharts => ToolInvocation::GenerateCharts(parse_arguments(call)?),
        })
    }

    pub fn name(&self) -> &str {
        match self {
            ToolInvocation::SqlAnalysis(_) => ToolKind::SqlAnalysis.name(),
            ToolInvocation::TableRag(_) => ToolKind::TableRag.name(),
            ToolInvocation::GenerateCharts(_) => ToolKind::GenerateCharts.name(),
            ToolInvocation::Unknown { name } => name,
        }
    }
}
