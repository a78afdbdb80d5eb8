//! MCP (Model Context Protocol) server exposing the ask pipeline as tools

use async_trait::async_trait;
use rust_mcp_schema::{
    schema_utils::CallToolError, CallToolRequest, CallToolResult, ContentBlock, Implementation,
    InitializeResult, ListToolsRequest, ListToolsResult, RpcError, ServerCapabilities,
    ServerCapabilitiesTools, TextContent, Tool, ToolInputSchema, LATEST_PROTOCOL_VERSION,
};
use rust_mcp_sdk::{mcp_server::ServerHandler, McpServer};
use saasight_ask::{AskError, AskPipeline};
use saasight_duck::catalog::{DatabaseCatalog, SCHEMA_DESCRIPTION};
use saasight_duck::seed::{self, SeedOptions};
use saasight_duck::DuckStore;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info};

pub struct SaasightHandler {
    pipeline: Arc<AskPipeline>,
    store: Arc<DuckStore>,
    seed_options: SeedOptions,
}

impl SaasightHandler {
    pub fn new(pipeline: Arc<AskPipeline>, store: Arc<DuckStore>) -> Self {
        Self {
            pipeline,
            store,
            seed_options: SeedOptions::default(),
        }
    }

    pub fn with_seed_options(mut self, seed_options: SeedOptions) -> Self {
        self.seed_options = seed_options;
        self
    }

    /// Create server initialization details
    pub fn server_info() -> InitializeResult {
        InitializeResult {
            protocol_version: LATEST_PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ServerCapabilitiesTools { list_changed: None }),
                ..Default::default()
            },
            server_info: Implementation {
                name: "saasight-server".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: Some("saasight SaaS Analytics Assistant".to_string()),
            },
            instructions: Some(
                "Ask business questions about users, subscriptions, revenue and feature usage \
                 in plain English with the 'ask' tool. Every answer carries the SQL that was \
                 run, the result and a one-line insight."
                    .to_string(),
            ),
            meta: None,
        }
    }

    fn tools() -> Vec<Tool> {
        let mut ask_props = HashMap::new();
        ask_props.insert(
            "question".to_string(),
            string_prop("Business question in plain English (e.g. 'What's our MRR?')"),
        );

        let mut seed_props = HashMap::new();
        let mut users = Map::new();
        users.insert("type".to_string(), Value::String("integer".to_string()));
        users.insert(
            "description".to_string(),
            Value::String("Number of demo users to generate (default 1000)".to_string()),
        );
        seed_props.insert("users".to_string(), users);

        vec![
            tool(
                "ask",
                "Answer a business question. The question is translated to a read-only SQL \
                 query, checked by the safety gate, executed against the analytics database \
                 and summarized. Returns the query, the result rows and an insight.",
                vec!["question".to_string()],
                ask_props,
            ),
            tool(
                "catalog",
                "Describe the analytics database: tables, columns, types and row counts.",
                vec![],
                HashMap::new(),
            ),
            tool(
                "generate_data",
                "Wipe the analytics tables and regenerate the synthetic demo data.",
                vec![],
                seed_props,
            ),
            tool(
                "initialize_database",
                "Create the analytics tables and fill them with demo data if they are empty. \
                 Existing data is left untouched.",
                vec![],
                HashMap::new(),
            ),
            tool(
                "metrics",
                "Pipeline counters in Prometheus text format.",
                vec![],
                HashMap::new(),
            ),
        ]
    }
}

fn string_prop(description: &str) -> Map<String, Value> {
    let mut prop = Map::new();
    prop.insert("type".to_string(), Value::String("string".to_string()));
    prop.insert("description".to_string(), Value::String(description.to_string()));
    prop
}

fn tool(
    name: &str,
    description: &str,
    required: Vec<String>,
    properties: HashMap<String, Map<String, Value>>,
) -> Tool {
    Tool {
        name: name.to_string(),
        description: Some(description.to_string()),
        input_schema: ToolInputSchema::new(required, Some(properties)),
        title: None,
        annotations: None,
        meta: None,
        output_schema: None,
    }
}

fn text_result(text: String) -> CallToolResult {
    CallToolResult {
        content: vec![ContentBlock::TextContent(TextContent::new(text, None, None))],
        is_error: None,
        meta: None,
        structured_content: None,
    }
}

#[async_trait]
impl ServerHandler for SaasightHandler {
    async fn handle_list_tools_request(
        &self,
        _request: ListToolsRequest,
        _runtime: Arc<dyn McpServer>,
    ) -> std::result::Result<ListToolsResult, RpcError> {
        Ok(ListToolsResult {
            tools: Self::tools(),
            next_cursor: None,
            meta: None,
        })
    }

    async fn handle_call_tool_request(
        &self,
        request: CallToolRequest,
        _runtime: Arc<dyn McpServer>,
    ) -> std::result::Result<CallToolResult, CallToolError> {
        info!(tool = %request.params.name, "Tool called");

        let arguments = request.params.arguments.map(Value::Object);
        match request.params.name.as_str() {
            "ask" => self.handle_ask_tool(arguments).await,
            "catalog" => self.handle_catalog_tool(),
            "generate_data" => self.handle_generate_data_tool(arguments),
            "initialize_database" => self.handle_initialize_database_tool(),
            "metrics" => self.handle_metrics_tool(),
            _ => Err(CallToolError::unknown_tool(request.params.name.clone())),
        }
    }
}

impl SaasightHandler {
    async fn handle_ask_tool(
        &self,
        arguments: Option<Value>,
    ) -> std::result::Result<CallToolResult, CallToolError> {
        let question = arguments
            .as_ref()
            .and_then(|args| args.get("question"))
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .ok_or_else(|| CallToolError::from_message("Missing required argument: question"))?;

        let answer = self.pipeline.ask(question).await.map_err(|e| {
            match &e {
                AskError::Rejected(_) => error!(error = %e, "Question produced an unsafe query"),
                AskError::Execution(_) => error!(error = %e, "Question could not be answered"),
            }
            CallToolError::from_message(e.to_string())
        })?;

        let body = serde_json::to_string_pretty(&answer)
            .map_err(|e| CallToolError::from_message(format!("Failed to serialize answer: {}", e)))?;

        Ok(text_result(format!(
            "Question: {}\n\nSQL:\n{}\n\nInsight: {}\n\nAnswer:\n{}",
            question, answer.query, answer.insight, body
        )))
    }

    fn handle_catalog_tool(&self) -> std::result::Result<CallToolResult, CallToolError> {
        let catalog = DatabaseCatalog::from_store(&self.store).map_err(|e| {
            error!(error = %e, "Failed to extract catalog");
            CallToolError::from_message(format!("Failed to extract catalog: {}", e))
        })?;

        Ok(text_result(format!(
            "{}\n## Schema notes\n\n{}",
            catalog.to_markdown(),
            SCHEMA_DESCRIPTION
        )))
    }

    fn handle_generate_data_tool(
        &self,
        arguments: Option<Value>,
    ) -> std::result::Result<CallToolResult, CallToolError> {
        let mut options = self.seed_options.clone();
        if let Some(users) = arguments
            .as_ref()
            .and_then(|args| args.get("users"))
            .and_then(|v| v.as_u64())
        {
            options.users = u32::try_from(users)
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| CallToolError::from_message("users must be a positive integer"))?;
        }

        let report = seed::seed(&self.store, &options).map_err(|e| {
            error!(error = %e, "Failed to generate demo data");
            CallToolError::from_message(format!("Failed to generate data: {}", e))
        })?;

        Ok(text_result(format!(
            "Generated demo data: {} users, {} subscriptions, {} events, {} revenue records",
            report.users, report.subscriptions, report.events, report.revenue_records
        )))
    }

    fn handle_initialize_database_tool(&self) -> std::result::Result<CallToolResult, CallToolError> {
        let seeded = seed::seed_if_empty(&self.store, &self.seed_options).map_err(|e| {
            error!(error = %e, "Failed to initialize database");
            CallToolError::from_message(format!("Failed to initialize database: {}", e))
        })?;

        let text = match seeded {
            Some(report) => format!(
                "Database initialized with {} users, {} subscriptions, {} events, {} revenue records",
                report.users, report.subscriptions, report.events, report.revenue_records
            ),
            None => "Database already initialized; existing data kept".to_string(),
        };
        Ok(text_result(text))
    }

    fn handle_metrics_tool(&self) -> std::result::Result<CallToolResult, CallToolError> {
        let text = self
            .pipeline
            .metrics()
            .map(|m| m.render())
            .unwrap_or_else(|| "Metrics are disabled".to_string());
        Ok(text_result(text))
    }
}
