//! Tool trait and registry.
//!
//! Tools are the agent-facing operations of the harness. Every tool is
//! registered in a [`ToolRegistry`] and exposed identically over MCP stdio
//! ([`crate::mcp`]) and the JSON HTTP API ([`crate::server`]).
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │              ToolRegistry                │
//! │  ┌──────────────────────┐ ┌───────────┐  │
//! │  │ search_documentation │ │  Custom   │  │
//! │  │ get_project_info_... │ │  (Rust)   │  │
//! │  └──────────────────────┘ └───────────┘  │
//! └──────────────┬───────────────────────────┘
//!                ▼
//!      McpBridge (stdio) / run_server (HTTP)
//! ```
//!
//! # Usage
//!
//! ```rust
//! use docs_harness::traits::ToolRegistry;
//!
//! let tools = ToolRegistry::with_builtins();
//! // tools.register(Box::new(MyTool::new()));
//! assert_eq!(tools.len(), 2);
//! ```

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use crate::connector_fs::ScanOptions;
use crate::models::{Document, DocumentType, SearchResult};
use crate::project::project_documents;
use crate::search::{QueryEngine, SearchOptions};

/// Default `max_results` for the search tool.
pub const TOOL_DEFAULT_MAX_RESULTS: usize = 10;
/// Upper bound for `max_results` accepted by the search tool.
pub const TOOL_MAX_RESULTS_LIMIT: usize = 50;

// ═══════════════════════════════════════════════════════════════════════
// Tool Trait
// ═══════════════════════════════════════════════════════════════════════

/// An operation agents can discover and call.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use anyhow::Result;
/// use serde_json::{json, Value};
/// use docs_harness::store::VectorStore;
/// use docs_harness::traits::{Tool, ToolContext};
///
/// pub struct CollectionSizeTool;
///
/// #[async_trait]
/// impl Tool for CollectionSizeTool {
///     fn name(&self) -> &str { "collection_size" }
///     fn description(&self) -> &str { "Number of indexed chunks" }
///
///     fn parameters_schema(&self) -> Value {
///         json!({ "type": "object", "properties": {} })
///     }
///
///     async fn execute(&self, _params: Value, ctx: &ToolContext) -> Result<Value> {
///         let count = ctx.engine().store().count().await?;
///         Ok(json!({ "count": count }))
///     }
/// }
/// ```
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name, used as the route path (`POST /tools/{name}`) and the MCP tool name.
    fn name(&self) -> &str;

    /// One-line description for agent discovery.
    fn description(&self) -> &str;

    /// Whether this tool ships with the harness. Defaults to `false`.
    fn is_builtin(&self) -> bool {
        false
    }

    /// JSON Schema for the parameters object.
    fn parameters_schema(&self) -> Value;

    /// Execute the tool. `params` is always a JSON object.
    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value>;
}

// ═══════════════════════════════════════════════════════════════════════
// ToolContext
// ═══════════════════════════════════════════════════════════════════════

/// Shared state handed to every tool invocation.
///
/// Built once at startup; the query engine is shared, never global.
pub struct ToolContext {
    engine: Arc<QueryEngine>,
    docs_root: PathBuf,
    scan: ScanOptions,
}

impl ToolContext {
    pub fn new(engine: Arc<QueryEngine>, docs_root: PathBuf, scan: ScanOptions) -> Self {
        Self {
            engine,
            docs_root,
            scan,
        }
    }

    pub fn engine(&self) -> &Arc<QueryEngine> {
        &self.engine
    }

    pub fn docs_root(&self) -> &PathBuf {
        &self.docs_root
    }

    /// Semantic search over the indexed chunks.
    pub async fn search(&self, query: &str, options: &SearchOptions) -> Result<Vec<SearchResult>> {
        self.engine.search(query, options).await
    }

    /// Processed documents of one project.
    pub fn project(&self, name: &str) -> Result<Vec<Document>> {
        project_documents(&self.docs_root, name, &self.scan)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Built-in Tool Implementations
// ═══════════════════════════════════════════════════════════════════════

/// Read a string array parameter, accepting a lone string as a one-item list.
fn string_list(params: &Value, key: &str) -> Result<Vec<String>> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::String(s)) => Ok(vec![s.clone()]),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item.as_str() {
                Some(s) => Ok(s.to_string()),
                None => bail!("{} must contain only strings", key),
            })
            .collect(),
        Some(_) => bail!("{} must be an array of strings", key),
    }
}

/// Parse the search tool's parameters into query options.
pub fn parse_search_params(params: &Value) -> Result<(String, SearchOptions)> {
    let query = params["query"].as_str().unwrap_or("").to_string();
    if query.trim().is_empty() {
        bail!("query must not be empty");
    }

    let max_results = match params.get("max_results") {
        None | Some(Value::Null) => TOOL_DEFAULT_MAX_RESULTS,
        Some(v) => match v.as_u64() {
            Some(n) if (1..=TOOL_MAX_RESULTS_LIMIT as u64).contains(&n) => n as usize,
            _ => bail!(
                "max_results must be an integer between 1 and {}",
                TOOL_MAX_RESULTS_LIMIT
            ),
        },
    };

    let type_filter: BTreeSet<DocumentType> = string_list(params, "type_filter")?
        .iter()
        .map(|t| t.parse::<DocumentType>())
        .collect::<Result<_>>()?;
    let project_filter: BTreeSet<String> =
        string_list(params, "project_filter")?.into_iter().collect();

    Ok((
        query,
        SearchOptions {
            max_results,
            type_filter,
            project_filter,
        },
    ))
}

/// Built-in semantic search over the documentation.
pub struct SearchDocumentationTool;

#[async_trait]
impl Tool for SearchDocumentationTool {
    fn name(&self) -> &str {
        "search_documentation"
    }

    fn description(&self) -> &str {
        "Search project documentation (ADRs, RFCs, guides, rules, projects) by meaning"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Natural-language search query" },
                "type_filter": {
                    "type": "array",
                    "items": { "type": "string", "enum": ["adr", "rfc", "guide", "rule", "project"] },
                    "description": "Only return these document types"
                },
                "project_filter": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Only return documents related to these projects"
                },
                "max_results": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": TOOL_MAX_RESULTS_LIMIT,
                    "default": TOOL_DEFAULT_MAX_RESULTS
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let (query, options) = parse_search_params(&params)?;
        let results = ctx.search(&query, &options).await?;
        Ok(serde_json::json!({ "results": results }))
    }
}

/// Built-in project lookup.
pub struct ProjectInfoTool;

#[async_trait]
impl Tool for ProjectInfoTool {
    fn name(&self) -> &str {
        "get_project_info_by_name"
    }

    fn description(&self) -> &str {
        "Get all documentation of a project by its directory name"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "project_name": { "type": "string", "description": "Directory name under projects/" }
            },
            "required": ["project_name"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let name = params["project_name"].as_str().unwrap_or("");
        if name.trim().is_empty() {
            bail!("project_name must not be empty");
        }

        let documents = ctx.project(name)?;
        Ok(serde_json::json!({ "documents": documents }))
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Registry
// ═══════════════════════════════════════════════════════════════════════

/// Registry for built-in and custom tools.
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    /// Create an empty tool registry.
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Create a registry with `search_documentation` and `get_project_info_by_name`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(SearchDocumentationTool));
        registry.register(Box::new(ProjectInfoTool));
        registry
    }

    /// Register a tool. Lookups return the first tool registered under a name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.push(tool);
    }

    pub fn tools(&self) -> &[Box<dyn Tool>] {
        &self.tools
    }

    /// Find a tool by name.
    pub fn find(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
