//! # Docs Harness CLI (`dox`)
//!
//! Indexes a tree of Markdown documentation (ADRs, RFCs, guides, rules,
//! project pages) into a vector collection and serves semantic search over
//! it to agents.
//!
//! ## Usage
//!
//! ```bash
//! dox --config ./config/dox.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `dox index [DOCS]` | Rebuild the collection from a docs tree |
//! | `dox search "<query>"` | Semantic search over indexed chunks |
//! | `dox project <name>` | Print a project's documents as JSON |
//! | `dox serve mcp` | Serve the tools over MCP stdio |
//! | `dox serve http` | Serve the tools over a JSON HTTP API |
//!
//! ## Examples
//!
//! ```bash
//! # Preview chunking without touching the store
//! dox index ./docs --dry-run
//!
//! # Only rules and ADRs that mention the billing project
//! dox search "retry policy" --type rule --type adr --project billing
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use docs_harness::config::{self, Config};
use docs_harness::connector_fs::ScanOptions;
use docs_harness::models::DocumentType;
use docs_harness::search::QueryEngine;
use docs_harness::traits::{ToolContext, ToolRegistry};
use docs_harness::{ingest, mcp, project, search, server};

/// Docs Harness: chunk, embed and search Markdown documentation.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. A missing file means built-in defaults.
#[derive(Parser)]
#[command(
    name = "dox",
    about = "Docs Harness: chunk, embed and search Markdown documentation",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/dox.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild the collection from a documentation tree.
    ///
    /// Deletes and recreates the collection, then uploads every chunk.
    Index {
        /// Documentation root. Defaults to `[docs].root`.
        docs: Option<PathBuf>,

        /// Show document and chunk counts without touching the store.
        #[arg(long)]
        dry_run: bool,
    },

    /// Search indexed documentation.
    Search {
        query: String,

        /// Restrict to a document type (adr, rfc, guide, rule, project). Repeatable.
        #[arg(long = "type", value_parser = parse_doc_type)]
        types: Vec<DocumentType>,

        /// Restrict to documents related to a project. Repeatable.
        #[arg(long = "project")]
        projects: Vec<String>,

        /// Maximum number of results.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Print all documents of a project as JSON.
    Project { name: String },

    /// Start a tool server.
    Serve {
        #[command(subcommand)]
        service: ServeService,
    },
}

#[derive(Subcommand)]
enum ServeService {
    /// MCP over stdin/stdout.
    Mcp,
    /// JSON HTTP API on `[server].bind`.
    Http,
}

fn parse_doc_type(s: &str) -> Result<DocumentType, String> {
    s.parse::<DocumentType>().map_err(|e| e.to_string())
}

/// Open the collection (indexing it if new) and build the shared tool state.
async fn tool_context(cfg: &Config) -> anyhow::Result<Arc<ToolContext>> {
    let engine = QueryEngine::from_config(cfg)?;
    let scan = ScanOptions::from_config(cfg)?;
    let root = cfg.docs.root.clone();

    engine
        .initialize(
            root.is_dir().then_some(root.as_path()),
            &scan,
            cfg.embedding.batch_size,
        )
        .await?;

    Ok(Arc::new(ToolContext::new(Arc::new(engine), root, scan)))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries command output and the MCP stream; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            tracing::warn!(error = %e, "failed to load .env");
        }
    }

    let cli = Cli::parse();
    let cfg = config::load_config_or_default(&cli.config)?;

    match cli.command {
        Commands::Index { docs, dry_run } => {
            ingest::run_index(&cfg, docs.as_deref(), dry_run).await?;
        }
        Commands::Search {
            query,
            types,
            projects,
            limit,
        } => {
            search::run_search(&cfg, &query, &types, &projects, limit).await?;
        }
        Commands::Project { name } => {
            let scan = ScanOptions::from_config(&cfg)?;
            project::run_project(&cfg.docs.root, &name, &scan)?;
        }
        Commands::Serve { service } => {
            let tools = Arc::new(ToolRegistry::with_builtins());
            let ctx = tool_context(&cfg).await?;
            match service {
                ServeService::Mcp => mcp::run_mcp_stdio(tools, ctx).await?,
                ServeService::Http => server::run_server(&cfg.server.bind, tools, ctx).await?,
            }
        }
    }

    Ok(())
}
