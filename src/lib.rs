//! # Docs Harness
//!
//! Turns a tree of Markdown documentation into bounded, overlapping,
//! metadata-tagged chunks and serves semantic search over them.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────────────┐   ┌──────────────┐
//! │ Directory   │──▶│ Document → Sections  │──▶│ Embed + Store │
//! │ walker      │   │ → Chunks (windowed)  │   │ Chroma / mem  │
//! └─────────────┘   └──────────────────────┘   └──────┬───────┘
//!                                                     │
//!                              ┌──────────────────────┤
//!                              ▼                      ▼
//!                        ┌──────────┐           ┌────────────┐
//!                        │   CLI    │           │ MCP / HTTP │
//!                        │  (dox)   │           │   tools    │
//!                        └──────────┘           └────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`tokens`] | Token estimate for a span of text |
//! | [`sections`] | Heading-delimited sections and their roles |
//! | [`chunk`] | Sliding-window chunk splitter |
//! | [`document`] | Front matter, type inference, per-file assembly |
//! | [`connector_fs`] | Recursive directory walker |
//! | [`models`] | Core data types |
//! | [`config`] | TOML configuration parsing |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`store`] | Vector store trait, Chroma and in-memory backends |
//! | [`ingest`] | Indexing pipeline |
//! | [`search`] | Query engine |
//! | [`project`] | Project lookup |
//! | [`traits`] | Tool trait and registry |
//! | [`mcp`] | MCP stdio bridge |
//! | [`server`] | JSON HTTP tool server |

pub mod chunk;
pub mod config;
pub mod connector_fs;
pub mod document;
pub mod embedding;
pub mod ingest;
pub mod mcp;
pub mod models;
pub mod project;
pub mod search;
pub mod sections;
pub mod server;
pub mod store;
pub mod tokens;
pub mod traits;
