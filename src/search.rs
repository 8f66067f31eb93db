//! Query interface over the vector store.
//!
//! [`QueryEngine`] pairs a [`VectorStore`] with the [`EmbeddingProvider`]
//! that produced its vectors. It is built once at startup and shared by the
//! CLI, the tool registry, and the servers.
//!
//! Relevance is reported as `1 - distance` exactly as the store returns it.
//! With cosine distance this lies in `[-1, 1]`; it is not clamped.

use anyhow::{bail, Result};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use crate::config::Config;
use crate::connector_fs::{scan_chunks, ScanOptions};
use crate::embedding::{create_provider, embed_query, EmbeddingProvider};
use crate::ingest::upload_chunks;
use crate::models::{DocumentType, ResultMetadata, SearchResult};
use crate::store::{create_store, MetadataFilter, VectorStore};

/// Default number of hits for library callers.
pub const DEFAULT_MAX_RESULTS: usize = 5;

/// Per-query options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOptions {
    pub max_results: usize,
    /// Keep only these document types. Empty means all.
    pub type_filter: BTreeSet<DocumentType>,
    /// Keep only chunks tagged with one of these projects. Empty means all.
    pub project_filter: BTreeSet<String>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            max_results: DEFAULT_MAX_RESULTS,
            type_filter: BTreeSet::new(),
            project_filter: BTreeSet::new(),
        }
    }
}

impl SearchOptions {
    pub fn to_filter(&self) -> MetadataFilter {
        MetadataFilter::new()
            .with_any("type", self.type_filter.iter().map(|t| t.as_str()))
            .with_any("projects", self.project_filter.iter().cloned())
    }
}

/// Handle for semantic queries against one collection.
pub struct QueryEngine {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl QueryEngine {
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { store, embedder }
    }

    /// Build the configured store and embedding provider.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(
            create_store(&config.store)?,
            create_provider(&config.embedding)?,
        ))
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    /// Open the collection. If it had to be created and `docs_root` is
    /// given, index that tree into it.
    ///
    /// Returns `true` when the collection was created by this call.
    pub async fn initialize(
        &self,
        docs_root: Option<&Path>,
        options: &ScanOptions,
        batch_size: usize,
    ) -> Result<bool> {
        let created = self.store.ensure_collection().await?;
        if !created {
            return Ok(false);
        }

        if let Some(root) = docs_root {
            let chunks = scan_chunks(root, options)?;
            let written =
                upload_chunks(self.store.as_ref(), self.embedder.as_ref(), &chunks, batch_size)
                    .await?;
            tracing::info!(
                collection = self.store.name(),
                chunks = written,
                root = %root.display(),
                "indexed documentation into new collection"
            );
        }
        Ok(true)
    }

    /// Nearest chunks to `query`, most relevant first.
    pub async fn search(&self, query: &str, options: &SearchOptions) -> Result<Vec<SearchResult>> {
        if query.trim().is_empty() {
            bail!("query must not be empty");
        }
        if options.max_results == 0 {
            bail!("max_results must be at least 1");
        }

        let embedding = embed_query(self.embedder.as_ref(), query).await?;
        let hits = self
            .store
            .query(&embedding, options.max_results, &options.to_filter())
            .await?;

        Ok(hits
            .into_iter()
            .map(|hit| SearchResult {
                metadata: ResultMetadata::from_flat_map(&hit.metadata),
                document: hit.content,
                relevance_score: 1.0 - hit.distance,
            })
            .collect())
    }
}

/// `dox search`: run one query and print the hits.
pub async fn run_search(
    config: &Config,
    query: &str,
    types: &[DocumentType],
    projects: &[String],
    limit: Option<usize>,
) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    let engine = QueryEngine::from_config(config)?;
    let scan = ScanOptions::from_config(config)?;
    let root = config.docs.root.as_path();
    engine
        .initialize(
            root.is_dir().then_some(root),
            &scan,
            config.embedding.batch_size,
        )
        .await?;

    let options = SearchOptions {
        max_results: limit.unwrap_or(DEFAULT_MAX_RESULTS),
        type_filter: types.iter().copied().collect(),
        project_filter: projects.iter().cloned().collect(),
    };
    let results = engine.search(query, &options).await?;

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, result) in results.iter().enumerate() {
        let meta = &result.metadata;
        println!(
            "{}. [{:.2}] {} / {}",
            i + 1,
            result.relevance_score,
            meta.doc_type,
            meta.title
        );
        if let Some(ref section) = meta.section_title {
            println!("    section: {}", section);
        }
        println!("    file: {}", meta.file_path);
        if !meta.projects.is_empty() {
            println!("    projects: {}", meta.projects.join(", "));
        }
        println!(
            "    excerpt: \"{}\"",
            excerpt(&result.document, 200).replace('\n', " ").trim()
        );
        println!();
    }

    Ok(())
}

/// First `max_chars` characters of `text`, with an ellipsis if cut.
fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashProvider;
    use crate::models::IndexRecord;
    use crate::store::InMemoryStore;
    use std::collections::BTreeMap;

    fn record(id: &str, doc_type: &str, projects: &str, content: &str) -> IndexRecord {
        let mut metadata = BTreeMap::new();
        metadata.insert("title".to_string(), id.to_string());
        metadata.insert("type".to_string(), doc_type.to_string());
        metadata.insert("projects".to_string(), projects.to_string());
        metadata.insert("sectionTitle".to_string(), "Decision".to_string());
        metadata.insert("chunkIndex".to_string(), "0".to_string());
        IndexRecord {
            id: id.to_string(),
            content: content.to_string(),
            metadata,
        }
    }

    async fn engine() -> QueryEngine {
        let store = Arc::new(InMemoryStore::new("docs"));
        let embedder = Arc::new(HashProvider::new(256).unwrap());
        store.reset().await.unwrap();

        let records = vec![
            record("pg", "adr", r#"["billing"]"#, "We use Postgres for the billing database."),
            record("css", "guide", "[]", "Button styling and colour tokens."),
            record("lint", "rule", r#"["search"]"#, "Run the linter before every database migration."),
        ];
        let texts: Vec<String> = records.iter().map(|r| r.content.clone()).collect();
        let vectors = embedder.embed(&texts).await.unwrap();
        store.add(&records, &vectors).await.unwrap();

        QueryEngine::new(store, embedder)
    }

    #[tokio::test]
    async fn test_search_ranks_and_scores() {
        let engine = engine().await;
        let results = engine
            .search("postgres billing database", &SearchOptions::default())
            .await
            .unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].metadata.title, "pg");
        assert_eq!(results[0].metadata.section_title.as_deref(), Some("Decision"));
        for pair in results.windows(2) {
            assert!(pair[0].relevance_score >= pair[1].relevance_score);
        }
    }

    #[tokio::test]
    async fn test_type_and_project_filters() {
        let engine = engine().await;

        let options = SearchOptions {
            type_filter: [DocumentType::Rule, DocumentType::Guide].into_iter().collect(),
            ..Default::default()
        };
        let results = engine.search("database", &options).await.unwrap();
        assert!(results.iter().all(|r| r.metadata.doc_type != "adr"));
        assert_eq!(results.len(), 2);

        let options = SearchOptions {
            project_filter: ["billing".to_string()].into_iter().collect(),
            ..Default::default()
        };
        let results = engine.search("database", &options).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].metadata.projects, vec!["billing"]);
    }

    #[tokio::test]
    async fn test_max_results_limits_hits() {
        let engine = engine().await;
        let options = SearchOptions {
            max_results: 1,
            ..Default::default()
        };
        assert_eq!(engine.search("database", &options).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_query_rejected() {
        let engine = engine().await;
        assert!(engine.search("   ", &SearchOptions::default()).await.is_err());
    }

    #[tokio::test]
    async fn test_initialize_indexes_only_when_created() {
        let tmp = tempfile::TempDir::new().unwrap();
        let root = tmp.path().join("docs");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join("a.md"), "# A\nalpha").unwrap();

        let engine = QueryEngine::new(
            Arc::new(InMemoryStore::new("docs")),
            Arc::new(HashProvider::new(32).unwrap()),
        );
        let options = ScanOptions::with_base(tmp.path());
        assert!(engine.initialize(Some(&root), &options, 8).await.unwrap());
        assert_eq!(engine.store().count().await.unwrap(), 1);

        std::fs::write(root.join("b.md"), "# B\nbeta").unwrap();
        assert!(!engine.initialize(Some(&root), &options, 8).await.unwrap());
        assert_eq!(engine.store().count().await.unwrap(), 1);
    }

    #[test]
    fn test_excerpt() {
        assert_eq!(excerpt("short", 10), "short");
        assert_eq!(excerpt("abcdef", 3), "abc...");
    }
}
