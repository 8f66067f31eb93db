//! Vector store abstraction.
//!
//! The [`VectorStore`] trait covers the handful of collection operations the
//! indexer and query engine need, so the Chroma server and the in-process
//! store are interchangeable. Records arrive with precomputed embeddings;
//! stores never call an embedding model themselves.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod chroma;
pub mod memory;

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::config::StoreConfig;
use crate::models::{member_key, IndexRecord, MEMBER_FIELDS};

pub use chroma::ChromaStore;
pub use memory::InMemoryStore;

/// One nearest-neighbour hit as reported by a store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredHit {
    pub id: String,
    pub content: String,
    pub metadata: BTreeMap<String, String>,
    /// Cosine distance, `0.0` for identical direction.
    pub distance: f64,
}

/// Conjunction of "field is one of" clauses over flattened metadata.
///
/// Fields holding a JSON array (such as `projects`) match when any element
/// is in the allowed set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataFilter {
    clauses: BTreeMap<String, BTreeSet<String>>,
}

impl MetadataFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `field` to be one of `values`. An empty set adds no clause.
    pub fn with_any<I, S>(mut self, field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: BTreeSet<String> = values.into_iter().map(Into::into).collect();
        if !values.is_empty() {
            self.clauses
                .entry(field.to_string())
                .or_default()
                .extend(values);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Whether a flattened metadata map satisfies every clause.
    pub fn matches(&self, metadata: &BTreeMap<String, String>) -> bool {
        self.clauses.iter().all(|(field, allowed)| {
            let Some(value) = metadata.get(field) else {
                return false;
            };
            match serde_json::from_str::<Vec<String>>(value) {
                Ok(items) => items.iter().any(|item| allowed.contains(item)),
                Err(_) => allowed.contains(value),
            }
        })
    }

    /// Render as a Chroma `where` document, or `None` when unfiltered.
    ///
    /// Chroma compares whole scalars, so clauses on array fields test the
    /// per-element marker keys written by
    /// [`Metadata::to_flat_map`](crate::models::Metadata::to_flat_map).
    pub fn to_chroma_where(&self) -> Option<serde_json::Value> {
        let mut clauses: Vec<serde_json::Value> = self
            .clauses
            .iter()
            .map(|(field, values)| {
                if MEMBER_FIELDS.contains(&field.as_str()) {
                    member_clause(field, values)
                } else {
                    serde_json::json!({ field: { "$in": values } })
                }
            })
            .collect();

        match clauses.len() {
            0 => None,
            1 => clauses.pop(),
            _ => Some(serde_json::json!({ "$and": clauses })),
        }
    }
}

fn member_clause(field: &str, values: &BTreeSet<String>) -> serde_json::Value {
    let mut alternatives: Vec<serde_json::Value> = values
        .iter()
        .map(|value| serde_json::json!({ member_key(field, value): { "$eq": "true" } }))
        .collect();
    // Chroma rejects `$or` with fewer than two operands.
    if alternatives.len() == 1 {
        alternatives.remove(0)
    } else {
        serde_json::json!({ "$or": alternatives })
    }
}

/// A named collection of embedded records.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Collection name.
    fn name(&self) -> &str;

    /// Open the collection, creating it if missing. Returns `true` if it was created.
    async fn ensure_collection(&self) -> Result<bool>;

    /// Drop the collection if present and create it empty.
    async fn reset(&self) -> Result<()>;

    /// Insert records with their embeddings, matched by position.
    async fn add(&self, records: &[IndexRecord], embeddings: &[Vec<f32>]) -> Result<()>;

    /// The `n` nearest records to `embedding`, closest first.
    async fn query(
        &self,
        embedding: &[f32],
        n: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<StoredHit>>;

    /// Number of records in the collection.
    async fn count(&self) -> Result<usize>;
}

/// Reject mismatched record/embedding batches before they reach a backend.
pub(crate) fn check_batch(records: &[IndexRecord], embeddings: &[Vec<f32>]) -> Result<()> {
    if records.len() != embeddings.len() {
        bail!(
            "record/embedding count mismatch: {} records, {} embeddings",
            records.len(),
            embeddings.len()
        );
    }
    Ok(())
}

/// Create the configured backend.
///
/// | `store.backend` | Store |
/// |-----------------|-------|
/// | `"chroma"` | [`ChromaStore`] |
/// | `"memory"` | [`InMemoryStore`] |
pub fn create_store(config: &StoreConfig) -> Result<Arc<dyn VectorStore>> {
    match config.backend.as_str() {
        "chroma" => Ok(Arc::new(ChromaStore::new(config)?)),
        "memory" => Ok(Arc::new(InMemoryStore::new(&config.collection))),
        other => bail!("Unknown store backend: {}", other),
    }
}
