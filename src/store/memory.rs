//! In-process [`VectorStore`] for tests and offline runs.
//!
//! Records live in a `Vec` behind `std::sync::RwLock`. Queries are
//! brute-force cosine distance over every stored vector.

use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::models::IndexRecord;

use super::{check_batch, MetadataFilter, StoredHit, VectorStore};

struct StoredRecord {
    record: IndexRecord,
    vector: Vec<f32>,
}

/// In-memory collection. Nothing survives the process.
pub struct InMemoryStore {
    name: String,
    // `None` until the collection is created.
    records: RwLock<Option<Vec<StoredRecord>>>,
}

impl InMemoryStore {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            records: RwLock::new(None),
        }
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("in-memory store lock poisoned")
}

#[async_trait]
impl VectorStore for InMemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn ensure_collection(&self) -> Result<bool> {
        let mut records = self.records.write().map_err(poisoned)?;
        if records.is_some() {
            return Ok(false);
        }
        *records = Some(Vec::new());
        Ok(true)
    }

    async fn reset(&self) -> Result<()> {
        *self.records.write().map_err(poisoned)? = Some(Vec::new());
        Ok(())
    }

    async fn add(&self, records: &[IndexRecord], embeddings: &[Vec<f32>]) -> Result<()> {
        check_batch(records, embeddings)?;
        let mut guard = self.records.write().map_err(poisoned)?;
        let stored = guard
            .as_mut()
            .ok_or_else(|| anyhow!("collection '{}' does not exist", self.name))?;

        for (record, vector) in records.iter().zip(embeddings) {
            // Same id replaces the earlier record.
            stored.retain(|s| s.record.id != record.id);
            stored.push(StoredRecord {
                record: record.clone(),
                vector: vector.clone(),
            });
        }
        Ok(())
    }

    async fn query(
        &self,
        embedding: &[f32],
        n: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<StoredHit>> {
        let guard = self.records.read().map_err(poisoned)?;
        let stored = guard
            .as_ref()
            .ok_or_else(|| anyhow!("collection '{}' does not exist", self.name))?;

        let mut hits: Vec<StoredHit> = stored
            .iter()
            .filter(|s| filter.matches(&s.record.metadata))
            .map(|s| StoredHit {
                id: s.record.id.clone(),
                content: s.record.content.clone(),
                metadata: s.record.metadata.clone(),
                distance: 1.0 - cosine_similarity(embedding, &s.vector) as f64,
            })
            .collect();

        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(n);
        Ok(hits)
    }

    async fn count(&self) -> Result<usize> {
        let guard = self.records.read().map_err(poisoned)?;
        Ok(guard.as_ref().map(Vec::len).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn record(id: &str, doc_type: &str) -> IndexRecord {
        let mut metadata = BTreeMap::new();
        metadata.insert("type".to_string(), doc_type.to_string());
        IndexRecord {
            id: id.to_string(),
            content: format!("content of {}", id),
            metadata,
        }
    }

    #[tokio::test]
    async fn test_ensure_collection_reports_creation_once() {
        let store = InMemoryStore::new("docs");
        assert!(store.ensure_collection().await.unwrap());
        assert!(!store.ensure_collection().await.unwrap());
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_add_requires_collection() {
        let store = InMemoryStore::new("docs");
        let result = store.add(&[record("a", "adr")], &[vec![1.0, 0.0]]).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_query_orders_by_distance_and_filters() {
        let store = InMemoryStore::new("docs");
        store.reset().await.unwrap();
        store
            .add(
                &[record("a", "adr"), record("b", "rule"), record("c", "adr")],
                &[vec![1.0, 0.0], vec![0.9, 0.1], vec![0.0, 1.0]],
            )
            .await
            .unwrap();

        let hits = store
            .query(&[1.0, 0.0], 10, &MetadataFilter::new())
            .await
            .unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert!(hits[0].distance.abs() < 1e-6);

        let only_adr = MetadataFilter::new().with_any("type", ["adr"]);
        let hits = store.query(&[1.0, 0.0], 1, &only_adr).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "a");
    }

    #[tokio::test]
    async fn test_reset_clears_records() {
        let store = InMemoryStore::new("docs");
        store.reset().await.unwrap();
        store.add(&[record("a", "adr")], &[vec![1.0]]).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
        store.reset().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_mismatched_batch_rejected() {
        let store = InMemoryStore::new("docs");
        store.reset().await.unwrap();
        assert!(store.add(&[record("a", "adr")], &[]).await.is_err());
    }
}
