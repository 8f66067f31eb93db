//! [`VectorStore`] backed by a Chroma server over its REST API.
//!
//! Uses the `/api/v1` collection endpoints. Embeddings are computed by the
//! caller and sent with each add and query, so the server needs no model.
//! Collections are created with cosine space, which keeps
//! `1 - distance` meaningful as a relevance score.

use std::collections::BTreeMap;
use std::sync::RwLock;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

use crate::config::StoreConfig;
use crate::models::IndexRecord;

use super::{check_batch, MetadataFilter, StoredHit, VectorStore};

#[derive(Debug, Deserialize)]
struct CollectionInfo {
    id: String,
}

#[derive(Debug, Deserialize, Default)]
struct QueryResponse {
    #[serde(default)]
    ids: Vec<Vec<String>>,
    #[serde(default)]
    documents: Option<Vec<Vec<Option<String>>>>,
    #[serde(default)]
    metadatas: Option<Vec<Vec<Option<serde_json::Map<String, serde_json::Value>>>>>,
    #[serde(default)]
    distances: Option<Vec<Vec<f64>>>,
}

/// Client for one Chroma collection.
pub struct ChromaStore {
    base_url: String,
    name: String,
    client: reqwest::Client,
    // Server-side id, resolved by `ensure_collection` or `reset`.
    collection_id: RwLock<Option<String>>,
}

impl ChromaStore {
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            name: config.collection.clone(),
            client,
            collection_id: RwLock::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1/{}", self.base_url, path)
    }

    fn id(&self) -> Result<String> {
        self.collection_id
            .read()
            .map_err(|_| anyhow!("chroma store lock poisoned"))?
            .clone()
            .ok_or_else(|| anyhow!("collection '{}' not initialized", self.name))
    }

    fn set_id(&self, id: Option<String>) -> Result<()> {
        *self
            .collection_id
            .write()
            .map_err(|_| anyhow!("chroma store lock poisoned"))? = id;
        Ok(())
    }

    async fn get_collection(&self) -> Result<Option<CollectionInfo>> {
        let resp = self
            .client
            .get(self.url(&format!("collections/{}", self.name)))
            .send()
            .await
            .with_context(|| format!("Failed to reach Chroma at {}", self.base_url))?;

        // Older servers answer a missing collection with 500 rather than 404.
        if resp.status() == StatusCode::NOT_FOUND || resp.status().is_server_error() {
            return Ok(None);
        }
        let resp = check_status(resp).await?;
        Ok(Some(resp.json().await?))
    }

    async fn create_collection(&self) -> Result<CollectionInfo> {
        let body = serde_json::json!({
            "name": self.name,
            "metadata": { "hnsw:space": "cosine" },
        });
        let resp = self
            .client
            .post(self.url("collections"))
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Failed to reach Chroma at {}", self.base_url))?;
        let resp = check_status(resp).await?;
        Ok(resp.json().await?)
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    bail!("Chroma API error {}: {}", status, body)
}

fn metadata_value_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Flatten the first result row of a query response into hits.
fn parse_query_response(resp: QueryResponse) -> Vec<StoredHit> {
    let ids = resp.ids.into_iter().next().unwrap_or_default();
    let documents = resp
        .documents
        .and_then(|d| d.into_iter().next())
        .unwrap_or_default();
    let metadatas = resp
        .metadatas
        .and_then(|m| m.into_iter().next())
        .unwrap_or_default();
    let distances = resp
        .distances
        .and_then(|d| d.into_iter().next())
        .unwrap_or_default();

    ids.into_iter()
        .enumerate()
        .map(|(i, id)| StoredHit {
            id,
            content: documents.get(i).cloned().flatten().unwrap_or_default(),
            metadata: metadatas
                .get(i)
                .cloned()
                .flatten()
                .map(|m| {
                    m.iter()
                        .map(|(k, v)| (k.clone(), metadata_value_to_string(v)))
                        .collect::<BTreeMap<_, _>>()
                })
                .unwrap_or_default(),
            distance: distances.get(i).copied().unwrap_or(1.0),
        })
        .collect()
}

#[async_trait]
impl VectorStore for ChromaStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn ensure_collection(&self) -> Result<bool> {
        if let Some(info) = self.get_collection().await? {
            self.set_id(Some(info.id))?;
            return Ok(false);
        }
        let info = self.create_collection().await?;
        tracing::info!(collection = %self.name, "created collection");
        self.set_id(Some(info.id))?;
        Ok(true)
    }

    async fn reset(&self) -> Result<()> {
        if self.get_collection().await?.is_some() {
            let resp = self
                .client
                .delete(self.url(&format!("collections/{}", self.name)))
                .send()
                .await?;
            check_status(resp).await?;
            tracing::debug!(collection = %self.name, "deleted collection");
        }
        self.set_id(None)?;
        let info = self.create_collection().await?;
        self.set_id(Some(info.id))?;
        Ok(())
    }

    async fn add(&self, records: &[IndexRecord], embeddings: &[Vec<f32>]) -> Result<()> {
        check_batch(records, embeddings)?;
        if records.is_empty() {
            return Ok(());
        }
        let id = self.id()?;

        let body = serde_json::json!({
            "ids": records.iter().map(|r| &r.id).collect::<Vec<_>>(),
            "embeddings": embeddings,
            "documents": records.iter().map(|r| &r.content).collect::<Vec<_>>(),
            "metadatas": records.iter().map(|r| &r.metadata).collect::<Vec<_>>(),
        });
        let resp = self
            .client
            .post(self.url(&format!("collections/{}/add", id)))
            .json(&body)
            .send()
            .await?;
        check_status(resp).await?;
        Ok(())
    }

    async fn query(
        &self,
        embedding: &[f32],
        n: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<StoredHit>> {
        let id = self.id()?;

        let mut body = serde_json::json!({
            "query_embeddings": [embedding],
            "n_results": n,
            "include": ["documents", "metadatas", "distances"],
        });
        if let Some(where_doc) = filter.to_chroma_where() {
            body["where"] = where_doc;
        }

        let resp = self
            .client
            .post(self.url(&format!("collections/{}/query", id)))
            .json(&body)
            .send()
            .await?;
        let resp = check_status(resp).await?;
        let parsed: QueryResponse = resp.json().await?;
        Ok(parse_query_response(parsed))
    }

    async fn count(&self) -> Result<usize> {
        let id = self.id()?;
        let resp = self
            .client
            .get(self.url(&format!("collections/{}/count", id)))
            .send()
            .await?;
        let resp = check_status(resp).await?;
        Ok(resp.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query_response() {
        let json = serde_json::json!({
            "ids": [["a_chunk_0", "b_chunk_1"]],
            "documents": [["first", null]],
            "metadatas": [[{ "type": "adr", "chunkIndex": 0 }, null]],
            "distances": [[0.25, 0.5]]
        });
        let resp: QueryResponse = serde_json::from_value(json).unwrap();
        let hits = parse_query_response(resp);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].content, "first");
        assert_eq!(hits[0].metadata["type"], "adr");
        assert_eq!(hits[0].metadata["chunkIndex"], "0");
        assert_eq!(hits[0].distance, 0.25);
        assert_eq!(hits[1].content, "");
        assert!(hits[1].metadata.is_empty());
    }

    #[test]
    fn test_parse_empty_response() {
        assert!(parse_query_response(QueryResponse::default()).is_empty());
    }

    #[tokio::test]
    async fn test_query_before_init_fails() {
        let store = ChromaStore::new(&StoreConfig::default()).unwrap();
        let err = store
            .query(&[1.0], 5, &MetadataFilter::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not initialized"));
    }
}
