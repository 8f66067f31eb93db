//! Indexing pipeline orchestration.
//!
//! Coordinates the full flow: directory walk → chunking → embedding →
//! storage. Every run rebuilds the collection from scratch and uploads all
//! chunks with a single `add` call.

use anyhow::Result;
use std::path::Path;

use crate::config::Config;
use crate::connector_fs::{scan_documents, ScanOptions};
use crate::embedding::{create_provider, embed_in_batches, EmbeddingProvider};
use crate::models::{Chunk, Document, IndexRecord};
use crate::store::{create_store, VectorStore};

/// Embed `chunks` and add them to the store's current collection.
///
/// Returns the number of records written.
pub async fn upload_chunks(
    store: &dyn VectorStore,
    embedder: &dyn EmbeddingProvider,
    chunks: &[Chunk],
    batch_size: usize,
) -> Result<usize> {
    if chunks.is_empty() {
        return Ok(0);
    }

    let records: Vec<IndexRecord> = chunks.iter().map(IndexRecord::from).collect();
    let texts: Vec<String> = records.iter().map(|r| r.content.clone()).collect();
    let embeddings = embed_in_batches(embedder, &texts, batch_size).await?;

    store.add(&records, &embeddings).await?;
    tracing::debug!(
        collection = store.name(),
        records = records.len(),
        model = embedder.model_name(),
        "uploaded chunks"
    );
    Ok(records.len())
}

/// Replace the collection's contents with `chunks`.
pub async fn index_chunks(
    store: &dyn VectorStore,
    embedder: &dyn EmbeddingProvider,
    chunks: &[Chunk],
    batch_size: usize,
) -> Result<usize> {
    store.reset().await?;
    upload_chunks(store, embedder, chunks, batch_size).await
}

/// Flatten documents into their chunks, preserving walk order.
pub fn collect_chunks(documents: &[Document]) -> Vec<Chunk> {
    documents
        .iter()
        .flat_map(|doc| doc.chunks.iter().cloned())
        .collect()
}

/// `dox index`: rebuild the collection from a documentation tree.
pub async fn run_index(config: &Config, docs_path: Option<&Path>, dry_run: bool) -> Result<()> {
    let root = docs_path.unwrap_or(config.docs.root.as_path());
    let options = ScanOptions::from_config(config)?;

    let documents = scan_documents(root, &options)?;
    let chunks = collect_chunks(&documents);

    if dry_run {
        println!("index {} (dry-run)", root.display());
        println!("  documents found: {}", documents.len());
        println!("  chunks: {}", chunks.len());
        print_document_summary(&documents);
        return Ok(());
    }

    if chunks.is_empty() {
        println!("No document chunks to index.");
        return Ok(());
    }

    let store = create_store(&config.store)?;
    let embedder = create_provider(&config.embedding)?;

    let written = index_chunks(
        store.as_ref(),
        embedder.as_ref(),
        &chunks,
        config.embedding.batch_size,
    )
    .await?;

    println!("index {}", root.display());
    println!("  documents: {}", documents.len());
    println!("  chunks written: {}", written);
    println!(
        "  collection: {} ({} records)",
        store.name(),
        store.count().await?
    );
    print_document_summary(&documents);
    println!("ok");
    Ok(())
}

fn print_document_summary(documents: &[Document]) {
    for doc in documents {
        println!(
            "  - {} [{}] {} ({} chunks)",
            doc.id,
            doc.metadata.doc_type,
            doc.metadata.title,
            doc.chunks.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashProvider;
    use crate::store::{InMemoryStore, MetadataFilter};
    use std::fs;
    use tempfile::TempDir;

    fn sample_documents() -> (TempDir, Vec<Document>) {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("docs");
        fs::create_dir_all(root.join("adr")).unwrap();
        fs::write(
            root.join("adr/0001-postgres.adr.md"),
            "---\ntitle: Use Postgres\n---\n# Context\nWe need storage.\n# Decision\nUse Postgres.",
        )
        .unwrap();
        fs::write(root.join("intro.md"), "Welcome to the docs.").unwrap();
        let docs = scan_documents(&root, &ScanOptions::with_base(tmp.path())).unwrap();
        (tmp, docs)
    }

    #[tokio::test]
    async fn test_index_chunks_writes_every_chunk() {
        let (_tmp, docs) = sample_documents();
        let chunks = collect_chunks(&docs);
        assert_eq!(chunks.len(), 3);

        let store = InMemoryStore::new("docs");
        let embedder = HashProvider::new(64).unwrap();
        let written = index_chunks(&store, &embedder, &chunks, 2).await.unwrap();
        assert_eq!(written, 3);
        assert_eq!(store.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_reindex_replaces_previous_contents() {
        let (_tmp, docs) = sample_documents();
        let chunks = collect_chunks(&docs);
        let store = InMemoryStore::new("docs");
        let embedder = HashProvider::new(64).unwrap();

        index_chunks(&store, &embedder, &chunks, 8).await.unwrap();
        index_chunks(&store, &embedder, &chunks[..1], 8).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);

        let query = embedder.embed(&["Use Postgres".to_string()]).await.unwrap();
        let hits = store
            .query(&query[0], 10, &MetadataFilter::new())
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].metadata["chunkIndex"], "0");
    }
}
