//! Filesystem walker for Markdown documentation trees.
//!
//! Recursively visits a root directory and assembles every eligible file
//! (`*.md`, not starting with `_`) into a [`Document`]. Files that cannot be
//! read or parsed are logged and skipped; the walk itself never aborts on a
//! per-file problem.

use anyhow::{bail, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::chunk::WindowPlan;
use crate::config::Config;
use crate::document::load_document;
use crate::models::{Chunk, Document};

/// How to walk and chunk a tree.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Base for document identifiers (the working directory for the CLI).
    pub id_base: PathBuf,
    pub plan: WindowPlan,
    pub exclude_globs: Vec<String>,
    pub follow_symlinks: bool,
}

impl ScanOptions {
    /// Options from config, with ids relative to the current directory.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            id_base: std::env::current_dir()?,
            plan: WindowPlan::new(&config.chunking)?,
            exclude_globs: config.docs.exclude_globs.clone(),
            follow_symlinks: config.docs.follow_symlinks,
        })
    }

    /// Default chunking, ids relative to `id_base`.
    pub fn with_base(id_base: impl Into<PathBuf>) -> Self {
        Self {
            id_base: id_base.into(),
            plan: WindowPlan::default(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
        }
    }
}

/// Whether a file name is eligible for indexing.
pub fn is_markdown_document(file_name: &str) -> bool {
    file_name.ends_with(".md") && !file_name.starts_with('_')
}

/// Walk `root` and assemble every eligible document.
///
/// Entries are visited in file-name order, so repeated runs over an unchanged
/// tree return identical output.
pub fn scan_documents(root: &Path, options: &ScanOptions) -> Result<Vec<Document>> {
    if !root.is_dir() {
        bail!("Documentation root does not exist: {}", root.display());
    }

    let exclude_set = build_globset(&options.exclude_globs)?;

    let mut documents = Vec::new();

    let walker = WalkDir::new(root)
        .follow_links(options.follow_symlinks)
        .sort_by_file_name();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        if exclude_set.is_match(relative) {
            continue;
        }

        let file_name = entry.file_name().to_string_lossy();
        if !is_markdown_document(&file_name) {
            continue;
        }

        match load_document(path, &options.id_base, &options.plan) {
            Ok(Some(doc)) => {
                tracing::debug!(id = %doc.id, chunks = doc.chunks.len(), "processed document");
                documents.push(doc);
            }
            Ok(None) => {
                tracing::debug!(path = %path.display(), "skipping document with empty body");
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %format!("{:#}", e), "error processing document");
            }
        }
    }

    Ok(documents)
}

/// Walk `root` and return every chunk of every document, in walk order.
pub fn scan_chunks(root: &Path, options: &ScanOptions) -> Result<Vec<Chunk>> {
    let documents = scan_documents(root, options)?;
    Ok(documents.into_iter().flat_map(|doc| doc.chunks).collect())
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
