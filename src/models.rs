//! Core data models used throughout the pipeline.
//!
//! These types represent the documents, sections, chunks, index records, and
//! search results that flow from the directory walker to the vector store
//! and back out of the query interface.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Kind of document, inferred from its filename or location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Adr,
    Rfc,
    Guide,
    Rule,
    Project,
}

impl DocumentType {
    pub const ALL: [DocumentType; 5] = [
        DocumentType::Adr,
        DocumentType::Rfc,
        DocumentType::Guide,
        DocumentType::Rule,
        DocumentType::Project,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Adr => "adr",
            DocumentType::Rfc => "rfc",
            DocumentType::Guide => "guide",
            DocumentType::Rule => "rule",
            DocumentType::Project => "project",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "adr" => Ok(DocumentType::Adr),
            "rfc" => Ok(DocumentType::Rfc),
            "guide" => Ok(DocumentType::Guide),
            "rule" => Ok(DocumentType::Rule),
            "project" => Ok(DocumentType::Project),
            other => bail!(
                "invalid document type: '{}'. Must be adr, rfc, guide, rule, or project.",
                other
            ),
        }
    }
}

/// Semantic role of a section, inferred from its heading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionType {
    Context,
    Decision,
    Consequences,
    Summary,
    Background,
    Implementation,
    #[default]
    Content,
}

impl SectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SectionType::Context => "context",
            SectionType::Decision => "decision",
            SectionType::Consequences => "consequences",
            SectionType::Summary => "summary",
            SectionType::Background => "background",
            SectionType::Implementation => "implementation",
            SectionType::Content => "content",
        }
    }
}

impl fmt::Display for SectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cross-references declared in a document's front matter, grouped by kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedDocs {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub adrs: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rfcs: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub guides: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub projects: Vec<String>,
}

/// Metadata shared by a document and every chunk cut from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    pub title: String,
    #[serde(rename = "type")]
    pub doc_type: DocumentType,
    pub tags: BTreeSet<String>,
    pub projects: BTreeSet<String>,
    pub status: Option<String>,
    pub file_path: String,
    pub related: RelatedDocs,
}

/// Document metadata plus the chunk's position and section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkMetadata {
    #[serde(flatten)]
    pub document: DocumentMetadata,
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub section_type: SectionType,
    pub section_title: String,
    pub tokens: usize,
}

/// Metadata attached to an index record.
///
/// The variant decides which keys are emitted when flattening, so whole
/// documents and chunks can share the same store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Metadata {
    Document(DocumentMetadata),
    Chunk(ChunkMetadata),
}

impl Metadata {
    /// Flatten into the scalar string map accepted by the vector store.
    ///
    /// Sets and the related map are encoded as JSON text; a missing status is
    /// the empty string. Each project also gets a `projects:<name>` marker
    /// set to `"true"`.
    pub fn to_flat_map(&self) -> BTreeMap<String, String> {
        let document = match self {
            Metadata::Document(d) => d,
            Metadata::Chunk(c) => &c.document,
        };

        let mut map = BTreeMap::new();
        map.insert("title".to_string(), document.title.clone());
        map.insert("type".to_string(), document.doc_type.to_string());
        map.insert("tags".to_string(), json_text(&document.tags));
        map.insert("projects".to_string(), json_text(&document.projects));
        for project in &document.projects {
            map.insert(member_key("projects", project), "true".to_string());
        }
        map.insert(
            "status".to_string(),
            document.status.clone().unwrap_or_default(),
        );
        map.insert("filePath".to_string(), document.file_path.clone());
        map.insert("related".to_string(), json_text(&document.related));

        if let Metadata::Chunk(c) = self {
            map.insert("chunkIndex".to_string(), c.chunk_index.to_string());
            map.insert("totalChunks".to_string(), c.total_chunks.to_string());
            map.insert("sectionType".to_string(), c.section_type.to_string());
            map.insert("sectionTitle".to_string(), c.section_title.clone());
            map.insert("tokens".to_string(), c.tokens.to_string());
        }

        map
    }
}

/// Fields stored as JSON arrays that also get one scalar marker key per
/// element, so backends that compare whole strings can test membership.
pub const MEMBER_FIELDS: [&str; 1] = ["projects"];

/// Marker key recording that `value` is an element of the array `field`.
pub fn member_key(field: &str, value: &str) -> String {
    format!("{}:{}", field, value)
}

fn json_text<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

/// A heading-delimited region of a document body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Heading text; empty for the implicit leading section.
    pub title: String,
    pub section_type: SectionType,
    /// Raw text, heading line included.
    pub text: String,
}

/// A unit of retrieval cut from one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    pub id: String,
    pub content: String,
    pub metadata: ChunkMetadata,
}

/// One processed Markdown file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Document {
    pub id: String,
    pub content: String,
    pub chunks: Vec<Chunk>,
    pub metadata: DocumentMetadata,
}

/// Flattened record handed to the vector store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRecord {
    pub id: String,
    pub content: String,
    pub metadata: BTreeMap<String, String>,
}

impl From<&Chunk> for IndexRecord {
    fn from(chunk: &Chunk) -> Self {
        IndexRecord {
            id: chunk.id.clone(),
            content: chunk.content.clone(),
            metadata: Metadata::Chunk(chunk.metadata.clone()).to_flat_map(),
        }
    }
}

impl From<&Document> for IndexRecord {
    fn from(doc: &Document) -> Self {
        IndexRecord {
            id: doc.id.clone(),
            content: doc.content.clone(),
            metadata: Metadata::Document(doc.metadata.clone()).to_flat_map(),
        }
    }
}

/// Metadata surfaced with a search hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultMetadata {
    pub title: String,
    #[serde(rename = "type")]
    pub doc_type: String,
    pub file_path: String,
    pub tags: Vec<String>,
    pub projects: Vec<String>,
    pub status: Option<String>,
    pub section_title: Option<String>,
    pub chunk_index: Option<usize>,
}

impl ResultMetadata {
    /// Rebuild structured metadata from a flattened store map.
    pub fn from_flat_map(map: &BTreeMap<String, String>) -> Self {
        let get = |key: &str| map.get(key).cloned().unwrap_or_default();
        let non_empty = |key: &str| map.get(key).filter(|v| !v.is_empty()).cloned();

        ResultMetadata {
            title: get("title"),
            doc_type: get("type"),
            file_path: get("filePath"),
            tags: parse_json_list(map.get("tags")),
            projects: parse_json_list(map.get("projects")),
            status: non_empty("status"),
            section_title: non_empty("sectionTitle"),
            chunk_index: map.get("chunkIndex").and_then(|v| v.parse().ok()),
        }
    }
}

/// Parse a JSON-encoded list of strings, tolerating missing or bad input.
pub fn parse_json_list(value: Option<&String>) -> Vec<String> {
    value
        .and_then(|v| serde_json::from_str::<Vec<String>>(v).ok())
        .unwrap_or_default()
}

/// A ranked search hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub document: String,
    pub metadata: ResultMetadata,
    /// `1 - distance` as reported by the store. Not clamped.
    pub relevance_score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_metadata() -> DocumentMetadata {
        DocumentMetadata {
            title: "Use Postgres".to_string(),
            doc_type: DocumentType::Adr,
            tags: ["db".to_string(), "storage".to_string()].into_iter().collect(),
            projects: ["billing".to_string()].into_iter().collect(),
            status: None,
            file_path: "docs/adr/0001-postgres.adr.md".to_string(),
            related: RelatedDocs {
                rfcs: vec!["0003".to_string()],
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_document_type_parse() {
        assert_eq!("ADR".parse::<DocumentType>().unwrap(), DocumentType::Adr);
        assert_eq!(" rule ".parse::<DocumentType>().unwrap(), DocumentType::Rule);
        assert!("wiki".parse::<DocumentType>().is_err());
    }

    #[test]
    fn test_chunk_metadata_flattens_all_keys() {
        let meta = Metadata::Chunk(ChunkMetadata {
            document: sample_metadata(),
            chunk_index: 1,
            total_chunks: 3,
            section_type: SectionType::Decision,
            section_title: "Decision".to_string(),
            tokens: 42,
        });
        let map = meta.to_flat_map();
        for key in [
            "title",
            "type",
            "tags",
            "projects",
            "status",
            "filePath",
            "related",
            "chunkIndex",
            "totalChunks",
            "sectionType",
            "sectionTitle",
            "tokens",
        ] {
            assert!(map.contains_key(key), "missing key {}", key);
        }
        assert_eq!(map["type"], "adr");
        assert_eq!(map["tags"], r#"["db","storage"]"#);
        assert_eq!(map["projects"], r#"["billing"]"#);
        assert_eq!(map["projects:billing"], "true");
        assert_eq!(map["status"], "");
        assert_eq!(map["related"], r#"{"rfcs":["0003"]}"#);
        assert_eq!(map["chunkIndex"], "1");
        assert_eq!(map["totalChunks"], "3");
        assert_eq!(map["sectionType"], "decision");
    }

    #[test]
    fn test_document_metadata_has_no_chunk_keys() {
        let map = Metadata::Document(sample_metadata()).to_flat_map();
        assert!(!map.contains_key("chunkIndex"));
        assert!(!map.contains_key("tokens"));
        // seven fields plus one project marker
        assert_eq!(map.len(), 8);
    }

    #[test]
    fn test_result_metadata_from_flat_map() {
        let mut flat = Metadata::Document(sample_metadata()).to_flat_map();
        flat.insert("status".to_string(), "accepted".to_string());
        flat.insert("chunkIndex".to_string(), "2".to_string());
        let meta = ResultMetadata::from_flat_map(&flat);
        assert_eq!(meta.title, "Use Postgres");
        assert_eq!(meta.doc_type, "adr");
        assert_eq!(meta.tags, vec!["db", "storage"]);
        assert_eq!(meta.projects, vec!["billing"]);
        assert_eq!(meta.status.as_deref(), Some("accepted"));
        assert_eq!(meta.section_title, None);
        assert_eq!(meta.chunk_index, Some(2));
    }

    #[test]
    fn test_parse_json_list_tolerates_garbage() {
        assert!(parse_json_list(None).is_empty());
        assert!(parse_json_list(Some(&"not json".to_string())).is_empty());
    }
}
