//! Markdown document assembly.
//!
//! Turns the raw text of one file into a [`Document`]: front matter is parsed
//! into metadata, the document type is inferred from naming conventions, the
//! identifier is derived from the path, and the body is sectioned and chunked.

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer};
use std::collections::BTreeSet;
use std::path::{Component, Path};

use crate::chunk::{chunk_sections, WindowPlan};
use crate::models::{Document, DocumentMetadata, DocumentType, RelatedDocs};
use crate::sections::extract_sections;

/// Filename suffixes, checked before any directory convention.
const SUFFIX_TYPES: [(&str, DocumentType); 4] = [
    (".adr.md", DocumentType::Adr),
    (".rfc.md", DocumentType::Rfc),
    (".guide.md", DocumentType::Guide),
    (".rules.md", DocumentType::Rule),
];

/// Directory names that imply a type when the filename says nothing.
const DIR_TYPES: [(&str, DocumentType); 5] = [
    ("adr", DocumentType::Adr),
    ("rfc", DocumentType::Rfc),
    ("guides", DocumentType::Guide),
    ("rules", DocumentType::Rule),
    ("projects", DocumentType::Project),
];

/// Recognised front matter keys. Anything else is ignored.
#[derive(Debug, Default, Deserialize)]
struct FrontMatter {
    #[serde(default, deserialize_with = "scalar_string")]
    title: Option<String>,
    #[serde(default, deserialize_with = "scalar_string")]
    name: Option<String>,
    #[serde(default, deserialize_with = "string_or_list")]
    tags: Vec<String>,
    #[serde(default, deserialize_with = "scalar_string")]
    status: Option<String>,
    #[serde(default)]
    related: RelatedFrontMatter,
}

#[derive(Debug, Default, Deserialize)]
struct RelatedFrontMatter {
    #[serde(default, deserialize_with = "string_or_list")]
    adrs: Vec<String>,
    #[serde(default, deserialize_with = "string_or_list")]
    rfcs: Vec<String>,
    #[serde(default, deserialize_with = "string_or_list")]
    guides: Vec<String>,
    #[serde(default, deserialize_with = "string_or_list")]
    rules: Vec<String>,
    #[serde(default, deserialize_with = "string_or_list")]
    projects: Vec<String>,
}

impl From<RelatedFrontMatter> for RelatedDocs {
    fn from(r: RelatedFrontMatter) -> Self {
        RelatedDocs {
            adrs: r.adrs,
            rfcs: r.rfcs,
            guides: r.guides,
            rules: r.rules,
            projects: r.projects,
        }
    }
}

fn yaml_scalar(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn scalar_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_yaml::Value::deserialize(deserializer)?;
    Ok(yaml_scalar(&value).filter(|s| !s.trim().is_empty()))
}

fn string_or_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_yaml::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_yaml::Value::Sequence(items) => items.iter().filter_map(yaml_scalar).collect(),
        other => yaml_scalar(&other).into_iter().collect(),
    })
}

/// Split a leading `---` delimited block from the body.
///
/// Returns `(front_matter, body)`. Without a complete block the whole input
/// is the body.
pub fn split_front_matter(raw: &str) -> (Option<&str>, &str) {
    let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);

    let after_open = match raw
        .strip_prefix("---\r\n")
        .or_else(|| raw.strip_prefix("---\n"))
    {
        Some(rest) => rest,
        None => return (None, raw),
    };

    let mut offset = 0;
    for line in after_open.split_inclusive('\n') {
        if line.trim_end() == "---" {
            let yaml = &after_open[..offset];
            let body = &after_open[offset + line.len()..];
            return (Some(yaml), body);
        }
        offset += line.len();
    }

    (None, raw)
}

fn parse_front_matter(yaml: Option<&str>) -> Result<FrontMatter> {
    match yaml {
        Some(y) if !y.trim().is_empty() => {
            serde_yaml::from_str(y).context("Failed to parse front matter")
        }
        _ => Ok(FrontMatter::default()),
    }
}

/// Infer the document type. Filename suffixes win over directories.
pub fn infer_document_type(path: &Path) -> DocumentType {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    if let Some((_, doc_type)) = SUFFIX_TYPES
        .iter()
        .find(|(suffix, _)| file_name.ends_with(suffix))
    {
        return *doc_type;
    }

    let dirs: Vec<String> = path
        .parent()
        .map(|p| {
            p.components()
                .filter_map(|c| match c {
                    Component::Normal(s) => Some(s.to_string_lossy().to_string()),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();

    DIR_TYPES
        .iter()
        .find(|(dir, _)| dirs.iter().any(|d| d == dir))
        .map(|(_, doc_type)| *doc_type)
        .unwrap_or(DocumentType::Guide)
}

/// Stable identifier: the path relative to `base`, components joined with
/// `_`, and the `.md` extension removed.
pub fn document_id(path: &Path, base: &Path) -> String {
    let relative = path.strip_prefix(base).unwrap_or(path);
    let joined = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().to_string()),
            Component::ParentDir => Some("..".to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("_");

    joined
        .strip_suffix(".md")
        .map(str::to_string)
        .unwrap_or(joined)
}

/// Assemble a document from one file's raw text.
///
/// Returns `Ok(None)` when the body is blank. Front matter that is not valid
/// YAML is an error; the caller decides whether that aborts anything.
pub fn parse_document(
    path: &Path,
    raw: &str,
    id_base: &Path,
    plan: &WindowPlan,
) -> Result<Option<Document>> {
    let (yaml, body) = split_front_matter(raw);
    let front = parse_front_matter(yaml)?;

    let body = body.trim();
    if body.is_empty() {
        return Ok(None);
    }

    let id = document_id(path, id_base);
    let doc_type = infer_document_type(path);

    let title = front
        .title
        .or(front.name)
        .unwrap_or_else(|| file_stem(path));

    let related: RelatedDocs = front.related.into();
    let projects: BTreeSet<String> = related.projects.iter().cloned().collect();

    let metadata = DocumentMetadata {
        title,
        doc_type,
        tags: front.tags.into_iter().collect(),
        projects,
        status: front.status,
        file_path: path.to_string_lossy().to_string(),
        related,
    };

    let sections = extract_sections(body);
    let chunks = chunk_sections(&id, &metadata, &sections, plan);

    Ok(Some(Document {
        id,
        content: body.to_string(),
        chunks,
        metadata,
    }))
}

/// Read a file from disk and assemble it.
pub fn load_document(path: &Path, id_base: &Path, plan: &WindowPlan) -> Result<Option<Document>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse_document(path, &raw, id_base, plan)
        .with_context(|| format!("Failed to process {}", path.display()))
}

/// Filename with the trailing `.md` removed.
fn file_stem(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    name.strip_suffix(".md")
        .map(str::to_string)
        .unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SectionType;

    fn parse(path: &str, raw: &str) -> Option<Document> {
        parse_document(Path::new(path), raw, Path::new(""), &WindowPlan::default()).unwrap()
    }

    #[test]
    fn test_split_front_matter() {
        let (fm, body) = split_front_matter("---\ntitle: Hello\n---\n# Body\n");
        assert_eq!(fm, Some("title: Hello\n"));
        assert_eq!(body, "# Body\n");
    }

    #[test]
    fn test_split_without_front_matter() {
        let (fm, body) = split_front_matter("# Body\n---\nnot front matter");
        assert!(fm.is_none());
        assert_eq!(body, "# Body\n---\nnot front matter");
    }

    #[test]
    fn test_split_unterminated_block() {
        let raw = "---\ntitle: x\n# Body";
        let (fm, body) = split_front_matter(raw);
        assert!(fm.is_none());
        assert_eq!(body, raw);
    }

    #[test]
    fn test_type_from_suffix_beats_directory() {
        assert_eq!(
            infer_document_type(Path::new("docs/rules/x.adr.md")),
            DocumentType::Adr
        );
        assert_eq!(
            infer_document_type(Path::new("docs/guides/y.rfc.md")),
            DocumentType::Rfc
        );
        assert_eq!(
            infer_document_type(Path::new("docs/adr/z.rules.md")),
            DocumentType::Rule
        );
        assert_eq!(
            infer_document_type(Path::new("docs/projects/a.guide.md")),
            DocumentType::Guide
        );
    }

    #[test]
    fn test_type_from_directory() {
        assert_eq!(
            infer_document_type(Path::new("docs/rules/naming.md")),
            DocumentType::Rule
        );
        assert_eq!(
            infer_document_type(Path::new("/abs/docs/adr/0001.md")),
            DocumentType::Adr
        );
        assert_eq!(
            infer_document_type(Path::new("docs/projects/billing/project.md")),
            DocumentType::Project
        );
        assert_eq!(
            infer_document_type(Path::new("docs/rfc/0002.md")),
            DocumentType::Rfc
        );
    }

    #[test]
    fn test_type_defaults_to_guide() {
        assert_eq!(
            infer_document_type(Path::new("docs/misc/notes.md")),
            DocumentType::Guide
        );
        // "rules" must be a directory, not a filename
        assert_eq!(
            infer_document_type(Path::new("docs/rules.md")),
            DocumentType::Guide
        );
    }

    #[test]
    fn test_document_id() {
        assert_eq!(
            document_id(
                Path::new("/work/docs/guides/setup.guide.md"),
                Path::new("/work")
            ),
            "docs_guides_setup.guide"
        );
        assert_eq!(
            document_id(Path::new("docs/adr/0001.adr.md"), Path::new("")),
            "docs_adr_0001.adr"
        );
        assert_eq!(
            document_id(Path::new("/elsewhere/a.md"), Path::new("/work")),
            "elsewhere_a"
        );
    }

    #[test]
    fn test_blank_body_skipped() {
        assert!(parse("docs/a.md", "").is_none());
        assert!(parse("docs/a.md", "---\ntitle: Empty\n---\n\n  \n").is_none());
    }

    #[test]
    fn test_title_fallbacks() {
        let doc = parse("docs/a.md", "---\ntitle: Real Title\nname: Other\n---\nBody").unwrap();
        assert_eq!(doc.metadata.title, "Real Title");

        let doc = parse("docs/a.md", "---\nname: Named\n---\nBody").unwrap();
        assert_eq!(doc.metadata.title, "Named");

        let doc = parse("docs/guides/setup.guide.md", "Body").unwrap();
        assert_eq!(doc.metadata.title, "setup.guide");
    }

    #[test]
    fn test_front_matter_metadata() {
        let raw = "---\n\
title: Use Postgres\n\
status: accepted\n\
tags: [db, storage]\n\
related:\n  rfcs: [\"0003\"]\n  projects:\n    - billing\n    - ledger\n\
---\n\
# Context\nWe need a database.\n\n# Decision\nPostgres.\n";
        let doc = parse("docs/adr/0001-postgres.md", raw).unwrap();
        let meta = &doc.metadata;
        assert_eq!(meta.doc_type, DocumentType::Adr);
        assert_eq!(meta.status.as_deref(), Some("accepted"));
        assert!(meta.tags.contains("db") && meta.tags.contains("storage"));
        assert_eq!(
            meta.projects.iter().cloned().collect::<Vec<_>>(),
            vec!["billing", "ledger"]
        );
        assert_eq!(meta.related.rfcs, vec!["0003"]);
        assert_eq!(meta.file_path, "docs/adr/0001-postgres.md");

        assert_eq!(doc.chunks.len(), 2);
        assert_eq!(doc.chunks[0].metadata.section_type, SectionType::Context);
        assert_eq!(doc.chunks[1].metadata.section_type, SectionType::Decision);
        assert_eq!(doc.chunks[1].metadata.document, doc.metadata);
    }

    #[test]
    fn test_scalar_tag_and_numeric_status() {
        let doc = parse("docs/a.md", "---\ntags: solo\nstatus: 2\n---\nBody").unwrap();
        assert_eq!(doc.metadata.tags.len(), 1);
        assert!(doc.metadata.tags.contains("solo"));
        assert_eq!(doc.metadata.status.as_deref(), Some("2"));
    }

    #[test]
    fn test_malformed_front_matter_is_error() {
        let result = parse_document(
            Path::new("docs/a.md"),
            "---\ntitle: [unclosed\n---\nBody",
            Path::new(""),
            &WindowPlan::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_setup_guide_scenario() {
        let doc = parse(
            "docs/guides/setup.guide.md",
            "# Setup\nStep one.\n# Usage\nStep two.",
        )
        .unwrap();
        assert_eq!(doc.id, "docs_guides_setup.guide");
        assert_eq!(doc.metadata.doc_type, DocumentType::Guide);
        let ids: Vec<&str> = doc.chunks.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "docs_guides_setup.guide_chunk_0",
                "docs_guides_setup.guide_chunk_1"
            ]
        );
        for chunk in &doc.chunks {
            assert_eq!(chunk.metadata.total_chunks, 2);
            assert_eq!(chunk.metadata.section_type, SectionType::Content);
        }
        assert_eq!(doc.chunks[0].content, "# Setup\nStep one.");
        assert_eq!(doc.chunks[1].metadata.section_title, "Usage");
    }
}
