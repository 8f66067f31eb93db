//! Project lookup.
//!
//! A project lives under `<docs root>/projects/<name>/` and is identified by
//! a `project.md` in that directory. Looking a project up returns every
//! processed document in its directory tree.

use anyhow::{bail, Result};
use std::path::{Component, Path, PathBuf};

use crate::connector_fs::{scan_documents, ScanOptions};
use crate::models::Document;

/// Directory holding `name`, after checking the name is a single path segment.
pub fn project_dir(docs_root: &Path, name: &str) -> Result<PathBuf> {
    let name = name.trim();
    let mut components = Path::new(name).components();
    let single_segment = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if !single_segment {
        bail!("invalid project name: '{}'", name);
    }
    Ok(docs_root.join("projects").join(name))
}

/// All documents of one project, in walk order.
pub fn project_documents(
    docs_root: &Path,
    name: &str,
    options: &ScanOptions,
) -> Result<Vec<Document>> {
    let dir = project_dir(docs_root, name)?;
    if !dir.join("project.md").is_file() {
        bail!("project not found: {}", name.trim());
    }
    scan_documents(&dir, options)
}

/// `dox project <NAME>`: print the project's documents as JSON.
pub fn run_project(docs_root: &Path, name: &str, options: &ScanOptions) -> Result<()> {
    let documents = project_documents(docs_root, name, options)?;
    println!("{}", serde_json::to_string_pretty(&documents)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DocumentType;
    use std::fs;
    use tempfile::TempDir;

    fn docs_tree() -> TempDir {
        let tmp = TempDir::new().unwrap();
        let project = tmp.path().join("docs/projects/billing");
        fs::create_dir_all(project.join("rules")).unwrap();
        fs::write(
            project.join("project.md"),
            "---\nname: Billing\ntags: [payments]\n---\n# Summary\nInvoices and payments.",
        )
        .unwrap();
        fs::write(project.join("rules/rounding.md"), "# Rounding\nRound half even.").unwrap();
        fs::create_dir_all(tmp.path().join("docs/projects/empty")).unwrap();
        tmp
    }

    #[test]
    fn test_project_documents() {
        let tmp = docs_tree();
        let docs = project_documents(
            &tmp.path().join("docs"),
            "billing",
            &ScanOptions::with_base(tmp.path()),
        )
        .unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].metadata.title, "Billing");
        assert_eq!(docs[0].metadata.doc_type, DocumentType::Project);
        assert_eq!(docs[1].metadata.doc_type, DocumentType::Rule);
    }

    #[test]
    fn test_missing_project_md() {
        let tmp = docs_tree();
        let root = tmp.path().join("docs");
        let options = ScanOptions::with_base(tmp.path());

        let err = project_documents(&root, "empty", &options).unwrap_err();
        assert!(err.to_string().contains("project not found"));
        assert!(project_documents(&root, "nope", &options).is_err());
    }

    #[test]
    fn test_rejects_path_traversal() {
        let root = Path::new("docs");
        assert!(project_dir(root, "../secrets").is_err());
        assert!(project_dir(root, "a/b").is_err());
        assert!(project_dir(root, "").is_err());
        assert!(project_dir(root, "..").is_err());
        assert_eq!(
            project_dir(root, "billing").unwrap(),
            PathBuf::from("docs/projects/billing")
        );
    }
}
