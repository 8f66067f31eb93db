//! Heading-based section extraction.
//!
//! Splits a Markdown body into [`Section`]s at ATX headings (`#` through
//! `######`). Each section keeps its heading as the first line of its text so
//! that chunks carry their own local title. Text before the first heading
//! forms an implicit section with an empty title.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{Section, SectionType};

static HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#{1,6}\s+(.+)$").expect("heading pattern is valid"));

/// Heading keywords in priority order; the first match wins.
const SECTION_KEYWORDS: [(&str, SectionType); 6] = [
    ("context", SectionType::Context),
    ("decision", SectionType::Decision),
    ("consequence", SectionType::Consequences),
    ("summary", SectionType::Summary),
    ("background", SectionType::Background),
    ("implementation", SectionType::Implementation),
];

/// Classify a heading by case-insensitive keyword match.
pub fn infer_section_type(title: &str) -> SectionType {
    let lower = title.to_lowercase();
    SECTION_KEYWORDS
        .iter()
        .find(|(keyword, _)| lower.contains(keyword))
        .map(|(_, section_type)| *section_type)
        .unwrap_or_default()
}

/// If `line` is an ATX heading, return its title.
fn heading_title(line: &str) -> Option<&str> {
    HEADING
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim_end())
}

/// Split `content` into sections.
///
/// Sections whose text is blank are dropped. A body with no headings yields a
/// single untitled content section. Every heading keeps its own section
/// non-blank, so the fallback below only fires for blank input, which
/// document assembly never passes in.
pub fn extract_sections(content: &str) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut current = Section {
        title: String::new(),
        section_type: SectionType::Content,
        text: String::new(),
    };

    for raw_line in content.split('\n') {
        let line = raw_line.strip_suffix('\r').unwrap_or(raw_line);

        if let Some(title) = heading_title(line) {
            let next = Section {
                title: title.to_string(),
                section_type: infer_section_type(title),
                text: format!("{}\n", line),
            };
            let finished = std::mem::replace(&mut current, next);
            if !finished.text.trim().is_empty() {
                sections.push(finished);
            }
        } else {
            current.text.push_str(line);
            current.text.push('\n');
        }
    }

    if !current.text.trim().is_empty() {
        sections.push(current);
    }

    if sections.is_empty() {
        sections.push(Section {
            title: String::new(),
            section_type: SectionType::Content,
            text: content.to_string(),
        });
    }

    sections
}
