use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

pub type ChunkId = Uuid;

// ===== TEI DOCUMENT MODEL =====
// Typed view of a (filtered) GROBID TEI tree. Every field is optional or
// possibly empty because the input is untrusted.

/// A section heading as found in the source, before depth resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heading {
    pub text: String,
    /// Hierarchical numbering label from the `n` attribute, e.g. "2.1"
    pub numbering: Option<String>,
}

/// A `div` of the body. Nested `div`s are kept as children so the
/// subsection policy can decide whether to render them.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Section {
    pub heading: Option<Heading>,
    /// Stripped text of the direct-child paragraphs, in document order
    pub paragraphs: Vec<String>,
    pub children: Vec<Section>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AuthorName {
    pub forenames: Vec<String>,
    pub surname: Option<String>,
}

impl AuthorName {
    /// Forenames joined by single spaces, then the surname, trimmed.
    pub fn display_name(&self) -> String {
        let forenames = self.forenames.join(" ");
        let surname = self.surname.as_deref().unwrap_or("");
        format!("{} {}", forenames, surname).trim().to_string()
    }
}

/// The bibliographic block describing the paper itself.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AnalyticBlock {
    pub authors: Vec<AuthorName>,
    pub doi: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TeiDocument {
    /// `None` when there is no `titleStmt/title`
    pub title: Option<String>,
    pub analytic: Option<AnalyticBlock>,
    /// `None` when there is no `abstract` element at all
    pub abstract_paragraphs: Option<Vec<String>>,
    /// Top-level `div`s of the body
    pub body: Vec<Section>,
}

// ===== MARKDOWN ARTIFACT =====

/// Resolved front-matter fields, after defaults have been applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleMetadata {
    pub title: String,
    pub authors: Vec<String>,
    pub doi: String,
    pub abstract_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedSection {
    /// Number of `#` markers
    pub level: usize,
    pub heading: String,
    pub paragraphs: Vec<String>,
}

/// One converted paper. `Display` produces the exact on-disk text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkdownArtifact {
    pub metadata: ArticleMetadata,
    pub sections: Vec<RenderedSection>,
}

impl MarkdownArtifact {
    pub fn render(&self) -> String {
        self.to_string()
    }
}

/// Escape a value for a double-quoted YAML scalar.
pub fn escape_quoted(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

impl fmt::Display for MarkdownArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "---")?;
        writeln!(f, "title: \"{}\"", escape_quoted(&self.metadata.title))?;
        writeln!(f, "authors:")?;
        for author in &self.metadata.authors {
            writeln!(f, "  - \"{}\"", escape_quoted(author))?;
        }
        writeln!(f, "doi: \"{}\"", escape_quoted(&self.metadata.doi))?;
        write!(f, "---\n\n")?;

        let mut items: Vec<String> = Vec::new();
        if let Some(abstract_text) = self.metadata.abstract_text.as_deref() {
            if !abstract_text.is_empty() {
                items.push("## Abstract".to_string());
                items.push(abstract_text.to_string());
            }
        }
        for section in &self.sections {
            // The leading newline puts two blank lines before every section heading.
            items.push(format!("\n{} {}", "#".repeat(section.level), section.heading));
            items.extend(section.paragraphs.iter().cloned());
        }
        write!(f, "{}", items.join("\n\n"))
    }
}

// ===== BATCH REPORTS =====

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    /// (input, written output) pairs in input order
    pub converted: Vec<(PathBuf, PathBuf)>,
    /// (input, error message) pairs in input order
    pub failed: Vec<(PathBuf, String)>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.converted.len() + self.failed.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionReport {
    pub extracted: Vec<(PathBuf, PathBuf)>,
    /// PDFs whose TEI output already existed
    pub skipped: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
}

impl ExtractionReport {
    pub fn total(&self) -> usize {
        self.extracted.len() + self.skipped.len() + self.failed.len()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexReport {
    /// (artifact, number of chunks written)
    pub indexed: Vec<(PathBuf, usize)>,
    /// Artifacts whose content hash had not changed
    pub unchanged: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
    /// Chunks in the index after the run
    pub total_chunks: usize,
}

// ===== INDEX TYPES =====

/// Metadata carried by every chunk of an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub title: String,
    /// Author display names joined with ", "
    pub authors: String,
    pub doi: String,
    pub source: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedChunk {
    pub id: ChunkId,
    pub text: String,
    pub embedding: Vec<f32>,
    /// Position of the chunk within its source document
    pub chunk_index: usize,
    pub metadata: ChunkMetadata,
    pub indexed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub chunk_id: ChunkId,
    pub text: String,
    pub metadata: ChunkMetadata,
    pub score: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> ArticleMetadata {
        ArticleMetadata {
            title: "A \"quoted\" title".to_string(),
            authors: vec!["Ada Lovelace".to_string()],
            doi: "10.1/x".to_string(),
            abstract_text: None,
        }
    }

    #[test]
    fn test_display_name_joins_and_trims() {
        let author = AuthorName {
            forenames: vec!["John".to_string(), "Q.".to_string()],
            surname: Some("Public".to_string()),
        };
        assert_eq!(author.display_name(), "John Q. Public");

        let surname_only = AuthorName {
            forenames: vec![],
            surname: Some("Plato".to_string()),
        };
        assert_eq!(surname_only.display_name(), "Plato");

        assert_eq!(AuthorName::default().display_name(), "");
    }

    #[test]
    fn test_render_front_matter_only() {
        let artifact = MarkdownArtifact {
            metadata: ArticleMetadata {
                authors: vec![],
                ..metadata()
            },
            sections: vec![],
        };
        assert_eq!(
            artifact.render(),
            "---\ntitle: \"A \\\"quoted\\\" title\"\nauthors:\ndoi: \"10.1/x\"\n---\n\n"
        );
    }

    #[test]
    fn test_render_body_layout() {
        let artifact = MarkdownArtifact {
            metadata: ArticleMetadata {
                abstract_text: Some("Short abstract.".to_string()),
                ..metadata()
            },
            sections: vec![
                RenderedSection {
                    level: 2,
                    heading: "Intro".to_string(),
                    paragraphs: vec!["P1".to_string(), "P2".to_string()],
                },
                RenderedSection {
                    level: 3,
                    heading: "Detail".to_string(),
                    paragraphs: vec![],
                },
            ],
        };
        let rendered = artifact.render();
        let body = rendered.split_once("---\n\n").map(|(_, b)| b).unwrap_or_default();
        assert_eq!(
            body,
            "## Abstract\n\nShort abstract.\n\n\n## Intro\n\nP1\n\nP2\n\n\n### Detail"
        );
    }

    #[test]
    fn test_empty_abstract_renders_no_heading() {
        let artifact = MarkdownArtifact {
            metadata: ArticleMetadata {
                abstract_text: Some(String::new()),
                ..metadata()
            },
            sections: vec![],
        };
        assert!(!artifact.render().contains("## Abstract"));
    }

    #[test]
    fn test_escape_quoted_handles_backslashes() {
        assert_eq!(escape_quoted(r#"a\b"c"#), r#"a\\b\"c"#);
    }
}
