//! Removal of non-content sections (references, declarations, ...).

use crate::config::{MatchMode, SectionFilterConfig};
use crate::error::{ConvertError, ConvertResult};
use crate::tei::{XmlElement, XmlNode};
use regex::Regex;
use tracing::debug;

/// Pure section filter: [`SectionFilter::apply`] returns a reduced copy of the
/// tree and never touches its input.
#[derive(Debug, Clone)]
pub struct SectionFilter {
    mode: MatchMode,
    case_sensitive: bool,
    /// Normalized headings, used by every mode except `Pattern`
    headings: Vec<String>,
    patterns: Vec<Regex>,
}

impl SectionFilter {
    pub fn new(config: &SectionFilterConfig) -> ConvertResult<Self> {
        let case_sensitive = config.case_sensitive;
        let patterns = if config.match_mode == MatchMode::Pattern {
            config
                .excluded_headings
                .iter()
                .map(|pattern| compile_pattern(pattern, case_sensitive))
                .collect::<ConvertResult<Vec<_>>>()?
        } else {
            Vec::new()
        };

        Ok(Self {
            mode: config.match_mode,
            case_sensitive,
            headings: config
                .excluded_headings
                .iter()
                .map(|heading| normalize(heading, case_sensitive))
                .collect(),
            patterns,
        })
    }

    /// Whether a section with this heading text is removed.
    pub fn is_excluded(&self, heading: &str) -> bool {
        let normalized = normalize(heading, self.case_sensitive);
        match self.mode {
            MatchMode::Exact => self.headings.iter().any(|h| *h == normalized),
            MatchMode::Prefix => self.headings.iter().any(|h| normalized.starts_with(h.as_str())),
            MatchMode::Contains => self.headings.iter().any(|h| normalized.contains(h.as_str())),
            MatchMode::Pattern => self.patterns.iter().any(|p| p.is_match(heading.trim())),
        }
    }

    /// Copy `root`, leaving out every `div` whose own `head` is excluded.
    /// `div`s without a `head` are always kept.
    pub fn apply(&self, root: &XmlElement) -> XmlElement {
        let mut removed = Vec::new();
        let filtered = self.filter_element(root, &mut removed);
        if !removed.is_empty() {
            debug!(sections = ?removed, "removed excluded sections");
        }
        filtered
    }

    fn filter_element(&self, element: &XmlElement, removed: &mut Vec<String>) -> XmlElement {
        let mut children = Vec::with_capacity(element.children.len());
        for child in &element.children {
            match child {
                XmlNode::Element(inner) => {
                    if let Some(heading) = self.excluded_heading(inner) {
                        removed.push(heading);
                        continue;
                    }
                    children.push(XmlNode::Element(self.filter_element(inner, removed)));
                }
                XmlNode::Text(text) => children.push(XmlNode::Text(text.clone())),
            }
        }

        XmlElement {
            name: element.name.clone(),
            attributes: element.attributes.clone(),
            children,
        }
    }

    fn excluded_heading(&self, element: &XmlElement) -> Option<String> {
        if element.name != "div" {
            return None;
        }
        let heading = element.first_child("head")?.stripped_text();
        self.is_excluded(&heading).then_some(heading)
    }
}

fn normalize(text: &str, case_sensitive: bool) -> String {
    let trimmed = text.trim();
    if case_sensitive {
        trimmed.to_string()
    } else {
        trimmed.to_lowercase()
    }
}

fn compile_pattern(pattern: &str, case_sensitive: bool) -> ConvertResult<Regex> {
    let source = if case_sensitive {
        pattern.to_string()
    } else {
        format!("(?i){}", pattern)
    };
    Regex::new(&source).map_err(|source| ConvertError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}
