use crate::config::MetadataConfig;
use crate::types::{ArticleMetadata, AuthorName, TeiDocument};

/// Resolve title, authors, DOI and abstract, applying defaults for anything
/// missing.
pub fn extract_metadata(document: &TeiDocument, config: &MetadataConfig) -> ArticleMetadata {
    let title = document
        .title
        .clone()
        .unwrap_or_else(|| config.missing_title.clone());

    let (authors, doi) = match &document.analytic {
        Some(analytic) => (
            analytic.authors.iter().map(AuthorName::display_name).collect(),
            analytic.doi.clone().unwrap_or_default(),
        ),
        None => (Vec::new(), String::new()),
    };

    let abstract_text = document
        .abstract_paragraphs
        .as_ref()
        .map(|paragraphs| paragraphs.join("\n"));

    ArticleMetadata {
        title,
        authors,
        doi,
        abstract_text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AnalyticBlock;

    #[test]
    fn test_defaults_for_empty_document() {
        let metadata = extract_metadata(&TeiDocument::default(), &MetadataConfig::default());
        assert_eq!(metadata.title, "No Title Found");
        assert!(metadata.authors.is_empty());
        assert_eq!(metadata.doi, "");
        assert_eq!(metadata.abstract_text, None);
    }

    #[test]
    fn test_present_but_empty_title_is_kept() {
        let document = TeiDocument {
            title: Some(String::new()),
            ..Default::default()
        };
        let metadata = extract_metadata(&document, &MetadataConfig::default());
        assert_eq!(metadata.title, "");
    }

    #[test]
    fn test_authors_doi_and_abstract() {
        let document = TeiDocument {
            title: Some("T".to_string()),
            analytic: Some(AnalyticBlock {
                authors: vec![
                    AuthorName {
                        forenames: vec!["John".to_string()],
                        surname: Some("Doe".to_string()),
                    },
                    AuthorName {
                        forenames: vec!["Jane".to_string()],
                        surname: None,
                    },
                ],
                doi: None,
            }),
            abstract_paragraphs: Some(vec!["First.".to_string(), "Second.".to_string()]),
            body: vec![],
        };
        let config = MetadataConfig {
            missing_title: "untitled".to_string(),
            ..Default::default()
        };
        let metadata = extract_metadata(&document, &config);
        assert_eq!(metadata.authors, vec!["John Doe", "Jane"]);
        assert_eq!(metadata.doi, "");
        assert_eq!(metadata.abstract_text.as_deref(), Some("First.\nSecond."));
    }
}
