//! Typed reading of a GROBID TEI tree.
//!
//! Every lookup degrades to `None` or an empty list; nothing here fails on a
//! missing element.

use super::tree::XmlElement;
use crate::config::AnalyticLookup;
use crate::types::{AnalyticBlock, AuthorName, Heading, Section, TeiDocument};
use tracing::debug;

impl TeiDocument {
    pub fn from_tree(root: &XmlElement, lookup: AnalyticLookup) -> Self {
        let title = root
            .find("titleStmt")
            .and_then(|stmt| stmt.find("title"))
            .map(XmlElement::stripped_text);

        let analytic = analytic_block(root, lookup);

        let abstract_paragraphs = root.find("abstract").map(|abstract_el| {
            abstract_el
                .find_all("p")
                .into_iter()
                .map(XmlElement::stripped_text)
                .collect()
        });

        let body = root
            .find("body")
            .map(|body| body.children_named("div").map(parse_section).collect())
            .unwrap_or_default();

        let document = TeiDocument {
            title,
            analytic,
            abstract_paragraphs,
            body,
        };
        debug!(
            has_title = document.title.is_some(),
            has_analytic = document.analytic.is_some(),
            sections = document.body.len(),
            "read TEI document"
        );
        document
    }
}

/// Locate and read the analytic block describing the paper.
pub fn analytic_block(root: &XmlElement, lookup: AnalyticLookup) -> Option<AnalyticBlock> {
    let in_front = root
        .find("front")
        .and_then(|front| front.find_with_attr("div", "type", "analytic"));

    let element = match (in_front, lookup) {
        (Some(element), _) => Some(element),
        (None, AnalyticLookup::FrontMatter) => None,
        (None, AnalyticLookup::FrontMatterThenHeader) => root
            .find("teiHeader")
            .and_then(|header| header.find("sourceDesc"))
            .and_then(|source| source.find("biblStruct"))
            .and_then(|bibl| bibl.first_child("analytic")),
    }?;

    Some(read_analytic(element))
}

fn read_analytic(element: &XmlElement) -> AnalyticBlock {
    let authors = element
        .find_all("author")
        .into_iter()
        .filter_map(|author| author.find("persName"))
        .map(|pers_name| AuthorName {
            forenames: pers_name
                .find_all("forename")
                .into_iter()
                .map(XmlElement::stripped_text)
                .collect(),
            surname: pers_name.find("surname").map(XmlElement::stripped_text),
        })
        .collect();

    let doi = element
        .find_with_attr("idno", "type", "DOI")
        .map(XmlElement::stripped_text);

    AnalyticBlock { authors, doi }
}

/// Read a `div` into a [`Section`]. Only direct-child `head`, `p` and `div`
/// elements are considered.
pub fn parse_section(div: &XmlElement) -> Section {
    let heading = div.first_child("head").map(|head| Heading {
        text: head.stripped_text(),
        numbering: head.attr("n").map(str::to_string),
    });

    Section {
        heading,
        paragraphs: div
            .children_named("p")
            .map(XmlElement::stripped_text)
            .collect(),
        children: div.children_named("div").map(parse_section).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tei::tree::parse_xml;

    const HEADER_ONLY: &str = r#"<TEI>
  <teiHeader>
    <fileDesc>
      <titleStmt><title level="a" type="main">Header Title</title></titleStmt>
      <sourceDesc>
        <biblStruct>
          <analytic>
            <author><persName><forename type="first">Grace</forename><forename type="middle">B</forename><surname>Hopper</surname></persName></author>
            <author><orgName>Not a person</orgName></author>
            <idno type="DOI">10.9/header</idno>
          </analytic>
        </biblStruct>
      </sourceDesc>
    </fileDesc>
  </teiHeader>
  <text><body/></text>
</TEI>"#;

    #[test]
    fn test_header_fallback_is_opt_in() {
        let root = parse_xml(HEADER_ONLY).unwrap();

        let strict = TeiDocument::from_tree(&root, AnalyticLookup::FrontMatter);
        assert_eq!(strict.title.as_deref(), Some("Header Title"));
        assert!(strict.analytic.is_none());

        let lenient = TeiDocument::from_tree(&root, AnalyticLookup::FrontMatterThenHeader);
        let analytic = lenient.analytic.unwrap();
        assert_eq!(analytic.authors.len(), 1);
        assert_eq!(analytic.authors[0].display_name(), "Grace B Hopper");
        assert_eq!(analytic.doi.as_deref(), Some("10.9/header"));
    }

    #[test]
    fn test_missing_everything_degrades() {
        let root = parse_xml("<TEI><text/></TEI>").unwrap();
        let doc = TeiDocument::from_tree(&root, AnalyticLookup::FrontMatter);
        assert_eq!(doc, TeiDocument::default());
    }

    #[test]
    fn test_abstract_presence_is_distinct_from_emptiness() {
        let root = parse_xml("<TEI><abstract><div/></abstract></TEI>").unwrap();
        let doc = TeiDocument::from_tree(&root, AnalyticLookup::FrontMatter);
        assert_eq!(doc.abstract_paragraphs, Some(vec![]));
    }

    #[test]
    fn test_parse_section_reads_direct_children_only() {
        let root = parse_xml(
            r#"<div><head n="3">Results</head><p> one </p><div><head n="3.1">Sub</head><p>nested</p></div><p>two</p></div>"#,
        )
        .unwrap();
        let section = parse_section(&root);
        assert_eq!(
            section.heading,
            Some(Heading {
                text: "Results".to_string(),
                numbering: Some("3".to_string())
            })
        );
        assert_eq!(section.paragraphs, vec!["one", "two"]);
        assert_eq!(section.children.len(), 1);
        assert_eq!(section.children[0].paragraphs, vec!["nested"]);
    }
}
