//! GROBID TEI input handling.
//!
//! `tree` turns raw XML into a generic [`XmlElement`] tree that the section
//! filter can rewrite. `document` reads the typed [`TeiDocument`] view out of
//! a (filtered) tree.
//!
//! [`TeiDocument`]: crate::types::TeiDocument

pub mod document;
pub mod tree;

pub use document::{analytic_block, parse_section};
pub use tree::{parse_xml, XmlElement, XmlNode};
