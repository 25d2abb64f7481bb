use crate::config::{BodyConfig, HeadlessSectionPolicy, SubsectionPolicy};
use crate::types::{RenderedSection, Section};

/// Number of `#` markers for a heading with the given numbering label.
///
/// The label is split on `.`; a missing label counts as one empty component,
/// so both unnumbered and single-number headings get `##`.
pub fn heading_level(numbering: Option<&str>) -> usize {
    numbering.unwrap_or("").split('.').count() + 1
}

/// Turn the top-level body sections into rendered sections, in order.
pub fn reconstruct(sections: &[Section], config: &BodyConfig) -> Vec<RenderedSection> {
    let mut rendered = Vec::new();
    for section in sections {
        render_section(section, config, &mut rendered);
    }
    rendered
}

fn render_section(section: &Section, config: &BodyConfig, out: &mut Vec<RenderedSection>) {
    let (heading, numbering) = match (&section.heading, config.headless_sections) {
        (Some(heading), _) => (heading.text.clone(), heading.numbering.as_deref()),
        (None, HeadlessSectionPolicy::Drop) => return,
        (None, HeadlessSectionPolicy::SynthesizePlaceholder) => {
            (config.placeholder_heading.clone(), None)
        }
    };

    out.push(RenderedSection {
        level: heading_level(numbering),
        heading,
        paragraphs: section.paragraphs.clone(),
    });

    if config.subsections == SubsectionPolicy::Flatten {
        for child in &section.children {
            render_section(child, config, out);
        }
    }
}
