//! Document structuring
//!
//! Turns the raw spans of one document into an ordered stream of headings
//! and section-stamped body blocks:
//!
//! 1. estimate the body font size over the whole document
//! 2. group spans into lines per page
//! 3. drop running headers/footers and page-number noise
//! 4. group lines into blocks
//! 5. classify blocks, tracking the section context as headings go by
//!
//! All state lives in the call, so documents can be structured in parallel.

pub mod heading;
pub mod outline;
pub mod section;

pub use heading::{
    Classification, Heading, HeadingClassifier, HeadingDeduper, HeadingFeature, dedupe_headings,
};
pub use outline::{HeadingNode, build_outline};
pub use section::SectionContext;

use crate::config::{Config, HeadingConfig, LayoutConfig};
use crate::layout::{HeaderFooterFilter, PageLines, estimate_body_size, group_blocks, group_lines};
use crate::pdf::PageSpans;

/// A body block stamped with the section context active when it was read
#[derive(Debug, Clone, PartialEq)]
pub struct BodyBlock {
    pub text: String,
    pub page: u32,
    pub section_path: Option<String>,
    pub size: f32,
    pub bold: bool,
}

/// One element of the structured stream, in reading order
#[derive(Debug, Clone, PartialEq)]
pub enum DocItem {
    Heading(Heading),
    Body(BodyBlock),
}

/// Result of structuring one document
#[derive(Debug, Clone, Default)]
pub struct StructuredDocument {
    pub body_size: f32,
    pub page_count: usize,
    pub items: Vec<DocItem>,
}

impl StructuredDocument {
    /// Deduplicated headings in document order.
    pub fn headings(&self) -> Vec<Heading> {
        self.items
            .iter()
            .filter_map(|item| match item {
                DocItem::Heading(h) => Some(h.clone()),
                DocItem::Body(_) => None,
            })
            .collect()
    }

    pub fn body_blocks(&self) -> impl Iterator<Item = &BodyBlock> {
        self.items.iter().filter_map(|item| match item {
            DocItem::Body(b) => Some(b),
            DocItem::Heading(_) => None,
        })
    }
}

/// Runs the layout and heading analysis for one document at a time
#[derive(Debug, Clone, Default)]
pub struct DocumentStructurer {
    layout: LayoutConfig,
    headings: HeadingConfig,
}

impl DocumentStructurer {
    pub fn new(config: &Config) -> Self {
        Self {
            layout: config.layout.clone(),
            headings: config.headings.clone(),
        }
    }

    pub fn structure(&self, pages: &[PageSpans]) -> StructuredDocument {
        let body_size = estimate_body_size(pages, &self.layout);
        let classifier = HeadingClassifier::new(self.headings.clone(), body_size);

        let mut page_lines: Vec<PageLines> = pages
            .iter()
            .map(|page| group_lines(page, self.layout.line_tolerance))
            .collect();
        if self.layout.strip_furniture {
            let filter = HeaderFooterFilter::detect(&page_lines, &self.layout);
            page_lines = filter.apply(page_lines);
        }

        let mut context = SectionContext::new();
        let mut deduper = HeadingDeduper::default();
        let mut items = Vec::new();

        for page in &page_lines {
            for block in group_blocks(&page.lines, body_size, &self.layout) {
                match classifier.heading(&block) {
                    Some(heading) => {
                        if deduper.is_repeat(&heading) {
                            continue;
                        }
                        context.observe(heading.level, &heading.title);
                        items.push(DocItem::Heading(heading));
                    }
                    None => items.push(DocItem::Body(BodyBlock {
                        text: block.text,
                        page: block.page,
                        section_path: context.path(),
                        size: block.size,
                        bold: block.bold,
                    })),
                }
            }
        }

        log::debug!(
            "Structured {} pages: body size {:.1}pt, {} items",
            pages.len(),
            body_size,
            items.len()
        );

        StructuredDocument {
            body_size,
            page_count: pages.len(),
            items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::{BBox, Span};

    const BODY: &str = "Regular body text that is long enough to count as body.";

    fn span(text: &str, font: &str, size: f32, y: f32) -> Span {
        Span::new(text, font, size, BBox::new(72.0, y, 500.0, y + size))
    }

    fn page(number: u32, spans: Vec<Span>) -> PageSpans {
        PageSpans {
            number,
            width: 612.0,
            height: 792.0,
            spans,
        }
    }

    #[test]
    fn test_headings_update_section_paths() {
        let pages = vec![
            page(
                1,
                vec![
                    span("Module 1 Overview", "Helvetica", 24.0, 100.0),
                    span(BODY, "Helvetica", 10.0, 150.0),
                    span("Step 1 Prepare", "Helvetica-Bold", 12.0, 200.0),
                    span(BODY, "Helvetica", 10.0, 230.0),
                ],
            ),
            page(2, vec![span(BODY, "Helvetica", 10.0, 100.0)]),
        ];
        let doc = DocumentStructurer::default().structure(&pages);

        let headings = doc.headings();
        assert_eq!(headings.len(), 2);
        assert_eq!((headings[0].title.as_str(), headings[0].level), ("Module 1 Overview", 1));
        assert_eq!((headings[1].title.as_str(), headings[1].level), ("Step 1 Prepare", 2));

        let paths: Vec<_> = doc.body_blocks().map(|b| (b.page, b.section_path.clone())).collect();
        assert_eq!(
            paths,
            vec![
                (1, Some("Module 1 Overview".to_string())),
                (1, Some("Module 1 Overview > Step 1 Prepare".to_string())),
                (2, Some("Module 1 Overview > Step 1 Prepare".to_string())),
            ]
        );
    }

    #[test]
    fn test_running_title_is_not_a_heading() {
        let pages: Vec<_> = (1..=3)
            .map(|n| {
                page(
                    n,
                    vec![
                        span("HANDBOOK", "Helvetica-Bold", 14.0, 20.0),
                        span(BODY, "Helvetica", 10.0, 300.0),
                    ],
                )
            })
            .collect();
        let doc = DocumentStructurer::default().structure(&pages);
        assert!(doc.headings().is_empty());
        assert_eq!(doc.body_blocks().count(), 3);
    }

    #[test]
    fn test_empty_document() {
        let doc = DocumentStructurer::default().structure(&[]);
        assert!(doc.items.is_empty());
        assert_eq!(doc.page_count, 0);
    }
}
