//! Running header/footer removal
//!
//! Text that sits in the top or bottom margin band on a large share of pages
//! is page furniture. It is removed before classification so it can never be
//! promoted to a heading or leak into chunks. Bare page numbers and
//! "Page N of M" style strings are removed wherever they appear.

use super::lines::PageLines;
use crate::config::LayoutConfig;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

static PAGE_NOISE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:page\s*\d+(?:\s*(?:/|of)\s*\d+)?|\d+\s*(?:/|of)\s*\d+|\d+)$")
        .expect("valid page noise regex")
});

/// Whether a line is pure page numbering ("12", "Page 3", "3 / 10", "Page 1 of 2").
pub fn is_page_noise(text: &str) -> bool {
    PAGE_NOISE_REGEX.is_match(text.trim())
}

/// Detected running headers and footers for one document
#[derive(Debug, Clone, Default)]
pub struct HeaderFooterFilter {
    headers: HashSet<String>,
    footers: HashSet<String>,
}

impl HeaderFooterFilter {
    /// Scan every page's margin bands and collect repeating texts.
    ///
    /// A text qualifies when it appears in the same band on at least
    /// `repeat_ratio` of the document's pages.
    pub fn detect(pages: &[PageLines], config: &LayoutConfig) -> Self {
        let page_count = pages.len().max(1) as f32;
        let mut header_pages: HashMap<&str, HashSet<u32>> = HashMap::new();
        let mut footer_pages: HashMap<&str, HashSet<u32>> = HashMap::new();

        for page in pages {
            let top = page.height * config.margin_ratio;
            let bottom = page.height * (1.0 - config.margin_ratio);
            for line in &page.lines {
                let text = line.text.trim();
                if line.bbox.y0 <= top {
                    header_pages.entry(text).or_default().insert(page.number);
                } else if line.bbox.y0 >= bottom {
                    footer_pages.entry(text).or_default().insert(page.number);
                }
            }
        }

        let repeating = |counts: HashMap<&str, HashSet<u32>>| -> HashSet<String> {
            counts
                .into_iter()
                .filter(|(text, seen)| {
                    text.chars().count() <= config.max_furniture_chars
                        && seen.len() as f32 / page_count >= config.repeat_ratio
                })
                .map(|(text, _)| text.to_string())
                .collect()
        };

        let filter = Self {
            headers: repeating(header_pages),
            footers: repeating(footer_pages),
        };
        if !filter.headers.is_empty() || !filter.footers.is_empty() {
            log::debug!(
                "Detected {} running headers and {} running footers",
                filter.headers.len(),
                filter.footers.len()
            );
        }
        filter
    }

    pub fn headers(&self) -> &HashSet<String> {
        &self.headers
    }

    pub fn footers(&self) -> &HashSet<String> {
        &self.footers
    }

    /// Whether a text has been blacklisted as running furniture.
    pub fn is_furniture(&self, text: &str) -> bool {
        let text = text.trim();
        self.headers.contains(text) || self.footers.contains(text)
    }

    /// Drop furniture and page-number noise from every page.
    pub fn apply(&self, pages: Vec<PageLines>) -> Vec<PageLines> {
        pages
            .into_iter()
            .map(|mut page| {
                page.lines
                    .retain(|line| !self.is_furniture(&line.text) && !is_page_noise(&line.text));
                page
            })
            .collect()
    }
}
