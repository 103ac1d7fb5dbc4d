//! Body font size estimation
//!
//! The body size is the baseline every heading decision is measured against.
//! It is computed once per document so heading levels stay comparable across
//! pages.

use crate::config::LayoutConfig;
use crate::pdf::PageSpans;
use std::collections::BTreeMap;

/// Estimate the dominant body font size of a document.
///
/// Takes the most frequent size (rounded to 0.1pt) among spans with at least
/// `body_font_min_chars` characters; ties go to the smaller size. Without
/// such spans, the median of all sized spans is used, and without any sizes
/// at all, `default_body_size`.
pub fn estimate_body_size(pages: &[PageSpans], config: &LayoutConfig) -> f32 {
    let mut histogram: BTreeMap<i32, usize> = BTreeMap::new();
    let mut all_sizes: Vec<f32> = Vec::new();

    for span in pages.iter().flat_map(|p| p.spans.iter()) {
        if span.size <= 0.0 {
            continue;
        }
        all_sizes.push(span.size);
        if span.text.trim().chars().count() >= config.body_font_min_chars {
            let tenths = (span.size * 10.0).round() as i32;
            *histogram.entry(tenths).or_insert(0) += 1;
        }
    }

    // BTreeMap iterates ascending, so `>` keeps the smaller size on ties.
    let mode = histogram
        .iter()
        .fold(None, |best: Option<(i32, usize)>, (&size, &count)| match best {
            Some((_, best_count)) if best_count >= count => best,
            _ => Some((size, count)),
        });

    if let Some((tenths, count)) = mode {
        let size = tenths as f32 / 10.0;
        log::debug!("Body font size {:.1}pt ({} long spans)", size, count);
        return size;
    }

    if !all_sizes.is_empty() {
        all_sizes.sort_by(|a, b| a.total_cmp(b));
        return all_sizes[all_sizes.len() / 2];
    }

    config.default_body_size
}
