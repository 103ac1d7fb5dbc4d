//! Grouping spans that share a baseline into lines

use crate::pdf::{BBox, PageSpans, Span};

/// A horizontal run of spans in reading order
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub text: String,
    /// Length-weighted average of the span sizes
    pub size: f32,
    /// Any span bold
    pub bold: bool,
    pub bbox: BBox,
    pub page: u32,
}

/// Lines of one page plus the geometry needed by the margin filter
#[derive(Debug, Clone, Default)]
pub struct PageLines {
    pub number: u32,
    pub height: f32,
    pub lines: Vec<Line>,
}

/// Group a page's spans into lines sorted by `(top, left)`.
///
/// Spans whose top edges lie within `tolerance` points of the line's first
/// span join that line; within a line, spans are ordered left to right.
pub fn group_lines(page: &PageSpans, tolerance: f32) -> PageLines {
    let mut spans: Vec<&Span> = page
        .spans
        .iter()
        .filter(|s| !s.text.trim().is_empty())
        .collect();
    spans.sort_by(|a, b| {
        a.bbox
            .y0
            .total_cmp(&b.bbox.y0)
            .then(a.bbox.x0.total_cmp(&b.bbox.x0))
    });

    let mut rows: Vec<Vec<&Span>> = Vec::new();
    for span in spans {
        match rows.last_mut() {
            Some(row) if (span.bbox.y0 - row[0].bbox.y0).abs() <= tolerance => row.push(span),
            _ => rows.push(vec![span]),
        }
    }

    let mut lines: Vec<Line> = rows
        .into_iter()
        .filter_map(|mut row| {
            row.sort_by(|a, b| a.bbox.x0.total_cmp(&b.bbox.x0));
            build_line(&row, page.number)
        })
        .collect();
    lines.sort_by(|a, b| {
        a.bbox
            .y0
            .total_cmp(&b.bbox.y0)
            .then(a.bbox.x0.total_cmp(&b.bbox.x0))
    });

    PageLines {
        number: page.number,
        height: page.height,
        lines,
    }
}

fn build_line(spans: &[&Span], page: u32) -> Option<Line> {
    let mut text = String::new();
    let mut prev_x1: Option<f32> = None;
    for span in spans {
        let piece = span.text.as_str();
        if let Some(x1) = prev_x1 {
            // Separate spans that do not already carry whitespace and are not glued together.
            let gap = span.bbox.x0 - x1;
            let needs_space = !text.ends_with(char::is_whitespace)
                && !piece.starts_with(char::is_whitespace)
                && gap > span.size * 0.1;
            if needs_space {
                text.push(' ');
            }
        }
        text.push_str(piece);
        prev_x1 = Some(span.bbox.x1);
    }

    let text = text.trim().to_string();
    if text.is_empty() {
        return None;
    }

    let (weighted, weight) = spans.iter().fold((0.0f32, 0usize), |(sum, n), span| {
        let len = span.text.chars().count();
        (sum + span.size * len as f32, n + len)
    });
    let size = if weight > 0 { weighted / weight as f32 } else { 0.0 };
    let bold = spans.iter().any(|s| s.bold);
    let bbox = spans
        .iter()
        .skip(1)
        .fold(spans[0].bbox, |acc, s| acc.union(&s.bbox));

    Some(Line {
        text,
        size,
        bold,
        bbox,
        page,
    })
}
