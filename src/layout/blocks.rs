//! Grouping lines into paragraph-like blocks

use super::lines::Line;
use crate::config::LayoutConfig;
use crate::pdf::BBox;
use crate::text::normalize_text;

/// One or more consecutive lines; the unit scored by the heading classifier
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    /// Normalized text
    pub text: String,
    /// Length-weighted average font size of the lines
    pub size: f32,
    /// Every line bold
    pub bold: bool,
    pub bbox: BBox,
    pub page: u32,
    pub line_count: usize,
}

/// Group reading-ordered lines into blocks.
///
/// A new block starts when the vertical gap to the previous line exceeds
/// `block_gap_ratio × body_size`, when the font size jumps by at least
/// `size_break_delta`, or when boldness flips. Blocks whose normalized text
/// is empty are dropped.
pub fn group_blocks(lines: &[Line], body_size: f32, config: &LayoutConfig) -> Vec<Block> {
    let max_gap = body_size * config.block_gap_ratio;
    let mut groups: Vec<Vec<&Line>> = Vec::new();

    for line in lines {
        let continues = groups
            .last()
            .and_then(|group| group.last())
            .is_some_and(|prev| {
                let gap = line.bbox.y0 - prev.bbox.y1;
                gap <= max_gap
                    && (line.size - prev.size).abs() < config.size_break_delta
                    && line.bold == prev.bold
            });
        match groups.last_mut() {
            Some(group) if continues => group.push(line),
            _ => groups.push(vec![line]),
        }
    }

    groups.into_iter().filter_map(|group| build_block(&group)).collect()
}

fn build_block(lines: &[&Line]) -> Option<Block> {
    let first = lines.first()?;
    let raw = lines.iter().map(|l| l.text.as_str()).collect::<Vec<_>>().join("\n");
    let text = normalize_text(&raw);
    if text.is_empty() {
        return None;
    }

    let (weighted, weight) = lines.iter().fold((0.0f32, 0usize), |(sum, n), line| {
        let len = line.text.chars().count();
        (sum + line.size * len as f32, n + len)
    });
    let size = if weight > 0 { weighted / weight as f32 } else { 0.0 };

    Some(Block {
        text,
        size,
        bold: lines.iter().all(|l| l.bold),
        bbox: lines.iter().skip(1).fold(first.bbox, |acc, l| acc.union(&l.bbox)),
        page: first.page,
        line_count: lines.len(),
    })
}
