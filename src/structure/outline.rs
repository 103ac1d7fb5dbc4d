//! Heading hierarchy
//!
//! A flat, leveled heading list becomes a tree under a synthetic `ROOT`
//! node. Every node ends up as a child of the nearest preceding heading with
//! a strictly smaller level.

use super::heading::Heading;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

const ROOT_TITLE: &str = "ROOT";

/// One node of the outline tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeadingNode {
    pub title: String,
    pub level: u8,
    /// `None` only on the root
    pub page: Option<u32>,
    /// Rounded to two decimals
    pub score: Option<f64>,
    pub children: Vec<HeadingNode>,
}

impl HeadingNode {
    pub fn root() -> Self {
        Self {
            title: ROOT_TITLE.to_string(),
            level: 0,
            page: None,
            score: None,
            children: Vec::new(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.level == 0 && self.page.is_none()
    }

    /// Headings in depth-first order, the inverse of [`build_outline`].
    pub fn flatten(&self) -> Vec<Heading> {
        let mut out = Vec::new();
        self.collect_into(&mut out);
        out
    }

    fn collect_into(&self, out: &mut Vec<Heading>) {
        for child in &self.children {
            out.push(Heading {
                title: child.title.clone(),
                level: child.level,
                page: child.page.unwrap_or_default(),
                score: child.score.unwrap_or_default() as f32,
            });
            child.collect_into(out);
        }
    }

    /// Number of nodes below this one.
    pub fn descendant_count(&self) -> usize {
        self.children.iter().map(|c| 1 + c.descendant_count()).sum()
    }

    /// One `#`-prefixed line per node, depth-first; levels clamp to 1..=6.
    pub fn to_markdown(&self) -> String {
        let mut lines = Vec::new();
        self.markdown_lines(&mut lines);
        format!("{}\n", lines.join("\n").trim())
    }

    fn markdown_lines(&self, lines: &mut Vec<String>) {
        for child in &self.children {
            let hashes = "#".repeat(child.level.clamp(1, 6) as usize);
            let page = child.page.map_or_else(|| "?".to_string(), |p| p.to_string());
            lines.push(format!("{} {} (p. {})", hashes, child.title, page));
            child.markdown_lines(lines);
        }
    }

    /// Compact JSON without the root: `{"items": [...]}`.
    pub fn to_slim_json(&self) -> Value {
        json!({ "items": self.children })
    }
}

impl From<&Heading> for HeadingNode {
    fn from(heading: &Heading) -> Self {
        Self {
            title: heading.title.clone(),
            level: heading.level,
            page: Some(heading.page),
            score: Some((heading.score as f64 * 100.0).round() / 100.0),
            children: Vec::new(),
        }
    }
}

/// Attach the top of the stack to the node below it.
fn close_top(stack: &mut Vec<HeadingNode>) {
    if stack.len() < 2 {
        return;
    }
    if let Some(node) = stack.pop() {
        if let Some(parent) = stack.last_mut() {
            parent.children.push(node);
        }
    }
}

/// Build the outline tree for one document's headings.
pub fn build_outline(headings: &[Heading]) -> HeadingNode {
    let mut stack = headings
        .iter()
        .fold(vec![HeadingNode::root()], |mut stack, heading| {
            while stack.len() > 1 && stack.last().is_some_and(|top| top.level >= heading.level) {
                close_top(&mut stack);
            }
            stack.push(HeadingNode::from(heading));
            stack
        });

    while stack.len() > 1 {
        close_top(&mut stack);
    }
    stack.pop().unwrap_or_else(HeadingNode::root)
}
