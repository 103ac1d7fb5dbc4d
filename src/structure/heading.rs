//! Heading detection
//!
//! Each block gets a "headingness" score from its style relative to the body
//! font size; candidates above the threshold get a level, patterns first
//! ("Module 3", "Step 2", "1.2.3") and size delta second.

use crate::config::HeadingConfig;
use crate::layout::Block;
use crate::text::collapse_whitespace;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static MODULE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:module|modul)\s+\d+\b").expect("valid module regex"));

static CHAPTER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:chapter|kapitel)\s+\d+\b").expect("valid chapter regex"));

static STEP_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^step\s+\d+\b").expect("valid step regex"));

static NUMBERED_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+(?:\.\d+){0,8}\b").expect("valid numbering regex"));

/// Style and text features of a block
#[derive(Debug, Clone, PartialEq)]
pub struct HeadingFeature {
    pub avg_size: f32,
    pub bold: bool,
    pub all_caps: bool,
    pub ends_with_period: bool,
    pub word_count: usize,
    pub numbered: bool,
}

impl HeadingFeature {
    pub fn from_text(text: &str, avg_size: f32, bold: bool) -> Self {
        let text = text.trim();
        let has_alpha = text.chars().any(char::is_alphabetic);
        Self {
            avg_size,
            bold,
            all_caps: has_alpha && !text.chars().any(char::is_lowercase),
            ends_with_period: text.ends_with('.'),
            word_count: text.split_whitespace().count(),
            numbered: NUMBERED_REGEX.is_match(text)
                || STEP_REGEX.is_match(text)
                || MODULE_REGEX.is_match(text)
                || CHAPTER_REGEX.is_match(text),
        }
    }

    pub fn from_block(block: &Block) -> Self {
        Self::from_text(&block.text, block.size, block.bold)
    }
}

/// A detected heading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heading {
    pub title: String,
    pub level: u8,
    pub page: u32,
    pub score: f32,
}

impl Heading {
    /// Key under which consecutive repeats are collapsed.
    fn dedupe_key(&self) -> (String, u8, u32) {
        (self.title.to_lowercase(), self.level, self.page)
    }
}

/// Outcome of classifying one block
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    Heading { level: u8, score: f32 },
    Body,
}

/// Scores blocks against a document's body font size
#[derive(Debug, Clone)]
pub struct HeadingClassifier {
    config: HeadingConfig,
    body_size: f32,
}

impl HeadingClassifier {
    pub fn new(config: HeadingConfig, body_size: f32) -> Self {
        Self { config, body_size }
    }

    pub fn score(&self, feat: &HeadingFeature) -> f32 {
        let c = &self.config;
        let mut score = (feat.avg_size - self.body_size).max(0.0) * c.size_weight;
        if feat.bold {
            score += c.bold_weight;
        }
        if feat.numbered {
            score += c.numbered_weight;
        }
        if feat.word_count <= c.short_word_limit {
            score += c.short_weight;
        }
        if feat.all_caps {
            score += c.caps_weight;
        }
        if feat.ends_with_period {
            score -= c.period_penalty;
        }
        score
    }

    /// Heading level for a candidate, or 0 for body text.
    pub fn level(&self, text: &str, feat: &HeadingFeature) -> u8 {
        let text = text.trim();
        if MODULE_REGEX.is_match(text) || CHAPTER_REGEX.is_match(text) {
            return 1;
        }
        if STEP_REGEX.is_match(text) {
            return 2;
        }
        if NUMBERED_REGEX.is_match(text) {
            let token = text.split_whitespace().next().unwrap_or_default();
            let dots = token.trim_end_matches('.').matches('.').count();
            return (2 + dots).min(self.config.max_numbered_level as usize) as u8;
        }

        let delta = feat.avg_size - self.body_size;
        if delta >= self.config.level1_delta {
            1
        } else if delta >= self.config.level2_delta {
            2
        } else if delta >= self.config.level3_delta && (feat.bold || feat.numbered) {
            3
        } else {
            0
        }
    }

    pub fn classify_text(&self, text: &str, avg_size: f32, bold: bool) -> Classification {
        if text.chars().count() > self.config.max_heading_chars {
            return Classification::Body;
        }
        let feat = HeadingFeature::from_text(text, avg_size, bold);
        let score = self.score(&feat);
        if score < self.config.min_score {
            return Classification::Body;
        }
        match self.level(text, &feat) {
            0 => Classification::Body,
            level => Classification::Heading {
                level,
                score: (score * 100.0).round() / 100.0,
            },
        }
    }

    pub fn classify(&self, block: &Block) -> Classification {
        self.classify_text(&block.text, block.size, block.bold)
    }

    /// Build a [`Heading`] for a block, if it is one.
    pub fn heading(&self, block: &Block) -> Option<Heading> {
        match self.classify(block) {
            Classification::Heading { level, score } => Some(Heading {
                title: collapse_whitespace(&block.text),
                level,
                page: block.page,
                score,
            }),
            Classification::Body => None,
        }
    }
}

/// Tracks the last emitted heading so running titles are emitted once per page.
#[derive(Debug, Clone, Default)]
pub struct HeadingDeduper {
    last: Option<(String, u8, u32)>,
}

impl HeadingDeduper {
    /// Returns `true` when the heading repeats the previous one exactly.
    pub fn is_repeat(&mut self, heading: &Heading) -> bool {
        let key = heading.dedupe_key();
        if self.last.as_ref() == Some(&key) {
            return true;
        }
        self.last = Some(key);
        false
    }
}

/// Collapse consecutive duplicates (same title ignoring case, level and page).
pub fn dedupe_headings(headings: Vec<Heading>) -> Vec<Heading> {
    let mut deduper = HeadingDeduper::default();
    headings.into_iter().filter(|h| !deduper.is_repeat(h)).collect()
}
