//! Text normalization for extracted PDF text

use regex::Regex;
use std::sync::LazyLock;
use unicode_normalization::UnicodeNormalization;

static HYPHEN_BREAK_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\w)-[ \t]*\n[ \t]*(\w)").expect("valid hyphen break regex"));

static BLANK_RUN_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t]*(?:\n[ \t]*)+").expect("valid blank run regex"));

static WHITESPACE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Normalize extracted text.
///
/// - folds compatibility characters (NFKC), e.g. the "ﬁ" ligature
/// - strips soft hyphens
/// - joins words hyphenated across a line break ("certifi-\ncate")
/// - turns single newlines into spaces and collapses whitespace runs
/// - keeps paragraph breaks, collapsing any run of blank lines to one
pub fn normalize_text(text: &str) -> String {
    let text: String = text.nfkc().collect();
    let text = text.replace('\u{00ad}', "").replace("\r\n", "\n").replace('\r', "\n");
    let text = HYPHEN_BREAK_REGEX.replace_all(&text, "$1$2");
    let text = BLANK_RUN_REGEX.replace_all(&text, "\n\n");

    text.split("\n\n")
        .map(|para| WHITESPACE_REGEX.replace_all(para, " ").trim().to_string())
        .filter(|para| !para.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Collapse all whitespace to single spaces; used for heading titles.
pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE_REGEX.replace_all(text.trim(), " ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dehyphenation() {
        assert_eq!(normalize_text("certifi-\ncate"), "certificate");
        assert_eq!(normalize_text("well-known fact"), "well-known fact");
    }

    #[test]
    fn test_single_newlines_become_spaces() {
        assert_eq!(normalize_text("first line\nsecond   line"), "first line second line");
    }

    #[test]
    fn test_blank_line_runs_collapse_to_one() {
        assert_eq!(normalize_text("one\n\n\n\n two"), "one\n\ntwo");
        assert_eq!(normalize_text("one\n \n\t\ntwo"), "one\n\ntwo");
    }

    #[test]
    fn test_soft_hyphen_and_ligature() {
        assert_eq!(normalize_text("ﬁnal con\u{00ad}tent"), "final content");
    }

    #[test]
    fn test_whitespace_only_is_empty() {
        assert_eq!(normalize_text(" \n\t \n"), "");
        assert_eq!(collapse_whitespace("  Module   1\nOverview "), "Module 1 Overview");
    }
}
