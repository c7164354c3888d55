//! Token and tag normalization.
//!
//! Everything here is a pure function over strings. Token sets are `BTreeSet`s so that any
//! iteration over them is ordered and runs stay reproducible.

use std::collections::{BTreeSet, HashSet};

/// Shortest token kept by [`tokenize`] and [`normalize_tag`]
pub const MIN_TOKEN_LEN: usize = 3;

// Markup and metadata artifacts that leak into tag lists from rendered exports.
const JUNK_TAGS: &[&str] = &[
    "div",
    "span",
    "/div",
    "class",
    "style",
    "font-size",
    "color",
    "width",
    "display",
    "table",
    "margin",
    "margin-bottom",
    "padding",
    "var",
    "px",
    "rem",
    "href",
    "src",
    "html",
    "css",
    "hljs-string",
    "hljs-keyword",
    "hljs-title",
    "hljs-number",
    "hljs-comment",
    "data-line-start",
    "data-line-end",
];

const JUNK_PREFIXES: &[&str] = &["hljs", "data-", "aria-"];

/// Lowercase, turn everything but ASCII letters and digits into separators, split, and drop
/// tokens shorter than [`MIN_TOKEN_LEN`].
pub fn tokenize(text: &str) -> BTreeSet<String> {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() {
                c
            } else {
                ' '
            }
        })
        .collect();

    cleaned
        .split_whitespace()
        .filter(|token| token.len() >= MIN_TOKEN_LEN)
        .map(str::to_string)
        .collect()
}

/// Normalize a single tag, or `None` when it is junk.
pub fn normalize_tag(tag: &str) -> Option<String> {
    let trimmed = tag.trim();
    if trimmed.is_empty() {
        return None;
    }

    let lower = trimmed.to_lowercase();
    if JUNK_TAGS.contains(&lower.as_str()) {
        return None;
    }
    if JUNK_PREFIXES.iter().any(|prefix| lower.starts_with(prefix)) {
        return None;
    }
    if trimmed.contains(['<', '>', '/']) || trimmed.starts_with('.') {
        return None;
    }

    let collapsed = lower.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() < MIN_TOKEN_LEN {
        return None;
    }
    if collapsed.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    Some(collapsed)
}

/// Clean a raw tag list: normalize, drop junk, dedupe keeping first occurrence, cap at `max`.
pub fn clean_tags<S: AsRef<str>>(tags: &[S], max: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    tags.iter()
        .filter_map(|tag| normalize_tag(tag.as_ref()))
        .filter(|tag| seen.insert(tag.clone()))
        .take(max)
        .collect()
}

/// Trim app names, drop empties, dedupe keeping declaration order.
pub fn normalize_apps<S: AsRef<str>>(apps: &[S]) -> Vec<String> {
    let mut seen = HashSet::new();
    apps.iter()
        .map(|app| app.as_ref().trim())
        .filter(|app| !app.is_empty())
        .filter(|app| seen.insert(app.to_string()))
        .map(str::to_string)
        .collect()
}

/// Token set of all tags taken together
pub fn tag_words<S: AsRef<str>>(tags: &[S]) -> BTreeSet<String> {
    tags.iter().flat_map(|tag| tokenize(tag.as_ref())).collect()
}

/// Union of ordered string lists, first occurrence wins, capped at `max`
pub fn union_capped<'a, I>(lists: I, max: usize) -> Vec<String>
where
    I: IntoIterator<Item = &'a [String]>,
{
    let mut seen = HashSet::new();
    lists
        .into_iter()
        .flatten()
        .filter(|item| seen.insert(item.to_string()))
        .take(max)
        .cloned()
        .collect()
}

/// Jaccard similarity; 0 when either side is empty
pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let shared = a.intersection(b).count();
    let union = a.len() + b.len() - shared;
    shared as f64 / union as f64
}

/// Number of elements present in both sets
pub fn overlap(a: &BTreeSet<String>, b: &BTreeSet<String>) -> usize {
    a.intersection(b).count()
}
