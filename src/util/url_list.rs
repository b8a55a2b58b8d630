//! URL list parsing for the analyze and batch inputs
//!
//! Users paste one link per line. Lines are trimmed, blank lines are dropped
//! and duplicates collapse to their first occurrence.
//!
//! # Examples
//!
//! ```ignore
//! use mediaq::util::url_list::parse_url_list;
//!
//! let urls = parse_url_list("https://a\r\n\nhttps://a\n  https://b  ");
//! // ["https://a", "https://b"]
//! ```

use std::collections::HashSet;

/// Split raw input into an ordered, de-duplicated list of links
pub fn parse_url_list(raw: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| seen.insert(*line))
        .map(str::to_string)
        .collect()
}

/// Whether the input contains at least one non-blank line
pub fn has_urls(raw: &str) -> bool {
    raw.lines().any(|line| !line.trim().is_empty())
}
