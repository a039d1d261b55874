//! Utility functions and helpers.

pub mod http;
pub mod log;

use std::sync::OnceLock;

use regex::Regex;
use unicode_segmentation::UnicodeSegmentation;
use url::Url;

/// Collapse whitespace runs into single spaces and trim.
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Single-line preview of at most `max` graphemes for log output.
pub fn preview(text: &str, max: usize) -> String {
    let flat = normalize_whitespace(text);
    if flat.is_empty() {
        return "[No Text]".to_string();
    }
    let mut graphemes = flat.graphemes(true);
    let head: String = graphemes.by_ref().take(max).collect();
    if graphemes.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

/// Resolve a potentially relative URL against a base URL.
pub fn resolve_url(base: &Url, href: &str) -> String {
    base.join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Join an API path onto a host, tolerating trailing slashes.
pub fn join_path(host: &str, path: &str) -> String {
    format!(
        "{}/{}",
        host.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Extract the numeric status id from an X post URL.
pub fn extract_status_id(url: &str) -> Option<String> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    let pattern = PATTERN
        .get_or_init(|| Regex::new(r"/status(?:es)?/(\d+)").ok())
        .as_ref()?;

    pattern
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_whitespace("  a \n\t b  "), "a b");
        assert_eq!(normalize_whitespace(""), "");
    }

    #[test]
    fn test_preview_truncates_on_graphemes() {
        assert_eq!(preview("hello world", 5), "hello...");
        assert_eq!(preview("short", 10), "short");
        assert_eq!(preview("👍🏽👍🏽👍🏽", 2), "👍🏽👍🏽...");
        assert_eq!(preview("   ", 10), "[No Text]");
    }

    #[test]
    fn test_resolve_url() {
        let base = Url::parse("https://x.com/alice").unwrap();
        assert_eq!(
            resolve_url(&base, "/alice/status/1"),
            "https://x.com/alice/status/1"
        );
        assert_eq!(
            resolve_url(&base, "https://other.com/x"),
            "https://other.com/x"
        );
    }

    #[test]
    fn test_join_path() {
        assert_eq!(
            join_path("https://m.local/", "/api/v1/memos"),
            "https://m.local/api/v1/memos"
        );
    }

    #[test]
    fn test_extract_status_id() {
        assert_eq!(
            extract_status_id("https://x.com/alice/status/1234567890"),
            Some("1234567890".to_string())
        );
        assert_eq!(
            extract_status_id("/alice/status/42/photo/1"),
            Some("42".to_string())
        );
        assert_eq!(extract_status_id("https://x.com/alice"), None);
    }
}
