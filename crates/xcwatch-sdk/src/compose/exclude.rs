//! Glob exclusion of scanned paths.

use glob::{MatchOptions, Pattern};
use tracing::warn;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// True when `path` matches any of `patterns`.
///
/// `path` is relative to the native project root with `/` separators.
/// Matching is case-sensitive, `*` stays within one path component, `**`
/// spans components and dotfiles match like any other name. Invalid patterns
/// are reported and never match.
pub fn is_excluded(path: &str, patterns: &[String]) -> bool {
    patterns.iter().any(|raw| match Pattern::new(raw) {
        Ok(pattern) => pattern.matches_with(path, MATCH_OPTIONS),
        Err(err) => {
            warn!("Ignoring invalid exclude pattern '{}': {}", raw, err);
            false
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_double_star_spans_directories() {
        let excludes = patterns(&["**/Tests/**"]);
        assert!(is_excluded("watchapp/Watch/Tests/FooTests.swift", &excludes));
        assert!(is_excluded("../app/watchapp/Watch/Tests/Deep/A.swift", &excludes));
        assert!(!is_excluded("watchapp/Watch/Sources/Foo.swift", &excludes));
    }

    #[test]
    fn test_single_star_stays_in_component() {
        let excludes = patterns(&["watchapp/*.swift"]);
        assert!(is_excluded("watchapp/Main.swift", &excludes));
        assert!(!is_excluded("watchapp/Watch/Main.swift", &excludes));
    }

    #[test]
    fn test_dotfiles_match() {
        let excludes = patterns(&["**/*.md"]);
        assert!(is_excluded("watchapp/Watch/.notes.md", &excludes));
    }

    #[test]
    fn test_case_sensitive() {
        let excludes = patterns(&["**/tests/**"]);
        assert!(!is_excluded("watchapp/Watch/Tests/A.swift", &excludes));
    }

    #[test]
    fn test_empty_and_invalid_patterns() {
        assert!(!is_excluded("watchapp/Watch/A.swift", &[]));
        assert!(!is_excluded("watchapp/Watch/A.swift", &patterns(&["[unclosed"])));
    }
}
