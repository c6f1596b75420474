//! Integration tests for glob-like patterns
//!
//! Tests wildcard semantics and capture extraction.

use proptest::prelude::*;
use simtree::foundation::{GlobPattern, has_wildcard_characters, matches_glob_like};

// =============================================================================
// Wildcards
// =============================================================================

#[test]
fn wildcard_semantics() {
    assert!(matches_glob_like("a*c", "abc"));
    assert!(matches_glob_like("a*c", "ac"));
    assert!(matches_glob_like("a?c", "ac"));
    assert!(matches_glob_like("a?c", "abc"));
    assert!(!matches_glob_like("a?c", "abbc"));
    assert!(!matches_glob_like("a+c", "ac"));
    assert!(matches_glob_like("a+c", "abc"));
}

#[test]
fn literals_are_escaped() {
    assert!(matches_glob_like("a.b", "a.b"));
    assert!(!matches_glob_like("a.b", "axb"));
    assert!(matches_glob_like("[x]", "[x]"));
}

#[test]
fn matches_are_anchored() {
    assert!(!matches_glob_like("core", "core0"));
    assert!(!matches_glob_like("core", "my_core"));
}

#[test]
fn captures_one_per_wildcard() {
    let pattern = GlobPattern::new("core*_?").unwrap();
    assert_eq!(pattern.captures("core12_x"), Some(vec!["12".to_owned(), "x".to_owned()]));
    assert_eq!(pattern.captures("alu"), None);
}

#[test]
fn wildcard_detection() {
    assert!(has_wildcard_characters("a*"));
    assert!(has_wildcard_characters("a+"));
    assert!(!has_wildcard_characters("plain_name"));
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #[test]
    fn literal_patterns_match_only_themselves(s in "[a-z_]{1,10}", t in "[a-z_]{1,10}") {
        prop_assert_eq!(matches_glob_like(&s, &t), s == t);
    }

    #[test]
    fn star_matches_any_suffix(prefix in "[a-z]{1,6}", suffix in "[a-z0-9_]{0,6}") {
        let pattern = format!("{prefix}*");
        let target = format!("{prefix}{suffix}");
        prop_assert!(matches_glob_like(&pattern, &target));
    }
}
