//! Integration tests for identifier rules
//!
//! Tests names, groups, aliases, tags, and node identity combinations.

use simtree::foundation::ident::{
    validate_alias, validate_group, validate_name, validate_node_identity, validate_tag,
};
use simtree::foundation::{BUILTIN_GROUP, ErrorKind};

// =============================================================================
// Names
// =============================================================================

#[test]
fn names_follow_character_rules() {
    assert!(validate_name("core0").is_ok());
    assert!(validate_name("l2_cache").is_ok());
    assert!(validate_name("0core").is_err());
    assert!(validate_name("core.x").is_err());
    assert!(validate_name("a__b").is_err());
}

#[test]
fn reserved_words_are_rejected() {
    for word in ["class", "import", "parent", "location"] {
        let err = validate_name(word).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::BadIdentifier { .. }), "{word}");
    }
}

#[test]
fn aliases_must_be_non_empty() {
    assert!(validate_alias("").is_err());
    assert!(validate_alias("cpu").is_ok());
}

// =============================================================================
// Groups and Tags
// =============================================================================

#[test]
fn groups_must_not_end_in_digit() {
    assert!(validate_group("cores").is_ok());
    assert!(validate_group("core2").is_err());
}

#[test]
fn tags_may_begin_with_digit() {
    assert!(validate_tag("2wide").is_ok());
    assert!(validate_tag("").is_err());
    assert!(validate_tag("a-b").is_err());
}

#[test]
fn identity_combinations() {
    assert!(validate_node_identity("core", None, None).is_ok());
    assert!(validate_node_identity("", Some("core"), Some(0)).is_ok());
    assert!(validate_node_identity("", None, None).is_err());
    assert!(validate_node_identity("core", Some("core"), None).is_err());
    assert!(validate_node_identity("core", None, Some(1)).is_err());
    assert!(validate_node_identity("stats", Some(BUILTIN_GROUP), None).is_ok());
    assert!(validate_node_identity("stats", Some(BUILTIN_GROUP), Some(0)).is_err());
}
