//! Identifier rules for node names, groups, aliases and tags.
//!
//! Identifiers are made of ASCII letters, digits and underscores, may not
//! begin with a digit, may not contain `__`, and may not be a reserved word.
//! Group names additionally may not end with a digit, so that the synthetic
//! `group+index` identifier is never ambiguous.

use crate::error::{Error, Result};
use crate::intern::BUILTIN_GROUP;

/// Sentinel meaning "no group index".
pub const GROUP_IDX_NONE: u32 = u32::MAX;

/// Words that may not be used as identifiers.
///
/// Scripting-language keywords that are likely to appear as attribute names
/// when trees are exposed to tooling, plus framework-reserved tokens.
pub const RESERVED_WORDS: &[&str] = &[
    // Scripting keywords
    "and", "as", "assert", "async", "await", "break", "class", "continue", "def", "del", "elif",
    "else", "except", "exec", "finally", "for", "from", "global", "if", "import", "in", "is",
    "lambda", "nonlocal", "not", "or", "pass", "print", "raise", "return", "try", "while",
    "with", "yield", "None", "True", "False",
    // Framework tokens
    "parent", "children", "extensions", "location",
];

/// Returns true if `s` is a reserved word.
#[must_use]
pub fn is_reserved_word(s: &str) -> bool {
    RESERVED_WORDS.contains(&s)
}

fn check_chars(s: &str) -> Result<()> {
    if let Some(c) = s.chars().find(|c| !(c.is_ascii_alphanumeric() || *c == '_')) {
        return Err(Error::bad_identifier(
            s,
            format!("character {c:?} is not a letter, digit or underscore"),
        ));
    }
    if s.contains("__") {
        return Err(Error::bad_identifier(s, "contains two consecutive underscores"));
    }
    Ok(())
}

/// Validates a node name or alias.
///
/// The empty string is accepted here; whether an anonymous node is allowed
/// depends on its group (see [`validate_node_identity`]).
///
/// # Errors
///
/// Returns `BadIdentifier` if any rule is violated.
pub fn validate_name(s: &str) -> Result<()> {
    if s.is_empty() {
        return Ok(());
    }
    check_chars(s)?;
    if s.starts_with(|c: char| c.is_ascii_digit()) {
        return Err(Error::bad_identifier(s, "begins with a digit"));
    }
    if is_reserved_word(s) {
        return Err(Error::bad_identifier(s, "is a reserved word"));
    }
    Ok(())
}

/// Validates an alias, which must also be non-empty.
///
/// # Errors
///
/// Returns `BadIdentifier` if the alias is empty or invalid.
pub fn validate_alias(s: &str) -> Result<()> {
    if s.is_empty() {
        return Err(Error::bad_identifier(s, "aliases must not be empty"));
    }
    validate_name(s)
}

/// Validates a group name.
///
/// # Errors
///
/// Returns `BadIdentifier` if any name rule is violated or the group ends
/// in a digit.
pub fn validate_group(s: &str) -> Result<()> {
    validate_name(s)?;
    if s.ends_with(|c: char| c.is_ascii_digit()) {
        return Err(Error::bad_identifier(s, "group names must not end with a digit"));
    }
    Ok(())
}

/// Validates a tag. Tags follow the character rules but may start with a digit.
///
/// # Errors
///
/// Returns `BadIdentifier` if the tag is empty or has invalid characters.
pub fn validate_tag(s: &str) -> Result<()> {
    if s.is_empty() {
        return Err(Error::bad_identifier(s, "tags must not be empty"));
    }
    check_chars(s)
}

/// Validates the combination of name, group and group index of a node.
///
/// Either both group and index are unset, or both are set; the builtin group
/// is the exception and requires the index to be unset. An empty name must be
/// compensated by a group and index.
///
/// # Errors
///
/// Returns `BadIdentifier` describing the first violated rule.
pub fn validate_node_identity(name: &str, group: Option<&str>, group_idx: Option<u32>) -> Result<()> {
    validate_name(name)?;
    match (group, group_idx) {
        (None, None) => {
            if name.is_empty() {
                return Err(Error::bad_identifier(
                    name,
                    "anonymous nodes require a group and group index",
                ));
            }
        }
        (None, Some(_)) => {
            return Err(Error::bad_identifier(name, "group index given without a group"));
        }
        (Some(g), None) => {
            if g != BUILTIN_GROUP {
                return Err(Error::bad_identifier(g, "group given without a group index"));
            }
            if name.is_empty() {
                return Err(Error::bad_identifier(
                    name,
                    "anonymous nodes require a group index",
                ));
            }
        }
        (Some(g), Some(idx)) => {
            if g == BUILTIN_GROUP {
                return Err(Error::bad_identifier(
                    g,
                    "the builtin group may not carry a group index",
                ));
            }
            validate_group(g)?;
            if idx == GROUP_IDX_NONE {
                return Err(Error::bad_identifier(g, "group index equals the unset sentinel"));
            }
        }
    }
    Ok(())
}

/// Builds the synthetic `group+index` identifier, e.g. `core` + `2` = `core2`.
#[must_use]
pub fn group_identifier(group: &str, idx: u32) -> String {
    format!("{group}{idx}")
}
