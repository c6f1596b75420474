//! Glob-like patterns for tree paths and notification categories.
//!
//! Each wildcard becomes one regex capture group:
//! - `*` matches zero or more characters
//! - `?` matches zero or one character
//! - `+` matches one or more characters
//!
//! Everything else is literal. A pattern matches an identifier only if it
//! matches the whole identifier.

use std::fmt;

use regex::Regex;

use crate::error::{Error, Result};

/// Wildcard substitutions, kept as data so that detection and translation
/// cannot drift apart.
pub const WILDCARD_SUBSTITUTIONS: &[(char, &str)] = &[('*', "(.*)"), ('?', "(.?)"), ('+', "(.+)")];

fn substitution(c: char) -> Option<&'static str> {
    WILDCARD_SUBSTITUTIONS
        .iter()
        .find(|(w, _)| *w == c)
        .map(|(_, r)| *r)
}

/// Returns true if `s` contains any wildcard character.
#[must_use]
pub fn has_wildcard_characters(s: &str) -> bool {
    s.chars().any(|c| substitution(c).is_some())
}

/// Translates a glob-like pattern into an anchored regular expression.
#[must_use]
pub fn create_search_regex_pattern(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    out.push_str("^(?:");
    let mut literal = String::new();
    for c in pattern.chars() {
        if let Some(rep) = substitution(c) {
            out.push_str(&regex::escape(&literal));
            literal.clear();
            out.push_str(rep);
        } else {
            literal.push(c);
        }
    }
    out.push_str(&regex::escape(&literal));
    out.push_str(")$");
    out
}

/// A compiled glob-like pattern.
#[derive(Clone)]
pub struct GlobPattern {
    source: String,
    regex: Regex,
}

impl GlobPattern {
    /// Compiles a glob-like pattern.
    ///
    /// # Errors
    ///
    /// Returns an internal error if the translated expression is rejected by
    /// the regex engine, which only happens for pathological sizes.
    pub fn new(pattern: &str) -> Result<Self> {
        let regex = Regex::new(&create_search_regex_pattern(pattern))
            .map_err(|e| Error::internal(format!("bad pattern {pattern:?}: {e}")))?;
        Ok(Self {
            source: pattern.to_owned(),
            regex,
        })
    }

    /// Returns the original pattern text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Returns true if the pattern contains wildcards.
    #[must_use]
    pub fn has_wildcards(&self) -> bool {
        has_wildcard_characters(&self.source)
    }

    /// Returns true if the whole of `s` matches.
    #[must_use]
    pub fn matches(&self, s: &str) -> bool {
        self.regex.is_match(s)
    }

    /// Returns the wildcard captures if the whole of `s` matches.
    #[must_use]
    pub fn captures(&self, s: &str) -> Option<Vec<String>> {
        let caps = self.regex.captures(s)?;
        Some(
            caps.iter()
                .skip(1)
                .map(|m| m.map(|m| m.as_str().to_owned()).unwrap_or_default())
                .collect(),
        )
    }
}

impl fmt::Debug for GlobPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GlobPattern({:?})", self.source)
    }
}

impl PartialEq for GlobPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for GlobPattern {}

/// Returns true if `s` matches the glob-like `pattern` in full.
#[must_use]
pub fn matches_glob_like(pattern: &str, s: &str) -> bool {
    GlobPattern::new(pattern).is_ok_and(|p| p.matches(s))
}
