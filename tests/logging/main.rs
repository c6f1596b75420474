//! Integration tests for Layer 2: Logging
//!
//! Tests log sources, taps, destinations, tap descriptors, and pevents
//! against file destinations in temporary directories.

mod descriptors;
mod pevents;
mod routing;

use std::path::Path;

/// Lines of a log file that are not header comments.
pub fn data_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .filter(|l| !l.starts_with('#'))
        .map(str::to_owned)
        .collect()
}
