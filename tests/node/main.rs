//! Integration tests for Layer 1: Node
//!
//! Tests for tree construction, lookup, privacy, the phase machine, the
//! notification bus, clocks, and metadata files.

mod addressing;
mod lifecycle;
mod metadata;
