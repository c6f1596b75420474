//! Simtree - Hierarchical simulation component tree
//!
//! This crate re-exports all layers of the simtree system for convenient access.
//! For detailed documentation, see the individual layer crates.
//!
//! # Architecture
//!
//! ```text
//! Layer 2: simtree_log        - Log sources, taps, destinations, pevents
//! Layer 1: simtree_node       - Node tree, phases, clocks, notification bus
//! Layer 0: simtree_foundation - Interned strings, handles, identifiers, errors
//! ```

pub use simtree_foundation as foundation;
pub use simtree_log as logging;
pub use simtree_node as node;
