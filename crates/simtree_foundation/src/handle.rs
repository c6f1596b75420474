//! Node handles with generational indices, and process-wide unique identifiers.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::fatal_internal;

/// Handle to a slot of a forest's node store.
///
/// A slot's generation changes whenever its node is destroyed or relocated,
/// so a handle kept past that point no longer resolves and lookups report
/// `Expired`. Observers keep these instead of references to nodes that may
/// die first.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeId {
    /// Slot in the node store.
    pub index: u64,
    /// Generation of the slot when the handle was issued.
    pub generation: u32,
}

impl NodeId {
    /// Creates a handle to `index` at `generation`.
    #[must_use]
    pub const fn new(index: u64, generation: u32) -> Self {
        Self { index, generation }
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({}v{})", self.index, self.generation)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.index)
    }
}

/// Process-wide unique identifier assigned to every constructed node and clock.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeUid(pub u64);

impl NodeUid {
    /// Largest identifier that will ever be handed out.
    pub const MAX: u64 = u64::MAX - 1;

    /// Draws the next identifier from the process-wide counter.
    ///
    /// # Panics
    ///
    /// Exhausting the counter is a fatal internal error.
    #[must_use]
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        match NEXT.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
            if n > Self::MAX { None } else { n.checked_add(1) }
        }) {
            Ok(uid) => Self(uid),
            Err(_) => fatal_internal("node unique identifier counter exhausted"),
        }
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
