//! Lifecycle phases shared by every node of a tree.

use std::fmt;

/// Lifecycle phase of a node.
///
/// Phases only move forward. Transitions start at a tree root and recurse in
/// construction order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Phase {
    /// Structure may be freely built.
    Building,
    /// Parameters are being applied; structure may still change.
    Configuring,
    /// Clocks are fixed and cached; resources are being created.
    Finalizing,
    /// Shape is frozen.
    Finalized,
    /// Nodes are being torn down.
    Teardown,
}

impl Phase {
    /// All phases in order.
    pub const ALL: [Phase; 5] = [
        Phase::Building,
        Phase::Configuring,
        Phase::Finalizing,
        Phase::Finalized,
        Phase::Teardown,
    ];

    /// Upper-case name used in diagnostics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Phase::Building => "BUILDING",
            Phase::Configuring => "CONFIGURING",
            Phase::Finalizing => "FINALIZING",
            Phase::Finalized => "FINALIZED",
            Phase::Teardown => "TEARDOWN",
        }
    }

    /// Returns true once the tree shape is frozen.
    #[must_use]
    pub fn is_finalized(self) -> bool {
        self >= Phase::Finalized
    }

    /// Returns true once clocks may no longer be reassigned.
    #[must_use]
    pub fn clocks_fixed(self) -> bool {
        self >= Phase::Finalizing
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
