//! Standard log categories.

use simtree_foundation::{Istr, intern};

/// Framework warnings.
pub const WARNING: &str = "warning";

/// Debug chatter.
pub const DEBUG: &str = "debug";

/// Parameter dumps.
pub const PARAMETERS: &str = "parameters";

/// Every standard category, in the order global sources are created.
pub const STANDARD: [&str; 3] = [WARNING, DEBUG, PARAMETERS];

/// Interned [`WARNING`].
#[must_use]
pub fn warning() -> Istr {
    intern(WARNING)
}

/// Interned [`DEBUG`].
#[must_use]
pub fn debug() -> Istr {
    intern(DEBUG)
}

/// Interned [`PARAMETERS`].
#[must_use]
pub fn parameters() -> Istr {
    intern(PARAMETERS)
}
