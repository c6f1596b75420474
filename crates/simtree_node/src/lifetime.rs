//! Leak tracing of node construction and destruction.
//!
//! With the `lifetime-trace` feature, every construction appends
//! `<uid> <location>` to [`CONSTRUCTION_LOG`] and every destruction to
//! [`DESTRUCTION_LOG`], both in the working directory. Without it the hooks
//! compile to nothing.

use simtree_foundation::NodeUid;

/// File receiving one line per constructed node.
pub const CONSTRUCTION_LOG: &str = "simtree_constructed.txt";

/// File receiving one line per destroyed node.
pub const DESTRUCTION_LOG: &str = "simtree_destroyed.txt";

#[cfg(feature = "lifetime-trace")]
fn append(path: &str, uid: NodeUid, location: &str) {
    use std::io::Write;

    let result = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .and_then(|mut f| writeln!(f, "{} {location}", uid.get()));
    if let Err(e) = result {
        tracing::debug!(path, error = %e, "lifetime trace write failed");
    }
}

#[cfg(feature = "lifetime-trace")]
pub(crate) fn record_construction(uid: NodeUid, location: &str) {
    append(CONSTRUCTION_LOG, uid, location);
}

#[cfg(feature = "lifetime-trace")]
pub(crate) fn record_destruction(uid: NodeUid, location: &str) {
    append(DESTRUCTION_LOG, uid, location);
}

#[cfg(not(feature = "lifetime-trace"))]
pub(crate) fn record_construction(_uid: NodeUid, _location: &str) {}

#[cfg(not(feature = "lifetime-trace"))]
pub(crate) fn record_destruction(_uid: NodeUid, _location: &str) {}
