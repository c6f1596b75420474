//! Framework warning routing.

use crate::bus::Origin;
use crate::forest::Forest;

/// Receives framework warnings (destruction while attached, teardown errors,
/// debug-dump failures, upward pattern traversal from a parentless node).
pub trait WarningSink {
    /// Reports one warning raised on behalf of `origin`.
    fn warn(&self, forest: &Forest, origin: Origin, message: &str);
}

/// Default sink: forwards to `tracing::warn!`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingWarnings;

impl WarningSink for TracingWarnings {
    fn warn(&self, forest: &Forest, origin: Origin, message: &str) {
        let location = forest.origin_location(origin);
        tracing::warn!(%location, "{message}");
    }
}

impl Forest {
    /// Replaces the warning sink, returning the previous one.
    pub fn set_warning_sink(&mut self, sink: Box<dyn WarningSink>) -> Box<dyn WarningSink> {
        std::mem::replace(&mut self.warnings, sink)
    }

    /// Raises a framework warning.
    pub fn warn(&self, origin: impl Into<Origin>, message: &str) {
        self.warnings.warn(self, origin.into(), message);
    }
}
