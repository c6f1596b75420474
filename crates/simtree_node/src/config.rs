//! Configuration for a forest.

/// Configuration for a [`Forest`](crate::Forest).
///
/// Controls warning budgets, time conversion and debug checks.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ForestConfig {
    /// Warnings emitted for nodes destroyed while attached outside teardown.
    pub destruction_warning_limit: u32,

    /// Teardown errors reported as warnings before the rest are dropped.
    pub teardown_warning_budget: u32,

    /// Simulated ticks per wall second, written to the clock metadata file.
    pub ticks_per_second: u64,

    /// Assert (debug builds) that every post comes from an advertising producer.
    pub check_generatable_on_post: bool,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            destruction_warning_limit: 10,
            teardown_warning_budget: 8,
            ticks_per_second: 1_000_000_000_000,
            check_generatable_on_post: true,
        }
    }
}

impl ForestConfig {
    /// Creates a configuration that reports every warning it can.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            destruction_warning_limit: u32::MAX,
            teardown_warning_budget: u32::MAX,
            ..Self::default()
        }
    }

    /// Builder method to set the destruction warning limit.
    #[must_use]
    pub fn with_destruction_warning_limit(mut self, limit: u32) -> Self {
        self.destruction_warning_limit = limit;
        self
    }

    /// Builder method to set the teardown warning budget.
    #[must_use]
    pub fn with_teardown_warning_budget(mut self, budget: u32) -> Self {
        self.teardown_warning_budget = budget;
        self
    }

    /// Builder method to set the tick frequency.
    #[must_use]
    pub fn with_ticks_per_second(mut self, ticks: u64) -> Self {
        self.ticks_per_second = ticks;
        self
    }

    /// Builder method to enable/disable the producer check on post.
    #[must_use]
    pub fn with_check_generatable_on_post(mut self, check: bool) -> Self {
        self.check_generatable_on_post = check;
        self
    }
}
