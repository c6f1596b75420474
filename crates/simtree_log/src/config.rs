//! Logging configuration and simulation-info headers.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Describes the run; written as `#` lines at the top of every log file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationInfo {
    /// Simulator name.
    pub name: String,
    /// Simulator version.
    pub version: String,
    /// Command line or other text that reproduces the run.
    pub reproduction: String,
    /// Extra free-form header lines.
    pub other: Vec<String>,
}

impl SimulationInfo {
    /// Creates info for a named simulator.
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            ..Self::default()
        }
    }

    /// Sets the reproduction line.
    #[must_use]
    pub fn with_reproduction(mut self, reproduction: impl Into<String>) -> Self {
        self.reproduction = reproduction.into();
        self
    }

    /// Appends a free-form header line.
    #[must_use]
    pub fn with_line(mut self, line: impl Into<String>) -> Self {
        self.other.push(line.into());
        self
    }

    /// Header lines without the leading `#`.
    #[must_use]
    pub fn header_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if !self.name.is_empty() || !self.version.is_empty() {
            lines.push(format!("Simulator: {} {}", self.name, self.version).trim_end().to_owned());
        }
        if !self.reproduction.is_empty() {
            lines.push(format!("Reproduction: {}", self.reproduction));
        }
        lines.extend(self.other.iter().cloned());
        lines
    }
}

/// Configuration applied by [`crate::install_with`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Tap global warnings to standard error.
    pub warnings_to_stderr: bool,
    /// Also tap global warnings to this file.
    pub warning_destination: Option<PathBuf>,
    /// Header written to file destinations.
    pub simulation_info: SimulationInfo,
}

impl LoggingConfig {
    /// Warnings go to standard error.
    #[must_use]
    pub fn interactive() -> Self {
        Self {
            warnings_to_stderr: true,
            ..Self::default()
        }
    }

    /// Sets whether warnings are tapped to standard error.
    #[must_use]
    pub fn with_warnings_to_stderr(mut self, enabled: bool) -> Self {
        self.warnings_to_stderr = enabled;
        self
    }

    /// Sets a file receiving every global warning.
    #[must_use]
    pub fn with_warning_destination(mut self, path: impl Into<PathBuf>) -> Self {
        self.warning_destination = Some(path.into());
        self
    }

    /// Sets the simulation-info header.
    #[must_use]
    pub fn with_simulation_info(mut self, info: SimulationInfo) -> Self {
        self.simulation_info = info;
        self
    }
}
