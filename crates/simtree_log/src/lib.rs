//! Logging for simtree, built on the notification bus.
//!
//! This crate provides:
//! - [`LogSource`] - Category sources posting [`LogMessage`]s
//! - [`Tap`] - Observers relaying messages to a [`Destination`]
//! - [`DestinationManager`] - Process-wide deduplicating destinations
//! - [`format`] - Line layouts chosen by file extension
//! - [`TapDescriptor`] - Serializable taps materialized once the tree exists
//! - [`pevent`] - Structured key/value events
//!
//! [`install`] creates the global `warning`, `debug` and `parameters`
//! sources and routes framework warnings through `warning`.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod categories;
pub mod config;
pub mod descriptor;
pub mod destination;
pub mod format;
pub mod message;
pub mod pevent;
pub mod source;
pub mod tap;

use simtree_foundation::Result;
use simtree_node::{Forest, ObservationPoint, Origin, WarningSink};

pub use config::{LoggingConfig, SimulationInfo};
pub use descriptor::{TapDescriptor, decode_descriptors, encode_descriptors, unused_descriptors};
pub use destination::{Destination, DestinationManager, DestinationSpec, DestinationStats, SharedStream};
pub use format::{FORMATTERS, FormatterEntry, Layout, LineContext, layout_for};
pub use message::LogMessage;
pub use pevent::{FormatFlags, PairDefinition, PairValue, PeventCollector, PeventController};
pub use source::{LogSource, MessageBuilder};
pub use tap::Tap;

/// The three standard global sources.
#[derive(Clone, Debug)]
pub struct GlobalSources {
    /// Global `warning` source.
    pub warning: LogSource,
    /// Global `debug` source.
    pub debug: LogSource,
    /// Global `parameters` source.
    pub parameters: LogSource,
}

/// Handle returned by [`install`]; keeps the configured taps alive.
#[derive(Debug)]
pub struct Logging {
    sources: GlobalSources,
    taps: Vec<Tap>,
}

impl Logging {
    /// The standard global sources.
    #[must_use]
    pub fn sources(&self) -> &GlobalSources {
        &self.sources
    }

    /// Taps created from the configuration.
    #[must_use]
    pub fn taps(&self) -> &[Tap] {
        &self.taps
    }
}

struct LogWarnings {
    source: LogSource,
}

impl WarningSink for LogWarnings {
    fn warn(&self, forest: &Forest, origin: Origin, message: &str) {
        if !self.source.log_for(forest, origin, message) {
            let location = forest.origin_location(origin);
            tracing::warn!(%location, "{message}");
        }
    }
}

/// Installs logging with the default configuration.
///
/// # Errors
///
/// See [`install_with`].
pub fn install(forest: &mut Forest) -> Result<Logging> {
    install_with(forest, &LoggingConfig::default())
}

/// Creates the global sources, replaces the forest's warning sink, and taps
/// warnings to the configured destinations.
///
/// # Errors
///
/// Returns `DestinationOpen` if a configured warning file cannot be opened.
pub fn install_with(forest: &mut Forest, config: &LoggingConfig) -> Result<Logging> {
    DestinationManager::global().set_simulation_info(config.simulation_info.clone());
    let sources = GlobalSources {
        warning: LogSource::global(forest, categories::WARNING),
        debug: LogSource::global(forest, categories::DEBUG),
        parameters: LogSource::global(forest, categories::PARAMETERS),
    };
    forest.set_warning_sink(Box::new(LogWarnings {
        source: sources.warning.clone(),
    }));

    let mut taps = Vec::new();
    if config.warnings_to_stderr {
        taps.push(Tap::new(
            forest,
            ObservationPoint::Global,
            categories::WARNING,
            &DestinationSpec::Stderr,
        )?);
    }
    if let Some(path) = &config.warning_destination {
        taps.push(Tap::new(
            forest,
            ObservationPoint::Global,
            categories::WARNING,
            &DestinationSpec::Path(path.clone()),
        )?);
    }
    tracing::debug!(taps = taps.len(), "installed logging");
    Ok(Logging { sources, taps })
}
