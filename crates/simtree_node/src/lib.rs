//! Component tree, lifecycle phases, and notification bus for simtree.
//!
//! This crate provides:
//! - [`Forest`] - Arena of simulation nodes with parent/child structure
//! - [`NodeSpec`] and [`NodeRef`] - Node construction and read-only views
//! - [`NodeBehavior`] - Per-node hooks for the phase machine and the bus
//! - [`Handler`] and [`NotificationSource`] - Typed, categorized notifications
//!   propagated from a source up its ancestor chain to the global node
//! - [`Phase`] - Building, configuring, finalizing, finalized, teardown
//! - [`Clock`] - Clock domains and tick accounting
//! - [`metadata`] - Clock and location metadata files

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod behavior;
pub mod bus;
pub mod clock;
pub mod config;
pub mod extension;
pub mod forest;
pub mod global;
pub mod lifecycle;
pub mod lifetime;
pub mod lookup;
pub mod metadata;
pub mod node;
pub mod phase;
pub mod source;
mod store;
pub mod warn;

pub use behavior::NodeBehavior;
pub use bus::{
    CategoryMatcher, Handler, Notification, NotificationInfo, ObservationPoint, ObserverInfo, Origin,
    parse_category_list,
};
pub use clock::{Clock, ClockId};
pub use config::ForestConfig;
pub use extension::{Extension, ExtensionFactory, ParameterSet};
pub use forest::Forest;
pub use global::GLOBAL_LOCATION;
pub use lookup::{ChildMatch, PATH_SEPARATOR};
pub use metadata::{
    ClockFile, ClockRecord, LocationRecord, METADATA_VERSION, parse_clock_file, parse_location_file,
    write_clock_file, write_location_file,
};
pub use node::{NodeRef, NodeSpec};
pub use phase::Phase;
pub use source::{NotificationSource, SourceBehavior};
pub use warn::{TracingWarnings, WarningSink};
