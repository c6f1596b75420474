//! Pevents: named key/value events emitted through the log bus.
//!
//! A collector posts lines of the form
//!
//! ```text
//! ev="retire" uid="12" pc="0x4000" cyc=1031;
//! ```
//!
//! in category `<name>_pevent`, or `<name>_pevent_verbose` for verbose
//! collectors. A [`PeventController`] creates the taps that route them.

use std::fmt::{self, Write as _};

use simtree_foundation::{NodeId, Result};
use simtree_node::{Forest, ObservationPoint};

use crate::destination::DestinationSpec;
use crate::source::LogSource;
use crate::tap::Tap;

/// Category suffix of plain pevents.
pub const PEVENT_SUFFIX: &str = "_pevent";

/// Category suffix of verbose pevents.
pub const VERBOSE_PEVENT_SUFFIX: &str = "_pevent_verbose";

/// Category of an event.
#[must_use]
pub fn pevent_category(name: &str, verbose: bool) -> String {
    if verbose {
        format!("{name}{VERBOSE_PEVENT_SUFFIX}")
    } else {
        format!("{name}{PEVENT_SUFFIX}")
    }
}

/// How one value is written.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FormatFlags {
    /// Integers in hexadecimal with a `0x` prefix.
    pub hex: bool,
    /// Omit the surrounding quotes.
    pub unquoted: bool,
    /// Only written by verbose collectors.
    pub verbose_only: bool,
}

impl FormatFlags {
    /// Hexadecimal integers.
    #[must_use]
    pub fn hex() -> Self {
        Self {
            hex: true,
            ..Self::default()
        }
    }

    /// Only in verbose events.
    #[must_use]
    pub fn verbose_only() -> Self {
        Self {
            verbose_only: true,
            ..Self::default()
        }
    }
}

/// A produced value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PairValue {
    /// Unsigned integer.
    Unsigned(u64),
    /// Signed integer.
    Signed(i64),
    /// Boolean.
    Bool(bool),
    /// Free text.
    Text(String),
}

impl PairValue {
    fn write(&self, out: &mut String, flags: FormatFlags) -> fmt::Result {
        match self {
            PairValue::Unsigned(v) if flags.hex => write!(out, "{v:#x}"),
            PairValue::Signed(v) if flags.hex => write!(out, "{v:#x}"),
            PairValue::Unsigned(v) => write!(out, "{v}"),
            PairValue::Signed(v) => write!(out, "{v}"),
            PairValue::Bool(v) => write!(out, "{}", u8::from(*v)),
            PairValue::Text(v) => out.write_str(v),
        }
    }
}

impl From<u64> for PairValue {
    fn from(v: u64) -> Self {
        PairValue::Unsigned(v)
    }
}

impl From<u32> for PairValue {
    fn from(v: u32) -> Self {
        PairValue::Unsigned(u64::from(v))
    }
}

impl From<i64> for PairValue {
    fn from(v: i64) -> Self {
        PairValue::Signed(v)
    }
}

impl From<bool> for PairValue {
    fn from(v: bool) -> Self {
        PairValue::Bool(v)
    }
}

impl From<&str> for PairValue {
    fn from(v: &str) -> Self {
        PairValue::Text(v.to_owned())
    }
}

impl From<String> for PairValue {
    fn from(v: String) -> Self {
        PairValue::Text(v)
    }
}

type Producer<T> = Box<dyn Fn(&T) -> PairValue>;

/// Ordered `(key, producer, flags)` list describing the fields of an event
/// about a `T`.
pub struct PairDefinition<T> {
    pairs: Vec<(String, Producer<T>, FormatFlags)>,
}

impl<T> Default for PairDefinition<T> {
    fn default() -> Self {
        Self { pairs: Vec::new() }
    }
}

impl<T> PairDefinition<T> {
    /// Creates an empty definition.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a field with default formatting.
    #[must_use]
    pub fn pair<V: Into<PairValue>>(self, key: &str, producer: impl Fn(&T) -> V + 'static) -> Self {
        self.pair_with(key, producer, FormatFlags::default())
    }

    /// Appends a field.
    #[must_use]
    pub fn pair_with<V: Into<PairValue>>(
        mut self,
        key: &str,
        producer: impl Fn(&T) -> V + 'static,
        flags: FormatFlags,
    ) -> Self {
        self.pairs
            .push((key.to_owned(), Box::new(move |t| producer(t).into()), flags));
        self
    }

    /// Field keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.pairs.iter().map(|(k, _, _)| k.as_str())
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Returns true if there are no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl<T> fmt::Debug for PairDefinition<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.keys()).finish()
    }
}

/// Emits one pevent per collected value.
pub struct PeventCollector<T> {
    name: String,
    verbose: bool,
    skew: i64,
    pairs: PairDefinition<T>,
    source: LogSource,
}

impl<T> PeventCollector<T> {
    /// Creates a collector whose source node sits under `parent`.
    ///
    /// # Errors
    ///
    /// Returns `BadIdentifier` if the event category is not a valid node
    /// name, or `Collision` if `parent` already hosts that collector.
    pub fn new(forest: &mut Forest, parent: NodeId, name: &str, pairs: PairDefinition<T>, verbose: bool) -> Result<Self> {
        let category = pevent_category(name, verbose);
        let source = LogSource::new(forest, parent, &category, &format!("{name} pevent collector"))?;
        Ok(Self {
            name: name.to_owned(),
            verbose,
            skew: 0,
            pairs,
            source,
        })
    }

    /// Sets the cycle offset added to every event.
    #[must_use]
    pub fn with_skew(mut self, skew: i64) -> Self {
        self.skew = skew;
        self
    }

    /// Changes the cycle offset.
    pub fn set_skew(&mut self, skew: i64) {
        self.skew = skew;
    }

    /// Event name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Underlying log source.
    #[must_use]
    pub fn source(&self) -> &LogSource {
        &self.source
    }

    /// Returns true if some tap would receive events.
    #[must_use]
    pub fn is_collecting(&self, forest: &Forest) -> bool {
        self.source.is_observed(forest)
    }

    /// Renders the event for `value` at the current tick.
    #[must_use]
    pub fn render(&self, forest: &Forest, value: &T) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = self.render_into(&mut out, forest, value);
        out
    }

    fn render_into(&self, out: &mut String, forest: &Forest, value: &T) -> fmt::Result {
        write!(out, "ev=\"{}\"", self.name)?;
        for (key, producer, flags) in &self.pairs.pairs {
            if flags.verbose_only && !self.verbose {
                continue;
            }
            write!(out, " {key}=")?;
            if !flags.unquoted {
                out.push('"');
            }
            producer(value).write(out, *flags)?;
            if !flags.unquoted {
                out.push('"');
            }
        }
        let tick = forest.current_tick();
        let cycle = forest.cycle_of(self.source.origin(), tick).unwrap_or(tick);
        write!(out, " cyc={};", i128::from(cycle) + i128::from(self.skew))
    }

    /// Emits the event for `value` if anything is listening.
    pub fn collect(&self, forest: &Forest, value: &T) {
        if self.is_collecting(forest) {
            self.source.log(forest, self.render(forest, value));
        }
    }
}

impl<T> fmt::Debug for PeventCollector<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeventCollector")
            .field("name", &self.name)
            .field("verbose", &self.verbose)
            .field("skew", &self.skew)
            .field("pairs", &self.pairs)
            .finish_non_exhaustive()
    }
}

/// Owns the taps that route pevents to destinations.
#[derive(Debug, Default)]
pub struct PeventController {
    taps: Vec<Tap>,
}

impl PeventController {
    /// Creates a controller with no taps.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Taps every named event under `point` to `destination`. The name `all`
    /// selects every event.
    ///
    /// # Errors
    ///
    /// Returns destination or registration errors.
    pub fn add_tap(
        &mut self,
        forest: &mut Forest,
        point: impl Into<ObservationPoint>,
        event_names: &[&str],
        destination: &DestinationSpec,
        verbose: bool,
    ) -> Result<()> {
        let categories: Vec<String> = event_names
            .iter()
            .map(|name| {
                let name = if *name == "all" { "*" } else { name };
                pevent_category(name, verbose)
            })
            .collect();
        let tap = Tap::new(forest, point, &categories.join(","), destination)?;
        self.taps.push(tap);
        Ok(())
    }

    /// Taps created so far.
    #[must_use]
    pub fn taps(&self) -> &[Tap] {
        &self.taps
    }

    /// Events forwarded by every tap.
    #[must_use]
    pub fn num_recorded(&self) -> u64 {
        self.taps.iter().map(Tap::num_recorded).sum()
    }

    /// Detaches and drops every tap.
    ///
    /// # Errors
    ///
    /// Returns the first detach error; the remaining taps are still dropped.
    pub fn detach_all(&mut self, forest: &mut Forest) -> Result<()> {
        let mut first = Ok(());
        for mut tap in self.taps.drain(..) {
            let result = tap.detach(forest);
            if first.is_ok() {
                first = result;
            }
        }
        first
    }
}
