//! Deduplicating log destinations and the manager that shares them.
//!
//! A destination is created the first time something refers to it and lives
//! for the rest of the process. Several taps on overlapping subtrees may
//! route one message to the same destination; each destination remembers the
//! highest sequence number written per thread and drops anything at or below
//! it.

use std::collections::HashMap;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use simtree_foundation::{Error, Result};
use simtree_node::Forest;

use crate::config::SimulationInfo;
use crate::format::{Layout, LineContext, layout_for};
use crate::message::LogMessage;

/// An already-open output stream shared with the caller.
pub type SharedStream = Arc<Mutex<dyn Write + Send>>;

/// What a destination writes to.
#[derive(Clone)]
pub enum DestinationSpec {
    /// Standard output.
    Stdout,
    /// Standard error.
    Stderr,
    /// A file, created or truncated on first use.
    Path(PathBuf),
    /// A caller-owned stream, identified by address.
    Stream(SharedStream),
}

impl DestinationSpec {
    /// Parses a destination argument: `1`/`stdout`, `2`/`stderr`, or a path.
    #[must_use]
    pub fn parse(arg: &str) -> Self {
        match arg {
            "1" | "stdout" => DestinationSpec::Stdout,
            "2" | "stderr" => DestinationSpec::Stderr,
            path => DestinationSpec::Path(PathBuf::from(path)),
        }
    }

    /// Returns true if both name the same destination.
    #[must_use]
    pub fn equivalent(&self, other: &DestinationSpec) -> bool {
        match (self, other) {
            (DestinationSpec::Stdout, DestinationSpec::Stdout)
            | (DestinationSpec::Stderr, DestinationSpec::Stderr) => true,
            (DestinationSpec::Path(a), DestinationSpec::Path(b)) => a == b,
            (DestinationSpec::Stream(a), DestinationSpec::Stream(b)) => {
                std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
            }
            _ => false,
        }
    }

    /// Human-readable name.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            DestinationSpec::Stdout => "stdout".to_owned(),
            DestinationSpec::Stderr => "stderr".to_owned(),
            DestinationSpec::Path(p) => p.display().to_string(),
            DestinationSpec::Stream(s) => format!("stream@{:p}", Arc::as_ptr(s)),
        }
    }

    fn layout(&self) -> Layout {
        match self {
            DestinationSpec::Path(p) => layout_for(&p.to_string_lossy()),
            _ => Layout::Default,
        }
    }
}

impl From<&str> for DestinationSpec {
    fn from(arg: &str) -> Self {
        Self::parse(arg)
    }
}

impl From<&Path> for DestinationSpec {
    fn from(path: &Path) -> Self {
        DestinationSpec::Path(path.to_path_buf())
    }
}

impl From<PathBuf> for DestinationSpec {
    fn from(path: PathBuf) -> Self {
        DestinationSpec::Path(path)
    }
}

impl fmt::Debug for DestinationSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DestinationSpec({})", self.label())
    }
}

enum Sink {
    Stdout,
    Stderr,
    File(BufWriter<File>),
    Stream(SharedStream),
}

impl Sink {
    fn with_writer<R>(&mut self, f: impl FnOnce(&mut dyn Write) -> io::Result<R>) -> io::Result<R> {
        match self {
            Sink::Stdout => f(&mut io::stdout().lock()),
            Sink::Stderr => f(&mut io::stderr().lock()),
            Sink::File(w) => f(w),
            Sink::Stream(s) => f(&mut *s.lock()),
        }
    }
}

struct DestinationState {
    sink: Sink,
    last_sequence: HashMap<u32, i64>,
}

/// Counters of one destination. Reads are advisory.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DestinationStats {
    /// Messages handed to the destination.
    pub received: u64,
    /// Lines written.
    pub written: u64,
    /// Messages dropped as already written.
    pub duplicates: u64,
    /// Lines that failed to write.
    pub write_errors: u64,
}

/// A sink for log messages.
pub struct Destination {
    spec: DestinationSpec,
    layout: Layout,
    state: Mutex<DestinationState>,
    received: AtomicU64,
    written: AtomicU64,
    duplicates: AtomicU64,
    write_errors: AtomicU64,
}

impl Destination {
    fn open(spec: DestinationSpec, info: &SimulationInfo) -> Result<Self> {
        let layout = spec.layout();
        let sink = match &spec {
            DestinationSpec::Stdout => Sink::Stdout,
            DestinationSpec::Stderr => Sink::Stderr,
            DestinationSpec::Stream(s) => Sink::Stream(Arc::clone(s)),
            DestinationSpec::Path(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .write(true)
                    .truncate(true)
                    .open(path)
                    .map_err(|e| Error::destination_open(path, e))?;
                let mut writer = BufWriter::new(file);
                layout
                    .write_header(&mut writer, info)
                    .and_then(|()| writer.flush())
                    .map_err(|e| Error::destination_open(path, e))?;
                Sink::File(writer)
            }
        };
        tracing::debug!(destination = %spec.label(), layout = layout.name(), "opened log destination");
        Ok(Self {
            spec,
            layout,
            state: Mutex::new(DestinationState {
                sink,
                last_sequence: HashMap::new(),
            }),
            received: AtomicU64::new(0),
            written: AtomicU64::new(0),
            duplicates: AtomicU64::new(0),
            write_errors: AtomicU64::new(0),
        })
    }

    /// What this destination writes to.
    #[must_use]
    pub fn spec(&self) -> &DestinationSpec {
        &self.spec
    }

    /// Layout of every line.
    #[must_use]
    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Snapshot of the counters.
    #[must_use]
    pub fn stats(&self) -> DestinationStats {
        DestinationStats {
            received: self.received.load(Ordering::Relaxed),
            written: self.written.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            write_errors: self.write_errors.load(Ordering::Relaxed),
        }
    }

    /// Messages handed to the destination so far.
    #[must_use]
    pub fn num_received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    /// Writes `message` unless a message with the same thread and an equal
    /// or later sequence number was already written.
    ///
    /// Returns true if a line was written.
    pub fn receive(&self, forest: &Forest, message: &LogMessage) -> bool {
        self.received.fetch_add(1, Ordering::Relaxed);
        let mut state = self.state.lock();
        if let Some(&last) = state.last_sequence.get(&message.thread_id) {
            if message.sequence <= last {
                self.duplicates.fetch_add(1, Ordering::Relaxed);
                return false;
            }
        }
        state.last_sequence.insert(message.thread_id, message.sequence);

        let location = forest.origin_location(message.origin);
        let ctx = LineContext {
            location: &location,
            cycle: forest.cycle_of(message.origin, message.sim_time),
        };
        let layout = self.layout;
        let result = state.sink.with_writer(|w| {
            layout.write_line(w, message, &ctx)?;
            w.flush()
        });
        match result {
            Ok(()) => {
                self.written.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(e) => {
                self.write_errors.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(destination = %self.spec.label(), error = %e, "log write failed");
                false
            }
        }
    }
}

impl fmt::Debug for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Destination")
            .field("spec", &self.spec)
            .field("layout", &self.layout)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

static GLOBAL: Lazy<DestinationManager> = Lazy::new(DestinationManager::new);

/// Registry of open destinations.
#[derive(Debug, Default)]
pub struct DestinationManager {
    destinations: Mutex<Vec<Arc<Destination>>>,
    info: Mutex<SimulationInfo>,
}

impl DestinationManager {
    /// Creates an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide manager.
    #[must_use]
    pub fn global() -> &'static DestinationManager {
        &GLOBAL
    }

    /// Sets the header written to files opened from now on.
    pub fn set_simulation_info(&self, info: SimulationInfo) {
        *self.info.lock() = info;
    }

    /// Returns the destination equivalent to `spec`, opening it if needed.
    ///
    /// # Errors
    ///
    /// Returns `DestinationOpen` if a file cannot be created or its header
    /// cannot be written.
    pub fn get(&self, spec: &DestinationSpec) -> Result<Arc<Destination>> {
        let mut list = self.destinations.lock();
        if let Some(existing) = list.iter().find(|d| d.spec.equivalent(spec)) {
            return Ok(Arc::clone(existing));
        }
        let info = self.info.lock().clone();
        let destination = Arc::new(Destination::open(spec.clone(), &info)?);
        list.push(Arc::clone(&destination));
        Ok(destination)
    }

    /// Returns the destination equivalent to `spec` if it is open.
    #[must_use]
    pub fn find(&self, spec: &DestinationSpec) -> Option<Arc<Destination>> {
        self.destinations
            .lock()
            .iter()
            .find(|d| d.spec.equivalent(spec))
            .cloned()
    }

    /// Every open destination, in opening order.
    #[must_use]
    pub fn destinations(&self) -> Vec<Arc<Destination>> {
        self.destinations.lock().clone()
    }

    /// Number of open destinations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.destinations.lock().len()
    }

    /// Returns true if nothing is open.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
