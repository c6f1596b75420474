//! Clock and location metadata files.
//!
//! Both are line-oriented text. The first line is the format version; lines
//! starting with `#` are comments.
//!
//! ```text
//! 1
//! 1000000000000
//! 7,core_clk,1000,1,1
//! ```

use std::io::{self, Write};

use simtree_foundation::{Error, NodeId, Result};

use crate::forest::Forest;

/// Metadata format version written on the first line.
pub const METADATA_VERSION: u32 = 1;

/// One clock line: `<uid>,<name>,<period>,<ratio-num>,<ratio-den>`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClockRecord {
    /// Clock unique identifier.
    pub uid: u64,
    /// Clock name.
    pub name: String,
    /// Period in ticks.
    pub period: u64,
    /// Ratio numerator.
    pub ratio_num: u32,
    /// Ratio denominator.
    pub ratio_den: u32,
}

/// Parsed clock file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClockFile {
    /// Format version.
    pub version: u32,
    /// Ticks per second.
    pub ticks_per_second: u64,
    /// Clock lines in file order.
    pub clocks: Vec<ClockRecord>,
}

/// One location line: `<uid>,<location>,<clock-uid-or--1>`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocationRecord {
    /// Node unique identifier.
    pub uid: u64,
    /// Fully qualified location in one of the node's forms.
    pub location: String,
    /// Uid of the node's working clock.
    pub clock_uid: Option<u64>,
}

/// Writes every clock of the forest.
///
/// # Errors
///
/// Returns I/O errors from `out`.
pub fn write_clock_file(forest: &Forest, out: &mut dyn Write) -> io::Result<()> {
    writeln!(out, "{METADATA_VERSION}")?;
    writeln!(out, "{}", forest.config().ticks_per_second)?;
    for clock in forest.clocks() {
        let (num, den) = clock.ratio();
        writeln!(
            out,
            "{},{},{},{num},{den}",
            clock.uid().get(),
            clock.name(),
            clock.period()
        )?;
    }
    Ok(())
}

/// Writes one line per form of every visible node under `root`: its name,
/// its `group[index]` form and each alias. Only the last component expands;
/// ancestors always use their display form.
///
/// # Errors
///
/// Returns I/O errors from `out`, or an error for a stale `root`.
pub fn write_location_file(forest: &Forest, root: NodeId, out: &mut dyn Write) -> io::Result<()> {
    writeln!(out, "{METADATA_VERSION}")?;
    for id in forest.subtree(root).map_err(io::Error::other)? {
        let node = forest.node(id).map_err(io::Error::other)?;
        if node.is_hidden() {
            continue;
        }
        let prefix = match node.parent() {
            Some(p) => format!("{}.", forest.location(p).map_err(io::Error::other)?),
            None => String::new(),
        };
        let clock = forest
            .working_clock(id)
            .map_err(io::Error::other)?
            .and_then(|c| forest.clock(c))
            .map_or(-1, |c| i128::from(c.uid().get()));

        let mut forms = Vec::new();
        if !node.name().is_empty() {
            forms.push(node.name().as_str().to_owned());
        }
        if let (Some(g), Some(idx)) = (node.group(), node.group_index()) {
            forms.push(format!("{g}[{idx}]"));
        }
        forms.extend(node.aliases().iter().map(|a| a.as_str().to_owned()));
        for form in forms {
            writeln!(out, "{},{prefix}{form},{clock}", node.uid().get())?;
        }
    }
    Ok(())
}

fn content_lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim_end()))
        .filter(|(_, l)| !l.is_empty() && !l.starts_with('#'))
}

fn field<T: std::str::FromStr>(file: &'static str, line: usize, raw: &str, what: &str) -> Result<T> {
    raw.parse()
        .map_err(|_| Error::malformed(file, line, format!("bad {what} {raw:?}")))
}

fn version(file: &'static str, lines: &mut dyn Iterator<Item = (usize, &str)>) -> Result<u32> {
    let (n, raw) = lines
        .next()
        .ok_or_else(|| Error::malformed(file, 1, "missing version line"))?;
    let version: u32 = field(file, n, raw, "version")?;
    if version != METADATA_VERSION {
        return Err(Error::malformed(file, n, format!("unsupported version {version}")));
    }
    Ok(version)
}

/// Parses a clock file.
///
/// # Errors
///
/// Returns `Malformed` naming the first bad line.
pub fn parse_clock_file(text: &str) -> Result<ClockFile> {
    const FILE: &str = "clock";
    let mut lines = content_lines(text);
    let version = version(FILE, &mut lines)?;
    let (n, raw) = lines
        .next()
        .ok_or_else(|| Error::malformed(FILE, 2, "missing tick frequency line"))?;
    let ticks_per_second = field(FILE, n, raw, "tick frequency")?;
    let mut clocks = Vec::new();
    for (n, line) in lines {
        let parts: Vec<&str> = line.split(',').collect();
        let [uid, name, period, num, den] = parts.as_slice() else {
            return Err(Error::malformed(FILE, n, "expected five fields"));
        };
        clocks.push(ClockRecord {
            uid: field(FILE, n, uid, "uid")?,
            name: (*name).to_owned(),
            period: field(FILE, n, period, "period")?,
            ratio_num: field(FILE, n, num, "ratio numerator")?,
            ratio_den: field(FILE, n, den, "ratio denominator")?,
        });
    }
    Ok(ClockFile {
        version,
        ticks_per_second,
        clocks,
    })
}

/// Parses a location file.
///
/// # Errors
///
/// Returns `Malformed` naming the first bad line.
pub fn parse_location_file(text: &str) -> Result<Vec<LocationRecord>> {
    const FILE: &str = "location";
    let mut lines = content_lines(text);
    version(FILE, &mut lines)?;
    let mut records = Vec::new();
    for (n, line) in lines {
        let parts: Vec<&str> = line.split(',').collect();
        let [uid, location, clock] = parts.as_slice() else {
            return Err(Error::malformed(FILE, n, "expected three fields"));
        };
        let clock: i64 = field(FILE, n, clock, "clock uid")?;
        records.push(LocationRecord {
            uid: field(FILE, n, uid, "uid")?,
            location: (*location).to_owned(),
            clock_uid: u64::try_from(clock).ok(),
        });
    }
    Ok(records)
}
