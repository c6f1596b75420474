//! Line formatters, selected by destination file extension.
//!
//! | extension      | line |
//! |----------------|------|
//! | `.log.basic`   | `<location> [<category>]: <content>` |
//! | `.log.verbose` | `{<tick> <cycle> <wall> tid:<tid> seq:<seq> <location> <category>} <content>` |
//! | `.log.raw`     | `<content>` |
//! | (default)      | `{<tick> <cycle> <location> <category>} <content>` |
//!
//! Embedded newlines are removed from content so that one message is always
//! one line.

use std::io::{self, Write};

use crate::config::SimulationInfo;
use crate::message::LogMessage;

/// Line layout of a destination.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Layout {
    /// Tick, cycle, origin, category, content.
    Default,
    /// Origin, category, content.
    Basic,
    /// Everything the message carries.
    Verbose,
    /// Content only.
    Raw,
}

/// One row of the formatter table.
#[derive(Copy, Clone, Debug)]
pub struct FormatterEntry {
    /// File name suffix; empty for the default row.
    pub extension: &'static str,
    /// Layout used for matching files.
    pub layout: Layout,
}

/// Formatter table, searched in order. The last row is the default and
/// matches every name.
pub const FORMATTERS: &[FormatterEntry] = &[
    FormatterEntry {
        extension: ".log.basic",
        layout: Layout::Basic,
    },
    FormatterEntry {
        extension: ".log.verbose",
        layout: Layout::Verbose,
    },
    FormatterEntry {
        extension: ".log.raw",
        layout: Layout::Raw,
    },
    FormatterEntry {
        extension: "",
        layout: Layout::Default,
    },
];

/// Layout for a destination file name.
#[must_use]
pub fn layout_for(name: &str) -> Layout {
    FORMATTERS
        .iter()
        .find(|e| name.ends_with(e.extension))
        .map_or(Layout::Default, |e| e.layout)
}

/// Per-line values that come from the tree rather than the message.
#[derive(Clone, Debug)]
pub struct LineContext<'a> {
    /// Location string of the message origin.
    pub location: &'a str,
    /// Cycle of the origin's clock at the message's tick.
    pub cycle: Option<u64>,
}

fn strip_newlines(content: &str) -> String {
    content.replace(['\n', '\r'], "")
}

fn cycle_field(cycle: Option<u64>) -> String {
    cycle.map_or_else(|| "-".repeat(8), |c| format!("{c:08}"))
}

impl Layout {
    /// Name used in headers.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Layout::Default => "default",
            Layout::Basic => "basic",
            Layout::Verbose => "verbose",
            Layout::Raw => "raw",
        }
    }

    /// Renders one message without the trailing newline.
    #[must_use]
    pub fn render(self, message: &LogMessage, ctx: &LineContext<'_>) -> String {
        let content = strip_newlines(&message.content);
        match self {
            Layout::Default => format!(
                "{{{:012} {} {} {}}} {content}",
                message.sim_time,
                cycle_field(ctx.cycle),
                ctx.location,
                message.category
            ),
            Layout::Basic => format!("{} [{}]: {content}", ctx.location, message.category),
            Layout::Verbose => format!(
                "{{{:012} {} {:.6} tid:{} seq:{} {} {}}} {content}",
                message.sim_time,
                cycle_field(ctx.cycle),
                message.wall_time,
                message.thread_id,
                message.sequence,
                ctx.location,
                message.category
            ),
            Layout::Raw => content,
        }
    }

    /// Writes one message as a line.
    ///
    /// # Errors
    ///
    /// Returns I/O errors from `out`.
    pub fn write_line(self, out: &mut dyn Write, message: &LogMessage, ctx: &LineContext<'_>) -> io::Result<()> {
        writeln!(out, "{}", self.render(message, ctx))
    }

    /// Writes the `#` header block of a file destination.
    ///
    /// # Errors
    ///
    /// Returns I/O errors from `out`.
    pub fn write_header(self, out: &mut dyn Write, info: &SimulationInfo) -> io::Result<()> {
        for line in info.header_lines() {
            writeln!(out, "# {}", strip_newlines(&line))?;
        }
        match self {
            Layout::Default => writeln!(out, "# {{<tick> <cycle> <location> <category>}} <content>"),
            Layout::Basic => writeln!(out, "# <location> [<category>]: <content>"),
            Layout::Verbose => writeln!(
                out,
                "# {{<tick> <cycle> <wall> tid:<thread> seq:<sequence> <location> <category>}} <content>"
            ),
            Layout::Raw => writeln!(out, "# <content>"),
        }
    }
}
