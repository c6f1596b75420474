//! Error types for the simtree system.
//!
//! Uses `thiserror` for ergonomic error definition with rich context.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::handle::NodeId;

/// Result type for simtree operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for simtree operations.
#[derive(Debug, Error)]
#[error("{kind}{}", context_suffix(.context))]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
    /// Optional context about where the error occurred.
    pub context: Option<ErrorContext>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    /// Adds context to this error.
    #[must_use]
    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Adds the location of the node involved.
    #[must_use]
    pub fn at(mut self, location: impl Into<String>) -> Self {
        let ctx = self.context.take().unwrap_or_default();
        self.context = Some(ctx.with_location(location));
        self
    }

    /// Creates a bad identifier error.
    #[must_use]
    pub fn bad_identifier(identifier: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadIdentifier {
            identifier: identifier.into(),
            reason: reason.into(),
        })
    }

    /// Creates an identifier collision error.
    #[must_use]
    pub fn collision(parent: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self::new(ErrorKind::Collision {
            parent: parent.into(),
            identifier: identifier.into(),
        })
    }

    /// Creates a phase violation error.
    #[must_use]
    pub fn phase(operation: impl Into<String>, phase: impl Into<String>) -> Self {
        Self::new(ErrorKind::PhaseError {
            operation: operation.into(),
            phase: phase.into(),
        })
    }

    /// Creates a not found error.
    #[must_use]
    pub fn not_found(path: impl Into<String>, from: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound {
            path: path.into(),
            from: from.into(),
        })
    }

    /// Creates an error for a registration no producer can satisfy.
    #[must_use]
    pub fn no_such_source(payload: &'static str, category: impl Into<String>) -> Self {
        Self::new(ErrorKind::NoSuchSource {
            payload,
            category: category.into(),
        })
    }

    /// Creates a duplicate registration error.
    #[must_use]
    pub fn double_register(payload: &'static str, category: impl Into<String>) -> Self {
        Self::new(ErrorKind::DoubleRegister {
            payload,
            category: category.into(),
        })
    }

    /// Creates an error for deregistering an unknown observer.
    #[must_use]
    pub fn not_registered(payload: &'static str, category: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotRegistered {
            payload,
            category: category.into(),
        })
    }

    /// Creates a destination open or write error.
    #[must_use]
    pub fn destination_open(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::new(ErrorKind::DestinationOpen {
            path: path.into(),
            source,
        })
    }

    /// Creates a finalization error.
    #[must_use]
    pub fn finalization(location: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(ErrorKind::FinalizationError {
            location: location.into(),
            reason: reason.into(),
        })
    }

    /// Creates an invalid structure error.
    #[must_use]
    pub fn invalid_structure(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidStructure(message.into()))
    }

    /// Creates an error for a handle whose node is gone.
    #[must_use]
    pub fn expired(id: NodeId) -> Self {
        Self::new(ErrorKind::Expired(id))
    }

    /// Creates an error for a malformed line of a metadata file.
    #[must_use]
    pub fn malformed(file: &'static str, line: usize, reason: impl Into<String>) -> Self {
        Self::new(ErrorKind::Malformed {
            file,
            line,
            reason: reason.into(),
        })
    }

    /// Creates an error for a failed encode or decode.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Serialization(message.into()))
    }

    /// Creates an internal error for recoverable framework faults.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal(message.into()))
    }

    /// Returns true if this is a [`ErrorKind::NotFound`] error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self.kind, ErrorKind::NotFound { .. })
    }

    /// Returns true if this is a [`ErrorKind::PhaseError`] error.
    #[must_use]
    pub fn is_phase_error(&self) -> bool {
        matches!(self.kind, ErrorKind::PhaseError { .. })
    }

    /// Returns true if this is a [`ErrorKind::Expired`] error.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        matches!(self.kind, ErrorKind::Expired(_))
    }
}

fn context_suffix(context: &Option<ErrorContext>) -> String {
    context.as_ref().map(|c| format!(" {c}")).unwrap_or_default()
}

/// Categorized error kinds for pattern matching.
#[derive(Debug, Error)]
pub enum ErrorKind {
    /// A name, group, alias or tag violates the identifier rules.
    #[error("bad identifier {identifier:?}: {reason}")]
    BadIdentifier {
        /// The offending identifier.
        identifier: String,
        /// Which rule it broke.
        reason: String,
    },

    /// A child identifier is already taken at the parent.
    #[error("identifier {identifier:?} already used by a child of {parent}")]
    Collision {
        /// Location of the parent.
        parent: String,
        /// The colliding identifier.
        identifier: String,
    },

    /// Operation attempted in the wrong lifecycle phase.
    #[error("cannot {operation} during phase {phase}")]
    PhaseError {
        /// The rejected operation.
        operation: String,
        /// The phase the node was in.
        phase: String,
    },

    /// A child by name or path does not exist, or is hidden by scope.
    #[error("no child {path:?} found from {from}")]
    NotFound {
        /// The requested path.
        path: String,
        /// Location the lookup started from.
        from: String,
    },

    /// No node under the observation point can produce the notification.
    #[error("no source of {payload} notifications matching category {category:?}")]
    NoSuchSource {
        /// Payload type name.
        payload: &'static str,
        /// Requested category.
        category: String,
    },

    /// The exact same observer is already registered.
    #[error("observer for {payload} notifications with category {category:?} already registered")]
    DoubleRegister {
        /// Payload type name.
        payload: &'static str,
        /// Requested category.
        category: String,
    },

    /// The observer to remove was never registered.
    #[error("no observer for {payload} notifications with category {category:?} is registered")]
    NotRegistered {
        /// Payload type name.
        payload: &'static str,
        /// Requested category.
        category: String,
    },

    /// A log destination could not be opened or written.
    #[error("log destination {path:?} failed: {source}")]
    DestinationOpen {
        /// Path of the destination.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Parameter or extension validation failed while finalizing.
    #[error("finalization failed at {location}: {reason}")]
    FinalizationError {
        /// Location of the failing node.
        location: String,
        /// Validation message.
        reason: String,
    },

    /// The requested tree edit would break the tree shape.
    #[error("invalid tree structure: {0}")]
    InvalidStructure(String),

    /// Node handle refers to a destroyed or relocated node.
    #[error("expired node handle: {0:?}")]
    Expired(NodeId),

    /// A clock or location metadata file could not be parsed.
    #[error("malformed {file} file, line {line}: {reason}")]
    Malformed {
        /// Which kind of file.
        file: &'static str,
        /// One-based line number.
        line: usize,
        /// What was wrong.
        reason: String,
    },

    /// Binary encoding or decoding failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Recoverable internal fault.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Context about where an error occurred.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// Location of the node involved.
    pub location: Option<String>,
    /// Stack of operations that led here, outermost first.
    pub stack: Vec<String>,
}

impl ErrorContext {
    /// Creates a new empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the node location.
    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Adds a stack frame.
    #[must_use]
    pub fn with_frame(mut self, frame: impl Into<String>) -> Self {
        self.stack.push(frame.into());
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(location) = &self.location {
            write!(f, "(at {location})")?;
        }
        for frame in &self.stack {
            write!(f, "\n  in {frame}")?;
        }
        Ok(())
    }
}

/// Reports a broken invariant and terminates.
///
/// Post-commit failures are not recoverable; the message is logged and the
/// thread panics.
#[track_caller]
pub fn fatal_internal(message: &str) -> ! {
    tracing::error!(reason = message, "fatal internal error");
    panic!("fatal internal error: {message}");
}
