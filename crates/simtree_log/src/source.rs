//! Log category sources and the message builders they hand out.

use std::fmt;

use simtree_foundation::{Istr, NodeId, Result, intern};
use simtree_node::{Forest, NodeSpec, NotificationInfo, NotificationSource, ObservationPoint, Origin};

use crate::message::{LogMessage, current_thread_id, next_sequence};

#[derive(Clone, Debug)]
enum Host {
    Node {
        source: NotificationSource<LogMessage>,
        attributed_to: NodeId,
    },
    Global,
}

/// Producer of log messages in one category.
///
/// A node source is a hidden builtin child of the node it reports for,
/// named after its category. A global source lives on the virtual global
/// node and can be used before any tree exists.
#[derive(Clone, Debug)]
pub struct LogSource {
    host: Host,
    category: Istr,
}

impl LogSource {
    /// Creates a source under `parent`. Messages are attributed to `parent`.
    ///
    /// # Errors
    ///
    /// Returns `BadIdentifier` if `category` is not a valid node name, or
    /// `Collision` if `parent` already has a child by that name.
    pub fn new(forest: &mut Forest, parent: NodeId, category: &str, description: &str) -> Result<Self> {
        let spec = NodeSpec::new(category, description).builtin();
        let source = NotificationSource::new(forest, Some(parent), spec, category)?;
        Ok(Self {
            category: source.category(),
            host: Host::Node {
                source,
                attributed_to: parent,
            },
        })
    }

    /// Creates a source hosted on the virtual global node.
    pub fn global(forest: &mut Forest, category: &str) -> Self {
        forest.register_global_source(NotificationInfo::of::<LogMessage>(category));
        Self {
            host: Host::Global,
            category: intern(category),
        }
    }

    /// Category of every message.
    #[must_use]
    pub fn category(&self) -> Istr {
        self.category
    }

    /// The source node, or `None` for a global source.
    #[must_use]
    pub fn node(&self) -> Option<NodeId> {
        match &self.host {
            Host::Node { source, .. } => Some(source.node()),
            Host::Global => None,
        }
    }

    /// Origin recorded in every message.
    #[must_use]
    pub fn origin(&self) -> Origin {
        match &self.host {
            Host::Node { attributed_to, .. } => Origin::Node(*attributed_to),
            Host::Global => Origin::Global,
        }
    }

    fn post_origin(&self) -> Origin {
        match &self.host {
            Host::Node { source, .. } => Origin::Node(source.node()),
            Host::Global => Origin::Global,
        }
    }

    /// Returns true if some tap or observer would receive a message.
    #[must_use]
    pub fn is_observed(&self, forest: &Forest) -> bool {
        match &self.host {
            Host::Node { source, .. } => source.is_observed(forest),
            Host::Global => forest.has_observers_for::<LogMessage>(Origin::Global, self.category),
        }
    }

    /// Points at which live taps or observers of this source are installed.
    #[must_use]
    pub fn observation_points(&self, forest: &Forest) -> Vec<ObservationPoint> {
        match &self.host {
            Host::Node { source, .. } => source.observation_points(forest),
            Host::Global if self.is_observed(forest) => vec![ObservationPoint::Global],
            Host::Global => Vec::new(),
        }
    }

    /// Starts a message. It is posted when the builder is dropped.
    ///
    /// ```ignore
    /// use std::fmt::Write;
    /// write!(source.emit(&forest), "cache miss at {addr:#x}")?;
    /// ```
    #[must_use]
    pub fn emit<'a>(&'a self, forest: &'a Forest) -> MessageBuilder<'a> {
        MessageBuilder {
            observed: self.is_observed(forest),
            source: self,
            forest,
            content: String::new(),
            origin: None,
            cancelled: false,
        }
    }

    /// Posts `content` as one message.
    pub fn log(&self, forest: &Forest, content: impl fmt::Display) {
        let mut builder = self.emit(forest);
        if builder.observed {
            builder.content = content.to_string();
        }
    }

    /// Posts `content` attributed to `origin` instead of this source's
    /// attribution. Returns false if nothing was listening.
    pub fn log_for(&self, forest: &Forest, origin: Origin, content: &str) -> bool {
        let mut builder = self.emit(forest);
        if !builder.observed {
            return false;
        }
        builder.origin = Some(origin);
        builder.content = content.to_owned();
        true
    }
}

/// Accumulates one message and posts it on drop.
pub struct MessageBuilder<'a> {
    source: &'a LogSource,
    forest: &'a Forest,
    content: String,
    origin: Option<Origin>,
    observed: bool,
    cancelled: bool,
}

impl MessageBuilder<'_> {
    /// Suppresses the post.
    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    /// Text accumulated so far.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Returns false if nothing would receive the message; content written
    /// to such a builder is discarded.
    #[must_use]
    pub fn is_observed(&self) -> bool {
        self.observed
    }
}

impl fmt::Write for MessageBuilder<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        if self.observed {
            self.content.push_str(s);
        }
        Ok(())
    }
}

impl Drop for MessageBuilder<'_> {
    fn drop(&mut self) {
        if self.cancelled || !self.observed {
            return;
        }
        let message = LogMessage {
            origin: self.origin.unwrap_or_else(|| self.source.origin()),
            wall_time: self.forest.wall_time(),
            sim_time: self.forest.current_tick(),
            category: self.source.category,
            thread_id: current_thread_id(),
            sequence: next_sequence(),
            content: std::mem::take(&mut self.content),
        };
        self.forest
            .post(self.source.post_origin(), self.source.category, &message);
    }
}

impl fmt::Debug for MessageBuilder<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageBuilder")
            .field("category", &self.source.category)
            .field("content", &self.content)
            .field("observed", &self.observed)
            .field("cancelled", &self.cancelled)
            .finish_non_exhaustive()
    }
}
