//! Node records, construction specs, and read-only node views.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use simtree_foundation::ident::{self, group_identifier};
use simtree_foundation::{BUILTIN_GROUP, Error, Istr, NodeId, NodeUid, Result, intern};

use crate::behavior::NodeBehavior;
use crate::bus::{ObserverInfo, ObserverTable};
use crate::clock::ClockId;
use crate::extension::ExtensionSlot;
use crate::phase::Phase;

/// Description of a node to construct.
///
/// ```
/// use simtree_node::NodeSpec;
///
/// let spec = NodeSpec::new("core", "processor core").with_group("cores", 0);
/// assert_eq!(spec.name(), "core");
/// ```
pub struct NodeSpec {
    name: String,
    group: Option<String>,
    group_idx: Option<u32>,
    description: String,
    indexable_by_group: bool,
    hidden: bool,
    behavior: Option<Box<dyn NodeBehavior>>,
}

impl NodeSpec {
    /// Creates a spec for a named node.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            group: None,
            group_idx: None,
            description: description.into(),
            indexable_by_group: true,
            hidden: false,
            behavior: None,
        }
    }

    /// Creates a spec for an anonymous node addressed by `group` and `idx`.
    #[must_use]
    pub fn anonymous(group: impl Into<String>, idx: u32, description: impl Into<String>) -> Self {
        Self::new("", description).with_group(group, idx)
    }

    /// Places the node in a group at the given index.
    #[must_use]
    pub fn with_group(mut self, group: impl Into<String>, idx: u32) -> Self {
        self.group = Some(group.into());
        self.group_idx = Some(idx);
        self
    }

    /// Places the node in the reserved builtin group.
    #[must_use]
    pub fn builtin(mut self) -> Self {
        self.group = Some(BUILTIN_GROUP.to_owned());
        self.group_idx = None;
        self
    }

    /// Excludes the node from group+index uniqueness checks among siblings.
    #[must_use]
    pub fn not_indexable_by_group(mut self) -> Self {
        self.indexable_by_group = false;
        self
    }

    /// Hides the node from rendered trees and metadata dumps.
    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Attaches behavior hooks to the node.
    #[must_use]
    pub fn with_behavior(mut self, behavior: impl NodeBehavior) -> Self {
        self.behavior = Some(Box::new(behavior));
        self
    }

    /// Attaches already-boxed behavior hooks to the node.
    #[must_use]
    pub fn with_boxed_behavior(mut self, behavior: Box<dyn NodeBehavior>) -> Self {
        self.behavior = Some(behavior);
        self
    }

    /// Returns the requested name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for NodeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeSpec")
            .field("name", &self.name)
            .field("group", &self.group)
            .field("group_idx", &self.group_idx)
            .field("description", &self.description)
            .field("has_behavior", &self.behavior.is_some())
            .finish_non_exhaustive()
    }
}

/// Parent link of a node.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum ParentRef {
    /// Never attached, no parent anticipated.
    Unset,
    /// Constructed for this parent but not attached yet.
    Expected(NodeId),
    /// Attached to this parent.
    Attached(NodeId),
    /// The parent was destroyed; its last location is kept for stringizing.
    Remembered(Arc<str>),
}

/// Internal node record.
pub(crate) struct NodeData {
    pub uid: NodeUid,
    pub name: Istr,
    pub group: Option<Istr>,
    pub group_idx: Option<u32>,
    pub description: Istr,
    pub aliases: Vec<Istr>,
    pub tags: Vec<Istr>,
    pub parent: ParentRef,
    pub children: Vec<NodeId>,
    /// Identifier -> immediate child; `None` marks a group name.
    pub identifiers: HashMap<Istr, Option<NodeId>>,
    pub phase: Phase,
    pub clock: Option<ClockId>,
    pub working_clock: Option<Option<ClockId>>,
    pub observers: ObserverTable,
    pub extensions: Vec<(Istr, ExtensionSlot)>,
    pub privacy_level: u32,
    pub privacy_increment: u32,
    pub scope_root: bool,
    pub is_root: bool,
    pub builtin: bool,
    pub hidden: bool,
    pub indexable_by_group: bool,
    pub behavior: Option<Box<dyn NodeBehavior>>,
    /// Set while `behavior` is checked out for a hook.
    pub behavior_busy: bool,
    /// Observer (de)registrations that arrived while the behavior was busy.
    pub deferred_observer_events: Vec<(ObserverInfo, bool)>,
    pub own_location: Option<Arc<str>>,
}

impl NodeData {
    /// Validates a spec and builds the detached record.
    pub(crate) fn from_spec(spec: NodeSpec) -> Result<Self> {
        ident::validate_node_identity(&spec.name, spec.group.as_deref(), spec.group_idx)?;
        if spec.description.is_empty() {
            return Err(Error::bad_identifier(
                spec.name,
                "node descriptions must not be empty",
            ));
        }
        let group = spec.group.as_deref().map(intern);
        let builtin = spec.group.as_deref() == Some(BUILTIN_GROUP);
        Ok(Self {
            uid: NodeUid::next(),
            name: intern(&spec.name),
            group,
            group_idx: spec.group_idx,
            description: intern(&spec.description),
            aliases: Vec::new(),
            tags: Vec::new(),
            parent: ParentRef::Unset,
            children: Vec::new(),
            identifiers: HashMap::new(),
            phase: Phase::Building,
            clock: None,
            working_clock: None,
            observers: ObserverTable::default(),
            extensions: Vec::new(),
            privacy_level: 0,
            privacy_increment: 0,
            scope_root: false,
            is_root: false,
            builtin,
            hidden: spec.hidden || builtin,
            indexable_by_group: spec.indexable_by_group,
            behavior: spec.behavior,
            behavior_busy: false,
            deferred_observer_events: Vec::new(),
            own_location: None,
        })
    }

    /// Name if set, otherwise the `group[index]` form.
    pub(crate) fn display_name(&self) -> String {
        if !self.name.is_empty() {
            return self.name.as_str().to_owned();
        }
        match (self.group, self.group_idx) {
            (Some(g), Some(idx)) => format!("{g}[{idx}]"),
            _ => String::new(),
        }
    }

    /// Synthetic `group+index` identifier, if the node has a group index.
    pub(crate) fn group_identifier(&self) -> Option<Istr> {
        match (self.group, self.group_idx) {
            (Some(g), Some(idx)) => Some(intern(&group_identifier(g.as_str(), idx))),
            _ => None,
        }
    }

    /// Identifiers this node answers to at its parent, in match priority order.
    ///
    /// Nodes excluded from group indexing do not claim `group+index`.
    pub(crate) fn identifiers_at_parent(&self) -> Vec<Istr> {
        let mut ids = Vec::with_capacity(2 + self.aliases.len());
        if !self.name.is_empty() {
            ids.push(self.name);
        }
        ids.extend(self.aliases.iter().copied());
        if self.indexable_by_group {
            if let Some(gid) = self.group_identifier() {
                if gid != self.name {
                    ids.push(gid);
                }
            }
        }
        ids
    }

    pub(crate) fn attached_parent(&self) -> Option<NodeId> {
        match self.parent {
            ParentRef::Attached(p) => Some(p),
            _ => None,
        }
    }
}

/// Read-only view of one node.
#[derive(Clone, Copy)]
pub struct NodeRef<'a> {
    id: NodeId,
    data: &'a NodeData,
}

impl<'a> NodeRef<'a> {
    pub(crate) fn new(id: NodeId, data: &'a NodeData) -> Self {
        Self { id, data }
    }

    /// Handle of this node.
    #[must_use]
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Process-wide unique identifier.
    #[must_use]
    pub fn uid(&self) -> NodeUid {
        self.data.uid
    }

    /// Interned name; empty for anonymous nodes.
    #[must_use]
    pub fn name(&self) -> Istr {
        self.data.name
    }

    /// Name if set, otherwise `group[index]`.
    #[must_use]
    pub fn display_name(&self) -> String {
        self.data.display_name()
    }

    /// Group name, if any.
    #[must_use]
    pub fn group(&self) -> Option<Istr> {
        self.data.group
    }

    /// Group index, if any.
    #[must_use]
    pub fn group_index(&self) -> Option<u32> {
        self.data.group_idx
    }

    /// Description text.
    #[must_use]
    pub fn description(&self) -> Istr {
        self.data.description
    }

    /// Aliases in the order they were added.
    #[must_use]
    pub fn aliases(&self) -> &'a [Istr] {
        &self.data.aliases
    }

    /// Tags held by this node.
    #[must_use]
    pub fn tags(&self) -> &'a [Istr] {
        &self.data.tags
    }

    /// Returns true if the node carries `tag`.
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.data.tags.iter().any(|t| t.as_str() == tag)
    }

    /// Current lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.data.phase
    }

    /// Attached parent, if any.
    #[must_use]
    pub fn parent(&self) -> Option<NodeId> {
        self.data.attached_parent()
    }

    /// Returns true if attached to a parent.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.data.attached_parent().is_some()
    }

    /// Returns true if created as a tree root.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.data.is_root
    }

    /// Returns true if in the builtin group.
    #[must_use]
    pub fn is_builtin(&self) -> bool {
        self.data.builtin
    }

    /// Returns true if hidden from display.
    #[must_use]
    pub fn is_hidden(&self) -> bool {
        self.data.hidden
    }

    /// Returns true if flagged as a scope root.
    #[must_use]
    pub fn is_scope_root(&self) -> bool {
        self.data.scope_root
    }

    /// Returns true if group+index uniqueness applies to this node.
    #[must_use]
    pub fn is_indexable_by_group(&self) -> bool {
        self.data.indexable_by_group
    }

    /// Privacy level used by public navigation.
    #[must_use]
    pub fn privacy_level(&self) -> u32 {
        self.data.privacy_level
    }

    /// Number of children, including private ones.
    #[must_use]
    pub fn child_count(&self) -> usize {
        self.data.children.len()
    }

    /// Explicitly assigned clock.
    #[must_use]
    pub fn clock(&self) -> Option<ClockId> {
        self.data.clock
    }

    /// Returns true if any observer is installed on this node.
    #[must_use]
    pub fn has_observers(&self) -> bool {
        !self.data.observers.is_empty()
    }

    /// Names of declared extensions.
    #[must_use]
    pub fn declared_extensions(&self) -> Vec<Istr> {
        self.data.extensions.iter().map(|(n, _)| *n).collect()
    }

    /// Returns true if the named extension has been instantiated.
    #[must_use]
    pub fn is_extension_instantiated(&self, name: &str) -> bool {
        self.data
            .extensions
            .iter()
            .any(|(n, slot)| n.as_str() == name && slot.is_instantiated())
    }

    /// Returns the behavior hooks, if any are installed and not in use.
    #[must_use]
    pub fn behavior(&self) -> Option<&'a dyn NodeBehavior> {
        self.data.behavior.as_deref()
    }
}

impl fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRef")
            .field("id", &self.id)
            .field("uid", &self.data.uid)
            .field("name", &self.data.name)
            .field("phase", &self.data.phase)
            .finish_non_exhaustive()
    }
}
