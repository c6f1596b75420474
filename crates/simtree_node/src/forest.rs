//! The forest: every tree of a process, plus the state they share.
//!
//! A [`Forest`] owns all nodes, the parentless index, the tag index, the
//! virtual global node, the clocks and the simulated time. It is the explicit
//! context every operation goes through; there are no hidden singletons
//! besides the string interner.
//!
//! Structural edits take `&mut Forest`. Posting notifications takes `&Forest`,
//! so observers cannot reshape the tree while a post is in flight.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use simtree_foundation::{Error, Istr, NodeId, Result, fatal_internal, ident, intern};

use crate::bus::ObservationPoint;
use crate::clock::Clock;
use crate::config::ForestConfig;
use crate::global::GlobalNode;
use crate::lifetime;
use crate::node::{NodeData, NodeRef, NodeSpec, ParentRef};
use crate::phase::Phase;
use crate::store::NodeStore;
use crate::warn::{TracingWarnings, WarningSink};

/// All trees of a process and their shared state.
pub struct Forest {
    pub(crate) nodes: NodeStore,
    pub(crate) parentless: Vec<NodeId>,
    pub(crate) tags: HashMap<Istr, BTreeSet<NodeId>>,
    pub(crate) global: GlobalNode,
    /// Points holding at least one owner-tied delegate.
    pub(crate) owned_observer_points: HashSet<ObservationPoint>,
    pub(crate) clocks: Vec<Clock>,
    pub(crate) current_tick: u64,
    pub(crate) started: Instant,
    pub(crate) config: ForestConfig,
    pub(crate) warnings: Box<dyn WarningSink>,
    pub(crate) destruction_warnings: u32,
    pub(crate) teardown_warnings: u32,
}

impl Default for Forest {
    fn default() -> Self {
        Self::new()
    }
}

impl Forest {
    /// Creates an empty forest with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ForestConfig::default())
    }

    /// Creates an empty forest.
    #[must_use]
    pub fn with_config(config: ForestConfig) -> Self {
        Self {
            nodes: NodeStore::new(),
            parentless: Vec::new(),
            tags: HashMap::new(),
            global: GlobalNode::default(),
            owned_observer_points: HashSet::new(),
            clocks: Vec::new(),
            current_tick: 0,
            started: Instant::now(),
            config,
            warnings: Box::new(TracingWarnings),
            destruction_warnings: 0,
            teardown_warnings: 0,
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &ForestConfig {
        &self.config
    }

    /// Number of live nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the forest holds no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 0
    }

    /// Returns true if `id` refers to a live node.
    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.exists(id)
    }

    /// Returns a read-only view of a node.
    ///
    /// # Errors
    ///
    /// Returns `Expired` for a stale handle.
    pub fn node(&self, id: NodeId) -> Result<NodeRef<'_>> {
        Ok(NodeRef::new(id, self.nodes.get(id)?))
    }

    /// Iterates over every live node in slot order.
    pub fn iter(&self) -> impl Iterator<Item = NodeRef<'_>> + '_ {
        self.nodes.iter().map(|(id, data)| NodeRef::new(id, data))
    }

    // =========================================================================
    // Construction
    // =========================================================================

    /// Creates a tree root. Roots stringize without the detached `~` marker.
    ///
    /// # Errors
    ///
    /// Returns `BadIdentifier` for an invalid name or empty description.
    pub fn create_root(&mut self, name: &str, description: &str) -> Result<NodeId> {
        self.create_root_with(NodeSpec::new(name, description))
    }

    /// Creates a tree root from a full spec.
    ///
    /// # Errors
    ///
    /// Returns `BadIdentifier` for invalid identifiers.
    pub fn create_root_with(&mut self, spec: NodeSpec) -> Result<NodeId> {
        let mut data = NodeData::from_spec(spec)?;
        data.is_root = true;
        self.insert_node(data, None)
    }

    /// Creates a node, attaching it to `parent` if one is given.
    ///
    /// If attachment fails the node is discarded and the error returned.
    ///
    /// # Errors
    ///
    /// Returns `BadIdentifier` for invalid identifiers, or any error of
    /// [`Forest::add_child`].
    pub fn create_node(&mut self, parent: Option<NodeId>, spec: NodeSpec) -> Result<NodeId> {
        let mut data = NodeData::from_spec(spec)?;
        if let Some(p) = parent {
            self.nodes.validate(p)?;
            data.parent = ParentRef::Expected(p);
        }
        self.insert_node(data, parent)
    }

    fn insert_node(&mut self, data: NodeData, parent: Option<NodeId>) -> Result<NodeId> {
        let uid = data.uid;
        let id = self.nodes.insert(data);
        self.parentless.push(id);
        self.replay_global_observers(id);
        lifetime::record_construction(uid, &self.location_anticipated(id)?);
        if let Some(p) = parent {
            if let Err(err) = self.add_child(p, id) {
                let location = self.location_anticipated(id)?;
                self.parentless.retain(|&n| n != id);
                self.nodes.remove(id)?;
                lifetime::record_destruction(uid, &location);
                return Err(err);
            }
        }
        Ok(id)
    }

    // =========================================================================
    // Attachment
    // =========================================================================

    /// Attaches `child` to `parent`.
    ///
    /// Every rejection happens before anything changes. Once committed, a
    /// failure is a broken invariant and aborts.
    ///
    /// # Errors
    ///
    /// - `PhaseError` if the parent is finalized, or the child is in a later
    ///   phase than the parent
    /// - `InvalidStructure` for self-attachment, cycles, or an already
    ///   attached child
    /// - `Collision` if a sibling has the same group and index, or any of the
    ///   child's identifiers is taken at the parent
    /// - whatever either node's attachment hooks return
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.check_attach(parent, child)
            .map_err(|e| e.at(self.location(parent).unwrap_or_default()))?;
        self.with_behavior(child, |b, f| b.on_parenting(f, child, parent))?
            .transpose()?;
        self.with_behavior(parent, |b, f| b.on_adding_child(f, parent, child))?
            .transpose()?;
        self.commit_attach(parent, child);
        Ok(())
    }

    fn check_attach(&self, parent: NodeId, child: NodeId) -> Result<()> {
        let p = self.nodes.get(parent)?;
        let c = self.nodes.get(child)?;
        if p.phase.is_finalized() {
            return Err(Error::phase("add child", p.phase.as_str()));
        }
        if parent == child {
            return Err(Error::invalid_structure("a node cannot be its own child"));
        }
        if c.attached_parent().is_some() {
            return Err(Error::invalid_structure(format!(
                "{} is already attached",
                self.location(child)?
            )));
        }
        if self.is_descendant_of(parent, child)? {
            return Err(Error::invalid_structure(format!(
                "attaching {} would make it its own ancestor",
                self.location(child)?
            )));
        }
        if c.phase > p.phase {
            return Err(Error::phase(
                format!("attach a child in phase {}", c.phase),
                p.phase.as_str(),
            ));
        }
        let parent_loc = || self.location(parent).unwrap_or_default();
        if c.indexable_by_group {
            if let (Some(g), Some(idx)) = (c.group, c.group_idx) {
                for &sibling in &p.children {
                    let s = self.nodes.get(sibling)?;
                    if s.indexable_by_group && s.group == Some(g) && s.group_idx == Some(idx) {
                        return Err(Error::collision(parent_loc(), format!("{g}[{idx}]")));
                    }
                }
            }
        }
        for identifier in c.identifiers_at_parent() {
            if matches!(p.identifiers.get(&identifier), Some(Some(_))) {
                return Err(Error::collision(parent_loc(), identifier.as_str()));
            }
        }
        if let Some(g) = c.group {
            if !c.builtin && matches!(p.identifiers.get(&g), Some(Some(_))) {
                return Err(Error::collision(parent_loc(), g.as_str()));
            }
        }
        Ok(())
    }

    fn commit_attach(&mut self, parent: NodeId, child: NodeId) {
        let c = self.committed(child);
        let identifiers = c.identifiers_at_parent();
        let group = c.group.filter(|_| !c.builtin);

        let p = self.committed_mut(parent);
        p.children.push(child);
        for identifier in identifiers {
            p.identifiers.insert(identifier, Some(child));
        }
        if let Some(g) = group {
            p.identifiers.entry(g).or_insert(None);
        }
        let (parent_level, parent_phase) = (p.privacy_level, p.phase);

        self.committed_mut(child).parent = ParentRef::Attached(parent);
        let subtree = self
            .subtree_preorder(child)
            .unwrap_or_else(|e| fatal_internal(&format!("attached subtree unreadable: {e}")));
        self.propagate_privacy(child, parent_level);
        for &id in &subtree {
            let data = self.committed_mut(id);
            if data.phase < parent_phase {
                data.phase = parent_phase;
            }
        }
        self.parentless.retain(|&n| n != child);

        for &id in &subtree {
            self.run_hook(id, |b, f| b.on_ancestor_appeared(f, id, parent));
        }
        let mut cur = Some(parent);
        while let Some(ancestor) = cur {
            self.run_hook(ancestor, |b, f| b.on_descendant_subtree_added(f, ancestor, child));
            cur = self.committed(ancestor).attached_parent();
        }

        let infos = self.chain_observer_infos(parent);
        self.broadcast_observers(&[child], &infos, true);
        if parent_phase.clocks_fixed() {
            self.cache_working_clocks(child)
                .unwrap_or_else(|e| fatal_internal(&format!("clock cache failed: {e}")));
        }
        tracing::trace!(?parent, ?child, "attached node");
    }

    fn run_hook(&mut self, id: NodeId, f: impl FnOnce(&mut dyn crate::NodeBehavior, &Forest)) {
        if let Err(e) = self.with_behavior(id, f) {
            fatal_internal(&format!("hook target vanished after commit: {e}"));
        }
    }

    fn propagate_privacy(&mut self, root: NodeId, parent_level: u32) {
        let mut stack = vec![(root, parent_level)];
        while let Some((id, above)) = stack.pop() {
            let data = self.committed_mut(id);
            data.privacy_level = above + data.privacy_increment;
            let level = data.privacy_level;
            stack.extend(data.children.iter().rev().map(|&c| (c, level)));
        }
    }

    fn committed(&self, id: NodeId) -> &NodeData {
        self.nodes
            .get(id)
            .unwrap_or_else(|e| fatal_internal(&format!("node vanished after commit: {e}")))
    }

    fn committed_mut(&mut self, id: NodeId) -> &mut NodeData {
        self.nodes
            .get_mut(id)
            .unwrap_or_else(|e| fatal_internal(&format!("node vanished after commit: {e}")))
    }

    // =========================================================================
    // Identity edits
    // =========================================================================

    /// Adds an alias, registering it at the parent if attached.
    ///
    /// # Errors
    ///
    /// Returns `BadIdentifier`, `Collision` if the alias is taken by this node
    /// or at the parent, or `PhaseError` once finalized.
    pub fn add_alias(&mut self, id: NodeId, alias: &str) -> Result<()> {
        ident::validate_alias(alias)?;
        let alias = intern(alias);
        let data = self.nodes.get(id)?;
        if data.phase.is_finalized() {
            return Err(Error::phase("add alias", data.phase.as_str()).at(self.location(id)?));
        }
        if data.name == alias || data.aliases.contains(&alias) {
            return Err(Error::collision(self.location(id)?, alias.as_str()));
        }
        let parent = data.attached_parent();
        if let Some(p) = parent {
            if self.nodes.get(p)?.identifiers.contains_key(&alias) {
                return Err(Error::collision(self.location(p)?, alias.as_str()));
            }
            self.nodes.get_mut(p)?.identifiers.insert(alias, Some(id));
        }
        self.nodes.get_mut(id)?.aliases.push(alias);
        Ok(())
    }

    /// Tags a node and records it in the tag index. Re-adding is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `BadIdentifier` or `PhaseError` once finalized.
    pub fn add_tag(&mut self, id: NodeId, tag: &str) -> Result<()> {
        ident::validate_tag(tag)?;
        let tag = intern(tag);
        let data = self.nodes.get_mut(id)?;
        if data.phase.is_finalized() {
            let phase = data.phase;
            return Err(Error::phase("add tag", phase.as_str()).at(self.location(id)?));
        }
        if !data.tags.contains(&tag) {
            data.tags.push(tag);
            self.tags.entry(tag).or_default().insert(id);
        }
        Ok(())
    }

    /// Raises the privacy level of a subtree by one relative to its parent.
    ///
    /// # Errors
    ///
    /// Returns `PhaseError` once finalized.
    pub fn make_subtree_private(&mut self, id: NodeId) -> Result<()> {
        let data = self.nodes.get_mut(id)?;
        if data.phase.is_finalized() {
            let phase = data.phase;
            return Err(Error::phase("make subtree private", phase.as_str()).at(self.location(id)?));
        }
        data.privacy_increment += 1;
        let above = match data.attached_parent() {
            Some(p) => self.nodes.get(p)?.privacy_level,
            None => 0,
        };
        self.propagate_privacy(id, above);
        Ok(())
    }

    /// Flags a node as a scope root.
    ///
    /// # Errors
    ///
    /// Returns `Expired` for a stale handle.
    pub fn set_scope_root(&mut self, id: NodeId) -> Result<()> {
        self.nodes.get_mut(id)?.scope_root = true;
        Ok(())
    }

    // =========================================================================
    // Relocation and destruction
    // =========================================================================

    /// Moves a node into a fresh slot. Children, parent links, identifier
    /// maps and tags follow; the old handle becomes expired.
    ///
    /// # Errors
    ///
    /// Returns `PhaseError` once finalized, or `InvalidStructure` if any
    /// observer is installed on the node.
    pub fn relocate(&mut self, src: NodeId) -> Result<NodeId> {
        let data = self.nodes.get(src)?;
        if data.phase.is_finalized() {
            return Err(Error::phase("relocate", data.phase.as_str()).at(self.location(src)?));
        }
        if !data.observers.is_empty() {
            return Err(Error::invalid_structure(format!(
                "cannot relocate {} while observers are installed on it",
                self.location(src)?
            )));
        }
        let data = self.nodes.remove(src)?;
        let parent = data.attached_parent();
        let children = data.children.clone();
        let tags = data.tags.clone();
        let dst = self.nodes.insert(data);

        if let Some(p) = parent {
            let pd = self.committed_mut(p);
            for c in &mut pd.children {
                if *c == src {
                    *c = dst;
                }
            }
            for target in pd.identifiers.values_mut() {
                if *target == Some(src) {
                    *target = Some(dst);
                }
            }
        }
        for c in children {
            let cd = self.committed_mut(c);
            if cd.parent == ParentRef::Attached(src) {
                cd.parent = ParentRef::Attached(dst);
            }
        }
        for (_, d) in self.nodes.iter_mut() {
            if d.parent == ParentRef::Expected(src) {
                d.parent = ParentRef::Expected(dst);
            }
        }
        for n in &mut self.parentless {
            if *n == src {
                *n = dst;
            }
        }
        for tag in tags {
            if let Some(set) = self.tags.get_mut(&tag) {
                set.remove(&src);
                set.insert(dst);
            }
        }
        tracing::trace!(?src, ?dst, "relocated node");
        Ok(dst)
    }

    /// Destroys one node.
    ///
    /// Destroying an attached node outside teardown is allowed but warned
    /// about, up to the configured limit. Children become parentless and
    /// remember this node's location for stringizing.
    ///
    /// # Errors
    ///
    /// Returns `Expired` for a stale handle.
    pub fn destroy(&mut self, id: NodeId) -> Result<()> {
        let data = self.nodes.get(id)?;
        let parent = data.attached_parent();
        let uid = data.uid;
        let orphans = data.children.clone();
        let tags = data.tags.clone();
        let location: Arc<str> = match &data.own_location {
            Some(loc) => Arc::clone(loc),
            None => Arc::from(self.location(id)?),
        };
        if parent.is_some() && data.phase != Phase::Teardown {
            self.warn_destruction_while_attached(id, &location);
        }

        let infos = self.chain_observer_infos(id);
        self.broadcast_observers(&orphans, &infos, false);
        for &c in &orphans {
            if let Ok(cd) = self.nodes.get_mut(c) {
                cd.parent = ParentRef::Remembered(Arc::clone(&location));
                self.parentless.push(c);
            }
        }
        if let Some(p) = parent {
            self.detach_from_parent(p, id)?;
        }
        self.parentless.retain(|&n| n != id);
        for tag in tags {
            if let Some(set) = self.tags.get_mut(&tag) {
                set.remove(&id);
                if set.is_empty() {
                    self.tags.remove(&tag);
                }
            }
        }
        self.nodes.remove(id)?;
        lifetime::record_destruction(uid, &location);
        tracing::trace!(%location, "destroyed node");
        Ok(())
    }

    /// Destroys a node and everything below it, children first.
    ///
    /// Returns the number of nodes destroyed.
    ///
    /// # Errors
    ///
    /// Returns `Expired` for a stale handle.
    pub fn destroy_subtree(&mut self, root: NodeId) -> Result<usize> {
        let order = self.subtree_preorder(root)?;
        for &id in order.iter().rev() {
            self.destroy(id)?;
        }
        Ok(order.len())
    }

    fn detach_from_parent(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        let group = self.nodes.get(child)?.group;
        let pd = self.nodes.get_mut(parent)?;
        pd.children.retain(|&c| c != child);
        pd.identifiers.retain(|_, target| *target != Some(child));
        let siblings = pd.children.clone();
        if let Some(g) = group {
            let shared = siblings
                .iter()
                .any(|&s| self.nodes.get(s).is_ok_and(|sd| sd.group == Some(g)));
            let pd = self.nodes.get_mut(parent)?;
            if !shared && pd.identifiers.get(&g) == Some(&None) {
                pd.identifiers.remove(&g);
            }
        }
        Ok(())
    }

    fn warn_destruction_while_attached(&mut self, id: NodeId, location: &str) {
        let limit = self.config.destruction_warning_limit;
        if self.destruction_warnings >= limit {
            return;
        }
        self.destruction_warnings += 1;
        let mut message =
            format!("node {location} destroyed while attached and not in teardown");
        if self.destruction_warnings == limit {
            message.push_str("; further destruction warnings suppressed");
        }
        self.warn(id, &message);
    }

    // =========================================================================
    // Traversal helpers
    // =========================================================================

    /// Nodes of the subtree rooted at `root` in construction order, including
    /// private ones.
    ///
    /// # Errors
    ///
    /// Returns `Expired` for a stale handle.
    pub fn subtree(&self, root: NodeId) -> Result<Vec<NodeId>> {
        self.subtree_preorder(root)
    }

    pub(crate) fn subtree_preorder(&self, root: NodeId) -> Result<Vec<NodeId>> {
        self.nodes.validate(root)?;
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let data = self.nodes.get(id)?;
            out.push(id);
            stack.extend(data.children.iter().rev().copied());
        }
        Ok(out)
    }
}

impl fmt::Debug for Forest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Forest")
            .field("nodes", &self.nodes.len())
            .field("parentless", &self.parentless.len())
            .field("clocks", &self.clocks.len())
            .field("current_tick", &self.current_tick)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
