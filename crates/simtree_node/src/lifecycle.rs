//! Phase transitions.
//!
//! Transitions are started on a tree root and recurse over the whole subtree
//! in construction order. Skipped intermediate phases are entered
//! implicitly, so `finalize_tree` on a BUILDING tree configures and
//! finalizes it first.

use std::collections::HashSet;
use std::io;

use simtree_foundation::{Error, NodeId, Result};

use crate::forest::Forest;
use crate::phase::Phase;

impl Forest {
    /// Phase of a node.
    ///
    /// # Errors
    ///
    /// Returns `Expired` for a stale handle.
    pub fn phase(&self, id: NodeId) -> Result<Phase> {
        Ok(self.nodes.get(id)?.phase)
    }

    fn require_tree_root(&self, root: NodeId, operation: &str) -> Result<Phase> {
        let data = self.nodes.get(root)?;
        if data.attached_parent().is_some() {
            return Err(Error::invalid_structure(format!(
                "{operation} must start at a tree root, not {}",
                self.location(root)?
            )));
        }
        Ok(data.phase)
    }

    fn require_before(&self, root: NodeId, target: Phase) -> Result<Phase> {
        let operation = format!("enter {target}");
        let phase = self.require_tree_root(root, &operation)?;
        if phase >= target {
            return Err(Error::phase(operation, phase.as_str()).at(self.location(root)?));
        }
        Ok(phase)
    }

    fn advance_subtree(&mut self, root: NodeId, target: Phase) -> Result<Vec<NodeId>> {
        let nodes = self.subtree_preorder(root)?;
        for &id in &nodes {
            let data = self.nodes.get_mut(id)?;
            if data.phase < target {
                data.phase = target;
            }
        }
        tracing::debug!(?root, phase = %target, nodes = nodes.len(), "entered phase");
        Ok(nodes)
    }

    fn located(&self, id: NodeId, err: Error) -> Error {
        match self.location(id) {
            Ok(location) => err.at(location),
            Err(_) => err,
        }
    }

    /// Enters CONFIGURING and runs every node's configuring hook.
    ///
    /// # Errors
    ///
    /// Returns `PhaseError` if the tree is already configuring or later, or
    /// the first hook error.
    pub fn enter_configuring(&mut self, root: NodeId) -> Result<()> {
        self.require_before(root, Phase::Configuring)?;
        for id in self.advance_subtree(root, Phase::Configuring)? {
            self.with_behavior(id, |b, f| b.on_configuring(f, id))?
                .transpose()
                .map_err(|e| self.located(id, e))?;
        }
        Ok(())
    }

    /// Enters FINALIZING and caches every node's working clock.
    ///
    /// # Errors
    ///
    /// Returns `PhaseError` if the tree is already finalizing or later.
    pub fn enter_finalizing(&mut self, root: NodeId) -> Result<()> {
        if self.require_before(root, Phase::Finalizing)? < Phase::Configuring {
            self.enter_configuring(root)?;
        }
        self.advance_subtree(root, Phase::Finalizing)?;
        self.cache_working_clocks(root)
    }

    /// Creates resources, validates extensions and nodes, then enters
    /// FINALIZED.
    ///
    /// Resource creation repeats until every node of the tree, including
    /// those created by other nodes' resource hooks, has run it once.
    ///
    /// # Errors
    ///
    /// Returns `FinalizationError` on any failed validation, leaving the tree
    /// in FINALIZING; `PhaseError` if already finalized.
    pub fn finalize_tree(&mut self, root: NodeId) -> Result<()> {
        if self.require_before(root, Phase::Finalized)? < Phase::Finalizing {
            self.enter_finalizing(root)?;
        }

        let mut done: HashSet<NodeId> = HashSet::new();
        loop {
            let pending: Vec<NodeId> = self
                .subtree_preorder(root)?
                .into_iter()
                .filter(|id| !done.contains(id))
                .collect();
            if pending.is_empty() {
                break;
            }
            for id in pending {
                done.insert(id);
                if !self.contains(id) {
                    continue;
                }
                self.with_behavior_mut(id, |b, f| b.create_resources(f, id))?
                    .transpose()
                    .map_err(|e| self.located(id, e))?;
            }
        }
        self.cache_working_clocks(root)?;

        let nodes = self.subtree_preorder(root)?;
        for &id in &nodes {
            self.validate_extensions(id)?;
        }
        for &id in &nodes {
            if let Some(behavior) = self.nodes.get(id)?.behavior.as_deref() {
                behavior
                    .validate_node(self, id)
                    .map_err(|e| Error::finalization(self.location(id).unwrap_or_default(), e.to_string()))?;
            }
        }
        self.advance_subtree(root, Phase::Finalized)?;
        Ok(())
    }

    /// Runs every node's post-run validation.
    ///
    /// # Errors
    ///
    /// Returns `PhaseError` unless the tree is FINALIZED, or the first
    /// validation error.
    pub fn validate_post_run(&self, root: NodeId) -> Result<()> {
        let phase = self.require_tree_root(root, "post-run validation")?;
        if phase != Phase::Finalized {
            return Err(Error::phase("validate post run", phase.as_str()).at(self.location(root)?));
        }
        for id in self.subtree_preorder(root)? {
            if let Some(behavior) = self.nodes.get(id)?.behavior.as_deref() {
                behavior
                    .validate_post_run(self, id)
                    .map_err(|e| self.located(id, e))?;
            }
        }
        Ok(())
    }

    /// Writes every node's debug content under a `<location>:` heading.
    ///
    /// A hook that fails has its error written inline and raised as a
    /// warning; the dump continues with the next node.
    ///
    /// # Errors
    ///
    /// Returns I/O errors of `out` itself.
    pub fn dump_debug_content(&self, root: NodeId, out: &mut dyn io::Write) -> io::Result<()> {
        let nodes = self.subtree_preorder(root).map_err(io::Error::other)?;
        for id in nodes {
            let Ok(data) = self.nodes.get(id) else { continue };
            let location = self.location(id).unwrap_or_default();
            writeln!(out, "{location}:")?;
            let Some(behavior) = data.behavior.as_deref() else {
                continue;
            };
            let mut buf = Vec::new();
            let result = behavior.dump_debug_content(self, id, &mut buf);
            out.write_all(&buf)?;
            if let Err(e) = result {
                writeln!(out, "  <error dumping debug content: {e}>")?;
                self.warn(id, &format!("debug dump of {location} failed: {e}"));
            }
        }
        Ok(())
    }

    /// Enters TEARDOWN and gives every node its last look at the tree.
    ///
    /// Calling it on a tree already in teardown does nothing. Hook errors are
    /// reported as warnings until the teardown budget is spent, then dropped.
    ///
    /// # Errors
    ///
    /// Returns `Expired` for a stale handle or `InvalidStructure` if `root`
    /// is attached to a parent.
    pub fn enter_teardown(&mut self, root: NodeId) -> Result<()> {
        if self.require_tree_root(root, "teardown")? == Phase::Teardown {
            return Ok(());
        }
        let nodes = self.subtree_preorder(root)?;
        let mut locations = Vec::new();
        for &id in &nodes {
            if !self.nodes.get(id)?.children.is_empty() {
                locations.push((id, self.location(id)?));
            }
        }
        for (id, location) in locations {
            self.nodes.get_mut(id)?.own_location = Some(location.into());
        }
        self.advance_subtree(root, Phase::Teardown)?;
        for id in nodes {
            if !self.contains(id) {
                continue;
            }
            let result = self.with_behavior(id, |b, f| b.on_teardown(f, id))?;
            if let Some(Err(e)) = result {
                self.report_teardown_error(id, &e);
            }
        }
        Ok(())
    }

    fn report_teardown_error(&mut self, id: NodeId, err: &Error) {
        if self.teardown_warnings >= self.config.teardown_warning_budget {
            return;
        }
        self.teardown_warnings += 1;
        let location = self.location(id).unwrap_or_default();
        self.warn(id, &format!("teardown of {location} failed: {err}"));
    }
}
