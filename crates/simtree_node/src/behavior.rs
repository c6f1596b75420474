//! Per-node behavior hooks.

use std::any::Any;
use std::io;

use simtree_foundation::{NodeId, Result};

use crate::bus::{NotificationInfo, ObserverInfo};
use crate::forest::Forest;

/// Hooks a node type supplies to the tree.
///
/// Every hook has a no-op default. While a hook runs, the node's own behavior
/// is checked out of the forest, so [`Forest::behavior`] on `me` returns
/// `None` from inside the hook. Observer (de)registrations that reach the
/// node in that window are delivered once the hook returns; other hooks
/// aimed at it are skipped with a warning.
pub trait NodeBehavior: Any {
    /// `me` is about to be attached to `parent`. Returning an error rejects
    /// the attachment before anything is committed.
    ///
    /// # Errors
    ///
    /// Any error rejects the attachment.
    fn on_parenting(&mut self, forest: &Forest, me: NodeId, parent: NodeId) -> Result<()> {
        let _ = (forest, me, parent);
        Ok(())
    }

    /// `child` is about to be attached to `me`.
    ///
    /// # Errors
    ///
    /// Any error rejects the attachment.
    fn on_adding_child(&mut self, forest: &Forest, me: NodeId, child: NodeId) -> Result<()> {
        let _ = (forest, me, child);
        Ok(())
    }

    /// An ancestor of `me` was just attached (directly or higher up).
    fn on_ancestor_appeared(&mut self, forest: &Forest, me: NodeId, ancestor: NodeId) {
        let _ = (forest, me, ancestor);
    }

    /// A subtree rooted at `subtree` was just attached below `me`.
    fn on_descendant_subtree_added(&mut self, forest: &Forest, me: NodeId, subtree: NodeId) {
        let _ = (forest, me, subtree);
    }

    /// The tree is entering CONFIGURING.
    ///
    /// # Errors
    ///
    /// Any error aborts the transition.
    fn on_configuring(&mut self, forest: &Forest, me: NodeId) -> Result<()> {
        let _ = (forest, me);
        Ok(())
    }

    /// Builds simulation resources while finalizing. May create children.
    ///
    /// # Errors
    ///
    /// Any error aborts finalization.
    fn create_resources(&mut self, forest: &mut Forest, me: NodeId) -> Result<()> {
        let _ = (forest, me);
        Ok(())
    }

    /// Checks the node once resources exist.
    ///
    /// # Errors
    ///
    /// Any error becomes a `FinalizationError`.
    fn validate_node(&self, forest: &Forest, me: NodeId) -> Result<()> {
        let _ = (forest, me);
        Ok(())
    }

    /// Checks the end state after a run.
    ///
    /// # Errors
    ///
    /// Any error marks the end state as invalid.
    fn validate_post_run(&self, forest: &Forest, me: NodeId) -> Result<()> {
        let _ = (forest, me);
        Ok(())
    }

    /// Writes unstructured diagnostics.
    ///
    /// # Errors
    ///
    /// I/O errors are caught by the caller and reported inline.
    fn dump_debug_content(&self, forest: &Forest, me: NodeId, out: &mut dyn io::Write) -> io::Result<()> {
        let _ = (forest, me, out);
        Ok(())
    }

    /// Last chance to reach the rest of the tree.
    ///
    /// # Errors
    ///
    /// Errors are degraded to warnings.
    fn on_teardown(&mut self, forest: &Forest, me: NodeId) -> Result<()> {
        let _ = (forest, me);
        Ok(())
    }

    /// Notifications this node can originate.
    fn generatable_notifications(&self) -> Vec<NotificationInfo> {
        Vec::new()
    }

    /// An observer that can hear this node was installed.
    fn notification_observer_registered(&mut self, info: &ObserverInfo) {
        let _ = info;
    }

    /// An observer that could hear this node was removed.
    fn notification_observer_deregistered(&mut self, info: &ObserverInfo) {
        let _ = info;
    }
}

impl Forest {
    /// Checks a node's behavior out, runs `f` with shared access to the
    /// forest, and checks it back in.
    pub(crate) fn with_behavior<R>(
        &mut self,
        id: NodeId,
        f: impl FnOnce(&mut dyn NodeBehavior, &Forest) -> R,
    ) -> Result<Option<R>> {
        let Some(mut behavior) = self.check_out_behavior(id)? else {
            return Ok(None);
        };
        let out = f(behavior.as_mut(), self);
        self.restore_behavior(id, behavior);
        Ok(Some(out))
    }

    /// Like [`Forest::with_behavior`] but with exclusive access to the forest.
    pub(crate) fn with_behavior_mut<R>(
        &mut self,
        id: NodeId,
        f: impl FnOnce(&mut dyn NodeBehavior, &mut Forest) -> R,
    ) -> Result<Option<R>> {
        let Some(mut behavior) = self.check_out_behavior(id)? else {
            return Ok(None);
        };
        let out = f(behavior.as_mut(), self);
        self.restore_behavior(id, behavior);
        Ok(Some(out))
    }

    fn check_out_behavior(&mut self, id: NodeId) -> Result<Option<Box<dyn NodeBehavior>>> {
        let data = self.nodes.get_mut(id)?;
        if data.behavior_busy {
            tracing::warn!(?id, "skipped re-entrant hook on a node whose behavior is running");
            return Ok(None);
        }
        let behavior = data.behavior.take();
        data.behavior_busy = behavior.is_some();
        Ok(behavior)
    }

    fn restore_behavior(&mut self, id: NodeId, mut behavior: Box<dyn NodeBehavior>) {
        match self.nodes.get_mut(id) {
            Ok(data) => {
                let produced = behavior.generatable_notifications();
                for (info, registered) in data.deferred_observer_events.drain(..) {
                    if !produced.iter().any(|p| info.concerns(p)) {
                        continue;
                    }
                    if registered {
                        behavior.notification_observer_registered(&info);
                    } else {
                        behavior.notification_observer_deregistered(&info);
                    }
                }
                data.behavior = Some(behavior);
                data.behavior_busy = false;
            }
            // A hook may destroy its own node during teardown
            Err(_) => tracing::debug!(?id, "dropped behavior of removed node"),
        }
    }

    /// Returns a node's behavior downcast to `B`.
    #[must_use]
    pub fn behavior<B: NodeBehavior>(&self, id: NodeId) -> Option<&B> {
        let behavior: &dyn Any = self.nodes.get(id).ok()?.behavior.as_deref()?;
        behavior.downcast_ref::<B>()
    }

    /// Returns a node's behavior downcast to `B`, mutably.
    #[must_use]
    pub fn behavior_mut<B: NodeBehavior>(&mut self, id: NodeId) -> Option<&mut B> {
        let behavior: &mut dyn Any = self.nodes.get_mut(id).ok()?.behavior.as_deref_mut()?;
        behavior.downcast_mut::<B>()
    }
}
