//! The virtual global node.
//!
//! A phantom parent of every parentless node in the forest. It has no parent
//! or children of its own; observers installed on it see posts from every
//! tree. Registrations on it are replayed to every parentless subtree, and to
//! every node created later. The only producers it hosts are framework
//! sources registered with [`Forest::register_global_source`].

use simtree_foundation::NodeId;

use crate::bus::{NotificationInfo, ObserverTable};
use crate::forest::Forest;

/// Location string of the virtual global node.
pub const GLOBAL_LOCATION: &str = "_global_";

#[derive(Debug, Default)]
pub(crate) struct GlobalNode {
    pub(crate) observers: ObserverTable,
    pub(crate) sources: Vec<NotificationInfo>,
}

impl Forest {
    /// Nodes with no attached parent: the virtual children of the global node.
    #[must_use]
    pub fn parentless_nodes(&self) -> &[NodeId] {
        &self.parentless
    }

    /// Advertises a framework source on the virtual global node.
    ///
    /// Posting with [`Origin::Global`](crate::Origin::Global) is only valid
    /// for advertised notifications.
    pub fn register_global_source(&mut self, info: NotificationInfo) {
        if !self.global.sources.contains(&info) {
            self.global.sources.push(info);
        }
    }

    /// Replays the global node's observers into a newly created node.
    pub(crate) fn replay_global_observers(&mut self, id: NodeId) {
        let infos = self.global.observers.live_infos();
        self.broadcast_observers(&[id], &infos, true);
    }
}
