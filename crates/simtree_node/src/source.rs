//! Notification sources: nodes that produce one kind of notification.

use std::marker::PhantomData;

use simtree_foundation::{Istr, NodeId, Result, intern};

use crate::behavior::NodeBehavior;
use crate::bus::{NotificationInfo, ObservationPoint, ObserverInfo};
use crate::forest::Forest;
use crate::node::NodeSpec;

/// Behavior of a source node: advertises one notification and keeps the
/// list of observers that can hear it.
#[derive(Debug, Clone)]
pub struct SourceBehavior {
    info: NotificationInfo,
    observers: Vec<ObserverInfo>,
}

impl SourceBehavior {
    /// Creates a source advertising `info`.
    #[must_use]
    pub fn new(info: NotificationInfo) -> Self {
        Self {
            info,
            observers: Vec::new(),
        }
    }

    /// The advertised notification.
    #[must_use]
    pub fn info(&self) -> NotificationInfo {
        self.info
    }

    /// Observers currently able to hear this source. Observers whose owner
    /// was dropped are skipped even before the bus purges them.
    pub fn observers(&self) -> impl Iterator<Item = &ObserverInfo> {
        self.observers.iter().filter(|o| o.is_live())
    }

    /// Returns true if any live observer can hear this source.
    #[must_use]
    pub fn has_observers(&self) -> bool {
        self.observers().next().is_some()
    }
}

impl NodeBehavior for SourceBehavior {
    fn generatable_notifications(&self) -> Vec<NotificationInfo> {
        vec![self.info]
    }

    fn notification_observer_registered(&mut self, info: &ObserverInfo) {
        self.observers.push(info.clone());
    }

    fn notification_observer_deregistered(&mut self, info: &ObserverInfo) {
        if let Some(pos) = self.observers.iter().position(|o| o == info) {
            self.observers.remove(pos);
        }
    }
}

/// Handle to a node that posts payloads of type `T` under one category.
pub struct NotificationSource<T> {
    node: NodeId,
    category: Istr,
    _payload: PhantomData<fn(&T)>,
}

impl<T: 'static> NotificationSource<T> {
    /// Creates the source node, attached to `parent` if given.
    ///
    /// Any behavior on `spec` is replaced by [`SourceBehavior`].
    ///
    /// # Errors
    ///
    /// Returns construction or attachment errors.
    pub fn new(forest: &mut Forest, parent: Option<NodeId>, spec: NodeSpec, category: &str) -> Result<Self> {
        let info = NotificationInfo::of::<T>(category);
        let node = forest.create_node(parent, spec.with_behavior(SourceBehavior::new(info)))?;
        Ok(Self {
            node,
            category: intern(category),
            _payload: PhantomData,
        })
    }

    /// The source node.
    #[must_use]
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Category of every post.
    #[must_use]
    pub fn category(&self) -> Istr {
        self.category
    }

    /// Posts a payload.
    pub fn post(&self, forest: &Forest, payload: &T) {
        forest.post(self.node, self.category, payload);
    }

    /// Returns true if some observer can hear this source.
    #[must_use]
    pub fn is_observed(&self, forest: &Forest) -> bool {
        forest
            .behavior::<SourceBehavior>(self.node)
            .is_some_and(SourceBehavior::has_observers)
    }

    /// Points at which observers of this source are installed.
    #[must_use]
    pub fn observation_points(&self, forest: &Forest) -> Vec<ObservationPoint> {
        forest
            .behavior::<SourceBehavior>(self.node)
            .map(|b| b.observers().map(|o| o.point).collect())
            .unwrap_or_default()
    }
}

impl<T> Clone for NotificationSource<T> {
    fn clone(&self) -> Self {
        Self {
            node: self.node,
            category: self.category,
            _payload: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for NotificationSource<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationSource")
            .field("node", &self.node)
            .field("category", &self.category)
            .finish()
    }
}
