//! Typed, subtree-scoped notification bus.
//!
//! A notification is `<origin, payload type, category, payload>`. Posting walks
//! from the origin up through its attached ancestors, then visits the virtual
//! global node. At each stop, delegates keyed by the payload's `TypeId` whose
//! category matches fire in registration order.
//!
//! Registering at a node tells every producer in its subtree that can emit a
//! matching notification, through
//! [`NodeBehavior::notification_observer_registered`](crate::NodeBehavior::notification_observer_registered).
//! Producers use this to keep an O(1) "is anyone listening" answer.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use simtree_foundation::{
    Error, GlobPattern, Istr, NodeId, Result, has_wildcard_characters, intern,
    matches_glob_like,
};

use crate::forest::Forest;

// =============================================================================
// Origins and observation points
// =============================================================================

/// Where a notification was produced.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Origin {
    /// A node of some tree.
    Node(NodeId),
    /// A framework source hosted on the virtual global node.
    Global,
}

impl From<NodeId> for Origin {
    fn from(id: NodeId) -> Self {
        Origin::Node(id)
    }
}

/// Where an observer is installed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ObservationPoint {
    /// A node; sees posts from its subtree.
    Node(NodeId),
    /// The virtual global node; sees posts from every tree.
    Global,
}

impl From<NodeId> for ObservationPoint {
    fn from(id: NodeId) -> Self {
        ObservationPoint::Node(id)
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// A delivered notification, as seen by a full-signature handler.
pub struct Notification<'a, T> {
    /// Forest the notification travels through.
    pub forest: &'a Forest,
    /// Producer of the notification.
    pub origin: Origin,
    /// Point at which this handler is installed.
    pub point: ObservationPoint,
    /// Concrete category of the post.
    pub category: Istr,
    /// Payload value.
    pub payload: &'a T,
}

type FullFn<T> = Rc<dyn Fn(&Notification<'_, T>)>;
type PayloadFn<T> = Rc<dyn Fn(&T)>;

enum Callback<T> {
    Full(FullFn<T>),
    Payload(PayloadFn<T>),
}

impl<T> Clone for Callback<T> {
    fn clone(&self) -> Self {
        match self {
            Callback::Full(f) => Callback::Full(Rc::clone(f)),
            Callback::Payload(f) => Callback::Payload(Rc::clone(f)),
        }
    }
}

/// Callback bound to payload type `T`.
///
/// Identity is the address of the shared closure: clones of a handler are the
/// same observer, two handlers built from equal closures are not.
pub struct Handler<T> {
    callback: Callback<T>,
    owner: Option<Weak<dyn Any>>,
}

impl<T: 'static> Handler<T> {
    /// Wraps a callback that receives origin, observation point and category.
    #[must_use]
    pub fn new(f: impl Fn(&Notification<'_, T>) + 'static) -> Self {
        Self {
            callback: Callback::Full(Rc::new(f)),
            owner: None,
        }
    }

    /// Wraps a callback that only receives the payload.
    #[must_use]
    pub fn payload_only(f: impl Fn(&T) + 'static) -> Self {
        Self {
            callback: Callback::Payload(Rc::new(f)),
            owner: None,
        }
    }

    /// Ties the handler to an owner; once the owner is dropped the handler
    /// stops firing and is purged on the next mutating bus call.
    #[must_use]
    pub fn owned_by<O: Any>(mut self, owner: &Rc<O>) -> Self {
        let weak: Weak<O> = Rc::downgrade(owner);
        let weak: Weak<dyn Any> = weak;
        self.owner = Some(weak);
        self
    }

    fn identity(&self) -> usize {
        match &self.callback {
            Callback::Full(f) => Rc::as_ptr(f).cast::<()>() as usize,
            Callback::Payload(f) => Rc::as_ptr(f).cast::<()>() as usize,
        }
    }

    fn full_signature(&self) -> bool {
        matches!(self.callback, Callback::Full(_))
    }

    fn stub(&self) -> Stub {
        let callback = self.callback.clone();
        Rc::new(
            move |forest: &Forest,
                  origin: Origin,
                  point: ObservationPoint,
                  category: Istr,
                  payload: &dyn Any| {
                let Some(payload) = payload.downcast_ref::<T>() else {
                    return;
                };
                match &callback {
                    Callback::Full(f) => f(&Notification {
                        forest,
                        origin,
                        point,
                        category,
                        payload,
                    }),
                    Callback::Payload(f) => f(payload),
                }
            },
        )
    }
}

impl<T> Clone for Handler<T> {
    fn clone(&self) -> Self {
        Self {
            callback: self.callback.clone(),
            owner: self.owner.clone(),
        }
    }
}

impl<T> fmt::Debug for Handler<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("full_signature", &matches!(self.callback, Callback::Full(_)))
            .field("owned", &self.owner.is_some())
            .finish()
    }
}

// =============================================================================
// Categories
// =============================================================================

/// Category filter of one registration token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CategoryMatcher {
    /// Empty category: matches every category of the payload type.
    Any,
    /// Exact category, compared by interned address.
    Exact(Istr),
    /// Glob-like category pattern.
    Pattern(Istr, GlobPattern),
}

impl CategoryMatcher {
    /// Parses one token.
    ///
    /// # Errors
    ///
    /// Returns an internal error if a pattern cannot be compiled.
    pub fn parse(token: &str) -> Result<Self> {
        let token = token.trim();
        if token.is_empty() {
            Ok(CategoryMatcher::Any)
        } else if has_wildcard_characters(token) {
            Ok(CategoryMatcher::Pattern(intern(token), GlobPattern::new(token)?))
        } else {
            Ok(CategoryMatcher::Exact(intern(token)))
        }
    }

    /// Text the matcher was parsed from.
    #[must_use]
    pub fn label(&self) -> Istr {
        match self {
            CategoryMatcher::Any => Istr::empty(),
            CategoryMatcher::Exact(c) | CategoryMatcher::Pattern(c, _) => *c,
        }
    }

    /// Returns true if a post with `category` fires this matcher.
    #[must_use]
    pub fn matches(&self, category: Istr) -> bool {
        match self {
            CategoryMatcher::Any => true,
            CategoryMatcher::Exact(c) => *c == category,
            CategoryMatcher::Pattern(_, p) => p.matches(category.as_str()),
        }
    }

    /// Returns true if a producer advertising `producer` could fire this
    /// matcher. An empty producer category means "any category".
    #[must_use]
    pub fn accepts_producer(&self, producer: Istr) -> bool {
        if producer.is_empty() {
            return true;
        }
        let producer_is_pattern = has_wildcard_characters(producer.as_str());
        match self {
            CategoryMatcher::Any => true,
            CategoryMatcher::Exact(c) => {
                *c == producer
                    || (producer_is_pattern && matches_glob_like(producer.as_str(), c.as_str()))
            }
            CategoryMatcher::Pattern(_, p) => producer_is_pattern || p.matches(producer.as_str()),
        }
    }
}

/// Parses a comma-separated category list into distinct matchers.
///
/// An empty list, or a list of only empty tokens, is the "any" matcher.
///
/// # Errors
///
/// Returns an internal error if a pattern cannot be compiled.
pub fn parse_category_list(list: &str) -> Result<Vec<CategoryMatcher>> {
    let mut out: Vec<CategoryMatcher> = Vec::new();
    for token in list.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let matcher = CategoryMatcher::parse(token)?;
        if !out.iter().any(|m| m.label() == matcher.label()) {
            out.push(matcher);
        }
    }
    if out.is_empty() {
        out.push(CategoryMatcher::Any);
    }
    Ok(out)
}

// =============================================================================
// Producer and observer descriptions
// =============================================================================

/// A `<payload type, category>` pair a producer can originate.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct NotificationInfo {
    /// Payload type.
    pub type_id: TypeId,
    /// Payload type name, for diagnostics.
    pub type_name: &'static str,
    /// Category or category pattern; empty means any.
    pub category: Istr,
}

impl NotificationInfo {
    /// Describes notifications with payload `T` and `category`.
    #[must_use]
    pub fn of<T: 'static>(category: &str) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            category: intern(category),
        }
    }

    /// Returns true if this producer can emit `<type_id, category>`.
    #[must_use]
    pub fn can_emit(&self, type_id: TypeId, category: Istr) -> bool {
        self.type_id == type_id
            && (self.category.is_empty()
                || self.category == category
                || matches_glob_like(self.category.as_str(), category.as_str()))
    }
}

/// An installed observer, as broadcast to producers.
///
/// An observer tied to an owner stops being live as soon as the owner is
/// dropped, before its registration is purged.
#[derive(Clone)]
pub struct ObserverInfo {
    /// Payload type.
    pub type_id: TypeId,
    /// Payload type name, for diagnostics.
    pub type_name: &'static str,
    /// Category filter.
    pub category: CategoryMatcher,
    /// Where the observer is installed.
    pub point: ObservationPoint,
    owner: Option<Weak<dyn Any>>,
}

impl ObserverInfo {
    /// Returns false once the observer's owner has been dropped.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.owner.as_ref().is_none_or(|w| w.strong_count() > 0)
    }

    /// Returns true if a producer advertising `info` is relevant to this observer.
    #[must_use]
    pub fn concerns(&self, info: &NotificationInfo) -> bool {
        self.type_id == info.type_id && self.category.accepts_producer(info.category)
    }
}

impl PartialEq for ObserverInfo {
    fn eq(&self, other: &Self) -> bool {
        let same_owner = match (&self.owner, &other.owner) {
            (None, None) => true,
            (Some(a), Some(b)) => Weak::ptr_eq(a, b),
            _ => false,
        };
        self.type_id == other.type_id
            && self.category == other.category
            && self.point == other.point
            && same_owner
    }
}

impl Eq for ObserverInfo {}

impl fmt::Debug for ObserverInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverInfo")
            .field("type_name", &self.type_name)
            .field("category", &self.category)
            .field("point", &self.point)
            .field("live", &self.is_live())
            .finish()
    }
}

// =============================================================================
// Delegates and observer tables
// =============================================================================

type Stub = Rc<dyn Fn(&Forest, Origin, ObservationPoint, Istr, &dyn Any)>;

/// Stored callback plus its binding metadata.
#[derive(Clone)]
pub(crate) struct Delegate {
    type_id: TypeId,
    type_name: &'static str,
    category: CategoryMatcher,
    point: ObservationPoint,
    identity: usize,
    full_signature: bool,
    owner: Option<Weak<dyn Any>>,
    stub: Stub,
}

impl Delegate {
    fn is_alive(&self) -> bool {
        self.owner.as_ref().is_none_or(|w| w.strong_count() > 0)
    }

    fn same_binding(&self, identity: usize, full_signature: bool, label: Istr) -> bool {
        self.identity == identity
            && self.full_signature == full_signature
            && self.category.label() == label
    }

    fn info(&self) -> ObserverInfo {
        ObserverInfo {
            type_id: self.type_id,
            type_name: self.type_name,
            category: self.category.clone(),
            point: self.point,
            owner: self.owner.clone(),
        }
    }
}

/// Per-node delegates keyed by payload type.
#[derive(Clone, Default)]
pub(crate) struct ObserverTable {
    by_type: HashMap<TypeId, Vec<Delegate>>,
}

impl ObserverTable {
    pub(crate) fn is_empty(&self) -> bool {
        self.by_type.values().all(Vec::is_empty)
    }

    fn delegates(&self, type_id: TypeId) -> &[Delegate] {
        self.by_type.get(&type_id).map_or(&[], Vec::as_slice)
    }

    fn contains(&self, type_id: TypeId, identity: usize, full: bool, label: Istr) -> bool {
        self.delegates(type_id)
            .iter()
            .any(|d| d.same_binding(identity, full, label))
    }

    fn insert(&mut self, delegate: Delegate) {
        self.by_type
            .entry(delegate.type_id)
            .or_default()
            .push(delegate);
    }

    fn remove(&mut self, type_id: TypeId, identity: usize, full: bool, label: Istr) -> Option<Delegate> {
        let list = self.by_type.get_mut(&type_id)?;
        let pos = list.iter().position(|d| d.same_binding(identity, full, label))?;
        Some(list.remove(pos))
    }

    /// Live delegates, described for replay.
    pub(crate) fn live_infos(&self) -> Vec<ObserverInfo> {
        self.by_type
            .values()
            .flatten()
            .filter(|d| d.is_alive())
            .map(Delegate::info)
            .collect()
    }

    fn has_owned(&self) -> bool {
        self.by_type.values().flatten().any(|d| d.owner.is_some())
    }

    /// Removes delegates whose owner is gone.
    fn purge_dead(&mut self) -> Vec<ObserverInfo> {
        let mut removed = Vec::new();
        for list in self.by_type.values_mut() {
            list.retain(|d| {
                let alive = d.is_alive();
                if !alive {
                    removed.push(d.info());
                }
                alive
            });
        }
        removed
    }
}

impl fmt::Debug for ObserverTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.by_type.values().flatten().map(Delegate::info))
            .finish()
    }
}

// =============================================================================
// Registration and posting
// =============================================================================

impl Forest {
    /// Installs `handler` at `point` for payload `T` and each category in the
    /// comma-separated `categories` list.
    ///
    /// # Errors
    ///
    /// - `DoubleRegister` if this handler is already installed there for one
    ///   of the categories
    /// - `NoSuchSource` if `ensure_possible` is set and nothing under `point`
    ///   can produce a matching notification
    /// - `Expired` if `point` is a stale handle
    ///
    /// Nothing is installed unless every category passes.
    pub fn register_for_notification<T: 'static>(
        &mut self,
        point: impl Into<ObservationPoint>,
        categories: &str,
        handler: &Handler<T>,
        ensure_possible: bool,
    ) -> Result<()> {
        let point = point.into();
        self.purge_dead_observers();
        let type_id = TypeId::of::<T>();
        let type_name = std::any::type_name::<T>();
        let matchers = parse_category_list(categories)?;
        let identity = handler.identity();
        let full = handler.full_signature();

        let table = self.observer_table(point)?;
        for m in &matchers {
            if table.contains(type_id, identity, full, m.label()) {
                return Err(Error::double_register(type_name, m.label().as_str()));
            }
        }
        if ensure_possible {
            for m in &matchers {
                if !self.subtree_can_generate(point, type_id, m)? {
                    return Err(Error::no_such_source(type_name, m.label().as_str()));
                }
            }
        }

        let stub = handler.stub();
        let mut infos = Vec::with_capacity(matchers.len());
        let table = self.observer_table_mut(point)?;
        for category in matchers {
            let delegate = Delegate {
                type_id,
                type_name,
                category,
                point,
                identity,
                full_signature: full,
                owner: handler.owner.clone(),
                stub: Rc::clone(&stub),
            };
            infos.push(delegate.info());
            table.insert(delegate);
        }
        if handler.owner.is_some() {
            self.owned_observer_points.insert(point);
        }
        tracing::trace!(?point, payload = type_name, categories, "registered observer");
        let roots = self.observed_roots(point)?;
        self.broadcast_observers(&roots, &infos, true);
        Ok(())
    }

    /// Removes a registration made with the same handler and categories.
    ///
    /// # Errors
    ///
    /// Returns `NotRegistered` if any category has no matching registration,
    /// in which case nothing is removed.
    pub fn deregister_for_notification<T: 'static>(
        &mut self,
        point: impl Into<ObservationPoint>,
        categories: &str,
        handler: &Handler<T>,
    ) -> Result<()> {
        let point = point.into();
        self.purge_dead_observers();
        let type_id = TypeId::of::<T>();
        let type_name = std::any::type_name::<T>();
        let matchers = parse_category_list(categories)?;
        let identity = handler.identity();
        let full = handler.full_signature();

        let table = self.observer_table(point)?;
        for m in &matchers {
            if !table.contains(type_id, identity, full, m.label()) {
                return Err(Error::not_registered(type_name, m.label().as_str()));
            }
        }
        let table = self.observer_table_mut(point)?;
        let infos: Vec<_> = matchers
            .iter()
            .filter_map(|m| table.remove(type_id, identity, full, m.label()))
            .map(|d| d.info())
            .collect();
        tracing::trace!(?point, payload = type_name, categories, "deregistered observer");
        let roots = self.observed_roots(point)?;
        self.broadcast_observers(&roots, &infos, false);
        Ok(())
    }

    /// Delivers a notification synchronously.
    ///
    /// Visits the origin, each attached ancestor up to the root, then the
    /// virtual global node. A post from a stale handle is dropped.
    pub fn post<T: 'static>(&self, origin: impl Into<Origin>, category: Istr, payload: &T) {
        let origin = origin.into();
        let type_id = TypeId::of::<T>();
        if let Origin::Node(id) = origin {
            if !self.nodes.exists(id) {
                tracing::debug!(?id, "dropped post from expired node");
                return;
            }
        }
        if self.config.check_generatable_on_post {
            debug_assert!(
                self.can_generate(origin, type_id, category),
                "{origin:?} cannot generate {} notifications in category {category:?}",
                std::any::type_name::<T>()
            );
        }

        let mut cur = match origin {
            Origin::Node(id) => Some(id),
            Origin::Global => None,
        };
        while let Some(id) = cur {
            let Ok(data) = self.nodes.get(id) else { break };
            fire(self, &data.observers, type_id, origin, category, payload);
            cur = data.attached_parent();
        }
        fire(self, &self.global.observers, type_id, origin, category, payload);
    }

    /// Returns true if a post from `origin` would reach at least one live
    /// delegate.
    #[must_use]
    pub fn has_observers_for<T: 'static>(&self, origin: impl Into<Origin>, category: Istr) -> bool {
        let type_id = TypeId::of::<T>();
        let hit = |table: &ObserverTable| {
            table
                .delegates(type_id)
                .iter()
                .any(|d| d.is_alive() && d.category.matches(category))
        };
        let mut cur = match origin.into() {
            Origin::Node(id) => Some(id),
            Origin::Global => None,
        };
        while let Some(id) = cur {
            let Ok(data) = self.nodes.get(id) else { break };
            if hit(&data.observers) {
                return true;
            }
            cur = data.attached_parent();
        }
        hit(&self.global.observers)
    }

    /// Returns true if `origin` advertises `<type_id, category>`.
    #[must_use]
    pub fn can_generate(&self, origin: Origin, type_id: TypeId, category: Istr) -> bool {
        self.generatable(origin)
            .iter()
            .any(|info| info.can_emit(type_id, category))
    }

    /// Notifications an origin advertises.
    #[must_use]
    pub fn generatable(&self, origin: Origin) -> Vec<NotificationInfo> {
        match origin {
            Origin::Global => self.global.sources.clone(),
            Origin::Node(id) => self
                .nodes
                .get(id)
                .ok()
                .and_then(|d| d.behavior.as_ref())
                .map(|b| b.generatable_notifications())
                .unwrap_or_default(),
        }
    }

    /// Returns true if some producer under `point` could fire `matcher`.
    ///
    /// # Errors
    ///
    /// Returns `Expired` if `point` is a stale handle.
    pub fn subtree_can_generate(
        &self,
        point: ObservationPoint,
        type_id: TypeId,
        matcher: &CategoryMatcher,
    ) -> Result<bool> {
        let relevant = |info: &NotificationInfo| {
            info.type_id == type_id && matcher.accepts_producer(info.category)
        };
        let nodes = match point {
            ObservationPoint::Node(id) => self.subtree_preorder(id)?,
            ObservationPoint::Global => {
                if self.global.sources.iter().any(relevant) {
                    return Ok(true);
                }
                self.nodes.iter().map(|(id, _)| id).collect()
            }
        };
        Ok(nodes
            .into_iter()
            .any(|id| self.generatable(Origin::Node(id)).iter().any(relevant)))
    }

    /// Live observers installed at `point`.
    ///
    /// # Errors
    ///
    /// Returns `Expired` if `point` is a stale handle.
    pub fn observers_at(&self, point: impl Into<ObservationPoint>) -> Result<Vec<ObserverInfo>> {
        Ok(self.observer_table(point.into())?.live_infos())
    }

    /// Drops delegates whose owner is gone and tells the affected producers.
    ///
    /// Returns the number of delegates removed.
    ///
    /// Only points that received an owner-tied registration are visited.
    pub fn purge_dead_observers(&mut self) -> usize {
        let mut removed: Vec<ObserverInfo> = Vec::new();
        let points: Vec<ObservationPoint> = self.owned_observer_points.iter().copied().collect();
        for point in points {
            let still_owned = match self.observer_table_mut(point) {
                Ok(table) => {
                    removed.extend(table.purge_dead());
                    table.has_owned()
                }
                Err(_) => false,
            };
            if !still_owned {
                self.owned_observer_points.remove(&point);
            }
        }
        let count = removed.len();
        for info in removed {
            if let Ok(roots) = self.observed_roots(info.point) {
                self.broadcast_observers(&roots, std::slice::from_ref(&info), false);
            }
        }
        if count > 0 {
            tracing::trace!(count, "purged observers with dropped owners");
        }
        count
    }

    fn observer_table(&self, point: ObservationPoint) -> Result<&ObserverTable> {
        match point {
            ObservationPoint::Node(id) => Ok(&self.nodes.get(id)?.observers),
            ObservationPoint::Global => Ok(&self.global.observers),
        }
    }

    fn observer_table_mut(&mut self, point: ObservationPoint) -> Result<&mut ObserverTable> {
        match point {
            ObservationPoint::Node(id) => Ok(&mut self.nodes.get_mut(id)?.observers),
            ObservationPoint::Global => Ok(&mut self.global.observers),
        }
    }

    /// Subtree roots whose producers an observer at `point` can hear.
    fn observed_roots(&self, point: ObservationPoint) -> Result<Vec<NodeId>> {
        match point {
            ObservationPoint::Node(id) => {
                self.nodes.validate(id)?;
                Ok(vec![id])
            }
            ObservationPoint::Global => Ok(self.parentless.clone()),
        }
    }

    /// Live observers at `start` and every attached ancestor of it.
    pub(crate) fn chain_observer_infos(&self, start: NodeId) -> Vec<ObserverInfo> {
        let mut infos = Vec::new();
        let mut cur = Some(start);
        while let Some(id) = cur {
            let Ok(data) = self.nodes.get(id) else { break };
            infos.extend(data.observers.live_infos());
            cur = data.attached_parent();
        }
        infos
    }

    /// Tells every relevant producer under `roots` about observers.
    pub(crate) fn broadcast_observers(&mut self, roots: &[NodeId], infos: &[ObserverInfo], registered: bool) {
        if infos.is_empty() {
            return;
        }
        for &root in roots {
            let Ok(nodes) = self.subtree_preorder(root) else {
                continue;
            };
            for id in nodes {
                let Ok(data) = self.nodes.get_mut(id) else {
                    continue;
                };
                if data.behavior_busy {
                    data.deferred_observer_events
                        .extend(infos.iter().map(|info| (info.clone(), registered)));
                    continue;
                }
                let Some(behavior) = data.behavior.as_mut() else {
                    continue;
                };
                let produced = behavior.generatable_notifications();
                for info in infos {
                    if !produced.iter().any(|p| info.concerns(p)) {
                        continue;
                    }
                    if registered {
                        behavior.notification_observer_registered(info);
                    } else {
                        behavior.notification_observer_deregistered(info);
                    }
                }
            }
        }
    }
}

fn fire(
    forest: &Forest,
    table: &ObserverTable,
    type_id: TypeId,
    origin: Origin,
    category: Istr,
    payload: &dyn Any,
) {
    for delegate in table.delegates(type_id) {
        if delegate.is_alive() && delegate.category.matches(category) {
            (delegate.stub)(forest, origin, delegate.point, category, payload);
        }
    }
}
