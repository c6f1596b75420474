//! Taps: observers that relay matching log messages to a destination.

use std::cell::Cell;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use simtree_foundation::Result;
use simtree_node::{Forest, Handler, Notification, ObservationPoint, Origin};

use crate::destination::{Destination, DestinationManager, DestinationSpec};
use crate::message::LogMessage;

struct TapState {
    destination: Arc<Destination>,
    recorded: Cell<u64>,
}

/// Forwards every [`LogMessage`] posted under an observation point in a
/// matching category to one destination.
///
/// Dropping a tap stops forwarding, and sources stop counting it as an
/// observer right away. The registration itself is freed on the next bus
/// mutation.
pub struct Tap {
    state: Rc<TapState>,
    handler: Handler<LogMessage>,
    category: String,
    point: Option<ObservationPoint>,
}

impl Tap {
    /// Creates a tap writing to `destination` through the process-wide
    /// [`DestinationManager`].
    ///
    /// # Errors
    ///
    /// Returns `DestinationOpen` if the destination cannot be opened, or the
    /// registration errors of [`Forest::register_for_notification`].
    pub fn new(
        forest: &mut Forest,
        point: impl Into<ObservationPoint>,
        category: &str,
        destination: &DestinationSpec,
    ) -> Result<Self> {
        let destination = DestinationManager::global().get(destination)?;
        Self::with_destination(forest, point, category, destination)
    }

    /// Creates a tap writing to an already-open destination.
    ///
    /// # Errors
    ///
    /// Returns the registration errors of
    /// [`Forest::register_for_notification`].
    pub fn with_destination(
        forest: &mut Forest,
        point: impl Into<ObservationPoint>,
        category: &str,
        destination: Arc<Destination>,
    ) -> Result<Self> {
        let state = Rc::new(TapState {
            destination,
            recorded: Cell::new(0),
        });
        let weak: Weak<TapState> = Rc::downgrade(&state);
        let handler = Handler::new(move |n: &Notification<'_, LogMessage>| {
            if let Some(state) = weak.upgrade() {
                state.recorded.set(state.recorded.get() + 1);
                state.destination.receive(n.forest, n.payload);
            }
        })
        .owned_by(&state);
        let mut tap = Self {
            state,
            handler,
            category: category.to_owned(),
            point: None,
        };
        tap.attach(forest, point.into())?;
        Ok(tap)
    }

    fn attach(&mut self, forest: &mut Forest, point: ObservationPoint) -> Result<()> {
        forest.register_for_notification(point, &self.category, &self.handler, false)?;
        let origin = match point {
            ObservationPoint::Node(id) => Origin::Node(id),
            ObservationPoint::Global => Origin::Global,
        };
        tracing::debug!(
            point = %forest.origin_location(origin),
            category = %self.category,
            destination = %self.state.destination.spec().label(),
            "attached log tap"
        );
        self.point = Some(point);
        Ok(())
    }

    /// Stops forwarding. Detaching from an expired node is not an error.
    ///
    /// # Errors
    ///
    /// Returns `NotRegistered` if the registration vanished some other way.
    pub fn detach(&mut self, forest: &mut Forest) -> Result<()> {
        let Some(point) = self.point.take() else {
            return Ok(());
        };
        match forest.deregister_for_notification(point, &self.category, &self.handler) {
            Err(e) if e.is_expired() => Ok(()),
            other => other,
        }
    }

    /// Detaches and reattaches at `point`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Tap::detach`] and of registration.
    pub fn reset(&mut self, forest: &mut Forest, point: impl Into<ObservationPoint>) -> Result<()> {
        self.detach(forest)?;
        self.attach(forest, point.into())
    }

    /// Messages this tap has forwarded.
    #[must_use]
    pub fn num_recorded(&self) -> u64 {
        self.state.recorded.get()
    }

    /// Where the tap is installed, if attached.
    #[must_use]
    pub fn point(&self) -> Option<ObservationPoint> {
        self.point
    }

    /// Category list the tap matches.
    #[must_use]
    pub fn category(&self) -> &str {
        &self.category
    }

    /// Destination the tap writes to.
    #[must_use]
    pub fn destination(&self) -> &Arc<Destination> {
        &self.state.destination
    }
}

impl std::fmt::Debug for Tap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tap")
            .field("point", &self.point)
            .field("category", &self.category)
            .field("destination", self.state.destination.spec())
            .field("recorded", &self.num_recorded())
            .finish()
    }
}
