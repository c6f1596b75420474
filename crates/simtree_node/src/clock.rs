//! Clock definitions, node clock association, and simulated time.
//!
//! Clock semantics belong to the scheduler. The tree only records which clock
//! a node runs on so that messages can be stamped with a cycle number.

use simtree_foundation::{Error, Istr, NodeId, NodeUid, Result, ident, intern};

use crate::bus::Origin;
use crate::forest::Forest;

/// Handle to a clock owned by a forest.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClockId(pub(crate) usize);

/// A named clock with a period in ticks and a ratio to its parent clock.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Clock {
    uid: NodeUid,
    name: Istr,
    period: u64,
    ratio_num: u32,
    ratio_den: u32,
}

impl Clock {
    /// Unique identifier, drawn from the node counter.
    #[must_use]
    pub fn uid(&self) -> NodeUid {
        self.uid
    }

    /// Clock name.
    #[must_use]
    pub fn name(&self) -> Istr {
        self.name
    }

    /// Period in ticks.
    #[must_use]
    pub fn period(&self) -> u64 {
        self.period
    }

    /// Ratio to the parent clock as `(numerator, denominator)`.
    #[must_use]
    pub fn ratio(&self) -> (u32, u32) {
        (self.ratio_num, self.ratio_den)
    }

    /// Cycle number of this clock at `tick`.
    #[must_use]
    pub fn cycle_at(&self, tick: u64) -> u64 {
        tick / self.period
    }
}

impl Forest {
    /// Creates a clock with a 1:1 ratio.
    ///
    /// # Errors
    ///
    /// Returns `BadIdentifier` for an invalid name, or `InvalidStructure` for a
    /// zero period.
    pub fn create_clock(&mut self, name: &str, period: u64) -> Result<ClockId> {
        self.create_clock_with_ratio(name, period, 1, 1)
    }

    /// Creates a clock with the given ratio to its parent clock.
    ///
    /// # Errors
    ///
    /// Returns `BadIdentifier` for an invalid name, or `InvalidStructure` for a
    /// zero period or zero ratio term.
    pub fn create_clock_with_ratio(
        &mut self,
        name: &str,
        period: u64,
        ratio_num: u32,
        ratio_den: u32,
    ) -> Result<ClockId> {
        ident::validate_alias(name)?;
        if period == 0 {
            return Err(Error::invalid_structure(format!(
                "clock {name:?} has a zero period"
            )));
        }
        if ratio_num == 0 || ratio_den == 0 {
            return Err(Error::invalid_structure(format!(
                "clock {name:?} has a zero ratio term"
            )));
        }
        let id = ClockId(self.clocks.len());
        self.clocks.push(Clock {
            uid: NodeUid::next(),
            name: intern(name),
            period,
            ratio_num,
            ratio_den,
        });
        tracing::debug!(clock = name, period, "created clock");
        Ok(id)
    }

    /// Returns a clock by handle.
    #[must_use]
    pub fn clock(&self, id: ClockId) -> Option<&Clock> {
        self.clocks.get(id.0)
    }

    /// Returns a clock by name.
    #[must_use]
    pub fn find_clock(&self, name: &str) -> Option<ClockId> {
        self.clocks
            .iter()
            .position(|c| c.name.as_str() == name)
            .map(ClockId)
    }

    /// All clocks in creation order.
    #[must_use]
    pub fn clocks(&self) -> &[Clock] {
        &self.clocks
    }

    /// Associates a clock with a node.
    ///
    /// # Errors
    ///
    /// Returns `PhaseError` from FINALIZING on, since working clocks are
    /// cached at that point.
    pub fn set_clock(&mut self, node: NodeId, clock: ClockId) -> Result<()> {
        if self.clock(clock).is_none() {
            return Err(Error::internal(format!("unknown clock {clock:?}")));
        }
        let phase = self.nodes.get(node)?.phase;
        if phase.clocks_fixed() {
            return Err(Error::phase("set clock", phase.as_str()).at(self.location(node)?));
        }
        self.nodes.get_mut(node)?.clock = Some(clock);
        Ok(())
    }

    /// Clock a node runs on: its own, or the nearest ancestor's.
    ///
    /// # Errors
    ///
    /// Returns `Expired` for a stale handle.
    pub fn working_clock(&self, node: NodeId) -> Result<Option<ClockId>> {
        let data = self.nodes.get(node)?;
        if let Some(cached) = data.working_clock {
            return Ok(cached);
        }
        let mut cur = Some(node);
        while let Some(id) = cur {
            let data = self.nodes.get(id)?;
            if data.clock.is_some() {
                return Ok(data.clock);
            }
            cur = data.attached_parent();
        }
        Ok(None)
    }

    /// Fixes the working clock of every node in the subtree.
    pub(crate) fn cache_working_clocks(&mut self, root: NodeId) -> Result<()> {
        for id in self.subtree_preorder(root)? {
            let clock = self.working_clock(id)?;
            self.nodes.get_mut(id)?.working_clock = Some(clock);
        }
        Ok(())
    }

    /// Cycle of the origin's working clock at `tick`, if it has one.
    #[must_use]
    pub fn cycle_of(&self, origin: Origin, tick: u64) -> Option<u64> {
        let Origin::Node(id) = origin else {
            return None;
        };
        let clock = self.working_clock(id).ok().flatten()?;
        self.clock(clock).map(|c| c.cycle_at(tick))
    }

    /// Current simulated time in ticks.
    #[must_use]
    pub fn current_tick(&self) -> u64 {
        self.current_tick
    }

    /// Sets the simulated time. Time is owned by the scheduler.
    pub fn set_current_tick(&mut self, tick: u64) {
        self.current_tick = tick;
    }

    /// Advances simulated time by `ticks`, saturating.
    pub fn advance_ticks(&mut self, ticks: u64) {
        self.current_tick = self.current_tick.saturating_add(ticks);
    }

    /// Seconds of wall time since the forest was created.
    #[must_use]
    pub fn wall_time(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }
}
