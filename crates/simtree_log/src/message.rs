//! Log message records and per-thread sequencing.

use std::cell::Cell;
use std::sync::atomic::{AtomicU32, Ordering};

use simtree_foundation::Istr;
use simtree_node::Origin;

/// A single log message as it travels over the notification bus.
#[derive(Clone, Debug, PartialEq)]
pub struct LogMessage {
    /// Node the message is attributed to.
    pub origin: Origin,
    /// Seconds since the forest was created.
    pub wall_time: f64,
    /// Simulated time in ticks.
    pub sim_time: u64,
    /// Category the message was posted under.
    pub category: Istr,
    /// Small integer naming the posting thread.
    pub thread_id: u32,
    /// Per-thread sequence number; the first message of a thread is 0.
    pub sequence: i64,
    /// Message text.
    pub content: String,
}

static NEXT_THREAD_ID: AtomicU32 = AtomicU32::new(0);

thread_local! {
    static THREAD_ID: u32 = NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed);
    static SEQUENCE: Cell<i64> = const { Cell::new(-1) };
}

/// Id of the calling thread, assigned on first use.
#[must_use]
pub fn current_thread_id() -> u32 {
    THREAD_ID.with(|id| *id)
}

/// Last sequence number handed out on the calling thread, or -1.
#[must_use]
pub fn last_sequence() -> i64 {
    SEQUENCE.with(Cell::get)
}

/// Advances and returns the calling thread's sequence number.
pub(crate) fn next_sequence() -> i64 {
    SEQUENCE.with(|s| {
        let next = s.get() + 1;
        s.set(next);
        next
    })
}
