//! Pending Group Module
//!
//! State collected for one (source, group) pair while its quiet period is running.
//! A group holds its items in arrival order plus the single live "wake": the
//! continuation of the most recent item and the timer armed for it.

use crate::{Batch, Delivery, GroupKey, Item};
use chrono::Utc;
use tokio::task::JoinHandle;

/// Downstream step bound to one incoming item.
///
/// Called at most once. Dropping it without calling means the item was absorbed
/// into a later delivery.
pub type Continuation = Box<dyn FnOnce(Delivery) + Send + 'static>;

/// The live continuation/timer pair of a group
struct Wake {
    continuation: Continuation,
    timer: Option<JoinHandle<()>>,
}

/// Accumulating state for one group
pub(crate) struct PendingGroup {
    items: Vec<Item>,
    wake: Option<Wake>,
    /// Identifies the live timer; a timer holding an older value is inert
    generation: u64,
}

impl PendingGroup {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            wake: None,
            generation: 0,
        }
    }

    pub fn push(&mut self, item: Item) {
        self.items.push(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Invalidate the live wake without delivering anything.
    ///
    /// The armed timer is aborted and the pending continuation is dropped.
    /// Returns `true` if a wake was live.
    pub fn supersede(&mut self) -> bool {
        match self.wake.take() {
            Some(wake) => {
                if let Some(timer) = wake.timer {
                    timer.abort();
                }
                true
            }
            None => false,
        }
    }

    /// Install the continuation of the newest item under a fresh generation.
    ///
    /// The caller supersedes any live wake beforehand.
    pub fn install(&mut self, continuation: Continuation, generation: u64) {
        self.wake = Some(Wake {
            continuation,
            timer: None,
        });
        self.generation = generation;
    }

    pub fn attach_timer(&mut self, timer: JoinHandle<()>) {
        if let Some(wake) = self.wake.as_mut() {
            wake.timer = Some(timer);
        }
    }

    /// Close the group: sort its items by sequence and bind the batch to the
    /// most recently added item.
    ///
    /// Returns `None` when there is nothing to deliver to.
    pub fn finalize(self, key: GroupKey) -> Option<(Continuation, Delivery)> {
        let wake = self.wake?;
        let mut items = self.items;
        let trigger = items.last()?.clone();

        // stable: equal sequence numbers keep arrival order
        items.sort_by_key(|item| item.sequence);

        let batch = Batch {
            key,
            items,
            finalized_at: Utc::now(),
        };

        Some((wake.continuation, Delivery::batched(trigger, batch)))
    }
}
