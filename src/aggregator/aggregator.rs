//! Group Aggregator Module
//!
//! This module implements the debounce engine that reassembles grouped items.
//!
//! # Lifecycle of a group
//! 1. First item for a (source, group) pair creates a `PendingGroup`
//! 2. Every further item supersedes the live wake, is appended, and rearms the timer
//! 3. When a timer expires and is still the live one, the group is removed from the
//!    registry, sorted by sequence number and delivered to the newest continuation
//!
//! Once a group is removed, the next item with the same identifiers starts a
//! fresh group.

use super::pending::{Continuation, PendingGroup};
use crate::{GroupId, GroupKey, GroupedItem, SourceId, config::AggregatorConfig};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

type Registry = HashMap<SourceId, HashMap<GroupId, PendingGroup>>;

/// Debounce engine for grouped items
///
/// Clones share the same registry, so one instance can be handed to every
/// component that routes items into it.
#[derive(Clone)]
pub struct GroupAggregator {
    /// source id -> group id -> pending state
    groups: Arc<Mutex<Registry>>,
    /// Source of timer generations, unique across all groups and sessions
    generations: Arc<AtomicU64>,
    /// Quiet period that must elapse after the newest item of a group
    timeout: Duration,
}

impl GroupAggregator {
    /// Creates a new aggregator
    ///
    /// # Arguments
    /// * `timeout` - Quiet period after which a group is finalized
    pub fn new(timeout: Duration) -> Self {
        Self {
            groups: Arc::new(Mutex::new(HashMap::new())),
            generations: Arc::new(AtomicU64::new(0)),
            timeout,
        }
    }

    pub fn from_config(config: &AggregatorConfig) -> Self {
        Self::new(config.timeout())
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Add an item to its group and (re)start the group's quiet period
    ///
    /// The continuation is not called here. It is either called once with the
    /// finalized batch, if this item is still the newest of its group when the
    /// timer expires, or dropped when a later item supersedes it.
    ///
    /// If no timer can be armed (no tokio runtime is available), the group is
    /// finalized immediately with whatever it has collected.
    pub fn observe(&self, item: GroupedItem, continuation: Continuation) {
        let (key, item) = item.into_parts();
        let sequence = item.sequence;

        let mut groups = self.lock();
        let group = match groups
            .entry(key.source_id)
            .or_default()
            .entry(key.group_id.clone())
        {
            Entry::Occupied(entry) => {
                let group = entry.into_mut();
                if group.supersede() {
                    debug!("Group {} debounced by item #{}", key, sequence);
                }
                group
            }
            Entry::Vacant(entry) => {
                debug!("Group {} opened by item #{}", key, sequence);
                entry.insert(PendingGroup::new())
            }
        };

        let generation = self.generations.fetch_add(1, Ordering::Relaxed);
        group.push(item);
        group.install(continuation, generation);

        match Handle::try_current() {
            Ok(runtime) => {
                // the quiet period counts from arrival, not from the timer's first poll
                let deadline = Instant::now() + self.timeout;
                let timer = runtime.spawn(self.clone().expire(key, generation, deadline));
                group.attach_timer(timer);
            }
            Err(e) => {
                warn!("Cannot arm timer for group {} ({}), finalizing now", key, e);
                let finalized = take_group(&mut groups, &key, generation);
                drop(groups);
                if let Some(group) = finalized {
                    deliver(key, group);
                }
            }
        }
    }

    /// Number of groups currently collecting
    pub fn pending_groups(&self) -> usize {
        self.lock().values().map(HashMap::len).sum()
    }

    /// Number of items collected so far for a group, zero if it is not pending
    pub fn pending_items(&self, key: &GroupKey) -> usize {
        self.lock()
            .get(&key.source_id)
            .and_then(|groups| groups.get(&key.group_id))
            .map_or(0, PendingGroup::len)
    }

    /// Timer body: wait out the quiet period, then finalize if still live
    async fn expire(self, key: GroupKey, generation: u64, deadline: Instant) {
        tokio::time::sleep_until(deadline).await;

        let finalized = {
            let mut groups = self.lock();
            take_group(&mut groups, &key, generation)
        };

        match finalized {
            Some(group) => deliver(key, group),
            None => debug!("Stale timer for group {} ignored", key),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.groups.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Remove a group from the registry if `generation` is still its live timer
fn take_group(groups: &mut Registry, key: &GroupKey, generation: u64) -> Option<PendingGroup> {
    let source = groups.get_mut(&key.source_id)?;
    if source.get(&key.group_id)?.generation() != generation {
        return None;
    }

    let group = source.remove(&key.group_id);
    if source.is_empty() {
        groups.remove(&key.source_id);
    }
    group
}

fn deliver(key: GroupKey, group: PendingGroup) {
    let label = key.to_string();
    match group.finalize(key) {
        Some((continuation, delivery)) => {
            info!(
                "Group {} finalized with {} items, delivering via item #{}",
                label,
                delivery.batch().map_or(0, <[_]>::len),
                delivery.item.sequence
            );
            continuation(delivery);
        }
        None => warn!("Group {} finalized with nothing to deliver", label),
    }
}
