//! Group Aggregation Module
//!
//! This module reassembles items that share a (source, group) pair into one batch:
//! - PendingGroup: Items collected so far plus the live continuation and timer
//! - GroupAggregator: Debounces groups and delivers each finished batch exactly once
//!
//! Within a batch, items are ordered by sequence number. No order is promised
//! across groups.

mod aggregator;
mod pending;

#[cfg(test)]
mod tests;

pub use aggregator::GroupAggregator;
pub use pending::Continuation;
