//! Dispatcher Module
//!
//! Boundary between the transport and the aggregator. Only grouped items of an
//! aggregated kind reach `GroupAggregator::observe`; everything else is handed
//! straight to its continuation.

use crate::{
    aggregator::{Continuation, GroupAggregator},
    config::AggregatorConfig,
    Delivery, Item, ItemKind,
};
use std::collections::HashSet;
use tracing::debug;

/// How an item was routed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Delivered immediately, unchanged
    PassedThrough,
    /// Handed to the aggregator; the continuation runs later or never
    Aggregated,
}

/// Routes incoming items either to the aggregator or directly downstream
#[derive(Clone)]
pub struct Dispatcher {
    aggregator: GroupAggregator,
    /// Kinds that are collected into groups
    aggregate_kinds: HashSet<ItemKind>,
}

impl Dispatcher {
    /// Creates a new dispatcher
    ///
    /// # Arguments
    /// * `aggregator` - Aggregator receiving grouped items
    /// * `aggregate_kinds` - Item kinds that take part in grouping
    pub fn new(aggregator: GroupAggregator, aggregate_kinds: impl IntoIterator<Item = ItemKind>) -> Self {
        Self {
            aggregator,
            aggregate_kinds: aggregate_kinds.into_iter().collect(),
        }
    }

    /// Build the aggregator and dispatcher from configuration
    pub fn from_config(config: &AggregatorConfig) -> Self {
        Self::new(
            GroupAggregator::from_config(config),
            config.aggregate_kinds.iter().copied(),
        )
    }

    pub fn aggregator(&self) -> &GroupAggregator {
        &self.aggregator
    }

    /// Route one item
    ///
    /// # Returns
    /// * `Route::PassedThrough` if the continuation has already been called
    /// * `Route::Aggregated` if the item now belongs to a pending group
    pub fn dispatch(&self, item: Item, continuation: Continuation) -> Route {
        if !self.aggregate_kinds.contains(&item.kind) {
            debug!("Item #{} of kind {} passed through", item.sequence, item.kind.as_str());
            continuation(Delivery::passthrough(item));
            return Route::PassedThrough;
        }

        match item.into_grouped() {
            Ok(grouped) => {
                self.aggregator.observe(grouped, continuation);
                Route::Aggregated
            }
            Err(item) => {
                debug!("Ungrouped item #{} passed through", item.sequence);
                continuation(Delivery::passthrough(item));
                Route::PassedThrough
            }
        }
    }
}
