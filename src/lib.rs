//! This crate reassembles items that arrive one by one but belong together, such as the
//! photos and videos of a chat album, into a single ordered batch. A group is finished
//! once no new item has arrived for a configured quiet period.

pub mod types; // Items, group keys, batches and deliveries.
pub mod aggregator; // Debounce engine collecting items per (source, group).
pub mod dispatch; // Boundary routing and classification predicates.
pub mod consumer; // Downstream handler that consumes finished deliveries.
pub mod api; // JSON-RPC ingress standing in for a messaging transport.
pub mod config; // Defines and loads service configuration.

// Re-export commonly used types and configurations for easier access.
pub use types::*;
pub use config::Config;
pub use aggregator::GroupAggregator;
pub use dispatch::Dispatcher;
