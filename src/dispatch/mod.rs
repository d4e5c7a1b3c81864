//! Dispatch Module
//!
//! This module sits between the transport and the aggregator:
//! - Dispatcher: Guards the aggregator boundary and routes ungrouped items downstream
//! - Filters: Predicates classifying a finished delivery (any media, photos, videos)

mod router;
pub mod filters;

pub use router::{Dispatcher, Route};
pub use filters::{media_group, photo_media_group, video_media_group};
