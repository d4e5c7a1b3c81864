//! Classification predicates over finished deliveries.

use crate::{Delivery, ItemKind};

/// True when a batch is attached to the delivery
pub fn media_group(delivery: &Delivery) -> bool {
    delivery.media_group.is_some()
}

/// True when a batch is attached and every member is a photo
pub fn photo_media_group(delivery: &Delivery) -> bool {
    all_of_kind(delivery, ItemKind::Photo)
}

/// True when a batch is attached and every member is a video
pub fn video_media_group(delivery: &Delivery) -> bool {
    all_of_kind(delivery, ItemKind::Video)
}

fn all_of_kind(delivery: &Delivery, kind: ItemKind) -> bool {
    delivery
        .batch()
        .is_some_and(|items| items.iter().all(|item| item.kind == kind))
}
