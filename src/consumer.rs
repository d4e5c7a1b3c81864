//! Batch Consumer Module
//!
//! Downstream handler used by the service binary. It logs every member of a
//! delivered batch by kind and reports what it received.

use crate::{
    dispatch::{media_group, photo_media_group, video_media_group},
    Delivery, ItemKind,
};
use serde::Serialize;
use tracing::info;

/// Classification of a delivered batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Photos,
    Videos,
    Mixed,
}

/// Outcome reported back to the transport for one delivery
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeliveryReport {
    Delivered {
        batch_size: usize,
        classification: Classification,
    },
    PassedThrough,
}

/// Logs deliveries the way a bot handler would consume them
#[derive(Debug, Clone, Default)]
pub struct BatchConsumer;

impl BatchConsumer {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, delivery: &Delivery) -> DeliveryReport {
        if !media_group(delivery) {
            info!(
                "Item #{} from {} received on its own",
                delivery.item.sequence, delivery.item.source_id
            );
            return DeliveryReport::PassedThrough;
        }

        let classification = classify(delivery);
        let items = delivery.batch().unwrap_or_default();

        if let Some(batch) = delivery.media_group.as_ref() {
            info!(
                "Media group {} finalized at {} with {} items",
                batch.key,
                batch.finalized_at.to_rfc3339(),
                items.len()
            );
        }

        for media in items {
            match media.kind {
                ItemKind::Photo => info!("Photo #{}: {}", media.sequence, media.payload),
                ItemKind::Video => info!("Video #{}: {}", media.sequence, media.payload),
                ItemKind::Other => info!("Item #{}: {}", media.sequence, media.payload),
            }
        }

        DeliveryReport::Delivered {
            batch_size: items.len(),
            classification,
        }
    }
}

fn classify(delivery: &Delivery) -> Classification {
    if photo_media_group(delivery) {
        Classification::Photos
    } else if video_media_group(delivery) {
        Classification::Videos
    } else {
        Classification::Mixed
    }
}
