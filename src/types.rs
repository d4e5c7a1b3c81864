use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Field name under which a finalized batch is attached to a delivery
pub const BATCH_FIELD: &str = "media_group";

/// Identifier of the chat or channel an item was posted to
pub type SourceId = i64;

/// Identifier correlating items posted together as one album
pub type GroupId = String;

/// Kind tag used for classification only; the aggregator ignores it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Photo,
    Video,
    Other,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Photo => "photo",
            ItemKind::Video => "video",
            ItemKind::Other => "other",
        }
    }
}

/// A single item delivered by the transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub source_id: SourceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<GroupId>,
    /// Monotonic per source, used for deterministic ordering inside a batch
    pub sequence: u64,
    pub kind: ItemKind,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Item {
    pub fn new(source_id: SourceId, sequence: u64, kind: ItemKind) -> Self {
        Self {
            source_id,
            group_id: None,
            sequence,
            kind,
            payload: serde_json::Value::Null,
        }
    }

    pub fn with_group(mut self, group_id: impl Into<GroupId>) -> Self {
        self.group_id = Some(group_id.into());
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    /// Key of the group this item belongs to, if any.
    ///
    /// An empty group id counts as no group at all.
    pub fn group_key(&self) -> Option<GroupKey> {
        match self.group_id.as_deref() {
            Some(group_id) if !group_id.is_empty() => Some(GroupKey {
                source_id: self.source_id,
                group_id: group_id.to_string(),
            }),
            _ => None,
        }
    }

    /// Convert into a [`GroupedItem`], handing the item back if it has no group
    pub fn into_grouped(self) -> Result<GroupedItem, Item> {
        match self.group_key() {
            Some(key) => Ok(GroupedItem { key, item: self }),
            None => Err(self),
        }
    }
}

/// (source, group) pair identifying one pending group
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupKey {
    pub source_id: SourceId,
    pub group_id: GroupId,
}

impl std::fmt::Display for GroupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.source_id, self.group_id)
    }
}

/// An item known to carry a non-empty group id.
///
/// Only obtainable through [`Item::into_grouped`].
#[derive(Debug, Clone, PartialEq)]
pub struct GroupedItem {
    key: GroupKey,
    item: Item,
}

impl GroupedItem {
    pub fn key(&self) -> &GroupKey {
        &self.key
    }

    pub fn item(&self) -> &Item {
        &self.item
    }

    pub fn into_parts(self) -> (GroupKey, Item) {
        (self.key, self.item)
    }
}

/// Finalized group, sorted by sequence number
///
/// Serialized with its items under [`BATCH_FIELD`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    #[serde(rename = "group")]
    pub key: GroupKey,
    #[serde(rename = "media_group")]
    pub items: Vec<Item>,
    pub finalized_at: DateTime<Utc>,
}

/// What a continuation receives: the triggering item plus the batch, if any
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Delivery {
    pub item: Item,
    #[serde(flatten)]
    pub media_group: Option<Batch>,
}

impl Delivery {
    /// Delivery for an item that never went through the aggregator
    pub fn passthrough(item: Item) -> Self {
        Self {
            item,
            media_group: None,
        }
    }

    pub fn batched(item: Item, batch: Batch) -> Self {
        Self {
            item,
            media_group: Some(batch),
        }
    }

    /// Sorted batch members, if a batch is attached
    pub fn batch(&self) -> Option<&[Item]> {
        self.media_group.as_ref().map(|batch| batch.items.as_slice())
    }
}

/// Errors raised while decoding items at the ingress boundary
#[derive(Debug, Error)]
pub enum ItemError {
    #[error("invalid item params: {0}")]
    InvalidParams(#[from] serde_json::Error),
}
