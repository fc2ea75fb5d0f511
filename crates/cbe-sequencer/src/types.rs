use std::collections::BTreeMap;

use cbe_schemas::ErrorClass;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One entry of the current visual ordering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderedKey {
    pub id: Uuid,
    pub order_key: i64,
}

impl OrderedKey {
    pub fn new(id: Uuid, order_key: i64) -> Self {
        Self { id, order_key }
    }
}

/// Result of a placement.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum KeyAssignment {
    /// Only `id` gets a new key.
    Single { id: Uuid, order_key: i64 },
    /// Keys had converged. Every item (including the placed one) gets the
    /// key from this map; the write must be a single transaction.
    Renumbered { order_keys: BTreeMap<Uuid, i64> },
}

impl KeyAssignment {
    pub fn is_renumber(&self) -> bool {
        matches!(self, KeyAssignment::Renumbered { .. })
    }

    /// The key assigned to `id`, if this assignment covers it.
    pub fn key_for(&self, id: Uuid) -> Option<i64> {
        match self {
            KeyAssignment::Single { id: single, order_key } => {
                (*single == id).then_some(*order_key)
            }
            KeyAssignment::Renumbered { order_keys } => order_keys.get(&id).copied(),
        }
    }

    /// Apply to a collection, returning it re-sorted by key.
    pub fn apply(&self, items: &[OrderedKey]) -> Vec<OrderedKey> {
        let mut keys: BTreeMap<Uuid, i64> =
            items.iter().map(|it| (it.id, it.order_key)).collect();
        match self {
            KeyAssignment::Single { id, order_key } => {
                keys.insert(*id, *order_key);
            }
            KeyAssignment::Renumbered { order_keys } => keys.extend(order_keys),
        }
        let mut out: Vec<OrderedKey> = keys
            .into_iter()
            .map(|(id, order_key)| OrderedKey::new(id, order_key))
            .collect();
        out.sort_by_key(|it| it.order_key);
        out
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SequenceError {
    #[error("sequencer: gap must be >= 2, got {gap}")]
    InvalidGap { gap: i64 },
    #[error("sequencer: keys must be strictly increasing in visual order (violation at index {index})")]
    KeysNotStrictlyIncreasing { index: usize },
    #[error("sequencer: item {id} is not in the collection")]
    UnknownItem { id: Uuid },
    #[error("sequencer: item {id} is already in the collection")]
    DuplicateItem { id: Uuid },
    #[error("sequencer: destination index {destination} out of range (max {max})")]
    DestinationOutOfRange { destination: usize, max: usize },
    #[error("sequencer: renumbering {len} items with gap {gap} overflows i64")]
    KeySpaceExhausted { len: usize, gap: i64 },
}

impl SequenceError {
    pub fn class(&self) -> ErrorClass {
        match self {
            SequenceError::KeySpaceExhausted { .. } => ErrorClass::Consistency,
            _ => ErrorClass::Validation,
        }
    }
}
