use std::collections::BTreeMap;

use uuid::Uuid;

use crate::{KeyAssignment, OrderedKey, SequenceError, SequencerConfig};

/// Key allocator for one collection. Holds only the configured gap.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Sequencer {
    gap: i64,
}

impl Default for Sequencer {
    fn default() -> Self {
        Self {
            gap: crate::DEFAULT_GAP,
        }
    }
}

impl Sequencer {
    pub fn new(gap: i64) -> Result<Self, SequenceError> {
        if gap < 2 {
            return Err(SequenceError::InvalidGap { gap });
        }
        Ok(Self { gap })
    }

    pub fn from_config(cfg: &SequencerConfig) -> Result<Self, SequenceError> {
        Self::new(cfg.gap)
    }

    pub fn gap(&self) -> i64 {
        self.gap
    }

    /// Key for a new item `id` appended without an explicit position.
    pub fn append(&self, items: &[OrderedKey], id: Uuid) -> Result<KeyAssignment, SequenceError> {
        self.insert_at(items, id, items.len())
    }

    /// Place a new item `id` at visual index `destination` (0..=len).
    pub fn insert_at(
        &self,
        items: &[OrderedKey],
        id: Uuid,
        destination: usize,
    ) -> Result<KeyAssignment, SequenceError> {
        check_strictly_increasing(items)?;
        if items.iter().any(|it| it.id == id) {
            return Err(SequenceError::DuplicateItem { id });
        }
        if destination > items.len() {
            return Err(SequenceError::DestinationOutOfRange {
                destination,
                max: items.len(),
            });
        }
        self.place(items, id, destination)
    }

    /// Move existing item `id` so that it ends up at visual index
    /// `destination` (0..len). Only `id`'s key changes unless the
    /// neighbours have converged.
    pub fn reorder(
        &self,
        items: &[OrderedKey],
        id: Uuid,
        destination: usize,
    ) -> Result<KeyAssignment, SequenceError> {
        check_strictly_increasing(items)?;
        let source = items
            .iter()
            .position(|it| it.id == id)
            .ok_or(SequenceError::UnknownItem { id })?;
        if destination >= items.len() {
            return Err(SequenceError::DestinationOutOfRange {
                destination,
                max: items.len().saturating_sub(1),
            });
        }
        if source == destination {
            return Ok(KeyAssignment::Single {
                id,
                order_key: items[source].order_key,
            });
        }

        let mut rest: Vec<OrderedKey> = items.to_vec();
        rest.remove(source);
        self.place(&rest, id, destination)
    }

    /// Keys `gap, 2*gap, ...` for `len` items.
    pub fn renumbered_keys(&self, len: usize) -> Result<Vec<i64>, SequenceError> {
        (1..=len)
            .map(|i| {
                i64::try_from(i)
                    .ok()
                    .and_then(|i| i.checked_mul(self.gap))
                    .ok_or(SequenceError::KeySpaceExhausted { len, gap: self.gap })
            })
            .collect()
    }

    /// `rest` excludes the item being placed.
    fn place(
        &self,
        rest: &[OrderedKey],
        id: Uuid,
        destination: usize,
    ) -> Result<KeyAssignment, SequenceError> {
        let rest_keys: Vec<i64> = rest.iter().map(|it| it.order_key).collect();
        if let Some(order_key) = self.key_between(&rest_keys, destination) {
            return Ok(KeyAssignment::Single { id, order_key });
        }

        // Converged: renumber everything else in visual order, then place.
        let renumbered = self.renumbered_keys(rest.len())?;
        let order_key = self.key_between(&renumbered, destination).ok_or(
            SequenceError::KeySpaceExhausted {
                len: rest.len() + 1,
                gap: self.gap,
            },
        )?;

        let mut order_keys: BTreeMap<Uuid, i64> = rest
            .iter()
            .zip(renumbered.iter())
            .map(|(it, key)| (it.id, *key))
            .collect();
        order_keys.insert(id, order_key);
        Ok(KeyAssignment::Renumbered { order_keys })
    }

    /// `None` when there is no integer room at `destination`.
    fn key_between(&self, keys: &[i64], destination: usize) -> Option<i64> {
        match (destination.checked_sub(1).and_then(|i| keys.get(i)), keys.get(destination)) {
            (None, None) => Some(self.gap),
            (None, Some(first)) => first.checked_sub(self.gap),
            (Some(last), None) => last.checked_add(self.gap),
            (Some(&lo), Some(&hi)) => {
                let mid = (i128::from(lo) + i128::from(hi)).div_euclid(2) as i64;
                (mid != lo).then_some(mid)
            }
        }
    }
}

fn check_strictly_increasing(items: &[OrderedKey]) -> Result<(), SequenceError> {
    for (i, pair) in items.windows(2).enumerate() {
        if pair[1].order_key <= pair[0].order_key {
            return Err(SequenceError::KeysNotStrictlyIncreasing { index: i + 1 });
        }
    }
    Ok(())
}
