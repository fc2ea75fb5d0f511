//! Mutex-guarded in-memory [`BillingStore`].
//!
//! Each trait call takes the lock once, so every write is atomic and
//! version checks cannot race. The change log is a [`ChangeChain`] living
//! next to the tracked records it describes.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use cbe_audit::{ChainedRecord, ChangeChain, ChangeRecord, EntityRef, Snapshot};
use cbe_schedule::Schedule;
use cbe_schemas::{DocumentTotals, LineItem, PaymentEvent};
use uuid::Uuid;

use crate::{BillingStore, LineItemWrite, StoreError, Version, Versioned};

struct Inner {
    line_items: BTreeMap<Uuid, Versioned<Vec<LineItem>>>,
    totals: BTreeMap<Uuid, DocumentTotals>,
    schedules: BTreeMap<Uuid, Versioned<Option<Schedule>>>,
    payments: BTreeMap<Uuid, Versioned<Vec<PaymentEvent>>>,
    tracked: BTreeMap<EntityRef, Versioned<Snapshot>>,
    chain: ChangeChain,
}

pub struct MemoryStore {
    inner: Mutex<Inner>,
    hash_chain: bool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(true)
    }
}

fn check_version(collection: String, expected: Version, actual: Version) -> Result<(), StoreError> {
    if expected == actual {
        Ok(())
    } else {
        Err(StoreError::VersionConflict {
            collection,
            expected,
            actual,
        })
    }
}

impl MemoryStore {
    pub fn new(hash_chain: bool) -> Self {
        Self {
            inner: Mutex::new(Inner {
                line_items: BTreeMap::new(),
                totals: BTreeMap::new(),
                schedules: BTreeMap::new(),
                payments: BTreeMap::new(),
                tracked: BTreeMap::new(),
                chain: ChangeChain::new(hash_chain),
            }),
            hash_chain,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner.lock().map_err(|_| StoreError::Backend {
            reason: "memory store lock poisoned".to_string(),
        })
    }

    /// Set the externally computed totals of a document.
    pub fn put_totals(&self, totals: DocumentTotals) -> Result<(), StoreError> {
        self.lock()?.totals.insert(totals.document_id, totals);
        Ok(())
    }

    /// Seed or overwrite an entity's tracked record outside the change log.
    pub fn put_tracked(&self, entity: EntityRef, snapshot: Snapshot) -> Result<Version, StoreError> {
        let mut inner = self.lock()?;
        let slot = inner.tracked.entry(entity).or_insert(Versioned {
            version: 0,
            value: Snapshot::new(),
        });
        slot.version += 1;
        slot.value = snapshot;
        Ok(slot.version)
    }

    pub fn tracked_snapshot(&self, entity: &EntityRef) -> Result<Option<Snapshot>, StoreError> {
        Ok(self.lock()?.tracked.get(entity).map(|v| v.value.clone()))
    }
}

impl BillingStore for MemoryStore {
    fn load_line_items(&self, document_id: Uuid) -> Result<Versioned<Vec<LineItem>>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .line_items
            .get(&document_id)
            .cloned()
            .unwrap_or(Versioned {
                version: 0,
                value: Vec::new(),
            }))
    }

    fn write_line_items(
        &self,
        document_id: Uuid,
        expected: Version,
        write: LineItemWrite,
    ) -> Result<Version, StoreError> {
        let mut inner = self.lock()?;
        let slot = inner.line_items.entry(document_id).or_insert(Versioned {
            version: 0,
            value: Vec::new(),
        });
        check_version(format!("line_items/{document_id}"), expected, slot.version)?;

        // Stage on a copy so a bad write leaves the collection untouched.
        let mut items = slot.value.clone();
        items.retain(|it| !write.remove.contains(&it.id));
        for new in write.upsert {
            match items.iter_mut().find(|it| it.id == new.id) {
                Some(existing) => *existing = new,
                None => items.push(new),
            }
        }
        for (id, key) in &write.order_keys {
            let item = items
                .iter_mut()
                .find(|it| it.id == *id)
                .ok_or_else(|| StoreError::NotFound {
                    what: "line item",
                    id: id.to_string(),
                })?;
            item.order_key = *key;
        }
        items.sort_by_key(|it| it.order_key);
        if let Some(pair) = items.windows(2).find(|w| w[0].order_key == w[1].order_key) {
            return Err(StoreError::DuplicateOrderKey {
                document_id,
                order_key: pair[0].order_key,
            });
        }

        slot.value = items;
        slot.version += 1;
        Ok(slot.version)
    }

    fn load_totals(&self, document_id: Uuid) -> Result<DocumentTotals, StoreError> {
        self.lock()?
            .totals
            .get(&document_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                what: "document totals",
                id: document_id.to_string(),
            })
    }

    fn load_schedule(&self, document_id: Uuid) -> Result<Versioned<Option<Schedule>>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .schedules
            .get(&document_id)
            .cloned()
            .unwrap_or(Versioned {
                version: 0,
                value: None,
            }))
    }

    fn replace_schedule(
        &self,
        document_id: Uuid,
        expected: Version,
        payments_seen: Version,
        schedule: Schedule,
    ) -> Result<Version, StoreError> {
        let mut inner = self.lock()?;
        let payments = inner.payments.get(&document_id).map_or(0, |p| p.version);
        check_version(format!("payments/{document_id}"), payments_seen, payments)?;
        let slot = inner.schedules.entry(document_id).or_insert(Versioned {
            version: 0,
            value: None,
        });
        check_version(format!("schedule/{document_id}"), expected, slot.version)?;
        slot.value = Some(schedule);
        slot.version += 1;
        Ok(slot.version)
    }

    fn load_payments(&self, document_id: Uuid) -> Result<Versioned<Vec<PaymentEvent>>, StoreError> {
        Ok(self
            .lock()?
            .payments
            .get(&document_id)
            .cloned()
            .unwrap_or(Versioned {
                version: 0,
                value: Vec::new(),
            }))
    }

    fn append_payment(&self, document_id: Uuid, event: PaymentEvent) -> Result<Version, StoreError> {
        let mut inner = self.lock()?;
        let slot = inner.payments.entry(document_id).or_insert(Versioned {
            version: 0,
            value: Vec::new(),
        });
        if slot.value.iter().any(|e| e.id == event.id) {
            return Err(StoreError::DuplicatePayment { payment_id: event.id });
        }
        slot.value.push(event);
        slot.version += 1;
        Ok(slot.version)
    }

    fn load_tracked(&self, entity: &EntityRef) -> Result<Versioned<Snapshot>, StoreError> {
        self.lock()?
            .tracked
            .get(entity)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                what: "tracked record",
                id: format!("{}/{}", entity.entity_type, entity.entity_id),
            })
    }

    fn commit_change(
        &self,
        entity: &EntityRef,
        expected: Version,
        snapshot: Snapshot,
        records: &[ChangeRecord],
    ) -> Result<Version, StoreError> {
        let mut inner = self.lock()?;
        let actual = inner.tracked.get(entity).map_or(0, |v| v.version);
        check_version(
            format!("tracked/{}/{}", entity.entity_type, entity.entity_id),
            expected,
            actual,
        )?;

        let linked = inner
            .chain
            .link_batch(records)
            .map_err(|e| StoreError::Backend {
                reason: format!("{e:#}"),
            })?;
        inner.chain.extend_linked(linked);

        let slot = inner.tracked.entry(entity.clone()).or_insert(Versioned {
            version: 0,
            value: Snapshot::new(),
        });
        slot.value = snapshot;
        slot.version += 1;
        Ok(slot.version)
    }

    fn change_log(&self) -> Result<Vec<ChainedRecord>, StoreError> {
        Ok(self.lock()?.chain.entries().to_vec())
    }

    fn change_log_hashed(&self) -> bool {
        self.hash_chain
    }
}
