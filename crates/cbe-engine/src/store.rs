use std::collections::BTreeMap;

use cbe_audit::{ChainedRecord, ChangeRecord, EntityRef, Snapshot};
use cbe_schedule::Schedule;
use cbe_schemas::{DocumentTotals, LineItem, PaymentEvent};
use uuid::Uuid;

use crate::StoreError;

/// Per-collection optimistic concurrency token. A collection that was never
/// written reads as version 0.
pub type Version = u64;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Versioned<T> {
    pub version: Version,
    pub value: T,
}

/// One atomic change to a document's line items, applied as
/// remove, then upsert, then re-key.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LineItemWrite {
    /// New `order_key` per item (existing or just upserted).
    pub order_keys: BTreeMap<Uuid, i64>,
    /// Inserted or replaced items (matched by id).
    pub upsert: Vec<LineItem>,
    pub remove: Vec<Uuid>,
}

impl LineItemWrite {
    pub fn is_empty(&self) -> bool {
        self.order_keys.is_empty() && self.upsert.is_empty() && self.remove.is_empty()
    }
}

/// Storage capability the engine runs against.
///
/// Every `write_*` / `replace_*` / `commit_*` call is atomic and succeeds only
/// if the collection is still at `expected`; it returns the new version.
/// Line item writes must keep `order_key` distinct within a document.
/// Implementations without multi-row transactions must persist the change
/// records before the mutation in `commit_change`, and the mutation must be
/// idempotent.
pub trait BillingStore: Send + Sync {
    fn load_line_items(&self, document_id: Uuid) -> Result<Versioned<Vec<LineItem>>, StoreError>;

    fn write_line_items(
        &self,
        document_id: Uuid,
        expected: Version,
        write: LineItemWrite,
    ) -> Result<Version, StoreError>;

    /// Externally computed figures; the engine never writes them.
    fn load_totals(&self, document_id: Uuid) -> Result<DocumentTotals, StoreError>;

    /// Version 0 with `None` when no schedule exists yet.
    fn load_schedule(&self, document_id: Uuid) -> Result<Versioned<Option<Schedule>>, StoreError>;

    /// Succeeds only if the schedule is still at `expected` and the payments
    /// are still at `payments_seen`.
    fn replace_schedule(
        &self,
        document_id: Uuid,
        expected: Version,
        payments_seen: Version,
        schedule: Schedule,
    ) -> Result<Version, StoreError>;

    fn load_payments(&self, document_id: Uuid) -> Result<Versioned<Vec<PaymentEvent>>, StoreError>;

    /// Append-only; a repeated payment id is rejected. Returns the new
    /// payments version.
    fn append_payment(&self, document_id: Uuid, event: PaymentEvent) -> Result<Version, StoreError>;

    fn load_tracked(&self, entity: &EntityRef) -> Result<Versioned<Snapshot>, StoreError>;

    /// Append `records` to the change log and store `snapshot` as the
    /// entity's new tracked state, as one unit. `records` may be empty when
    /// only untracked fields changed.
    fn commit_change(
        &self,
        entity: &EntityRef,
        expected: Version,
        snapshot: Snapshot,
        records: &[ChangeRecord],
    ) -> Result<Version, StoreError>;

    fn change_log(&self) -> Result<Vec<ChainedRecord>, StoreError>;

    /// Whether change log entries are hash-chained.
    fn change_log_hashed(&self) -> bool;
}
