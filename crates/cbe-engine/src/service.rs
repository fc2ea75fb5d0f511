use std::collections::BTreeMap;

use anyhow::Result;
use cbe_audit::{
    verify_entries, ChainedRecord, ChangeRecord, EditSession, EntityRef,
    FieldDescriptor, Snapshot, VerifyResult,
};
use cbe_schedule::{MilestoneScheduler, Schedule, ScheduleConfig, ScheduleRequest};
use cbe_schemas::{DocumentTotals, ErrorClass, LineItem, PaymentEvent};
use cbe_sequencer::{KeyAssignment, OrderedKey, Sequencer, SequencerConfig};
use cbe_waterfall::Allocation;
use serde_json::Value;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{BillingStore, Clock, EngineError, LineItemWrite, Version};

/// Component configuration, read from the layered config JSON.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EngineConfig {
    pub sequencer: SequencerConfig,
    pub schedule: ScheduleConfig,
}

impl EngineConfig {
    pub fn from_config_json(cfg: &Value) -> Result<Self> {
        Ok(Self {
            sequencer: SequencerConfig::from_config_json(cfg)?,
            schedule: ScheduleConfig::from_config_json(cfg)?,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewLineItem {
    pub id: Uuid,
    pub description: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReorderOutcome {
    pub assignment: KeyAssignment,
    /// Collection version after the write (unchanged for a no-op move).
    pub version: Version,
}

/// An open edit: the session, the state it was detected against and the
/// full record that will be stored on commit.
#[derive(Clone, Debug)]
pub struct PendingEdit {
    session: EditSession,
    expected_version: Version,
    base: Snapshot,
    proposed: Snapshot,
}

impl PendingEdit {
    pub fn session(&self) -> &EditSession {
        &self.session
    }

    /// Attribution, source, contact info, notes and summary edits go here.
    pub fn session_mut(&mut self) -> &mut EditSession {
        &mut self.session
    }

    pub fn expected_version(&self) -> Version {
        self.expected_version
    }

    pub fn proposed(&self) -> &Snapshot {
        &self.proposed
    }
}

pub struct BillingEngine<S, C> {
    store: S,
    clock: C,
    sequencer: Sequencer,
    scheduler: MilestoneScheduler,
}

fn ordered_keys(items: &[LineItem]) -> Vec<OrderedKey> {
    items
        .iter()
        .map(|it| OrderedKey::new(it.id, it.order_key))
        .collect()
}

/// Keys from `assignment` that differ from the current collection.
fn changed_keys(items: &[OrderedKey], assignment: &KeyAssignment) -> BTreeMap<Uuid, i64> {
    let current: BTreeMap<Uuid, i64> = items.iter().map(|it| (it.id, it.order_key)).collect();
    let proposed: BTreeMap<Uuid, i64> = match assignment {
        KeyAssignment::Single { id, order_key } => BTreeMap::from([(*id, *order_key)]),
        KeyAssignment::Renumbered { order_keys } => order_keys.clone(),
    };
    proposed
        .into_iter()
        .filter(|(id, key)| current.get(id) != Some(key))
        .collect()
}

impl<S: BillingStore, C: Clock> BillingEngine<S, C> {
    pub fn new(store: S, clock: C, config: EngineConfig) -> Result<Self, EngineError> {
        Ok(Self {
            store,
            clock,
            sequencer: Sequencer::from_config(&config.sequencer)?,
            scheduler: MilestoneScheduler::new(config.schedule)?,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Log a failed operation by class and hand the result back unchanged.
    fn observe<T>(
        &self,
        op: &'static str,
        subject: Uuid,
        run: impl FnOnce() -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        let res = run();
        if let Err(e) = &res {
            let class = e.class();
            match class {
                ErrorClass::Consistency => {
                    error!(op, %subject, class = %class, error = %e, "operation failed")
                }
                ErrorClass::Validation | ErrorClass::Conflict => {
                    warn!(op, %subject, class = %class, error = %e, "operation rejected")
                }
            }
        }
        res
    }

    // ---------------------------------------------------------------------
    // Line items
    // ---------------------------------------------------------------------

    /// Move `item_id` to visual index `destination`.
    pub fn reorder(
        &self,
        document_id: Uuid,
        item_id: Uuid,
        destination: usize,
    ) -> Result<ReorderOutcome, EngineError> {
        self.observe("reorder", document_id, || {
            let current = self.store.load_line_items(document_id)?;
            let keys = ordered_keys(&current.value);
            let assignment = self.sequencer.reorder(&keys, item_id, destination)?;

            let order_keys = changed_keys(&keys, &assignment);
            if order_keys.is_empty() {
                return Ok(ReorderOutcome {
                    assignment,
                    version: current.version,
                });
            }
            let touched = order_keys.len();
            let version = self.store.write_line_items(
                document_id,
                current.version,
                LineItemWrite {
                    order_keys,
                    ..LineItemWrite::default()
                },
            )?;

            if assignment.is_renumber() {
                info!(%document_id, %item_id, version, keys = touched, "line items renumbered");
            }
            info!(%document_id, %item_id, destination, version, "line item reordered");
            Ok(ReorderOutcome {
                assignment,
                version,
            })
        })
    }

    /// Insert a new item at `position`, or after the last item when `None`.
    pub fn insert_line_item(
        &self,
        document_id: Uuid,
        new: NewLineItem,
        position: Option<usize>,
    ) -> Result<LineItem, EngineError> {
        self.observe("insert_line_item", document_id, || {
            let current = self.store.load_line_items(document_id)?;
            let keys = ordered_keys(&current.value);
            let assignment = match position {
                Some(p) => self.sequencer.insert_at(&keys, new.id, p)?,
                None => self.sequencer.append(&keys, new.id)?,
            };
            let order_key = assignment
                .key_for(new.id)
                .ok_or_else(|| EngineError::Consistency {
                    reason: format!("placement did not assign a key to {}", new.id),
                })?;
            let item = LineItem::new(
                new.id,
                order_key,
                new.description,
                new.quantity,
                new.unit_price_cents,
            )?;

            let mut order_keys = changed_keys(&keys, &assignment);
            order_keys.remove(&item.id);
            let version = self.store.write_line_items(
                document_id,
                current.version,
                LineItemWrite {
                    order_keys,
                    upsert: vec![item.clone()],
                    remove: Vec::new(),
                },
            )?;

            if assignment.is_renumber() {
                info!(%document_id, item_id = %item.id, version, "line items renumbered");
            }
            info!(%document_id, item_id = %item.id, order_key, version, "line item inserted");
            Ok(item)
        })
    }

    /// Change quantity and unit price; `total_cents` is recomputed.
    pub fn update_line_item(
        &self,
        document_id: Uuid,
        item_id: Uuid,
        quantity: i64,
        unit_price_cents: i64,
    ) -> Result<LineItem, EngineError> {
        self.observe("update_line_item", document_id, || {
            let current = self.store.load_line_items(document_id)?;
            let mut item = current
                .value
                .iter()
                .find(|it| it.id == item_id)
                .cloned()
                .ok_or(EngineError::UnknownLineItem {
                    document_id,
                    item_id,
                })?;
            item.set_quantity(quantity)?;
            item.set_unit_price(unit_price_cents)?;

            let version = self.store.write_line_items(
                document_id,
                current.version,
                LineItemWrite {
                    upsert: vec![item.clone()],
                    ..LineItemWrite::default()
                },
            )?;
            info!(%document_id, %item_id, total_cents = item.total_cents(), version, "line item updated");
            Ok(item)
        })
    }

    pub fn remove_line_item(&self, document_id: Uuid, item_id: Uuid) -> Result<Version, EngineError> {
        self.observe("remove_line_item", document_id, || {
            let current = self.store.load_line_items(document_id)?;
            if !current.value.iter().any(|it| it.id == item_id) {
                return Err(EngineError::UnknownLineItem {
                    document_id,
                    item_id,
                });
            }
            let version = self.store.write_line_items(
                document_id,
                current.version,
                LineItemWrite {
                    remove: vec![item_id],
                    ..LineItemWrite::default()
                },
            )?;
            info!(%document_id, %item_id, version, "line item removed");
            Ok(version)
        })
    }

    // ---------------------------------------------------------------------
    // Schedules and payments
    // ---------------------------------------------------------------------

    fn schedule_request(&self, totals: &DocumentTotals, days_until_due: i64) -> ScheduleRequest {
        ScheduleRequest {
            document_id: totals.document_id,
            total_payable_cents: totals.total_cents,
            days_until_due,
            is_exempt: totals.tax_exempt,
            generated_on: self.clock.today(),
        }
    }

    /// First schedule for a document, from its externally computed totals.
    pub fn generate_schedule(
        &self,
        document_id: Uuid,
        days_until_due: i64,
    ) -> Result<Schedule, EngineError> {
        self.observe("generate_schedule", document_id, || {
            let totals = self.store.load_totals(document_id)?;
            let existing = self.store.load_schedule(document_id)?;
            if existing.value.is_some() {
                return Err(EngineError::ScheduleExists { document_id });
            }
            let payments = self.store.load_payments(document_id)?;
            let schedule = self
                .scheduler
                .generate(&self.schedule_request(&totals, days_until_due))?;
            let version = self.store.replace_schedule(
                document_id,
                existing.version,
                payments.version,
                schedule.clone(),
            )?;
            info!(
                %document_id,
                version,
                tier = %schedule.tier,
                milestones = schedule.milestones.len(),
                "schedule generated"
            );
            Ok(schedule)
        })
    }

    /// Replace the whole schedule. Refused while any payment is applied,
    /// including one recorded after the payments were read.
    pub fn regenerate_schedule(
        &self,
        document_id: Uuid,
        days_until_due: i64,
    ) -> Result<Schedule, EngineError> {
        self.observe("regenerate_schedule", document_id, || {
            let totals = self.store.load_totals(document_id)?;
            let existing = self.store.load_schedule(document_id)?;
            let current = existing
                .value
                .as_ref()
                .ok_or(EngineError::NoSchedule { document_id })?;
            let payments = self.store.load_payments(document_id)?;
            let paid = cbe_waterfall::completed_total(&payments.value)?;

            let schedule = self.scheduler.regenerate(
                current,
                paid,
                &self.schedule_request(&totals, days_until_due),
            )?;
            let version = self.store.replace_schedule(
                document_id,
                existing.version,
                payments.version,
                schedule.clone(),
            )?;
            info!(
                %document_id,
                version,
                revision = schedule.revision,
                tier = %schedule.tier,
                "schedule regenerated"
            );
            Ok(schedule)
        })
    }

    pub fn schedule(&self, document_id: Uuid) -> Result<Option<Schedule>, EngineError> {
        Ok(self.store.load_schedule(document_id)?.value)
    }

    pub fn record_payment(&self, document_id: Uuid, event: PaymentEvent) -> Result<(), EngineError> {
        self.observe("record_payment", document_id, || {
            cbe_waterfall::completed_total(std::slice::from_ref(&event))?;
            let payment_id = event.id;
            let amount_cents = event.amount_cents;
            let version = self.store.append_payment(document_id, event)?;
            info!(%document_id, %payment_id, amount_cents, version, "payment recorded");
            Ok(())
        })
    }

    /// Current waterfall over completed payments. Computed on every read.
    pub fn allocation(&self, document_id: Uuid) -> Result<Allocation, EngineError> {
        self.observe("allocation", document_id, || {
            let schedule = self
                .store
                .load_schedule(document_id)?
                .value
                .ok_or(EngineError::NoSchedule { document_id })?;
            let payments = self.store.load_payments(document_id)?;
            Ok(cbe_waterfall::allocate_events(
                &schedule.milestones,
                &payments.value,
            )?)
        })
    }

    // ---------------------------------------------------------------------
    // Change audit trail
    // ---------------------------------------------------------------------

    /// Detect changes of `entity` against its stored tracked state.
    pub fn begin_edit(
        &self,
        entity: EntityRef,
        document_id: Option<Uuid>,
        proposed: &Snapshot,
        fields: &[FieldDescriptor],
    ) -> Result<PendingEdit, EngineError> {
        let subject = entity.entity_id;
        self.observe("begin_edit", subject, || {
            let current = self.store.load_tracked(&entity)?;
            let mut session = EditSession::new(Uuid::new_v4(), entity, document_id);
            session.detect(&current.value, proposed, fields)?;
            Ok(PendingEdit {
                session,
                expected_version: current.version,
                base: current.value,
                proposed: proposed.clone(),
            })
        })
    }

    /// Append the change records and store the proposed record in one store
    /// call. Untracked fields are stored too, with no change records. The
    /// session is only marked committed if that call succeeds.
    pub fn commit_edit(&self, edit: &mut PendingEdit) -> Result<Vec<ChangeRecord>, EngineError> {
        let entity = edit.session.entity().clone();
        self.observe("commit_edit", entity.entity_id, || {
            let at = self.clock.now();
            let expected = edit.expected_version;
            let unchanged = edit.proposed == edit.base;
            let next = edit.proposed.clone();

            let records = edit.session.commit_with(at, |records| {
                if records.is_empty() && unchanged {
                    return Ok(());
                }
                self.store.commit_change(&entity, expected, next, records)?;
                Ok::<(), EngineError>(())
            })?;

            info!(
                entity_type = %entity.entity_type,
                entity_id = %entity.entity_id,
                records = records.len(),
                "change committed"
            );
            Ok(records)
        })
    }

    pub fn abandon_edit(&self, edit: &mut PendingEdit) -> Result<(), EngineError> {
        edit.session.abandon()?;
        Ok(())
    }

    pub fn change_log(&self) -> Result<Vec<ChainedRecord>, EngineError> {
        Ok(self.store.change_log()?)
    }

    pub fn verify_change_log(&self) -> Result<VerifyResult, EngineError> {
        let entries = self.store.change_log()?;
        let verdict = verify_entries(&entries, self.store.change_log_hashed()).map_err(|e| {
            EngineError::Consistency {
                reason: format!("{e:#}"),
            }
        })?;
        if let VerifyResult::Broken { line, reason } = &verdict {
            error!(entry = *line, %reason, "change log hash chain broken");
        }
        Ok(verdict)
    }
}
