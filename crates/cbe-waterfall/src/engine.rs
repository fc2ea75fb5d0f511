use std::collections::BTreeSet;

use cbe_schemas::{PaymentEvent, PaymentMilestone};

use crate::{AllocatedMilestone, Allocation, AllocationError, MilestoneStatus};

/// Sum of all `completed` payment events. Other statuses are ignored.
///
/// Every event must carry a positive amount, whatever its status; events are
/// append-only facts and a non-positive one means the feed is malformed.
pub fn completed_total(events: &[PaymentEvent]) -> Result<i64, AllocationError> {
    let mut total: i64 = 0;
    for ev in events {
        if ev.amount_cents <= 0 {
            return Err(AllocationError::NonPositivePayment {
                payment_id: ev.id,
                amount_cents: ev.amount_cents,
            });
        }
        if ev.is_completed() {
            total = total
                .checked_add(ev.amount_cents)
                .ok_or(AllocationError::AmountOverflow)?;
        }
    }
    Ok(total)
}

/// Allocate `total_paid_cents` across `milestones` in `sequence_index` order.
///
/// Input order of `milestones` does not matter.
pub fn allocate(
    milestones: &[PaymentMilestone],
    total_paid_cents: i64,
) -> Result<Allocation, AllocationError> {
    if total_paid_cents < 0 {
        return Err(AllocationError::NegativePaidTotal { total_paid_cents });
    }

    let mut seen: BTreeSet<u32> = BTreeSet::new();
    for m in milestones {
        if m.amount_cents < 0 {
            return Err(AllocationError::NegativeAmount {
                milestone_id: m.id,
                amount_cents: m.amount_cents,
            });
        }
        if !seen.insert(m.sequence_index) {
            return Err(AllocationError::DuplicateSequenceIndex {
                sequence_index: m.sequence_index,
            });
        }
    }

    let mut ordered: Vec<&PaymentMilestone> = milestones.iter().collect();
    ordered.sort_by_key(|m| m.sequence_index);

    let mut pool = total_paid_cents;
    let mut allocated: i64 = 0;
    let mut outstanding: i64 = 0;
    let mut out = Vec::with_capacity(ordered.len());

    for m in ordered {
        let applied = pool.min(m.amount_cents);
        pool -= applied;
        let remaining = m.amount_cents - applied;

        allocated += applied;
        outstanding = outstanding
            .checked_add(remaining)
            .ok_or(AllocationError::AmountOverflow)?;

        let status = if remaining == 0 {
            MilestoneStatus::Satisfied
        } else if applied > 0 {
            MilestoneStatus::Partial
        } else {
            MilestoneStatus::Unpaid
        };

        out.push(AllocatedMilestone {
            milestone: m.clone(),
            applied_cents: applied,
            remaining_cents: remaining,
            status,
        });
    }

    Ok(Allocation {
        milestones: out,
        total_paid_cents,
        allocated_cents: allocated,
        unallocated_credit_cents: pool,
        outstanding_cents: outstanding,
    })
}

/// [`completed_total`] followed by [`allocate`].
pub fn allocate_events(
    milestones: &[PaymentMilestone],
    events: &[PaymentEvent],
) -> Result<Allocation, AllocationError> {
    allocate(milestones, completed_total(events)?)
}
