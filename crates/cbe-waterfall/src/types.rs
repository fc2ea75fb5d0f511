use cbe_schemas::{ErrorClass, PaymentMilestone};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MilestoneStatus {
    /// Nothing applied yet.
    Unpaid,
    /// `0 < applied < amount`.
    Partial,
    /// `remaining == 0`.
    Satisfied,
}

impl MilestoneStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MilestoneStatus::Unpaid => "unpaid",
            MilestoneStatus::Partial => "partial",
            MilestoneStatus::Satisfied => "satisfied",
        }
    }
}

/// A milestone enriched with its share of the paid pool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocatedMilestone {
    #[serde(flatten)]
    pub milestone: PaymentMilestone,
    pub applied_cents: i64,
    pub remaining_cents: i64,
    pub status: MilestoneStatus,
}

/// Full allocation result, milestones in `sequence_index` order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub milestones: Vec<AllocatedMilestone>,
    pub total_paid_cents: i64,
    /// `sum(applied_cents)`.
    pub allocated_cents: i64,
    /// Paid beyond the whole schedule; the caller reports it as a credit.
    pub unallocated_credit_cents: i64,
    /// `sum(remaining_cents)`.
    pub outstanding_cents: i64,
}

impl Allocation {
    /// First milestone (in waterfall order) that still has a remainder.
    pub fn next_due(&self) -> Option<&AllocatedMilestone> {
        self.milestones.iter().find(|m| m.remaining_cents > 0)
    }

    pub fn is_fully_paid(&self) -> bool {
        self.outstanding_cents == 0
    }

    pub fn has_credit(&self) -> bool {
        self.unallocated_credit_cents > 0
    }

    /// First milestone carrying any applied money.
    pub fn first_applied(&self) -> Option<&AllocatedMilestone> {
        self.milestones.iter().find(|m| m.applied_cents > 0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum AllocationError {
    #[error("allocation: total_paid_cents must be >= 0, got {total_paid_cents}")]
    NegativePaidTotal { total_paid_cents: i64 },
    #[error("allocation: milestone {milestone_id} has negative amount_cents {amount_cents}")]
    NegativeAmount { milestone_id: Uuid, amount_cents: i64 },
    #[error("allocation: sequence_index {sequence_index} appears more than once")]
    DuplicateSequenceIndex { sequence_index: u32 },
    #[error("allocation: payment {payment_id} has non-positive amount_cents {amount_cents}")]
    NonPositivePayment { payment_id: Uuid, amount_cents: i64 },
    #[error("allocation: summing amounts overflows i64")]
    AmountOverflow,
}

impl AllocationError {
    pub fn class(&self) -> ErrorClass {
        ErrorClass::Validation
    }
}
