use cbe_schemas::{ErrorClass, PaymentMilestone};
use cbe_waterfall::AllocationError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tier label used for exempt contracts.
pub const NET_TERM_TIER: &str = "NET_TERM";

/// Input for one generation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleRequest {
    pub document_id: Uuid,
    pub total_payable_cents: i64,
    /// Lead time from `generated_on` to the contractual event / due date.
    pub days_until_due: i64,
    pub is_exempt: bool,
    pub generated_on: NaiveDate,
}

/// A generated schedule. `revision` starts at 0 and increments on every
/// regeneration; milestone ids are derived from `(document_id, revision, seq)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub document_id: Uuid,
    pub revision: u32,
    pub tier: String,
    pub tax_exempt: bool,
    pub generated_on: NaiveDate,
    pub event_date: NaiveDate,
    pub total_payable_cents: i64,
    pub milestones: Vec<PaymentMilestone>,
}

impl Schedule {
    pub fn scheduled_cents(&self) -> i64 {
        self.milestones.iter().map(|m| m.amount_cents).sum()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    #[error("schedule: total_payable_cents must be >= 0, got {total_payable_cents}")]
    NegativeTotal { total_payable_cents: i64 },
    #[error("schedule: days_until_due must be >= 0, got {days_until_due}")]
    NegativeLeadTime { days_until_due: i64 },
    #[error("schedule: tier {tier} is invalid: {reason}")]
    InvalidTier { tier: String, reason: String },
    #[error("schedule: no tier covers a lead time of {days_until_due} days")]
    NoTier { days_until_due: i64 },
    #[error("schedule: date arithmetic out of range from {from} by {days} days")]
    DateOutOfRange { from: NaiveDate, days: i64 },
    #[error("schedule: regeneration targets document {requested} but schedule belongs to {existing}")]
    DocumentMismatch { existing: Uuid, requested: Uuid },
    #[error(
        "schedule: refusing to regenerate; milestone {milestone_id} already has {applied_cents} cents applied"
    )]
    AlreadyReconciled { milestone_id: Uuid, applied_cents: i64 },
    #[error("schedule: milestone amounts sum to {scheduled_cents}, expected {total_payable_cents}")]
    Unreconciled {
        total_payable_cents: i64,
        scheduled_cents: i64,
    },
    #[error("schedule: rounding left the last milestone at {amount_cents} cents")]
    NegativeResidual { amount_cents: i64 },
    #[error(transparent)]
    Allocation(#[from] AllocationError),
}

impl ScheduleError {
    pub fn class(&self) -> ErrorClass {
        match self {
            ScheduleError::AlreadyReconciled { .. } => ErrorClass::Conflict,
            ScheduleError::Unreconciled { .. } | ScheduleError::NegativeResidual { .. } => {
                ErrorClass::Consistency
            }
            ScheduleError::Allocation(e) => e.class(),
            _ => ErrorClass::Validation,
        }
    }
}
