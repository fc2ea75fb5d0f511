use cbe_schemas::{derive_id, MilestoneKind, PaymentMilestone};
use chrono::{Days, NaiveDate};

use crate::{
    DueRule, MilestoneSplit, Schedule, ScheduleConfig, ScheduleError, ScheduleRequest,
    NET_TERM_TIER,
};

#[derive(Clone, Debug)]
pub struct MilestoneScheduler {
    config: ScheduleConfig,
}

impl Default for MilestoneScheduler {
    fn default() -> Self {
        Self {
            config: ScheduleConfig::default(),
        }
    }
}

impl MilestoneScheduler {
    pub fn new(config: ScheduleConfig) -> Result<Self, ScheduleError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ScheduleConfig {
        &self.config
    }

    /// First schedule for a document (revision 0).
    pub fn generate(&self, req: &ScheduleRequest) -> Result<Schedule, ScheduleError> {
        self.build(req, 0)
    }

    /// Replace `existing` with a freshly generated schedule.
    ///
    /// Refuses with [`ScheduleError::AlreadyReconciled`] (a conflict) if the
    /// waterfall puts any of `total_paid_cents` on an existing milestone.
    pub fn regenerate(
        &self,
        existing: &Schedule,
        total_paid_cents: i64,
        req: &ScheduleRequest,
    ) -> Result<Schedule, ScheduleError> {
        if existing.document_id != req.document_id {
            return Err(ScheduleError::DocumentMismatch {
                existing: existing.document_id,
                requested: req.document_id,
            });
        }
        let allocation = cbe_waterfall::allocate(&existing.milestones, total_paid_cents)?;
        if let Some(m) = allocation.first_applied() {
            return Err(ScheduleError::AlreadyReconciled {
                milestone_id: m.milestone.id,
                applied_cents: m.applied_cents,
            });
        }
        self.build(req, existing.revision.saturating_add(1))
    }

    fn build(&self, req: &ScheduleRequest, revision: u32) -> Result<Schedule, ScheduleError> {
        if req.total_payable_cents < 0 {
            return Err(ScheduleError::NegativeTotal {
                total_payable_cents: req.total_payable_cents,
            });
        }
        if req.days_until_due < 0 {
            return Err(ScheduleError::NegativeLeadTime {
                days_until_due: req.days_until_due,
            });
        }

        let event_date = add_days(req.generated_on, req.days_until_due)?;

        let (tier, milestones) = if req.is_exempt {
            let due = add_days(req.generated_on, self.config.net_term_days)?;
            let only = PaymentMilestone {
                id: milestone_id(req, revision, 0),
                kind: MilestoneKind::NetTerm,
                percentage: 100,
                amount_cents: req.total_payable_cents,
                due_date: Some(due),
                sequence_index: 0,
            };
            (NET_TERM_TIER.to_string(), vec![only])
        } else {
            let tier = self
                .config
                .tier_for(req.days_until_due)
                .ok_or(ScheduleError::NoTier {
                    days_until_due: req.days_until_due,
                })?;
            let milestones = self.split(req, revision, event_date, &tier.splits)?;
            (tier.name.clone(), milestones)
        };

        let schedule = Schedule {
            document_id: req.document_id,
            revision,
            tier,
            tax_exempt: req.is_exempt,
            generated_on: req.generated_on,
            event_date,
            total_payable_cents: req.total_payable_cents,
            milestones,
        };

        let scheduled_cents = schedule.scheduled_cents();
        if scheduled_cents != req.total_payable_cents {
            return Err(ScheduleError::Unreconciled {
                total_payable_cents: req.total_payable_cents,
                scheduled_cents,
            });
        }
        Ok(schedule)
    }

    fn split(
        &self,
        req: &ScheduleRequest,
        revision: u32,
        event_date: NaiveDate,
        splits: &[MilestoneSplit],
    ) -> Result<Vec<PaymentMilestone>, ScheduleError> {
        let total = req.total_payable_cents;
        let last = splits.len().saturating_sub(1);
        let mut assigned: i64 = 0;
        let mut out = Vec::with_capacity(splits.len());

        for (i, split) in splits.iter().enumerate() {
            let amount_cents = if i == last {
                let residual = total - assigned;
                if residual < 0 {
                    return Err(ScheduleError::NegativeResidual {
                        amount_cents: residual,
                    });
                }
                residual
            } else {
                let share = percent_of(total, split.percentage);
                assigned += share;
                share
            };

            out.push(PaymentMilestone {
                id: milestone_id(req, revision, i as u32),
                kind: split.kind,
                percentage: split.percentage,
                amount_cents,
                due_date: self.due_date(req, event_date, split.due)?,
                sequence_index: i as u32,
            });
        }
        Ok(out)
    }

    fn due_date(
        &self,
        req: &ScheduleRequest,
        event_date: NaiveDate,
        rule: DueRule,
    ) -> Result<Option<NaiveDate>, ScheduleError> {
        match rule {
            DueRule::Immediate => Ok(None),
            DueRule::Midpoint => add_days(req.generated_on, req.days_until_due / 2).map(Some),
            DueRule::BeforeEvent => {
                let lead = req.days_until_due.min(self.config.days_before_event);
                event_date
                    .checked_sub_days(Days::new(lead.unsigned_abs()))
                    .map(Some)
                    .ok_or(ScheduleError::DateOutOfRange {
                        from: event_date,
                        days: -lead,
                    })
            }
        }
    }
}

/// `round_half_up(total * pct / 100)` in integer cents. `total >= 0`.
fn percent_of(total: i64, pct: u8) -> i64 {
    let scaled = i128::from(total) * i128::from(pct);
    ((scaled + 50) / 100) as i64
}

fn add_days(from: NaiveDate, days: i64) -> Result<NaiveDate, ScheduleError> {
    u64::try_from(days)
        .ok()
        .and_then(|d| from.checked_add_days(Days::new(d)))
        .ok_or(ScheduleError::DateOutOfRange { from, days })
}

fn milestone_id(req: &ScheduleRequest, revision: u32, seq: u32) -> uuid::Uuid {
    derive_id(req.document_id, &format!("milestone/{revision}/{seq}"))
}
