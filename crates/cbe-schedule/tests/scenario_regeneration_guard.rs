//! Regeneration refuses to touch reconciled money
//!
//! GREEN when:
//! - an unpaid schedule regenerates with a bumped revision and fresh ids
//! - any applied payment makes regeneration a conflict naming the milestone
//! - a request for another document is rejected

use cbe_schedule::{MilestoneScheduler, ScheduleError, ScheduleRequest};
use cbe_schemas::ErrorClass;
use chrono::NaiveDate;
use uuid::Uuid;

fn req(total: i64, days: i64) -> ScheduleRequest {
    ScheduleRequest {
        document_id: Uuid::from_u128(5),
        total_payable_cents: total,
        days_until_due: days,
        is_exempt: false,
        generated_on: NaiveDate::from_ymd_opt(2026, 6, 1).unwrap(),
    }
}

#[test]
fn unpaid_schedule_regenerates_with_new_revision() {
    let sched = MilestoneScheduler::default();
    let first = sched.generate(&req(10_000, 45)).unwrap();
    let second = sched.regenerate(&first, 0, &req(12_000, 20)).unwrap();

    assert_eq!(second.revision, 1);
    assert_eq!(second.tier, "SHORT");
    assert_eq!(second.scheduled_cents(), 12_000);
    assert!(second
        .milestones
        .iter()
        .all(|m| first.milestones.iter().all(|f| f.id != m.id)));
}

#[test]
fn any_applied_payment_blocks_regeneration() {
    let sched = MilestoneScheduler::default();
    let first = sched.generate(&req(10_000, 45)).unwrap();
    let err = sched.regenerate(&first, 1, &req(12_000, 45)).unwrap_err();
    assert_eq!(
        err,
        ScheduleError::AlreadyReconciled {
            milestone_id: first.milestones[0].id,
            applied_cents: 1,
        }
    );
    assert_eq!(err.class(), ErrorClass::Conflict);
}

#[test]
fn regeneration_for_another_document_is_rejected() {
    let sched = MilestoneScheduler::default();
    let first = sched.generate(&req(10_000, 45)).unwrap();
    let mut other = req(10_000, 45);
    other.document_id = Uuid::from_u128(6);
    assert!(matches!(
        sched.regenerate(&first, 0, &other),
        Err(ScheduleError::DocumentMismatch { .. })
    ));
}
