//! Invalid allocation input is rejected, never clamped

use cbe_schemas::{ErrorClass, MilestoneKind, PaymentEvent, PaymentMilestone, PaymentStatus};
use cbe_waterfall::{allocate, allocate_events, completed_total, AllocationError};
use chrono::{TimeZone, Utc};
use uuid::Uuid;

fn m(n: u128, amount: i64, seq: u32) -> PaymentMilestone {
    PaymentMilestone {
        id: Uuid::from_u128(n),
        kind: MilestoneKind::Deposit,
        percentage: 50,
        amount_cents: amount,
        due_date: None,
        sequence_index: seq,
    }
}

fn ev(n: u128, amount: i64, status: PaymentStatus) -> PaymentEvent {
    PaymentEvent {
        id: Uuid::from_u128(n),
        amount_cents: amount,
        occurred_at: Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap(),
        status,
    }
}

#[test]
fn negative_paid_total_is_validation_error() {
    let err = allocate(&[m(1, 100, 0)], -1).unwrap_err();
    assert_eq!(err, AllocationError::NegativePaidTotal { total_paid_cents: -1 });
    assert_eq!(err.class(), ErrorClass::Validation);
}

#[test]
fn negative_amount_and_duplicate_sequence_rejected() {
    assert!(matches!(
        allocate(&[m(1, -5, 0)], 0),
        Err(AllocationError::NegativeAmount { .. })
    ));
    assert_eq!(
        allocate(&[m(1, 5, 3), m(2, 5, 3)], 0).unwrap_err(),
        AllocationError::DuplicateSequenceIndex { sequence_index: 3 }
    );
}

#[test]
fn only_completed_events_count() {
    let events = vec![
        ev(1, 2_000, PaymentStatus::Completed),
        ev(2, 9_999, PaymentStatus::Pending),
        ev(3, 1_000, PaymentStatus::Failed),
        ev(4, 500, PaymentStatus::Completed),
        ev(5, 700, PaymentStatus::Refunded),
    ];
    assert_eq!(completed_total(&events).unwrap(), 2_500);

    let a = allocate_events(&[m(1, 6_000, 0), m(2, 4_000, 1)], &events).unwrap();
    assert_eq!(a.total_paid_cents, 2_500);
    assert_eq!(a.milestones[0].applied_cents, 2_500);
}

#[test]
fn non_positive_payment_event_is_rejected() {
    assert!(matches!(
        completed_total(&[ev(1, 0, PaymentStatus::Pending)]),
        Err(AllocationError::NonPositivePayment { .. })
    ));
}

#[test]
fn overflowing_payment_sum_is_rejected() {
    let events = vec![
        ev(1, i64::MAX, PaymentStatus::Completed),
        ev(2, 1, PaymentStatus::Completed),
    ];
    assert_eq!(
        completed_total(&events).unwrap_err(),
        AllocationError::AmountOverflow
    );
}
