//! Reorder / insert key placement
//!
//! # Invariants under test
//! 1. Move to the front = `min - gap`; move to the back = `max + gap`.
//! 2. Move between neighbours = `floor((lo + hi) / 2)`, also for negative keys.
//! 3. Only the moved item's key changes.
//! 4. Same state + same target => same result (idempotent).
//! 5. Malformed input is rejected as a validation error.

use cbe_schemas::ErrorClass;
use cbe_sequencer::{KeyAssignment, OrderedKey, SequenceError, Sequencer, SequencerConfig};
use uuid::Uuid;

fn id(n: u128) -> Uuid {
    Uuid::from_u128(n)
}

fn items(keys: &[i64]) -> Vec<OrderedKey> {
    keys.iter()
        .enumerate()
        .map(|(i, k)| OrderedKey::new(id(i as u128 + 1), *k))
        .collect()
}

fn single(a: KeyAssignment) -> (Uuid, i64) {
    match a {
        KeyAssignment::Single { id, order_key } => (id, order_key),
        other => panic!("expected single-key assignment, got {other:?}"),
    }
}

#[test]
fn move_last_to_first_takes_min_minus_gap() {
    let seq = Sequencer::default();
    let coll = items(&[10, 20, 30]);
    let (moved, key) = single(seq.reorder(&coll, id(3), 0).unwrap());
    assert_eq!(moved, id(3));
    assert_eq!(key, 0);
}

#[test]
fn move_first_to_last_takes_max_plus_gap() {
    let seq = Sequencer::default();
    let coll = items(&[10, 20, 30]);
    let (_, key) = single(seq.reorder(&coll, id(1), 2).unwrap());
    assert_eq!(key, 40);
}

#[test]
fn move_between_takes_floor_midpoint() {
    let seq = Sequencer::default();
    // Move item at index 0 (key 10) to index 1: lands between 20 and 30.
    let coll = items(&[10, 20, 30]);
    let (_, key) = single(seq.reorder(&coll, id(1), 1).unwrap());
    assert_eq!(key, 25);

    // Floor, not truncation, for negative sums.
    let coll = items(&[-7, -4, 50]);
    let (_, key) = single(seq.reorder(&coll, id(3), 1).unwrap());
    assert_eq!(key, -6);
}

#[test]
fn reorder_result_sorts_into_requested_order() {
    let seq = Sequencer::default();
    let coll = items(&[10, 20, 30, 40]);
    let a = seq.reorder(&coll, id(4), 1).unwrap();
    let after: Vec<Uuid> = a.apply(&coll).iter().map(|it| it.id).collect();
    assert_eq!(after, vec![id(1), id(4), id(2), id(3)]);

    // Untouched items keep their keys.
    let applied = a.apply(&coll);
    for it in applied.iter().filter(|it| it.id != id(4)) {
        let before = coll.iter().find(|c| c.id == it.id).unwrap();
        assert_eq!(it.order_key, before.order_key);
    }
}

#[test]
fn same_position_is_a_no_op() {
    let seq = Sequencer::default();
    let coll = items(&[10, 20, 30]);
    assert_eq!(single(seq.reorder(&coll, id(2), 1).unwrap()), (id(2), 20));
}

#[test]
fn reorder_is_idempotent_for_identical_input() {
    let seq = Sequencer::default();
    let coll = items(&[10, 11, 30]);
    let a = seq.reorder(&coll, id(3), 1).unwrap();
    let b = seq.reorder(&coll, id(3), 1).unwrap();
    assert_eq!(a, b);
}

#[test]
fn append_goes_past_current_max() {
    let seq = Sequencer::default();
    assert_eq!(single(seq.append(&[], id(9)).unwrap()), (id(9), 10));
    let coll = items(&[-5, 3, 70]);
    assert_eq!(single(seq.append(&coll, id(9)).unwrap()), (id(9), 80));
}

#[test]
fn insert_at_front_middle_and_back() {
    let seq = Sequencer::default();
    let coll = items(&[10, 20, 30]);
    assert_eq!(single(seq.insert_at(&coll, id(9), 0).unwrap()).1, 0);
    assert_eq!(single(seq.insert_at(&coll, id(9), 1).unwrap()).1, 15);
    assert_eq!(single(seq.insert_at(&coll, id(9), 3).unwrap()).1, 40);
}

#[test]
fn malformed_input_is_validation_error() {
    let seq = Sequencer::default();
    let coll = items(&[10, 20, 30]);

    let err = seq.reorder(&coll, id(99), 0).unwrap_err();
    assert_eq!(err, SequenceError::UnknownItem { id: id(99) });
    assert_eq!(err.class(), ErrorClass::Validation);

    assert!(matches!(
        seq.reorder(&coll, id(1), 3),
        Err(SequenceError::DestinationOutOfRange { destination: 3, max: 2 })
    ));
    assert!(matches!(
        seq.insert_at(&coll, id(2), 0),
        Err(SequenceError::DuplicateItem { .. })
    ));
    assert!(matches!(
        seq.reorder(&items(&[10, 10, 30]), id(1), 2),
        Err(SequenceError::KeysNotStrictlyIncreasing { index: 1 })
    ));
    assert!(matches!(
        Sequencer::new(1),
        Err(SequenceError::InvalidGap { gap: 1 })
    ));
}

#[test]
fn gap_comes_from_config_section() {
    let cfg = serde_json::json!({"sequencer": {"gap": 100}});
    let seq = Sequencer::from_config(&SequencerConfig::from_config_json(&cfg).unwrap()).unwrap();
    assert_eq!(seq.gap(), 100);

    let defaulted = SequencerConfig::from_config_json(&serde_json::json!({})).unwrap();
    assert_eq!(defaulted.gap, cbe_sequencer::DEFAULT_GAP);
}
