//! Line item ordering through the store
//!
//! GREEN when:
//! - appends get keys in creation order
//! - moving index 2 -> 0 among [10, 20, 30] writes key 0 and bumps the version
//! - a no-op move writes nothing
//! - repeated inserts between converged neighbours renumber in one write
//! - quantity/price edits recompute totals; bad input writes nothing
//! - a direct store write that would duplicate an order_key is refused

use std::collections::BTreeMap;

use cbe_engine::{
    BillingEngine, BillingStore, EngineConfig, FixedClock, LineItemWrite, MemoryStore,
    NewLineItem, StoreError,
};
use cbe_schemas::{ErrorClass, LineItem};
use chrono::{TimeZone, Utc};
use uuid::Uuid;

const DOC: Uuid = Uuid::from_u128(0xD0C);

fn engine() -> BillingEngine<MemoryStore, FixedClock> {
    let clock = FixedClock(Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap());
    BillingEngine::new(MemoryStore::default(), clock, EngineConfig::default()).unwrap()
}

fn item(n: u128, desc: &str) -> NewLineItem {
    NewLineItem {
        id: Uuid::from_u128(n),
        description: desc.to_string(),
        quantity: 2,
        unit_price_cents: 1_250,
    }
}

fn keys(engine: &BillingEngine<MemoryStore, FixedClock>) -> Vec<(Uuid, i64)> {
    engine
        .store()
        .load_line_items(DOC)
        .unwrap()
        .value
        .iter()
        .map(|it| (it.id, it.order_key))
        .collect()
}

#[test]
fn move_last_to_first_writes_single_key() {
    let e = engine();
    for (n, d) in [(1, "canapes"), (2, "mains"), (3, "dessert")] {
        e.insert_line_item(DOC, item(n, d), None).unwrap();
    }
    assert_eq!(
        keys(&e),
        vec![(Uuid::from_u128(1), 10), (Uuid::from_u128(2), 20), (Uuid::from_u128(3), 30)]
    );
    let before = e.store().load_line_items(DOC).unwrap().version;

    let out = e.reorder(DOC, Uuid::from_u128(3), 0).unwrap();
    assert_eq!(out.assignment.key_for(Uuid::from_u128(3)), Some(0));
    assert!(!out.assignment.is_renumber());
    assert_eq!(out.version, before + 1);
    assert_eq!(
        keys(&e),
        vec![(Uuid::from_u128(3), 0), (Uuid::from_u128(1), 10), (Uuid::from_u128(2), 20)]
    );
}

#[test]
fn noop_move_does_not_write() {
    let e = engine();
    e.insert_line_item(DOC, item(1, "a"), None).unwrap();
    e.insert_line_item(DOC, item(2, "b"), None).unwrap();
    let before = e.store().load_line_items(DOC).unwrap().version;
    let out = e.reorder(DOC, Uuid::from_u128(2), 1).unwrap();
    assert_eq!(out.version, before);
}

#[test]
fn converged_inserts_renumber_once() {
    let e = engine();
    e.insert_line_item(DOC, item(1, "first"), None).unwrap();
    e.insert_line_item(DOC, item(2, "last"), None).unwrap();

    // Keep inserting right after the first item until the gap closes.
    let mut renumbers = 0;
    for n in 10..20u128 {
        let before: Vec<i64> = keys(&e).iter().map(|(_, k)| *k).collect();
        e.insert_line_item(DOC, item(n, "squeeze"), Some(1)).unwrap();
        let after = keys(&e);
        let after_keys: Vec<i64> = after.iter().map(|(_, k)| *k).collect();
        if !before.iter().all(|k| after_keys.contains(k)) {
            renumbers += 1;
        }
        assert_eq!(after[1].0, Uuid::from_u128(n));
        assert_eq!(after.first().map(|(id, _)| *id), Some(Uuid::from_u128(1)));
        assert_eq!(after.last().map(|(id, _)| *id), Some(Uuid::from_u128(2)));
        let mut sorted = after_keys.clone();
        sorted.dedup();
        assert_eq!(sorted.len(), after_keys.len(), "keys must stay distinct");
    }
    // 15, 12, 11, converged: renumber and restart at 15. Inserts 4, 7 and 10 renumber.
    assert_eq!(renumbers, 3);
}

#[test]
fn update_recomputes_total_and_rejects_bad_input() {
    let e = engine();
    let it = e.insert_line_item(DOC, item(1, "plated dinner"), None).unwrap();
    assert_eq!(it.total_cents(), 2_500);

    let updated = e.update_line_item(DOC, it.id, 140, 4_500).unwrap();
    assert_eq!(updated.total_cents(), 630_000);

    let version = e.store().load_line_items(DOC).unwrap().version;
    let err = e.update_line_item(DOC, it.id, 0, 4_500).unwrap_err();
    assert_eq!(err.class(), ErrorClass::Validation);
    assert_eq!(e.store().load_line_items(DOC).unwrap().version, version);
}

#[test]
fn removed_item_is_gone_and_append_follows_max() {
    let e = engine();
    e.insert_line_item(DOC, item(1, "a"), None).unwrap();
    e.insert_line_item(DOC, item(2, "b"), None).unwrap();
    e.remove_line_item(DOC, Uuid::from_u128(2)).unwrap();
    let fresh = e.insert_line_item(DOC, item(3, "c"), None).unwrap();
    assert_eq!(fresh.order_key, 20);
    assert_eq!(keys(&e).len(), 2);

    let err = e.remove_line_item(DOC, Uuid::from_u128(2)).unwrap_err();
    assert_eq!(err.class(), ErrorClass::Validation);
}

#[test]
fn invalid_moves_are_validation_errors() {
    let e = engine();
    e.insert_line_item(DOC, item(1, "a"), None).unwrap();
    let err = e.reorder(DOC, Uuid::from_u128(1), 5).unwrap_err();
    assert_eq!(err.class(), ErrorClass::Validation);
    let err = e.reorder(DOC, Uuid::from_u128(99), 0).unwrap_err();
    assert_eq!(err.class(), ErrorClass::Validation);
    let err = e.insert_line_item(DOC, item(1, "dup"), None).unwrap_err();
    assert_eq!(err.class(), ErrorClass::Validation);
}

#[test]
fn duplicate_order_key_write_is_refused() {
    let e = engine();
    for (n, d) in [(1, "canapes"), (2, "mains")] {
        e.insert_line_item(DOC, item(n, d), None).unwrap();
    }
    let before = e.store().load_line_items(DOC).unwrap();

    let rekey = e.store().write_line_items(
        DOC,
        before.version,
        LineItemWrite {
            order_keys: BTreeMap::from([(Uuid::from_u128(2), 10)]),
            ..LineItemWrite::default()
        },
    );
    let err = rekey.unwrap_err();
    assert!(
        matches!(err, StoreError::DuplicateOrderKey { order_key: 10, .. }),
        "{err}"
    );
    assert_eq!(err.class(), ErrorClass::Consistency);

    let clash = LineItem::new(Uuid::from_u128(3), 20, "dessert", 1, 900).unwrap();
    assert!(e
        .store()
        .write_line_items(
            DOC,
            before.version,
            LineItemWrite {
                upsert: vec![clash],
                ..LineItemWrite::default()
            },
        )
        .is_err());

    assert_eq!(e.store().load_line_items(DOC).unwrap(), before);
}
