//! Detection properties over generated quotes
//!
//! # Invariants under test
//! - Round trip: applying the detected candidates to `old` yields `new` on
//!   every tracked field.
//! - No-op: `detect(X, X)` is empty.
//! - Reordering an unordered-set field is never a change; reordering an
//!   ordered-list field always is.

use cbe_audit::{apply_changes, detect_changes, Auditable, QuoteFacts, QUOTE_FIELDS};
use chrono::NaiveDate;

struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    fn pick<'a>(&mut self, xs: &'a [&'a str]) -> &'a str {
        xs[(self.next() as usize) % xs.len()]
    }
}

const VENUES: &[&str] = &["Riverside Hall", "Garden Terrace", "Loft 9"];
const STYLES: &[&str] = &["plated", "buffet", "family style"];
const DIETS: &[&str] = &["vegan", "halal", "kosher", "nut-free", "gluten-free"];
const MENU: &[&str] = &["soup", "salad", "salmon", "risotto", "tart", "sorbet"];

fn random_quote(rng: &mut Lcg) -> QuoteFacts {
    let diets = (0..rng.next() % 4).map(|_| rng.pick(DIETS).to_string()).collect();
    let menu = (0..rng.next() % 5).map(|_| rng.pick(MENU).to_string()).collect();
    QuoteFacts {
        guest_count: (rng.next() % 300) as i64,
        event_date: if rng.next() % 4 == 0 {
            None
        } else {
            NaiveDate::from_ymd_opt(2026, 1 + (rng.next() % 12) as u32, 1 + (rng.next() % 28) as u32)
        },
        venue: rng.pick(VENUES).to_string(),
        service_style: rng.pick(STYLES).to_string(),
        dietary_restrictions: diets,
        menu_items: menu,
    }
}

#[test]
fn applying_candidates_reaches_new() {
    let mut rng = Lcg(7);
    for _ in 0..500 {
        let old = random_quote(&mut rng);
        let new = random_quote(&mut rng);
        let candidates = detect_changes(&old.snapshot(), &new.snapshot(), QUOTE_FIELDS);

        let mut patched = old.snapshot();
        apply_changes(&mut patched, &candidates);
        assert!(detect_changes(&patched, &new.snapshot(), QUOTE_FIELDS).is_empty());

        // Same property through the typed record.
        let mut typed = old.clone();
        for c in &candidates {
            typed.apply_change(&c.field_name, &c.new_value).unwrap();
        }
        assert!(detect_changes(&typed.snapshot(), &new.snapshot(), QUOTE_FIELDS).is_empty());
    }
}

#[test]
fn identical_snapshots_detect_nothing() {
    let mut rng = Lcg(11);
    for _ in 0..200 {
        let q = random_quote(&mut rng);
        assert!(detect_changes(&q.snapshot(), &q.snapshot(), QUOTE_FIELDS).is_empty());
    }
}

#[test]
fn set_order_ignored_list_order_significant() {
    let old = QuoteFacts {
        dietary_restrictions: vec!["vegan".into(), "halal".into()],
        menu_items: vec!["soup".into(), "tart".into()],
        ..QuoteFacts::default()
    };
    let mut new = old.clone();
    new.dietary_restrictions.reverse();
    new.dietary_restrictions.push("vegan".into());
    assert!(detect_changes(&old.snapshot(), &new.snapshot(), QUOTE_FIELDS).is_empty());

    new.menu_items.reverse();
    let c = detect_changes(&old.snapshot(), &new.snapshot(), QUOTE_FIELDS);
    assert_eq!(c.len(), 1);
    assert_eq!(c[0].field_name, "menu_items");
}
