use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{AuditError, Auditable, Comparison, FieldDescriptor, FieldValue, Snapshot};

/// Tracked fields of a catering quote / event order.
pub const QUOTE_FIELDS: &[FieldDescriptor] = &[
    FieldDescriptor::new("guest_count", "guest count", Comparison::Exact),
    FieldDescriptor::new("event_date", "event date", Comparison::Exact),
    FieldDescriptor::new("venue", "venue", Comparison::Exact),
    FieldDescriptor::new("service_style", "service style", Comparison::Exact),
    FieldDescriptor::new(
        "dietary_restrictions",
        "dietary restrictions",
        Comparison::UnorderedSet,
    ),
    FieldDescriptor::new("menu_items", "menu items", Comparison::OrderedList),
];

/// Billable facts of a quote that the customer can ask to change.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteFacts {
    pub guest_count: i64,
    pub event_date: Option<NaiveDate>,
    pub venue: String,
    pub service_style: String,
    pub dietary_restrictions: Vec<String>,
    /// Course order matters.
    pub menu_items: Vec<String>,
}

impl Auditable for QuoteFacts {
    fn tracked_fields() -> &'static [FieldDescriptor] {
        QUOTE_FIELDS
    }

    fn snapshot(&self) -> Snapshot {
        let mut s = Snapshot::new();
        s.insert("guest_count".into(), FieldValue::Int(self.guest_count));
        s.insert(
            "event_date".into(),
            self.event_date
                .map(|d| FieldValue::Text(d.to_string()))
                .unwrap_or(FieldValue::Null),
        );
        s.insert("venue".into(), FieldValue::text(self.venue.clone()));
        s.insert(
            "service_style".into(),
            FieldValue::text(self.service_style.clone()),
        );
        s.insert(
            "dietary_restrictions".into(),
            FieldValue::list(self.dietary_restrictions.iter().cloned()),
        );
        s.insert(
            "menu_items".into(),
            FieldValue::list(self.menu_items.iter().cloned()),
        );
        s
    }

    fn apply_change(&mut self, field: &str, value: &FieldValue) -> Result<(), AuditError> {
        let mismatch = |expected: &'static str| AuditError::FieldTypeMismatch {
            field: field.to_string(),
            expected,
        };
        match field {
            "guest_count" => match value {
                FieldValue::Int(n) => self.guest_count = *n,
                _ => return Err(mismatch("integer")),
            },
            "event_date" => match value {
                FieldValue::Null => self.event_date = None,
                FieldValue::Text(s) => {
                    self.event_date =
                        Some(s.parse::<NaiveDate>().map_err(|_| mismatch("ISO date"))?)
                }
                _ => return Err(mismatch("ISO date")),
            },
            "venue" => self.venue = text(value).ok_or_else(|| mismatch("text"))?,
            "service_style" => self.service_style = text(value).ok_or_else(|| mismatch("text"))?,
            "dietary_restrictions" => {
                self.dietary_restrictions = texts(value).ok_or_else(|| mismatch("list of text"))?
            }
            "menu_items" => self.menu_items = texts(value).ok_or_else(|| mismatch("list of text"))?,
            other => {
                return Err(AuditError::UnknownField {
                    field: other.to_string(),
                })
            }
        }
        Ok(())
    }
}

fn text(value: &FieldValue) -> Option<String> {
    match value {
        FieldValue::Text(s) => Some(s.clone()),
        _ => None,
    }
}

fn texts(value: &FieldValue) -> Option<Vec<String>> {
    match value {
        FieldValue::List(items) => items.iter().map(text).collect(),
        _ => None,
    }
}
