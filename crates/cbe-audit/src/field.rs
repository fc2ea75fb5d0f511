use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::AuditError;

/// Comparable primitive for one tracked field.
///
/// Serializes untagged (`null`, `true`, `42`, `"text"`, `[...]`) so change
/// records read naturally in the JSONL log.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
    List(Vec<FieldValue>),
}

impl FieldValue {
    pub fn text(s: impl Into<String>) -> Self {
        FieldValue::Text(s.into())
    }

    pub fn list<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        FieldValue::List(items.into_iter().map(|s| FieldValue::Text(s.into())).collect())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => f.write_str("(none)"),
            FieldValue::Bool(true) => f.write_str("yes"),
            FieldValue::Bool(false) => f.write_str("no"),
            FieldValue::Int(n) => write!(f, "{n}"),
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::List(items) if items.is_empty() => f.write_str("(none)"),
            FieldValue::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
        }
    }
}

/// How two values of a field are compared.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Comparison {
    Exact,
    /// Element order and duplicates are irrelevant.
    UnorderedSet,
    /// Element order is significant.
    OrderedList,
}

/// One tracked field: storage name, human label for summaries, comparison.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub label: &'static str,
    pub comparison: Comparison,
}

impl FieldDescriptor {
    pub const fn new(name: &'static str, label: &'static str, comparison: Comparison) -> Self {
        Self {
            name,
            label,
            comparison,
        }
    }

    /// Canonical form used both for comparison and for the recorded values.
    pub fn canonicalize(&self, value: &FieldValue) -> FieldValue {
        match (self.comparison, value) {
            (Comparison::UnorderedSet, FieldValue::List(items)) => {
                let mut items = items.clone();
                items.sort();
                items.dedup();
                FieldValue::List(items)
            }
            _ => value.clone(),
        }
    }
}

/// Field name -> value. A field absent from the map reads as `Null`.
pub type Snapshot = BTreeMap<String, FieldValue>;

/// A record whose billable facts are tracked by the change log.
pub trait Auditable {
    fn tracked_fields() -> &'static [FieldDescriptor];

    fn snapshot(&self) -> Snapshot;

    /// Write one tracked field. Unknown fields and mistyped values are
    /// validation errors.
    fn apply_change(&mut self, field: &str, value: &FieldValue) -> Result<(), AuditError>;
}
