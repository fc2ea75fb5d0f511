//! cbe-schemas
//!
//! Shared value types for the billing consistency engine.
//!
//! - Line items (ordering key + quantity/price/total)
//! - Payment milestones and payment events
//! - Externally computed document totals (read-only input)
//! - The error classification every engine crate maps into
//!
//! All money is integer cents (`i64`). Nothing here performs IO.

mod line_item;
mod payment;

pub use line_item::{LineItem, LineItemError};
pub use payment::{DocumentTotals, MilestoneKind, PaymentEvent, PaymentMilestone, PaymentStatus};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Cents per currency unit.
pub const CENTS_SCALE: i64 = 100;

/// Namespace for deterministic (v5) ids minted by the engine.
///
/// Fixed forever: changing it changes every derived milestone / change-record id.
pub const ENGINE_NAMESPACE: Uuid = Uuid::from_bytes([
    0x6b, 0x1d, 0x3c, 0x5e, 0x92, 0x4f, 0x4a, 0x07, 0x8e, 0x21, 0xc4, 0x55, 0x0a, 0x9b, 0x7d, 0x13,
]);

/// Derive a stable id from a parent id and a scoped label.
///
/// Same `(parent, label)` always yields the same id.
pub fn derive_id(parent: Uuid, label: &str) -> Uuid {
    let mut name = Vec::with_capacity(16 + 1 + label.len());
    name.extend_from_slice(parent.as_bytes());
    name.push(b'/');
    name.extend_from_slice(label.as_bytes());
    Uuid::new_v5(&ENGINE_NAMESPACE, &name)
}

/// Error classification shared by every engine crate.
///
/// - `Validation`: malformed input. Surface it, never retry.
/// - `Conflict`: the stored state moved or is already reconciled. The caller
///   decides whether to refresh and retry.
/// - `Consistency`: an engine invariant failed. Fatal for the operation; this
///   indicates a bug, not bad input.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    Validation,
    Conflict,
    Consistency,
}

impl ErrorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClass::Validation => "VALIDATION",
            ErrorClass::Conflict => "CONFLICT",
            ErrorClass::Consistency => "CONSISTENCY",
        }
    }
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Render cents as a plain decimal string (`123456` -> `"1234.56"`).
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    let scale = CENTS_SCALE as u64;
    format!("{sign}{}.{:02}", abs / scale, abs % scale)
}
