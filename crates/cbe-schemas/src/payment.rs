use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Closed set of milestone kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MilestoneKind {
    Deposit,
    Progress,
    Balance,
    NetTerm,
}

impl MilestoneKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MilestoneKind::Deposit => "deposit",
            MilestoneKind::Progress => "progress",
            MilestoneKind::Balance => "balance",
            MilestoneKind::NetTerm => "net-term",
        }
    }
}

/// One scheduled partial obligation of a document's total payable amount.
///
/// `due_date == None` means due immediately.
/// `sequence_index` is the waterfall order: lower is satisfied first.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMilestone {
    pub id: Uuid,
    pub kind: MilestoneKind,
    pub percentage: u8,
    pub amount_cents: i64,
    pub due_date: Option<NaiveDate>,
    pub sequence_index: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

/// Append-only payment fact reported by the payment processor integration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentEvent {
    pub id: Uuid,
    pub amount_cents: i64,
    pub occurred_at: DateTime<Utc>,
    pub status: PaymentStatus,
}

impl PaymentEvent {
    pub fn is_completed(&self) -> bool {
        self.status == PaymentStatus::Completed
    }
}

/// Authoritative document figures computed outside the engine.
///
/// The engine reads `total_cents` as the payable amount for scheduling and
/// never recomputes subtotal or tax itself.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentTotals {
    pub document_id: Uuid,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub tax_exempt: bool,
}
