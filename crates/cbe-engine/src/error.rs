use cbe_audit::AuditError;
use cbe_schedule::ScheduleError;
use cbe_schemas::{ErrorClass, LineItemError};
use cbe_sequencer::SequenceError;
use cbe_waterfall::AllocationError;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("store: {collection} is at version {actual}, write expected {expected}")]
    VersionConflict {
        collection: String,
        expected: u64,
        actual: u64,
    },
    #[error("store: {what} {id} not found")]
    NotFound { what: &'static str, id: String },
    #[error("store: payment {payment_id} already recorded")]
    DuplicatePayment { payment_id: Uuid },
    #[error("store: line items of {document_id} would share order_key {order_key}")]
    DuplicateOrderKey { document_id: Uuid, order_key: i64 },
    #[error("store: backend failure: {reason}")]
    Backend { reason: String },
}

impl StoreError {
    pub fn class(&self) -> ErrorClass {
        match self {
            StoreError::VersionConflict { .. } => ErrorClass::Conflict,
            StoreError::NotFound { .. } | StoreError::DuplicatePayment { .. } => {
                ErrorClass::Validation
            }
            StoreError::DuplicateOrderKey { .. } | StoreError::Backend { .. } => {
                ErrorClass::Consistency
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Sequence(#[from] SequenceError),
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
    #[error(transparent)]
    Allocation(#[from] AllocationError),
    #[error(transparent)]
    Audit(#[from] AuditError),
    #[error(transparent)]
    LineItem(#[from] LineItemError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("engine: document {document_id} already has a schedule; regenerate it instead")]
    ScheduleExists { document_id: Uuid },
    #[error("engine: document {document_id} has no schedule")]
    NoSchedule { document_id: Uuid },
    #[error("engine: line item {item_id} not found on document {document_id}")]
    UnknownLineItem { document_id: Uuid, item_id: Uuid },
    #[error("engine: consistency failure: {reason}")]
    Consistency { reason: String },
}

impl EngineError {
    pub fn class(&self) -> ErrorClass {
        match self {
            EngineError::Sequence(e) => e.class(),
            EngineError::Schedule(e) => e.class(),
            EngineError::Allocation(e) => e.class(),
            EngineError::Audit(e) => e.class(),
            EngineError::LineItem(e) => e.class(),
            EngineError::Store(e) => e.class(),
            EngineError::ScheduleExists { .. } => ErrorClass::Conflict,
            EngineError::Consistency { .. } => ErrorClass::Consistency,
            EngineError::NoSchedule { .. }
            | EngineError::UnknownLineItem { .. } => ErrorClass::Validation,
        }
    }

    pub fn is_conflict(&self) -> bool {
        self.class() == ErrorClass::Conflict
    }
}
