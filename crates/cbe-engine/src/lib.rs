//! cbe-engine
//!
//! Read -> compute -> write service over an external [`BillingStore`].
//!
//! - Every write is one atomic store call guarded by the version that was
//!   read; a stale version is a Conflict, never a blind write
//! - Renumbering, schedule regeneration and audit-append-plus-mutation are
//!   each a single store transaction
//! - The engine caches nothing between calls
//!
//! Failures are logged at `warn` (validation / conflict) or `error`
//! (consistency) and returned; nothing is retried here.

mod clock;
mod error;
mod memory;
mod service;
mod store;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{EngineError, StoreError};
pub use memory::MemoryStore;
pub use service::{BillingEngine, EngineConfig, NewLineItem, PendingEdit, ReorderOutcome};
pub use store::{BillingStore, LineItemWrite, Version, Versioned};
