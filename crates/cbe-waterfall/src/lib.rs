//! cbe-waterfall
//!
//! Waterfall allocation of an aggregate paid total across ordered payment
//! milestones.
//!
//! - Milestones are processed strictly by `sequence_index`
//! - Each milestone takes `min(pool, amount)` from the running pool
//! - Overpayment surfaces as `unallocated_credit_cents`, never dropped
//! - Only `completed` payment events count towards the paid total
//!
//! Deterministic, pure logic. No IO. No clock. Allocation reasons about the
//! aggregate paid total only; payment timestamps and arrival order are
//! ignored.

mod engine;
mod types;

pub use engine::{allocate, allocate_events, completed_total};
pub use types::*;
