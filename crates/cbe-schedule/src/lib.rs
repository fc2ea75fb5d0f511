//! cbe-schedule
//!
//! Payment milestone schedules.
//!
//! - Exempt (government / institutional) contracts: one net-term milestone
//! - Otherwise: a named tier chosen by lead time (`RUSH`, `SHORT`, `STANDARD`
//!   by default), each tier a list of percentage splits with a due rule
//! - Amounts are rounded half-up to the cent; the last milestone absorbs the
//!   residual so the schedule reconciles to the payable total exactly
//! - Regeneration replaces a schedule only while no money has been applied
//!
//! Deterministic, pure logic. The generation date is an input, not a clock read.

mod config;
mod engine;
mod types;

pub use config::{DueRule, MilestoneSplit, ScheduleConfig, ScheduleTier};
pub use engine::MilestoneScheduler;
pub use types::*;
