//! cbe-sequencer
//!
//! Fractional order keys for an ordered collection of line items.
//!
//! - Insert without position: `max + gap` (or `gap` for an empty collection)
//! - Move/insert at the front: `min - gap`
//! - Move/insert at the back: `max + gap`
//! - Move/insert between `lo` and `hi`: `floor((lo + hi) / 2)`
//! - Converged neighbours (`floor((lo + hi) / 2) == lo`): renumber the whole
//!   collection as multiples of `gap` in visual order, then place the item
//!
//! Deterministic, pure logic. No IO. Persisting the returned keys is the
//! caller's job and must go through an optimistic-concurrency write.

mod engine;
mod types;

pub use engine::Sequencer;
pub use types::*;

use anyhow::Result;
use serde::Deserialize;
use serde_json::Value;

/// Default spacing between adjacent keys.
pub const DEFAULT_GAP: i64 = 10;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SequencerConfig {
    #[serde(default = "default_gap")]
    pub gap: i64,
}

fn default_gap() -> i64 {
    DEFAULT_GAP
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self { gap: DEFAULT_GAP }
    }
}

impl SequencerConfig {
    /// Read `/sequencer` from canonical config JSON (produced by cbe-config).
    pub fn from_config_json(cfg: &Value) -> Result<Self> {
        cbe_config::section(cfg, "/sequencer")
    }
}
