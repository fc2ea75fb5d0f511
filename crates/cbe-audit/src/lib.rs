//! cbe-audit
//!
//! Field-level change detection and the attributed change log.
//!
//! - Tracked fields are a closed list of descriptors, each with a canonical
//!   comparison (exact, unordered set, ordered list)
//! - `detect_changes(old, new, fields)` yields one candidate per differing
//!   field; no candidates is a legitimate no-op edit
//! - An [`EditSession`] collects attribution/source/context, synthesizes a
//!   customer summary until a human edits it, and commits one immutable
//!   [`ChangeRecord`] per candidate
//! - Committed records are appended to a SHA-256 hash chain (JSON Lines file
//!   or in memory) that a verifier can check line by line
//!
//! Detection and sessions are pure. Only [`JsonlChangeLog`] and
//! [`verify_chain`] touch the filesystem.

mod chain;
mod detect;
mod field;
mod quote;
mod session;

pub use chain::{
    compute_record_hash, verify_chain, verify_chain_str, verify_entries, ChainedRecord,
    ChangeChain, JsonlChangeLog, VerifyResult,
};
pub use detect::{apply_changes, detect_changes, ChangeCandidate};
pub use field::{Auditable, Comparison, FieldDescriptor, FieldValue, Snapshot};
pub use quote::{QuoteFacts, QUOTE_FIELDS};
pub use session::{
    AuditError, ChangeContext, ChangeRecord, ChangeSource, EditSession, EntityRef, SessionState,
};

use anyhow::Result;
use serde::Deserialize;
use serde_json::Value;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    #[serde(default = "default_hash_chain")]
    pub hash_chain: bool,
    /// JSONL change log location (CLI only; the engine writes through its store).
    #[serde(default)]
    pub log_path: Option<String>,
}

fn default_hash_chain() -> bool {
    true
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            hash_chain: true,
            log_path: None,
        }
    }
}

impl AuditConfig {
    /// Read `/audit` from canonical config JSON (produced by cbe-config).
    pub fn from_config_json(cfg: &Value) -> Result<Self> {
        cbe_config::section(cfg, "/audit")
    }
}
