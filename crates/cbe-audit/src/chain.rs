use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::ChangeRecord;

/// A change record as it sits in the log.
///
/// With hashing enabled, `hash_prev` is the previous entry's `hash_self`
/// (`None` for the first) and `hash_self` is SHA-256 over the canonical JSON
/// of this entry with `hash_self` cleared.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainedRecord {
    pub seq: u64,
    pub record: ChangeRecord,
    pub hash_prev: Option<String>,
    pub hash_self: Option<String>,
}

/// Tail of a chain: next sequence number and last hash.
#[derive(Clone, Debug, Default)]
struct ChainHead {
    hash_chain: bool,
    seq: u64,
    last_hash: Option<String>,
}

impl ChainHead {
    fn new(hash_chain: bool) -> Self {
        Self {
            hash_chain,
            ..Self::default()
        }
    }

    fn resume_from(&mut self, last: Option<&ChainedRecord>) {
        if let Some(last) = last {
            self.seq = last.seq + 1;
            self.last_hash = last.hash_self.clone();
        }
    }

    /// Build the next entry without advancing; call [`ChainHead::advance`]
    /// once it is durably stored.
    fn link(&self, record: ChangeRecord) -> Result<ChainedRecord> {
        let mut entry = ChainedRecord {
            seq: self.seq,
            record,
            hash_prev: None,
            hash_self: None,
        };
        if self.hash_chain {
            entry.hash_prev = self.last_hash.clone();
            entry.hash_self = Some(compute_record_hash(&entry)?);
        }
        Ok(entry)
    }

    fn advance(&mut self, entry: &ChainedRecord) {
        self.seq = entry.seq + 1;
        self.last_hash = entry.hash_self.clone();
    }
}

/// In-memory chain, used by stores that keep the change log next to the
/// records it describes.
#[derive(Clone, Debug)]
pub struct ChangeChain {
    head: ChainHead,
    entries: Vec<ChainedRecord>,
}

impl ChangeChain {
    pub fn new(hash_chain: bool) -> Self {
        Self {
            head: ChainHead::new(hash_chain),
            entries: Vec::new(),
        }
    }

    /// The entries the next batch would produce, without appending them.
    pub fn link_batch(&self, records: &[ChangeRecord]) -> Result<Vec<ChainedRecord>> {
        let mut head = self.head.clone();
        let mut out = Vec::with_capacity(records.len());
        for r in records {
            let entry = head.link(r.clone())?;
            head.advance(&entry);
            out.push(entry);
        }
        Ok(out)
    }

    pub fn append(&mut self, record: ChangeRecord) -> Result<&ChainedRecord> {
        let entry = self.head.link(record)?;
        self.head.advance(&entry);
        self.entries.push(entry);
        let idx = self.entries.len() - 1;
        Ok(&self.entries[idx])
    }

    /// Append entries produced by [`ChangeChain::link_batch`] on this chain.
    pub fn extend_linked(&mut self, linked: Vec<ChainedRecord>) {
        for entry in linked {
            self.head.advance(&entry);
            self.entries.push(entry);
        }
    }

    pub fn entries(&self) -> &[ChainedRecord] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last_hash(&self) -> Option<&str> {
        self.head.last_hash.as_deref()
    }

    pub fn verify(&self) -> Result<VerifyResult> {
        verify_entries(&self.entries, self.head.hash_chain)
    }

    /// The chain as JSON Lines, byte-compatible with [`JsonlChangeLog`].
    pub fn to_jsonl(&self) -> Result<String> {
        let mut out = String::new();
        for entry in &self.entries {
            out.push_str(&canonical_json_line(entry)?);
            out.push('\n');
        }
        Ok(out)
    }
}

/// Append-only JSON Lines change log. One entry per line.
pub struct JsonlChangeLog {
    path: PathBuf,
    head: ChainHead,
}

impl JsonlChangeLog {
    /// Opens (or prepares) the log and resumes after its last entry.
    /// Parent dirs are created.
    pub fn open(path: impl AsRef<Path>, hash_chain: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create_dir_all {:?}", parent))?;
        }

        let mut head = ChainHead::new(hash_chain);
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("read change log {:?}", path))?;
            let last = match content.lines().rev().map(str::trim).find(|l| !l.is_empty()) {
                Some(line) => Some(
                    serde_json::from_str::<ChainedRecord>(line)
                        .with_context(|| format!("parse last entry of {:?}", path))?,
                ),
                None => None,
            };
            head.resume_from(last.as_ref());
        }

        Ok(Self { path, head })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn next_seq(&self) -> u64 {
        self.head.seq
    }

    pub fn last_hash(&self) -> Option<&str> {
        self.head.last_hash.as_deref()
    }

    pub fn append(&mut self, record: ChangeRecord) -> Result<ChainedRecord> {
        let entry = self.head.link(record)?;
        let line = canonical_json_line(&entry)?;
        append_line(&self.path, &line)?;
        self.head.advance(&entry);
        Ok(entry)
    }

    /// Append a commit's records as one write.
    pub fn append_all(&mut self, records: &[ChangeRecord]) -> Result<Vec<ChainedRecord>> {
        let mut head = self.head.clone();
        let mut entries = Vec::with_capacity(records.len());
        let mut buf = String::new();
        for r in records {
            let entry = head.link(r.clone())?;
            head.advance(&entry);
            buf.push_str(&canonical_json_line(&entry)?);
            buf.push('\n');
            entries.push(entry);
        }
        if !buf.is_empty() {
            let mut f = open_append(&self.path)?;
            f.write_all(buf.as_bytes()).context("write change log batch failed")?;
            f.sync_data().context("sync change log failed")?;
        }
        self.head = head;
        Ok(entries)
    }
}

fn open_append(path: &Path) -> Result<fs::File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open change log {:?}", path))
}

fn append_line(path: &Path, line: &str) -> Result<()> {
    let mut f = open_append(path)?;
    f.write_all(line.as_bytes())
        .context("write change log line failed")?;
    f.write_all(b"\n").context("write newline failed")?;
    f.sync_data().context("sync change log failed")?;
    Ok(())
}

/// Sorted keys, compact JSON.
fn canonical_json_line<T: Serialize>(v: &T) -> Result<String> {
    let raw = serde_json::to_value(v).context("serialize change entry failed")?;
    let sorted = sort_keys(&raw);
    serde_json::to_string(&sorted).context("json stringify failed")
}

fn sort_keys(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut keys: Vec<_> = map.keys().cloned().collect();
            keys.sort();
            let mut new = serde_json::Map::new();
            for k in keys {
                new.insert(k.clone(), sort_keys(&map[&k]));
            }
            Value::Object(new)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_keys).collect()),
        _ => v.clone(),
    }
}

/// Computed over the entry WITHOUT `hash_self`.
pub fn compute_record_hash(entry: &ChainedRecord) -> Result<String> {
    let mut clone = entry.clone();
    clone.hash_self = None;

    let canonical = canonical_json_line(&clone)?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyResult {
    Valid { lines: usize },
    /// First broken entry, 1-based.
    Broken { line: usize, reason: String },
}

impl VerifyResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, VerifyResult::Valid { .. })
    }
}

/// With `hash_chain` set every entry must carry its hashes. Without it,
/// hashes become mandatory from the first hashed entry on.
pub fn verify_chain(path: impl AsRef<Path>, hash_chain: bool) -> Result<VerifyResult> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("read change log {:?}", path.as_ref()))?;
    verify_chain_str(&content, hash_chain)
}

/// Blank lines are skipped; `line` in the result is the physical line number.
pub fn verify_chain_str(content: &str, hash_chain: bool) -> Result<VerifyResult> {
    let mut check = ChainCheck::new(hash_chain);
    for (i, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let entry: ChainedRecord = serde_json::from_str(trimmed)
            .with_context(|| format!("parse change entry at line {}", i + 1))?;
        if let Some(reason) = check.next(&entry)? {
            return Ok(VerifyResult::Broken {
                line: i + 1,
                reason,
            });
        }
    }
    Ok(VerifyResult::Valid { lines: check.count })
}

/// Same checks over already-parsed entries; `line` is the 1-based position.
pub fn verify_entries(entries: &[ChainedRecord], hash_chain: bool) -> Result<VerifyResult> {
    let mut check = ChainCheck::new(hash_chain);
    for (i, entry) in entries.iter().enumerate() {
        if let Some(reason) = check.next(entry)? {
            return Ok(VerifyResult::Broken {
                line: i + 1,
                reason,
            });
        }
    }
    Ok(VerifyResult::Valid { lines: check.count })
}

struct ChainCheck {
    require_hashes: bool,
    count: usize,
    prev_seq: Option<u64>,
    prev_hash: Option<String>,
}

impl ChainCheck {
    fn new(hash_chain: bool) -> Self {
        Self {
            require_hashes: hash_chain,
            count: 0,
            prev_seq: None,
            prev_hash: None,
        }
    }

    fn next(&mut self, entry: &ChainedRecord) -> Result<Option<String>> {
        if entry.hash_prev != self.prev_hash {
            return Ok(Some(format!(
                "hash_prev mismatch: expected {:?}, got {:?}",
                self.prev_hash, entry.hash_prev
            )));
        }

        let expected_seq = self.prev_seq.map_or(0, |prev| prev + 1);
        if entry.seq != expected_seq {
            return Ok(Some(format!(
                "seq gap: expected {}, got {}",
                expected_seq, entry.seq
            )));
        }

        match &entry.hash_self {
            Some(claimed) => {
                let recomputed = compute_record_hash(entry)?;
                if *claimed != recomputed {
                    return Ok(Some(format!(
                        "hash_self mismatch: claimed {}, recomputed {}",
                        claimed, recomputed
                    )));
                }
                self.require_hashes = true;
            }
            None if self.require_hashes => {
                return Ok(Some(format!("hash_self missing at seq {}", entry.seq)));
            }
            None => {}
        }

        self.count += 1;
        self.prev_seq = Some(entry.seq);
        self.prev_hash = entry.hash_self.clone();
        Ok(None)
    }
}
