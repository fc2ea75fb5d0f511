//! `cbe audit verify` and `cbe audit record` over a JSONL change log.

use anyhow::{Context, Result};
use cbe_audit::{
    verify_chain, AuditConfig, Auditable, ChangeSource, EditSession, EntityRef, JsonlChangeLog,
    QuoteFacts, VerifyResult, QUOTE_FIELDS,
};
use chrono::Utc;
use tracing::{error, info};
use uuid::Uuid;

use super::{load_config, read_json_file};

/// `--path` wins over `/audit/log_path`.
fn resolve_log(path: Option<String>, config_paths: &[String]) -> Result<(String, AuditConfig)> {
    let loaded = load_config(config_paths)?;
    let cfg = AuditConfig::from_config_json(&loaded.config_json)?;
    let path = path
        .or_else(|| cfg.log_path.clone())
        .context("no change log: pass --path or set /audit/log_path in --config")?;
    Ok((path, cfg))
}

pub fn verify(path: Option<String>, config_paths: &[String]) -> Result<()> {
    let (path, cfg) = resolve_log(path, config_paths)?;
    match verify_chain(&path, cfg.hash_chain)? {
        VerifyResult::Valid { lines } => {
            println!("chain_valid=true lines={lines} path={path}");
            Ok(())
        }
        VerifyResult::Broken { line, reason } => {
            error!(%path, line, %reason, "change log hash chain broken");
            println!("chain_valid=false line={line} path={path}");
            anyhow::bail!("change log broken at line {line}: {reason}");
        }
    }
}

pub struct RecordArgs {
    pub path: Option<String>,
    pub config_paths: Vec<String>,
    pub old: String,
    pub new: String,
    pub entity_type: String,
    pub entity_id: String,
    pub document_id: Option<String>,
    pub attribution: String,
    pub source: String,
    pub contact: Option<String>,
    pub note: Option<String>,
    pub summary: Option<String>,
}

fn parse_uuid(flag: &str, raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw.trim()).with_context(|| format!("{flag} must be a uuid, got {raw}"))
}

pub fn record(args: RecordArgs) -> Result<()> {
    let (path, cfg) = resolve_log(args.path, &args.config_paths)?;
    let old: QuoteFacts = read_json_file(&args.old)?;
    let new: QuoteFacts = read_json_file(&args.new)?;
    let source: ChangeSource = args.source.parse()?;
    let entity = EntityRef::new(args.entity_type, parse_uuid("--entity-id", &args.entity_id)?);
    let document_id = args
        .document_id
        .as_deref()
        .map(|d| parse_uuid("--document-id", d))
        .transpose()?;

    let mut session = EditSession::new(Uuid::new_v4(), entity, document_id);
    session.detect(&old.snapshot(), &new.snapshot(), QUOTE_FIELDS)?;
    session.set_attribution(args.attribution)?;
    session.set_source(source)?;
    session.set_contact_info(args.contact)?;
    session.set_internal_note(args.note)?;
    if let Some(summary) = args.summary {
        session.edit_summary(Some(summary))?;
    }

    let mut log = JsonlChangeLog::open(&path, cfg.hash_chain)?;
    let records = session.commit_with(Utc::now(), |records| -> Result<()> {
        log.append_all(records)?;
        Ok(())
    })?;

    info!(%path, records = records.len(), "change records appended");
    println!("records={}", records.len());
    if let Some(summary) = records.first().and_then(|r| r.customer_summary.as_deref()) {
        println!("summary={summary}");
    }
    if let Some(h) = log.last_hash() {
        println!("hash_self={h}");
    }
    Ok(())
}
