//! Command handler modules for cbe-cli.
//!
//! Shared utilities used by multiple command paths live here.
//! Command-specific logic lives in the submodules.

pub mod audit;
pub mod billing;

use anyhow::{Context, Result};
use cbe_config::LoadedConfig;
use serde::de::DeserializeOwned;
use std::fs;

pub fn config_hash(paths: &[String]) -> Result<()> {
    let loaded = load_config(paths)?;
    println!("config_hash={}", loaded.config_hash);
    println!("{}", loaded.canonical_json);
    Ok(())
}

/// Layered config from `--config` paths; built-in defaults when none given.
pub fn load_config(paths: &[String]) -> Result<LoadedConfig> {
    if paths.is_empty() {
        return LoadedConfig::empty();
    }
    let refs: Vec<&str> = paths.iter().map(String::as_str).collect();
    cbe_config::load_layered_yaml(&refs)
}

/// Read a JSON file into `T`. A UTF-8 BOM is tolerated.
pub fn read_json_file<T: DeserializeOwned>(path: &str) -> Result<T> {
    let bytes = fs::read(path).with_context(|| format!("read {} failed", path))?;
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(&bytes);
    let raw = std::str::from_utf8(bytes).with_context(|| format!("{} must be UTF-8 text", path))?;
    serde_json::from_str(raw.trim()).with_context(|| format!("{} must contain valid JSON", path))
}
