//! Persisted node records: metadata, check reports, and single-value files.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;

use nodeops_core::checks::Report;
use nodeops_core::config::NodePaths;
use nodeops_core::meta::Meta;

/// Read and parse a JSON file. `Ok(None)` if it does not exist.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let text =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let value = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(Some(value))
}

/// Write `value` as pretty JSON, replacing the file atomically.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    write_atomic(path, json.as_bytes())
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes).with_context(|| format!("Failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}

/// Load the node metadata, creating it with defaults on first read.
pub fn get_meta(paths: &NodePaths) -> Result<Meta> {
    let path = paths.meta();
    match read_json(&path)? {
        Some(meta) => Ok(meta),
        None => {
            let meta = Meta::default();
            save_meta(paths, &meta)?;
            Ok(meta)
        }
    }
}

/// Overwrite the node metadata in full.
pub fn save_meta(paths: &NodePaths, meta: &Meta) -> Result<()> {
    write_json(&paths.meta(), meta)
}

/// Load a check report. A missing file is an empty report.
pub fn get_report(path: &Path) -> Result<Report> {
    Ok(read_json(path)?.unwrap_or_default())
}

pub fn save_report(path: &Path, report: &Report) -> Result<()> {
    write_json(path, report)
}

/// Read a single-value text file, trimmed.
pub fn read_value(path: &Path) -> Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }
    let text =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(Some(text.trim().to_string()))
}

pub fn write_value(path: &Path, value: &str) -> Result<()> {
    write_atomic(path, value.as_bytes())
}
