//! Contract artifacts (ABIs) consumed by the node services.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use nodeops_core::config::NodePaths;
use nodeops_core::params::NodeParams;

use crate::http;

pub const MANAGER_FILE: &str = "manager.json";
pub const BRIDGE_FILE: &str = "bridge.json";

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(120);

/// Raw artifact bytes from an http(s) URL, a `file://` URL or a plain path.
fn read_source(source: &str) -> Result<Vec<u8>> {
    if source.starts_with("http://") || source.starts_with("https://") {
        return http::get_bytes(source, DOWNLOAD_TIMEOUT);
    }
    let local = source.strip_prefix("file://").unwrap_or(source);
    fs::read(local).with_context(|| format!("Failed to read {local}"))
}

/// Fetch one artifact into `dest`. The artifact must be a JSON document;
/// `dest` is only replaced once it is known to be one.
pub fn fetch(source: &str, dest: &Path) -> Result<()> {
    let bytes = read_source(source)?;
    serde_json::from_slice::<serde_json::Value>(&bytes)
        .with_context(|| format!("Contract artifact from {source} is not valid JSON"))?;
    let partial = dest.with_extension("part");
    fs::write(&partial, &bytes)
        .with_context(|| format!("Failed to write {}", partial.display()))?;
    fs::rename(&partial, dest)
        .with_context(|| format!("Failed to replace {}", dest.display()))?;
    Ok(())
}

/// Move the current artifacts aside so the previous set survives a failed download.
pub fn backup_contracts(paths: &NodePaths) -> Result<()> {
    let current = paths.contracts_dir();
    let backup = paths.contracts_backup_dir();
    if !current.exists() {
        return Ok(());
    }
    if backup.exists() {
        fs::remove_dir_all(&backup)
            .with_context(|| format!("Failed to remove {}", backup.display()))?;
    }
    fs::create_dir_all(&backup)?;
    for entry in fs::read_dir(&current)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            fs::copy(entry.path(), backup.join(entry.file_name()))?;
        }
    }
    Ok(())
}

/// Fetch both artifact files, replacing any previous copies.
pub fn download_contracts(paths: &NodePaths, params: &NodeParams) -> Result<()> {
    backup_contracts(paths)?;
    let dir = paths.contracts_dir();
    fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    fetch(&params.manager_contracts_url, &dir.join(MANAGER_FILE))
        .context("Failed to fetch manager contracts")?;
    fetch(&params.bridge_contracts_url, &dir.join(BRIDGE_FILE))
        .context("Failed to fetch bridge contracts")?;
    info!(dir = %dir.display(), "contract artifacts fetched");
    Ok(())
}
