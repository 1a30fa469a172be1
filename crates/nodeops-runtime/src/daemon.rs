//! Container runtime daemon configuration and kernel prerequisites.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use tracing::info;

use nodeops_core::config::Settings;

use crate::{shell, store};

/// Parse the daemon config. A missing file is an error.
pub fn read_daemon_config(path: &Path) -> Result<Map<String, Value>> {
    let text =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let value: Value = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    match value {
        Value::Object(map) => Ok(map),
        _ => anyhow::bail!("{} is not a JSON object", path.display()),
    }
}

/// Enable live-restore and the node's socket in the daemon config, restarting
/// the daemon only when something changed. Returns whether it changed.
pub fn configure(settings: &Settings) -> Result<bool> {
    let path = &settings.docker_daemon_config;
    let mut config = if path.exists() {
        read_daemon_config(path)?
    } else {
        Map::new()
    };
    let before = config.clone();

    config.insert("live-restore".into(), Value::Bool(true));

    let socket = format!("unix://{}", settings.docker_socket.display());
    let hosts = config
        .entry("hosts")
        .or_insert_with(|| Value::Array(Vec::new()));
    if let Value::Array(list) = hosts {
        if !list.iter().any(|h| h.as_str() == Some(socket.as_str())) {
            list.push(Value::String(socket));
        }
    } else {
        anyhow::bail!("'hosts' in {} is not a list", path.display());
    }

    if let Some(dir) = settings.docker_socket.parent() {
        fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    if config == before {
        info!("docker daemon already configured");
        return Ok(false);
    }
    store::write_json(path, &Value::Object(config))?;
    shell::run_checked("systemctl", &["restart", "docker"])?;
    info!(path = %path.display(), "docker daemon reconfigured");
    Ok(true)
}

/// Load `module` unless `lsmod` already lists it.
pub fn ensure_kernel_module(module: &str) -> Result<bool> {
    let loaded = shell::run_checked("lsmod", &[])?;
    if loaded
        .lines()
        .any(|l| l.split_whitespace().next() == Some(module))
    {
        return Ok(false);
    }
    shell::run_checked("modprobe", &[module])?;
    info!(module, "kernel module loaded");
    Ok(true)
}
