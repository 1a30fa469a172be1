//! Rendered service configs: reverse proxy, log shipper and firewall rules.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;

use nodeops_core::config::NodePaths;
use nodeops_core::params::NodeParams;

use crate::firewall;

const NGINX: &str = include_str!("../resources/templates/nginx.conf.tera");
const FILEBEAT: &str = include_str!("../resources/templates/filebeat.yml.tera");
const IPTABLES: &str = include_str!("../resources/templates/iptables.rules.tera");

/// Upstream the proxy forwards to, inside the compose network.
const API_UPSTREAM: &str = "api:3008";
const RATE_LIMIT: u32 = 50;

fn engine() -> Result<tera::Tera> {
    let mut tera = tera::Tera::default();
    tera.add_raw_templates([
        ("nginx.conf", NGINX),
        ("filebeat.yml", FILEBEAT),
        ("iptables.rules", IPTABLES),
    ])
    .map_err(|e| anyhow::anyhow!("Failed to parse templates: {}", e))?;
    Ok(tera)
}

fn context(paths: &NodePaths, params: &NodeParams) -> tera::Context {
    let mut ctx = tera::Context::new();
    ctx.insert("env_type", &params.env_type);
    ctx.insert("endpoint", &params.endpoint);
    ctx.insert("api_upstream", API_UPSTREAM);
    ctx.insert("rate_limit", &RATE_LIMIT);
    ctx.insert("ssl_dir", &paths.node_data_dir().join("ssl"));
    if let Some(host) = &params.telemetry_host {
        ctx.insert("telemetry_host", host);
    }
    ctx.insert("rules", &firewall::accept_rules());
    ctx.insert("drop", &firewall::drop_rule());
    ctx
}

pub fn render(name: &str, paths: &NodePaths, params: &NodeParams) -> Result<String> {
    engine()?
        .render(name, &context(paths, params))
        .map_err(|e| anyhow::anyhow!("Failed to render {}: {}", name, e))
}

/// Render every config that applies to `params` into the rendered dir.
/// The log shipper config is removed when telemetry is off.
pub fn render_configs(paths: &NodePaths, params: &NodeParams) -> Result<Vec<PathBuf>> {
    let dir = paths.rendered_dir();
    fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    let mut names = vec!["nginx.conf", "iptables.rules"];
    if params.telemetry_host.is_some() {
        names.push("filebeat.yml");
    } else {
        let stale = dir.join("filebeat.yml");
        if stale.exists() {
            fs::remove_file(&stale)
                .with_context(|| format!("Failed to remove {}", stale.display()))?;
        }
    }

    let mut written = Vec::new();
    for name in names {
        let path = dir.join(name);
        let text = render(name, paths, params)?;
        fs::write(&path, text).with_context(|| format!("Failed to write {}", path.display()))?;
        written.push(path);
    }
    info!(count = written.len(), dir = %dir.display(), "configs rendered");
    Ok(written)
}
