//! Container runtime: the compose-managed service set plus the dynamic
//! workload containers created at run time.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;
use tracing::{info, instrument};

use nodeops_core::config::{COMPOSE_PROJECT, DYNAMIC_CONTAINER_PREFIXES, NodePaths};

use crate::shell;

/// Services started on every node.
pub const BASE_SERVICES: [&str; 4] = ["admin", "api", "proxy", "watchdog"];
/// Log shipper, started only when a telemetry host is configured.
pub const TELEMETRY_SERVICE: &str = "telemetry";

/// Services to bring up for the given telemetry setting.
pub fn services(telemetry: bool) -> Vec<&'static str> {
    let mut services = BASE_SERVICES.to_vec();
    if telemetry {
        services.push(TELEMETRY_SERVICE);
    }
    services
}

fn compose(
    paths: &NodePaths,
    env: &BTreeMap<String, String>,
    extra: &[&str],
    cwd: Option<&Path>,
) -> Result<String> {
    let file = paths.compose_file();
    let file = file.to_string_lossy();
    let mut args = vec!["compose", "-f", file.as_ref(), "-p", COMPOSE_PROJECT];
    args.extend_from_slice(extra);
    shell::run_checked_env("docker", &args, env, cwd)
}

#[instrument(skip(paths, env))]
pub fn compose_up(
    paths: &NodePaths,
    env: &BTreeMap<String, String>,
    services: &[&str],
) -> Result<()> {
    let mut args = vec!["up", "-d"];
    args.extend_from_slice(services);
    compose(paths, env, &args, None)?;
    info!("containers up");
    Ok(())
}

/// Stop and remove the compose-managed containers.
#[instrument(skip(paths, env))]
pub fn compose_rm(paths: &NodePaths, env: &BTreeMap<String, String>, timeout: u64) -> Result<()> {
    let timeout = timeout.to_string();
    compose(paths, env, &["down", "-t", &timeout], None)?;
    info!("containers removed");
    Ok(())
}

pub fn compose_pull(paths: &NodePaths, env: &BTreeMap<String, String>) -> Result<()> {
    compose(paths, env, &["pull"], None).map(|_| ())
}

/// Build images from a local source checkout instead of pulling them.
pub fn compose_build(
    paths: &NodePaths,
    env: &BTreeMap<String, String>,
    source_dir: &Path,
) -> Result<()> {
    compose(paths, env, &["build"], Some(source_dir)).map(|_| ())
}

/// Names of all containers (running or not) whose name matches `filter`.
pub fn list_containers(filter: &str) -> Result<Vec<String>> {
    let name_filter = format!("name={filter}");
    let out = shell::run_checked(
        "docker",
        &["ps", "-a", "--filter", &name_filter, "--format", "{{.Names}}"],
    )?;
    Ok(out
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect())
}

pub fn stop_and_remove(name: &str, timeout: u64) -> Result<()> {
    let timeout = timeout.to_string();
    shell::run_checked("docker", &["stop", "-t", &timeout, name])?;
    shell::run_checked("docker", &["rm", name])?;
    Ok(())
}

/// Remove every workload-specific container. Returns how many were removed.
pub fn remove_dynamic_containers(timeout: u64) -> Result<usize> {
    let mut removed = 0;
    for prefix in DYNAMIC_CONTAINER_PREFIXES {
        for name in list_containers(prefix)? {
            info!(container = %name, "removing dynamic container");
            stop_and_remove(&name, timeout)?;
            removed += 1;
        }
    }
    Ok(removed)
}

/// Destructive: removes every image not used by a container.
pub fn remove_unused_images() -> Result<()> {
    shell::run_checked("docker", &["image", "prune", "-af"])?;
    info!("unused images removed");
    Ok(())
}
