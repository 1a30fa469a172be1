use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, instrument, warn};

use nodeops_core::checks::{CheckResult, CheckType};
use nodeops_core::config::{CONTAINER_STOP_TIMEOUT, KERNEL_MODULE, NodePaths, Settings};
use nodeops_core::error::NodeError;
use nodeops_core::meta::Meta;
use nodeops_core::params::{EnvParams, NodeParams, StaticParams};

use super::{Step, TransitionContext, run_steps};
use crate::backend::BackendClient;
use crate::checks::{self, Checker, DockerChecker, MachineChecker, PackageChecker};
use crate::options::OptionsStore;
use crate::{
    allocation, artifacts, backup as archive, containers, daemon, firewall, git, guard, host,
    store, templates, volume,
};

#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    /// Leave the container runtime daemon config untouched.
    pub skip_docker_config: bool,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
    pub skip_docker_config: bool,
    /// Never prune images, even when the service-definition revision changed.
    pub skip_cleanup: bool,
    /// Proceed without asking the backend whether the update is safe.
    pub unsafe_ok: bool,
}

#[derive(Debug, Clone)]
pub struct RestoreOptions {
    pub archive: PathBuf,
    /// Restore configuration only; leave the containers down.
    pub config_only: bool,
    pub skip_docker_config: bool,
}

/// Requirement set for `env_type` from the synced service definitions.
pub fn load_env_params(paths: &NodePaths, env_type: &str) -> Result<EnvParams> {
    let statics = StaticParams::load(&paths.static_params())?;
    Ok(statics.for_env(env_type)?.clone())
}

/// Run the host checkers for one phase (or all), merge into the report,
/// and return the results that did not pass.
pub fn run_host_checks(
    settings: &Settings,
    env: &EnvParams,
    disk_device: &str,
    check_type: Option<CheckType>,
) -> Result<Vec<CheckResult>> {
    let machine = MachineChecker::new(env.server.clone(), env.network.clone(), disk_device);
    let packages = PackageChecker::new(env.packages.clone());
    let docker = DockerChecker::new(
        env.docker.clone(),
        settings.docker_daemon_config.clone(),
        settings.docker_socket.clone(),
    );
    let checkers: [&dyn Checker; 3] = [&machine, &packages, &docker];
    checks::run_checks(&checkers, check_type, &settings.paths().checks_report())
}

fn preflight(settings: &Settings, env_type: &str, disk_device: &str) -> Result<()> {
    let env = load_env_params(&settings.paths(), env_type)?;
    let failed = run_host_checks(settings, &env, disk_device, Some(CheckType::Preinstall))?;
    if !failed.is_empty() {
        return Err(NodeError::PreflightFailed(failed).into());
    }
    Ok(())
}

fn postflight(settings: &Settings, env_type: &str, disk_device: &str) -> Result<()> {
    let env = load_env_params(&settings.paths(), env_type)?;
    let failed = run_host_checks(settings, &env, disk_device, Some(CheckType::Postinstall))?;
    if !failed.is_empty() {
        warn!(failed = failed.len(), "postinstall checks failed, host state is left as is");
        return Err(NodeError::PostflightFailed(failed).into());
    }
    Ok(())
}

// ── Shared steps ────────────────────────────────────────────────────────

fn sync_config(paths: &NodePaths, params: &NodeParams) -> Result<()> {
    git::ensure_repo(
        &params.container_configs_url,
        &paths.config_dir(),
        &params.container_configs_stream,
    )
}

fn create_data_tree(paths: &NodePaths) -> Result<()> {
    for dir in paths.data_tree() {
        fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    Ok(())
}

fn data_tree_exists(paths: &NodePaths) -> bool {
    paths.data_tree().iter().all(|d| d.is_dir())
}

fn allocate(settings: &Settings, params: &NodeParams, disk_device: &str) -> Result<()> {
    let paths = settings.paths();
    let env = load_env_params(&paths, &params.env_type)?;
    allocation::update_resource_allocation(&paths, &env, disk_device, settings.sampling)?;
    Ok(())
}

fn save_meta(paths: &NodePaths, params: &NodeParams) -> Result<()> {
    let (os_id, os_version) = host::os_release();
    let meta = Meta {
        version: env!("CARGO_PKG_VERSION").to_string(),
        config_stream: params.container_configs_stream.clone(),
        volume_manager_stream: params.volume_manager_stream.clone(),
        os_id,
        os_version,
    };
    store::save_meta(paths, &meta)
}

/// Options, single-value files, authorized user and metadata.
fn save_node_settings(ctx: &TransitionContext, params: &NodeParams) -> Result<()> {
    let paths = &ctx.paths;
    OptionsStore::new(paths).replace(&params.options())?;
    store::write_value(&paths.disk_mountpoint(), &params.disk_mountpoint)?;
    store::write_value(&paths.endpoint_url(), &params.endpoint)?;
    guard::record_user(paths, ctx.uid)?;
    save_meta(paths, params)
}

fn teardown(paths: &NodePaths, env: &BTreeMap<String, String>) -> Result<()> {
    containers::compose_rm(paths, env, CONTAINER_STOP_TIMEOUT)?;
    containers::remove_dynamic_containers(CONTAINER_STOP_TIMEOUT)?;
    Ok(())
}

fn fetch_images(paths: &NodePaths, params: &NodeParams) -> Result<()> {
    let env = params.compose_env();
    match &params.source_dir {
        Some(dir) => containers::compose_build(paths, &env, dir),
        None => containers::compose_pull(paths, &env),
    }
}

fn start_containers(paths: &NodePaths, params: &NodeParams) -> Result<()> {
    let services = containers::services(params.telemetry_host.is_some());
    containers::compose_up(paths, &params.compose_env(), &services)
}

fn fetch_images_step<'a>(paths: &'a NodePaths, params: &'a NodeParams) -> Step<'a> {
    let name = if params.source_dir.is_some() {
        "build images"
    } else {
        "pull images"
    };
    Step::new(name, move || fetch_images(paths, params))
}

// ── Transitions ─────────────────────────────────────────────────────────

/// Provision a bare host.
#[instrument(skip_all, fields(env_type = %params.env_type))]
pub fn init(ctx: &TransitionContext, params: &NodeParams, opts: &InitOptions) -> Result<()> {
    ctx.state.require_not_inited()?;
    guard::check_user(&ctx.paths, ctx.uid)?;

    let settings = &ctx.settings;
    let paths = &ctx.paths;
    let disk = params.disk_mountpoint.as_str();

    let mut steps = vec![
        Step::new("sync service definitions", || sync_config(paths, params)),
        Step::new("load kernel module", || {
            daemon::ensure_kernel_module(KERNEL_MODULE).map(|_| ())
        }),
    ];
    if !opts.skip_docker_config {
        steps.push(Step::new("configure docker daemon", || {
            daemon::configure(settings).map(|_| ())
        }));
    }
    steps.extend([
        Step::new("create data directories", || create_data_tree(paths))
            .skip_if(|| data_tree_exists(paths)),
        Step::new("fetch contract artifacts", || {
            artifacts::download_contracts(paths, params)
        }),
        Step::new("render configs", || {
            templates::render_configs(paths, params).map(|_| ())
        }),
        Step::new("preinstall checks", || preflight(settings, &params.env_type, disk)),
        Step::new("apply firewall rules", || firewall::apply().map(|_| ())),
        Step::new("install volume manager", || volume::install(paths, params, disk)),
        Step::new("save node settings", || save_node_settings(ctx, params)),
        Step::new("allocate resources", || allocate(settings, params, disk)),
        fetch_images_step(paths, params),
        Step::new("start containers", || start_containers(paths, params)),
        Step::new("postinstall checks", || postflight(settings, &params.env_type, disk)),
    ]);
    run_steps("init", steps)
}

/// Move an initialized node to new service definitions.
#[instrument(skip_all, fields(stream = %params.container_configs_stream))]
pub fn update(ctx: &TransitionContext, params: &NodeParams, opts: &UpdateOptions) -> Result<()> {
    ctx.state.require_inited()?;
    guard::check_user(&ctx.paths, ctx.uid)?;
    if opts.unsafe_ok {
        warn!("skipping update safety check");
    } else {
        BackendClient::new(&ctx.settings.backend_url)?.require_update_safe()?;
    }

    let settings = &ctx.settings;
    let paths = &ctx.paths;
    let disk = store::read_value(&paths.disk_mountpoint())?
        .unwrap_or_else(|| params.disk_mountpoint.clone());
    let compose_env = params.compose_env();

    let meta = store::get_meta(paths)?;
    let cleanup =
        !opts.skip_cleanup && meta.config_stream_changed(&params.container_configs_stream);
    info!(from = %meta.config_stream, to = %params.container_configs_stream, cleanup, "updating");

    let mut steps = vec![
        Step::new("stop containers", || teardown(paths, &compose_env)),
        Step::new("sync service definitions", || sync_config(paths, params)),
    ];
    if !opts.skip_docker_config {
        steps.push(Step::new("configure docker daemon", || {
            daemon::configure(settings).map(|_| ())
        }));
    }
    steps.extend([
        Step::new("load kernel module", || {
            daemon::ensure_kernel_module(KERNEL_MODULE).map(|_| ())
        }),
        Step::new("create data directories", || create_data_tree(paths))
            .skip_if(|| data_tree_exists(paths)),
        Step::new("update contract artifacts", || {
            artifacts::download_contracts(paths, params)
        }),
        Step::new("install volume manager", || volume::install(paths, params, &disk)),
        Step::new("render configs", || {
            templates::render_configs(paths, params).map(|_| ())
        }),
        Step::new("apply firewall rules", || firewall::apply().map(|_| ())),
        Step::new("allocate resources", || allocate(settings, params, &disk)),
    ]);
    if cleanup {
        steps.push(Step::new("remove unused images", containers::remove_unused_images));
    }
    steps.extend([
        Step::new("save metadata", || {
            store::write_value(&paths.endpoint_url(), &params.endpoint)?;
            save_meta(paths, params)
        }),
        fetch_images_step(paths, params),
        Step::new("start containers", || start_containers(paths, params)),
    ]);
    run_steps("update", steps)
}

/// Stop the container set, optionally announcing maintenance first.
#[instrument(skip(ctx, params))]
pub fn turn_off(ctx: &TransitionContext, params: &NodeParams, maintenance_on: bool) -> Result<()> {
    ctx.state.require_inited()?;
    guard::check_user(&ctx.paths, ctx.uid)?;

    let paths = &ctx.paths;
    let compose_env = params.compose_env();
    let mut steps = Vec::new();
    if maintenance_on {
        steps.push(Step::new("enable maintenance mode", || {
            BackendClient::new(&ctx.settings.backend_url)?.set_maintenance(true)
        }));
    }
    steps.push(Step::new("stop containers", || teardown(paths, &compose_env)));
    run_steps("turn_off", steps)
}

/// Start the container set, optionally leaving maintenance afterwards.
#[instrument(skip(ctx, params))]
pub fn turn_on(ctx: &TransitionContext, params: &NodeParams, maintenance_off: bool) -> Result<()> {
    ctx.state.require_inited()?;
    guard::check_user(&ctx.paths, ctx.uid)?;

    let paths = &ctx.paths;
    let mut steps = vec![Step::new("start containers", || start_containers(paths, params))];
    if maintenance_off {
        steps.push(Step::new("disable maintenance mode", || {
            BackendClient::new(&ctx.settings.backend_url)?.set_maintenance(false)
        }));
    }
    run_steps("turn_on", steps)
}

/// Re-provision a bare host from a backup archive.
#[instrument(skip_all, fields(archive = %opts.archive.display()))]
pub fn restore(ctx: &TransitionContext, params: &NodeParams, opts: &RestoreOptions) -> Result<()> {
    ctx.state.require_not_inited()?;
    guard::check_user(&ctx.paths, ctx.uid)?;

    let settings = &ctx.settings;
    let paths = &ctx.paths;
    let disk = params.disk_mountpoint.as_str();

    let mut steps = vec![
        Step::new("unpack backup", || unpack(&opts.archive, paths)),
        Step::new("preinstall checks", || preflight(settings, &params.env_type, disk)),
        Step::new("load kernel module", || {
            daemon::ensure_kernel_module(KERNEL_MODULE).map(|_| ())
        }),
    ];
    if !opts.skip_docker_config {
        steps.push(Step::new("configure docker daemon", || {
            daemon::configure(settings).map(|_| ())
        }));
    }
    steps.extend([
        Step::new("create data directories", || create_data_tree(paths))
            .skip_if(|| data_tree_exists(paths)),
        Step::new("render configs", || {
            templates::render_configs(paths, params).map(|_| ())
        }),
        Step::new("apply firewall rules", || firewall::apply().map(|_| ())),
        Step::new("install volume manager", || volume::install(paths, params, disk)),
        Step::new("save node settings", || save_node_settings(ctx, params)),
        Step::new("allocate resources", || allocate(settings, params, disk)),
    ]);
    if !opts.config_only {
        steps.push(fetch_images_step(paths, params));
        steps.push(Step::new("start containers", || start_containers(paths, params)));
    }
    steps.push(Step::new("postinstall checks", || {
        postflight(settings, &params.env_type, disk)
    }));
    run_steps("restore", steps)
}

/// Unpack the archive. An allocation carried by an older archive is dropped:
/// the witness must only appear once this restore has recomputed it.
fn unpack(archive: &Path, paths: &NodePaths) -> Result<()> {
    archive::unpack_backup(archive, paths)?;
    let witness = paths.resource_allocation();
    if witness.exists() {
        fs::remove_file(&witness)
            .with_context(|| format!("Failed to remove {}", witness.display()))?;
    }
    Ok(())
}

/// Archive the node root into `dest_dir`.
pub fn backup(ctx: &TransitionContext, dest_dir: &Path) -> Result<PathBuf> {
    ctx.state.require_inited()?;
    guard::check_user(&ctx.paths, ctx.uid)?;
    archive::create_backup(&ctx.paths, dest_dir)
}
