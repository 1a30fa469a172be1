use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgAction, CommandFactory, Parser, Subcommand};

use crate::display;
use crate::logging::{self, LogFormat};
use crate::ui;

use nodeops_core::checks::CheckType;
use nodeops_core::config::{NodePaths, Settings};
use nodeops_core::error::exit_code_for;
use nodeops_core::meta::Meta;
use nodeops_core::options::NodeOptions;
use nodeops_core::params::NodeParams;
use nodeops_runtime::backend::BackendClient;
use nodeops_runtime::guard::{self, NodeState};
use nodeops_runtime::options::OptionsStore;
use nodeops_runtime::orchestrator::{
    self, InitOptions, RestoreOptions, TransitionContext, UpdateOptions,
};
use nodeops_runtime::{allocation, containers, host, store};

#[derive(Parser)]
#[command(
    name = "nodeops",
    version,
    about = "Lifecycle manager for a single container-based service node"
)]
struct Cli {
    /// Log format for the tracing stream on stderr
    #[arg(long, global = true, value_enum, default_value = "human")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    // ---- Lifecycle ----
    /// Provision a bare host and start the node
    Init {
        /// Node parameters file (TOML)
        #[arg(long, short = 'c')]
        config: PathBuf,
        /// Leave the container runtime daemon configuration untouched
        #[arg(long)]
        skip_docker_config: bool,
    },
    /// Move an initialized node to new service definitions
    Update {
        /// Node parameters file (TOML)
        #[arg(long, short = 'c')]
        config: PathBuf,
        /// Leave the container runtime daemon configuration untouched
        #[arg(long)]
        skip_docker_config: bool,
        /// Keep unused images even when the service definitions change
        #[arg(long)]
        skip_cleanup: bool,
        /// Skip the backend update-safety check
        #[arg(long = "unsafe")]
        unsafe_ok: bool,
        /// Do not ask for confirmation (required without a terminal)
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Stop the node's containers
    TurnOff {
        /// Node parameters file (TOML)
        #[arg(long, short = 'c')]
        config: PathBuf,
        /// Put the node into maintenance before stopping
        #[arg(long)]
        maintenance_on: bool,
        /// Do not ask for confirmation (required without a terminal)
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Start the node's containers
    TurnOn {
        /// Node parameters file (TOML)
        #[arg(long, short = 'c')]
        config: PathBuf,
        /// Take the node out of maintenance after starting
        #[arg(long)]
        maintenance_off: bool,
    },
    /// Re-provision the host from a backup archive
    Restore {
        /// Archive produced by `nodeops backup`
        archive: PathBuf,
        /// Node parameters file (TOML)
        #[arg(long, short = 'c')]
        config: PathBuf,
        /// Restore configuration only; do not start containers
        #[arg(long)]
        config_only: bool,
        /// Leave the container runtime daemon configuration untouched
        #[arg(long)]
        skip_docker_config: bool,
    },
    /// Archive the node root into a directory
    Backup {
        /// Destination directory
        dir: PathBuf,
    },

    // ---- Inspection ----
    /// Run host readiness checks and print the merged report
    Checks {
        /// Node parameters file (TOML)
        #[arg(long, short = 'c')]
        config: PathBuf,
        /// Only run probes of this phase
        #[arg(long = "type", value_parser = ["preinstall", "postinstall"])]
        check_type: Option<String>,
    },
    /// Show or recompute the resource allocation
    Resources {
        #[command(subcommand)]
        action: ResourcesCmd,
    },
    /// Show or change node options
    Options {
        #[command(subcommand)]
        action: OptionsCmd,
    },
    /// Query the administrative backend
    Node {
        #[command(subcommand)]
        action: NodeCmd,
    },
    /// Show node state, metadata and containers
    Status,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
enum ResourcesCmd {
    /// Print the persisted allocation
    Show,
    /// Measure the host and rewrite the allocation
    Generate {
        /// Node parameters file (TOML)
        #[arg(long, short = 'c')]
        config: PathBuf,
    },
}

#[derive(Subcommand)]
enum OptionsCmd {
    /// Print all node options
    Show,
    /// Set one node option
    Set {
        /// Option name (archive, catchup, historic_state)
        key: String,
        #[arg(action = ArgAction::Set)]
        value: bool,
    },
}

#[derive(Subcommand)]
enum NodeCmd {
    /// Print what the backend reports about this node
    Info,
}

/// Parse arguments, dispatch, and return the process exit code.
pub fn run() -> i32 {
    let cli = Cli::parse();
    logging::init(cli.log_format);

    match dispatch(cli.command) {
        Ok(()) => 0,
        Err(err) => {
            ui::error_block(&err);
            exit_code_for(&err).code()
        }
    }
}

fn dispatch(command: Commands) -> Result<()> {
    let settings = Settings::from_env();

    match command {
        Commands::Init {
            config,
            skip_docker_config,
        } => cmd_init(settings, &config, skip_docker_config),
        Commands::Update {
            config,
            skip_docker_config,
            skip_cleanup,
            unsafe_ok,
            yes,
        } => cmd_update(
            settings,
            &config,
            UpdateOptions {
                skip_docker_config,
                skip_cleanup,
                unsafe_ok,
            },
            yes,
        ),
        Commands::TurnOff {
            config,
            maintenance_on,
            yes,
        } => cmd_turn_off(settings, &config, maintenance_on, yes),
        Commands::TurnOn {
            config,
            maintenance_off,
        } => cmd_turn_on(settings, &config, maintenance_off),
        Commands::Restore {
            archive,
            config,
            config_only,
            skip_docker_config,
        } => cmd_restore(
            settings,
            &config,
            RestoreOptions {
                archive,
                config_only,
                skip_docker_config,
            },
        ),
        Commands::Backup { dir } => cmd_backup(settings, &dir),
        Commands::Checks { config, check_type } => {
            cmd_checks(&settings, &config, check_type.as_deref())
        }
        Commands::Resources { action } => match action {
            ResourcesCmd::Show => cmd_resources_show(&settings.paths()),
            ResourcesCmd::Generate { config } => cmd_resources_generate(&settings, &config),
        },
        Commands::Options { action } => match action {
            OptionsCmd::Show => cmd_options_show(&settings.paths()),
            OptionsCmd::Set { key, value } => cmd_options_set(&settings.paths(), &key, value),
        },
        Commands::Node { action } => match action {
            NodeCmd::Info => cmd_node_info(&settings),
        },
        Commands::Status => cmd_status(&settings.paths()),
        Commands::Completions { shell } => cmd_completions(shell),
    }
}

// ============================================================================
// Lifecycle
// ============================================================================

fn context(settings: Settings) -> TransitionContext {
    TransitionContext::new(settings, host::current_uid())
}

fn cmd_init(settings: Settings, config: &Path, skip_docker_config: bool) -> Result<()> {
    let params = NodeParams::load(config)?;
    let ctx = context(settings);
    ui::banner(
        "Initializing node",
        &[
            ("env", params.env_type.clone()),
            ("root", ctx.paths.root.display().to_string()),
        ],
    );
    orchestrator::init(&ctx, &params, &InitOptions { skip_docker_config })?;
    ui::success("Node initialized.");
    Ok(())
}

fn cmd_update(settings: Settings, config: &Path, opts: UpdateOptions, yes: bool) -> Result<()> {
    let params = NodeParams::load(config)?;
    let ctx = context(settings);
    ctx.state.require_inited()?;

    if !yes
        && !ui::confirm(&format!(
            "Update node to '{}'? Containers will be restarted.",
            params.container_configs_stream
        ))?
    {
        ui::info("Update cancelled.");
        return Ok(());
    }

    orchestrator::update(&ctx, &params, &opts)?;
    ui::success(&format!(
        "Node updated to '{}'.",
        params.container_configs_stream
    ));
    Ok(())
}

fn cmd_turn_off(settings: Settings, config: &Path, maintenance_on: bool, yes: bool) -> Result<()> {
    let params = NodeParams::load(config)?;
    let ctx = context(settings);
    ctx.state.require_inited()?;

    if !yes && !ui::confirm("Stop all node containers?")? {
        ui::info("Turn off cancelled.");
        return Ok(());
    }

    orchestrator::turn_off(&ctx, &params, maintenance_on)?;
    ui::success("Node turned off.");
    Ok(())
}

fn cmd_turn_on(settings: Settings, config: &Path, maintenance_off: bool) -> Result<()> {
    let params = NodeParams::load(config)?;
    let ctx = context(settings);
    orchestrator::turn_on(&ctx, &params, maintenance_off)?;
    ui::success("Node turned on.");
    Ok(())
}

fn cmd_restore(settings: Settings, config: &Path, opts: RestoreOptions) -> Result<()> {
    let params = NodeParams::load(config)?;
    if !opts.archive.is_file() {
        anyhow::bail!("Backup archive not found: {}", opts.archive.display());
    }
    let ctx = context(settings);
    ui::banner(
        "Restoring node",
        &[
            ("archive", opts.archive.display().to_string()),
            ("root", ctx.paths.root.display().to_string()),
        ],
    );
    orchestrator::restore(&ctx, &params, &opts)?;
    if opts.config_only {
        ui::success("Node configuration restored; containers were not started.");
    } else {
        ui::success("Node restored.");
    }
    Ok(())
}

fn cmd_backup(settings: Settings, dir: &Path) -> Result<()> {
    let ctx = context(settings);
    let sp = ui::spinner("Creating backup archive...");
    let result = orchestrator::backup(&ctx, dir);
    sp.finish_and_clear();
    let archive = result?;
    ui::success(&format!("Backup written to {}", archive.display()));
    Ok(())
}

// ============================================================================
// Inspection
// ============================================================================

fn cmd_checks(settings: &Settings, config: &Path, check_type: Option<&str>) -> Result<()> {
    let params = NodeParams::load(config)?;
    let check_type = check_type.map(str::parse::<CheckType>).transpose()?;
    let paths = settings.paths();
    let env = orchestrator::load_env_params(&paths, &params.env_type)?;
    let disk = store::read_value(&paths.disk_mountpoint())?
        .unwrap_or_else(|| params.disk_mountpoint.clone());

    let sp = ui::spinner("Running host checks...");
    let result = orchestrator::run_host_checks(settings, &env, &disk, check_type);
    sp.finish_and_clear();
    let failed = result?;

    let report = store::get_report(&paths.checks_report())?;
    println!("{}", display::report_table(&report));
    println!();
    if failed.is_empty() {
        ui::success("All checks passed.");
        Ok(())
    } else {
        anyhow::bail!("{} check(s) did not pass", failed.len())
    }
}

fn cmd_resources_show(paths: &NodePaths) -> Result<()> {
    match allocation::load_allocation(paths)? {
        Some(alloc) => {
            println!("{}", display::allocation_table(&alloc));
            Ok(())
        }
        None => {
            ui::info("No resource allocation yet. Run 'nodeops init' first.");
            Ok(())
        }
    }
}

fn cmd_resources_generate(settings: &Settings, config: &Path) -> Result<()> {
    let params = NodeParams::load(config)?;
    let paths = settings.paths();
    guard::check_inited(&paths)?;
    guard::check_user(&paths, host::current_uid())?;

    let env = orchestrator::load_env_params(&paths, &params.env_type)?;
    let disk = store::read_value(&paths.disk_mountpoint())?
        .unwrap_or_else(|| params.disk_mountpoint.clone());

    let sp = ui::spinner("Measuring host resources...");
    let result = allocation::update_resource_allocation(&paths, &env, &disk, settings.sampling);
    sp.finish_and_clear();
    let alloc = result?;

    println!("{}", display::allocation_table(&alloc));
    ui::success(&format!(
        "Allocation written to {}",
        paths.resource_allocation().display()
    ));
    Ok(())
}

fn cmd_options_show(paths: &NodePaths) -> Result<()> {
    let opts = OptionsStore::new(paths).load()?;
    for key in NodeOptions::KEYS {
        ui::status_line(&format!("{key}:"), &opts.get(key)?.to_string());
    }
    Ok(())
}

fn cmd_options_set(paths: &NodePaths, key: &str, value: bool) -> Result<()> {
    guard::check_user(paths, host::current_uid())?;
    OptionsStore::new(paths)
        .update(|opts| opts.set(key, value))
        .with_context(|| format!("Failed to set node option '{key}'"))?;
    ui::success(&format!("Option '{key}' set to {value}."));
    Ok(())
}

fn cmd_node_info(settings: &Settings) -> Result<()> {
    let info = BackendClient::new(&settings.backend_url)?.node_info()?;
    println!("{}", display::pretty_json(&info));
    Ok(())
}

fn cmd_status(paths: &NodePaths) -> Result<()> {
    ui::status_header();

    let state = NodeState::read(paths);
    let state_text = match state {
        NodeState::Initialized => "Initialized",
        NodeState::Uninitialized => "Uninitialized",
    };
    ui::status_line("State:", state_text);
    ui::status_line("Root:", &paths.root.display().to_string());

    let meta: Option<Meta> = store::read_json(&paths.meta())?;
    match meta {
        Some(meta) => {
            ui::status_line("Version:", &meta.version);
            ui::status_line("Service definitions:", &meta.config_stream);
            ui::status_line("Volume manager:", &meta.volume_manager_stream);
            let os = format!("{} {}", meta.os_id, meta.os_version);
            ui::status_line("OS:", if os.trim().is_empty() { "-" } else { os.trim() });
        }
        None => ui::status_line("Version:", "-"),
    }

    if state == NodeState::Uninitialized {
        ui::status_line("Containers:", "-");
        return Ok(());
    }

    match containers::list_containers(nodeops_core::config::COMPOSE_PROJECT) {
        Ok(names) if names.is_empty() => ui::status_line("Containers:", "None"),
        Ok(names) => {
            ui::status_line("Containers:", &names.len().to_string());
            for name in names {
                ui::status_line(&format!("  {name}"), "present");
            }
        }
        Err(e) => {
            tracing::debug!(error = %e, "container listing failed");
            ui::status_line("Containers:", "-");
            ui::warn("Could not query the container runtime.");
        }
    }
    Ok(())
}

fn cmd_completions(shell: clap_complete::Shell) -> Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "nodeops", &mut std::io::stdout());
    Ok(())
}
