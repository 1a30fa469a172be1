use std::path::PathBuf;

use anyhow::Context;
use nodeops_core::checks::CheckType;
use nodeops_core::params::DockerRequirements;

use super::packages::version_at_least;
use super::{Checker, Probe, ProbeDef, ProbeResult, Verdict, bind};
use crate::{daemon, shell};

/// Container runtime installation and configuration.
pub struct DockerChecker {
    requirements: DockerRequirements,
    daemon_config: PathBuf,
    socket: PathBuf,
}

const PRE: &[CheckType] = &[CheckType::Preinstall];
const POST: &[CheckType] = &[CheckType::Postinstall];
const BOTH: &[CheckType] = &[CheckType::Preinstall, CheckType::Postinstall];

impl DockerChecker {
    #[rustfmt::skip]
    const PROBES: &'static [ProbeDef<DockerChecker>] = &[
        ProbeDef { name: "docker_engine", phases: PRE, run: Self::docker_engine },
        ProbeDef { name: "docker_compose", phases: PRE, run: Self::docker_compose },
        ProbeDef { name: "docker_service_status", phases: BOTH, run: Self::docker_service_status },
        ProbeDef { name: "docker_live_restore", phases: POST, run: Self::docker_live_restore },
        ProbeDef { name: "docker_socket", phases: POST, run: Self::docker_socket },
    ];

    pub fn new(requirements: DockerRequirements, daemon_config: PathBuf, socket: PathBuf) -> Self {
        Self {
            requirements,
            daemon_config,
            socket,
        }
    }

    fn docker_engine(&self) -> ProbeResult {
        let actual = shell::run_checked("docker", &["version", "--format", "{{.Server.Version}}"])?;
        version_at_least(&self.requirements.docker_engine, &actual)
    }

    fn docker_compose(&self) -> ProbeResult {
        let actual = shell::run_checked("docker", &["compose", "version", "--short"])?;
        version_at_least(
            &self.requirements.docker_compose,
            actual.trim_start_matches('v'),
        )
    }

    fn docker_service_status(&self) -> ProbeResult {
        let state = shell::run_stdout("systemctl", &["is-active", "docker"])?;
        let info = Some(serde_json::Value::String(state.clone()));
        if state == "active" {
            Ok(Verdict::Pass(info))
        } else {
            Ok(Verdict::Fail(info))
        }
    }

    fn docker_live_restore(&self) -> ProbeResult {
        let config = daemon::read_daemon_config(&self.daemon_config)
            .with_context(|| format!("Cannot read {}", self.daemon_config.display()))?;
        let enabled = config
            .get("live-restore")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        let info = Some(serde_json::json!({ "live-restore": enabled }));
        Ok(if enabled {
            Verdict::Pass(info)
        } else {
            Verdict::Fail(info)
        })
    }

    fn docker_socket(&self) -> ProbeResult {
        let info = Some(serde_json::Value::String(self.socket.display().to_string()));
        if self.socket.exists() {
            Ok(Verdict::Pass(info))
        } else {
            Ok(Verdict::Fail(info))
        }
    }
}

impl Checker for DockerChecker {
    fn name(&self) -> &'static str {
        "docker"
    }

    fn probes(&self) -> Vec<Probe<'_>> {
        bind(self, Self::PROBES)
    }
}
