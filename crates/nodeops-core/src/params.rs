//! Parameter files: the operator-supplied node parameters and the
//! declarative requirement source shipped with the service definitions.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::NodeError;
use crate::options::NodeOptions;

/// Node parameters, read from the TOML file passed to `init`, `update` and `restore`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeParams {
    /// Deployment network; selects the requirement set in `static_params.toml`.
    pub env_type: String,
    pub container_configs_url: String,
    pub container_configs_stream: String,
    pub volume_manager_url: String,
    pub volume_manager_stream: String,
    /// Block device backing the workload volumes.
    pub disk_mountpoint: String,
    pub endpoint: String,
    pub manager_contracts_url: String,
    pub bridge_contracts_url: String,
    #[serde(default)]
    pub telemetry_host: Option<String>,
    /// Build images from this checkout instead of pulling them.
    #[serde(default)]
    pub source_dir: Option<PathBuf>,
    #[serde(default)]
    pub archive: bool,
    #[serde(default)]
    pub catchup: bool,
    #[serde(default)]
    pub historic_state: bool,
    /// Extra variables handed to the container runtime verbatim.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl NodeParams {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read node parameters: {}", path.display()))?;
        Self::from_toml_str(&text)
            .with_context(|| format!("Failed to parse node parameters: {}", path.display()))
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let params: NodeParams = toml::from_str(text)?;
        params.validate()?;
        Ok(params)
    }

    /// Reject empty required keys before any step runs.
    pub fn validate(&self) -> std::result::Result<(), NodeError> {
        let required = [
            ("env_type", &self.env_type),
            ("container_configs_url", &self.container_configs_url),
            ("container_configs_stream", &self.container_configs_stream),
            ("volume_manager_url", &self.volume_manager_url),
            ("volume_manager_stream", &self.volume_manager_stream),
            ("disk_mountpoint", &self.disk_mountpoint),
            ("endpoint", &self.endpoint),
            ("manager_contracts_url", &self.manager_contracts_url),
            ("bridge_contracts_url", &self.bridge_contracts_url),
        ];
        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, v)| v.trim().is_empty())
            .map(|(k, _)| *k)
            .collect();
        if !missing.is_empty() {
            return Err(NodeError::InvalidParams(format!(
                "missing required keys: {}",
                missing.join(", ")
            )));
        }
        Ok(())
    }

    pub fn options(&self) -> NodeOptions {
        NodeOptions {
            archive: self.archive,
            catchup: self.catchup,
            historic_state: self.historic_state,
        }
    }

    /// Environment passed to every container runtime invocation.
    pub fn compose_env(&self) -> BTreeMap<String, String> {
        let mut env = self.env.clone();
        env.insert("ENV_TYPE".into(), self.env_type.clone());
        env.insert("ENDPOINT".into(), self.endpoint.clone());
        env.insert("DISK_MOUNTPOINT".into(), self.disk_mountpoint.clone());
        env.insert(
            "CONTAINER_CONFIGS_STREAM".into(),
            self.container_configs_stream.clone(),
        );
        if let Some(host) = &self.telemetry_host {
            env.insert("TELEMETRY_HOST".into(), host.clone());
        }
        env
    }
}

/// Hardware minimums. Sizes are in bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerRequirements {
    pub cpu_total: u64,
    pub cpu_physical: u64,
    pub memory: u64,
    pub swap: u64,
    pub disk: u64,
}

/// Minimum container runtime versions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DockerRequirements {
    pub docker_engine: String,
    pub docker_compose: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkRequirements {
    #[serde(default = "default_probe_addr")]
    pub probe_addr: String,
    #[serde(default = "default_probe_timeout")]
    pub timeout_secs: u64,
}

fn default_probe_addr() -> String {
    "8.8.8.8:53".to_string()
}

fn default_probe_timeout() -> u64 {
    5
}

impl Default for NetworkRequirements {
    fn default() -> Self {
        Self {
            probe_addr: default_probe_addr(),
            timeout_secs: default_probe_timeout(),
        }
    }
}

/// Share of a host resource given to each service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceProportions {
    pub workload: f64,
    pub companion: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationParams {
    pub cpu: ServiceProportions,
    pub mem: ServiceProportions,
    /// Named volume sub-allocations as fractions of each disk tier.
    #[serde(default)]
    pub volume_limits: BTreeMap<String, f64>,
}

/// Requirement set for one deployment network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvParams {
    pub server: ServerRequirements,
    /// Package name to minimum version.
    #[serde(default)]
    pub packages: BTreeMap<String, String>,
    pub docker: DockerRequirements,
    #[serde(default)]
    pub network: NetworkRequirements,
    pub allocation: AllocationParams,
}

/// Contents of `static_params.toml` in the service-definition checkout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticParams {
    pub envs: BTreeMap<String, EnvParams>,
}

impl StaticParams {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read static params: {}", path.display()))?;
        toml::from_str(&text)
            .with_context(|| format!("Failed to parse static params: {}", path.display()))
    }

    pub fn for_env(&self, env_type: &str) -> std::result::Result<&EnvParams, NodeError> {
        self.envs.get(env_type).ok_or_else(|| {
            NodeError::InvalidParams(format!("no static params for env type '{env_type}'"))
        })
    }
}
