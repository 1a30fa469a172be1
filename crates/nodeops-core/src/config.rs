use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default node root, overridable at runtime via `NODEOPS_HOME`.
pub const ROOT_DEFAULT: &str = "/var/lib/nodeops";
pub const DOCKER_DAEMON_CONFIG_DEFAULT: &str = "/etc/docker/daemon.json";
pub const DOCKER_SOCKET_DEFAULT: &str = "/var/run/nodeops/docker.sock";
pub const BACKEND_URL_DEFAULT: &str = "http://127.0.0.1:3007";

/// Project name passed to the container runtime; also the container name prefix.
pub const COMPOSE_PROJECT: &str = "nodeops";
/// Container name prefixes for the workload-specific containers that are
/// created by the backend rather than by the compose file.
pub const DYNAMIC_CONTAINER_PREFIXES: [&str; 2] = ["nodeops_workload_", "nodeops_companion_"];
/// Seconds given to containers to stop before they are killed.
pub const CONTAINER_STOP_TIMEOUT: u64 = 300;
/// Kernel module the volume manager depends on.
pub const KERNEL_MODULE: &str = "btrfs";
/// Volume group the volume manager carves workload volumes from.
pub const VOLUME_GROUP: &str = "nodeops";

/// Host measurement sampling for memory and CPU allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sampling {
    pub count: u32,
    pub interval: Duration,
}

impl Default for Sampling {
    fn default() -> Self {
        Self {
            count: 5,
            interval: Duration::from_secs(1),
        }
    }
}

/// Ambient settings, from the environment with defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub root: PathBuf,
    pub docker_daemon_config: PathBuf,
    pub docker_socket: PathBuf,
    pub backend_url: String,
    pub sampling: Sampling,
}

impl Settings {
    /// Read settings from `NODEOPS_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        Self {
            root: PathBuf::from(get("NODEOPS_HOME", ROOT_DEFAULT)),
            docker_daemon_config: PathBuf::from(get(
                "NODEOPS_DOCKER_DAEMON_CONFIG",
                DOCKER_DAEMON_CONFIG_DEFAULT,
            )),
            docker_socket: PathBuf::from(get("NODEOPS_DOCKER_SOCKET", DOCKER_SOCKET_DEFAULT)),
            backend_url: get("NODEOPS_BACKEND_URL", BACKEND_URL_DEFAULT),
            sampling: Sampling::default(),
        }
    }

    /// Settings rooted at `root` with every other value defaulted.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::from_lookup(|_| None)
        }
    }

    pub fn paths(&self) -> NodePaths {
        NodePaths::new(&self.root)
    }
}

/// Well-known locations under the node root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodePaths {
    pub root: PathBuf,
}

impl NodePaths {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    /// Checkout of the service-definition repository.
    pub fn config_dir(&self) -> PathBuf {
        self.root.join("config")
    }

    pub fn compose_file(&self) -> PathBuf {
        self.config_dir().join("docker-compose.yml")
    }

    pub fn static_params(&self) -> PathBuf {
        self.config_dir().join("static_params.toml")
    }

    pub fn node_data_dir(&self) -> PathBuf {
        self.root.join("node_data")
    }

    pub fn resource_allocation(&self) -> PathBuf {
        self.node_data_dir().join("resource_allocation.json")
    }

    pub fn meta(&self) -> PathBuf {
        self.root.join("meta.json")
    }

    pub fn node_options(&self) -> PathBuf {
        self.node_data_dir().join("node_options.json")
    }

    pub fn node_options_lock(&self) -> PathBuf {
        self.node_data_dir().join("node_options.json.lock")
    }

    pub fn checks_report(&self) -> PathBuf {
        self.root.join("reports").join("checks.json")
    }

    pub fn disk_mountpoint(&self) -> PathBuf {
        self.node_data_dir().join("disk_mountpoint.txt")
    }

    pub fn endpoint_url(&self) -> PathBuf {
        self.node_data_dir().join("endpoint_url.txt")
    }

    pub fn authorized_user(&self) -> PathBuf {
        self.node_data_dir().join("authorized_user.txt")
    }

    pub fn contracts_dir(&self) -> PathBuf {
        self.root.join("contracts")
    }

    pub fn contracts_backup_dir(&self) -> PathBuf {
        self.root.join("contracts.bak")
    }

    /// Rendered reverse-proxy, telemetry and firewall configs.
    pub fn rendered_dir(&self) -> PathBuf {
        self.node_data_dir().join("etc")
    }

    pub fn volume_manager_dir(&self) -> PathBuf {
        self.root.join("volume-manager")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.root.join("log")
    }

    /// Directories created by every provisioning transition.
    pub fn data_tree(&self) -> Vec<PathBuf> {
        vec![
            self.node_data_dir(),
            self.rendered_dir(),
            self.contracts_dir(),
            self.log_dir(),
            self.root.join("reports"),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_env() {
        let settings = Settings::from_lookup(|_| None);
        assert_eq!(settings.root, PathBuf::from(ROOT_DEFAULT));
        assert_eq!(settings.backend_url, BACKEND_URL_DEFAULT);
        assert_eq!(settings.sampling, Sampling::default());
    }

    #[test]
    fn test_env_overrides() {
        let settings = Settings::from_lookup(|key| match key {
            "NODEOPS_HOME" => Some("/tmp/node".to_string()),
            "NODEOPS_BACKEND_URL" => Some(String::new()),
            _ => None,
        });
        assert_eq!(settings.root, PathBuf::from("/tmp/node"));
        // empty values fall back to the default
        assert_eq!(settings.backend_url, BACKEND_URL_DEFAULT);
    }

    #[test]
    fn test_allocation_file_lives_under_node_data() {
        let paths = Settings::with_root("/srv/n").paths();
        assert_eq!(
            paths.resource_allocation(),
            PathBuf::from("/srv/n/node_data/resource_allocation.json")
        );
        assert!(paths.data_tree().contains(&paths.node_data_dir()));
    }
}
