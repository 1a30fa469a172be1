//! Volume manager: carves workload volumes out of the node's block device.

use std::collections::BTreeMap;

use anyhow::Result;
use tracing::{info, instrument};

use nodeops_core::config::{NodePaths, VOLUME_GROUP};
use nodeops_core::params::NodeParams;

use crate::{git, shell};

const INSTALL_SCRIPT: &str = "scripts/install.sh";

fn installer_env(params: &NodeParams, device: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("BLOCK_DEVICE".to_string(), device.to_string()),
        ("VOLUME_GROUP".to_string(), VOLUME_GROUP.to_string()),
        ("ENV_TYPE".to_string(), params.env_type.clone()),
    ])
}

/// Sync the volume-manager checkout and run its installer against `device`,
/// the same block device the allocation was measured on. The installer is
/// idempotent.
#[instrument(skip(paths, params))]
pub fn install(paths: &NodePaths, params: &NodeParams, device: &str) -> Result<()> {
    let dir = paths.volume_manager_dir();
    git::ensure_repo(&params.volume_manager_url, &dir, &params.volume_manager_stream)?;

    let env = installer_env(params, device);
    shell::run_checked_env("bash", &[INSTALL_SCRIPT], &env, Some(&dir))?;
    info!("volume manager installed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell_mock::{MockResponse, mock_shell};
    use crate::testutil;

    #[test]
    fn test_install_syncs_then_runs_installer() {
        let (_guard, calls) = mock_shell().install();
        let dir = tempfile::tempdir().unwrap();
        let paths = NodePaths::new(dir.path());

        install(&paths, &testutil::node_params(), "/dev/sdb").unwrap();

        let clone = calls.position("git clone https://example.com/volume-manager.git").unwrap();
        let run = calls.position("bash scripts/install.sh").unwrap();
        assert!(clone < run);
    }

    #[test]
    fn test_installer_failure_propagates() {
        let (_guard, _calls) = mock_shell()
            .respond("bash scripts/install.sh", MockResponse::fail(1, "no such device"))
            .install();
        let dir = tempfile::tempdir().unwrap();
        let paths = NodePaths::new(dir.path());
        assert!(install(&paths, &testutil::node_params(), "/dev/sdb").is_err());
    }

    #[test]
    fn test_installer_targets_the_given_device() {
        let params = testutil::node_params();
        assert_eq!(params.disk_mountpoint, "/dev/sdb");
        let env = installer_env(&params, "/dev/nvme1n1");
        assert_eq!(env["BLOCK_DEVICE"], "/dev/nvme1n1");
        assert_eq!(env["VOLUME_GROUP"], VOLUME_GROUP);
        assert_eq!(env["ENV_TYPE"], "devnet");
    }
}
