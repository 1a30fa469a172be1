//! Measure the host and persist the resource allocation.

use anyhow::Result;
use tracing::{info, instrument};

use nodeops_core::alloc::{
    self, CompanionAllocation, ResourceAlloc, ResourceAllocation, WorkloadAllocation,
};
use nodeops_core::config::{NodePaths, Sampling};
use nodeops_core::params::EnvParams;

use crate::{host, store};

/// Disk tiers for `device`. A device that cannot be measured is fatal.
pub fn get_disk_alloc(device: &str) -> Result<ResourceAlloc> {
    let raw = host::disk_size(device)?;
    Ok(alloc::disk_alloc(raw))
}

/// Averaged total memory in bytes.
pub fn get_total_memory(sampling: Sampling) -> Result<f64> {
    host::sample_average(sampling, || Ok(host::meminfo()?.total))
}

/// Averaged logical CPU count.
pub fn get_cpu_count(sampling: Sampling) -> Result<f64> {
    host::sample_average(sampling, host::cpu_count)
}

/// Compute a fresh allocation from live measurements.
#[instrument(skip(env, sampling))]
pub fn compose_resource_allocation(
    env: &EnvParams,
    disk_device: &str,
    sampling: Sampling,
) -> Result<ResourceAllocation> {
    let disk = get_disk_alloc(disk_device)?;
    let memory = get_total_memory(sampling)?;
    let cpus = get_cpu_count(sampling)?;
    let proportions = &env.allocation;

    let volume_limits = alloc::compose_volume_allocation(&disk, &proportions.volume_limits);
    Ok(ResourceAllocation {
        workload: WorkloadAllocation {
            cpu_shares: alloc::cpu_alloc(cpus, proportions.cpu.workload),
            mem: alloc::memory_alloc(memory, proportions.mem.workload),
            disk,
            volume_limits,
        },
        companion: CompanionAllocation {
            cpu_shares: alloc::cpu_alloc(cpus, proportions.cpu.companion),
            mem: alloc::memory_alloc(memory, proportions.mem.companion),
        },
    })
}

pub fn load_allocation(paths: &NodePaths) -> Result<Option<ResourceAllocation>> {
    store::read_json(&paths.resource_allocation())
}

pub fn save_allocation(paths: &NodePaths, allocation: &ResourceAllocation) -> Result<()> {
    store::write_json(&paths.resource_allocation(), allocation)
}

/// Measure, compose and persist. Nothing is written if any measurement fails.
pub fn update_resource_allocation(
    paths: &NodePaths,
    env: &EnvParams,
    disk_device: &str,
    sampling: Sampling,
) -> Result<ResourceAllocation> {
    let allocation = compose_resource_allocation(env, disk_device, sampling)?;
    save_allocation(paths, &allocation)?;
    info!(path = %paths.resource_allocation().display(), "resource allocation saved");
    Ok(allocation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell_mock::{self, MockResponse};
    use crate::testutil;
    use nodeops_core::alloc::{Tier, VOLUME_CHUNK};
    use nodeops_core::error::NodeError;

    #[test]
    fn test_compose_from_mocked_host() {
        let (_guard, calls) = shell_mock::healthy_host().install();
        let env = testutil::env_params();

        let alloc = compose_resource_allocation(&env, "/dev/sdb", testutil::instant()).unwrap();

        assert_eq!(alloc.workload.disk.get(Tier::Large) % VOLUME_CHUNK, 0);
        // 4 cores * 1024 shares * 0.9 * 0.8
        assert_eq!(alloc.workload.cpu_shares.get(Tier::Large), 2949);
        assert_eq!(alloc.companion.cpu_shares.get(Tier::Large), 737);
        let state = alloc.workload.volume_limits[&Tier::Large]["state"];
        assert_eq!(state, (alloc.workload.disk.get(Tier::Large) as f64 * 0.6).floor() as u64);
        assert_eq!(calls.count("blockdev --getsize64 /dev/sdb"), 1);
        assert_eq!(calls.count("nproc"), testutil::instant().count as usize);
    }

    #[test]
    fn test_unmeasurable_disk_persists_nothing() {
        let (_guard, _calls) = shell_mock::healthy_host()
            .respond("blockdev", MockResponse::fail(1, "not a block device"))
            .install();
        let dir = tempfile::tempdir().unwrap();
        let paths = NodePaths::new(dir.path());

        let env = testutil::env_params();
        let err =
            update_resource_allocation(&paths, &env, "/mnt/x", testutil::instant()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<NodeError>(),
            Some(NodeError::DiskMeasurement { .. })
        ));
        assert!(!paths.resource_allocation().exists());
    }

    #[test]
    fn test_update_persists_allocation() {
        let (_guard, _calls) = shell_mock::healthy_host().install();
        let dir = tempfile::tempdir().unwrap();
        let paths = NodePaths::new(dir.path());

        let env = testutil::env_params();
        let alloc =
            update_resource_allocation(&paths, &env, "/dev/sdb", testutil::instant()).unwrap();
        assert_eq!(load_allocation(&paths).unwrap(), Some(alloc));
    }
}
