use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use anyhow::Context;
use nodeops_core::checks::CheckType;
use nodeops_core::params::{NetworkRequirements, ServerRequirements};

use super::{Checker, Probe, ProbeDef, ProbeResult, Verdict, at_least, bind};
use crate::host;

/// Hardware and connectivity requirements.
pub struct MachineChecker {
    requirements: ServerRequirements,
    network: NetworkRequirements,
    disk_device: String,
}

const PRE: &[CheckType] = &[CheckType::Preinstall];

impl MachineChecker {
    #[rustfmt::skip]
    const PROBES: &'static [ProbeDef<MachineChecker>] = &[
        ProbeDef { name: "cpu_total", phases: PRE, run: Self::cpu_total },
        ProbeDef { name: "cpu_physical", phases: PRE, run: Self::cpu_physical },
        ProbeDef { name: "memory", phases: PRE, run: Self::memory },
        ProbeDef { name: "swap", phases: PRE, run: Self::swap },
        ProbeDef { name: "disk", phases: PRE, run: Self::disk },
        ProbeDef { name: "network", phases: PRE, run: Self::network },
    ];

    pub fn new(
        requirements: ServerRequirements,
        network: NetworkRequirements,
        disk_device: impl Into<String>,
    ) -> Self {
        Self {
            requirements,
            network,
            disk_device: disk_device.into(),
        }
    }

    fn cpu_total(&self) -> ProbeResult {
        Ok(at_least(self.requirements.cpu_total, host::cpu_count()?))
    }

    fn cpu_physical(&self) -> ProbeResult {
        Ok(at_least(
            self.requirements.cpu_physical,
            host::physical_cpu_count()?,
        ))
    }

    fn memory(&self) -> ProbeResult {
        Ok(at_least(self.requirements.memory, host::meminfo()?.total))
    }

    fn swap(&self) -> ProbeResult {
        Ok(at_least(self.requirements.swap, host::meminfo()?.swap))
    }

    fn disk(&self) -> ProbeResult {
        Ok(at_least(
            self.requirements.disk,
            host::disk_size(&self.disk_device)?,
        ))
    }

    fn network(&self) -> ProbeResult {
        let timeout = Duration::from_secs(self.network.timeout_secs);
        let addr = self
            .network
            .probe_addr
            .to_socket_addrs()
            .with_context(|| format!("Cannot resolve {}", self.network.probe_addr))?
            .next()
            .with_context(|| format!("No address for {}", self.network.probe_addr))?;
        TcpStream::connect_timeout(&addr, timeout)
            .with_context(|| format!("Cannot connect to {addr}"))?;
        Ok(Verdict::Pass(Some(serde_json::json!({ "addr": addr.to_string() }))))
    }
}

impl Checker for MachineChecker {
    fn name(&self) -> &'static str {
        "machine"
    }

    fn probes(&self) -> Vec<Probe<'_>> {
        bind(self, Self::PROBES)
    }
}
