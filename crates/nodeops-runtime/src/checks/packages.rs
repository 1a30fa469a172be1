use std::collections::BTreeMap;

use anyhow::Result;
use nodeops_core::checks::CheckType;

use super::{Checker, Probe, ProbeDef, ProbeResult, Verdict, bind};
use crate::shell;

/// Installed host packages, compared with the platform's own version ordering.
pub struct PackageChecker {
    /// Package name to minimum version.
    requirements: BTreeMap<String, String>,
}

const PRE: &[CheckType] = &[CheckType::Preinstall];

impl PackageChecker {
    #[rustfmt::skip]
    const PROBES: &'static [ProbeDef<PackageChecker>] = &[
        ProbeDef { name: "iptables_persistent", phases: PRE, run: Self::iptables_persistent },
        ProbeDef { name: "lvm2", phases: PRE, run: Self::lvm2 },
        ProbeDef { name: "btrfs_progs", phases: PRE, run: Self::btrfs_progs },
        ProbeDef { name: "lsof", phases: PRE, run: Self::lsof },
        ProbeDef { name: "psmisc", phases: PRE, run: Self::psmisc },
    ];

    pub fn new(requirements: BTreeMap<String, String>) -> Self {
        Self { requirements }
    }

    fn iptables_persistent(&self) -> ProbeResult {
        self.check_package("iptables-persistent")
    }

    fn lvm2(&self) -> ProbeResult {
        self.check_package("lvm2")
    }

    fn btrfs_progs(&self) -> ProbeResult {
        self.check_package("btrfs-progs")
    }

    fn lsof(&self) -> ProbeResult {
        self.check_package("lsof")
    }

    fn psmisc(&self) -> ProbeResult {
        self.check_package("psmisc")
    }

    fn check_package(&self, package: &str) -> ProbeResult {
        let actual = installed_version(package)?;
        match self.requirements.get(package) {
            None => Ok(Verdict::Pass(Some(serde_json::json!({ "actual": actual })))),
            Some(expected) => version_at_least(expected, &actual),
        }
    }
}

impl Checker for PackageChecker {
    fn name(&self) -> &'static str {
        "packages"
    }

    fn probes(&self) -> Vec<Probe<'_>> {
        bind(self, Self::PROBES)
    }
}

/// Installed version from the package database. Not installed is an error.
pub fn installed_version(package: &str) -> Result<String> {
    let output = shell::run_host("dpkg-query", &["-W", "-f=${Status} ${Version}", package])?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stdout = stdout.trim();
    match stdout.strip_prefix("install ok installed ") {
        Some(version) if output.status.success() && !version.is_empty() => {
            Ok(version.trim().to_string())
        }
        _ => anyhow::bail!("{package} is not installed"),
    }
}

/// Compare with `dpkg --compare-versions`, the platform's version ordering.
pub fn version_at_least(expected: &str, actual: &str) -> ProbeResult {
    let info = Some(serde_json::json!({ "expected": expected, "actual": actual }));
    let output = shell::run_host("dpkg", &["--compare-versions", actual, "ge", expected])?;
    match output.status.code() {
        Some(0) => Ok(Verdict::Pass(info)),
        Some(1) => Ok(Verdict::Fail(info)),
        code => anyhow::bail!(
            "dpkg --compare-versions exited with {:?}: {}",
            code,
            String::from_utf8_lossy(&output.stderr).trim()
        ),
    }
}
