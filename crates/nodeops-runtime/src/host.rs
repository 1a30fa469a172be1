//! Host measurements and identity.

use std::collections::HashSet;
use std::thread;

use anyhow::{Context, Result};
use nodeops_core::config::Sampling;
use nodeops_core::error::NodeError;

use crate::shell;

/// Logical CPU count.
pub fn cpu_count() -> Result<u64> {
    let out = shell::run_checked("nproc", &["--all"])?;
    out.parse()
        .with_context(|| format!("Unexpected nproc output: {out}"))
}

/// Physical core count (unique core/socket pairs).
pub fn physical_cpu_count() -> Result<u64> {
    let out = shell::run_checked("lscpu", &["-p=Core,Socket"])?;
    let cores: HashSet<&str> = out
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .collect();
    Ok(cores.len() as u64)
}

/// Memory and swap totals in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemInfo {
    pub total: u64,
    pub swap: u64,
}

pub fn meminfo() -> Result<MemInfo> {
    let out = shell::run_checked("cat", &["/proc/meminfo"])?;
    parse_meminfo(&out)
}

fn parse_meminfo(text: &str) -> Result<MemInfo> {
    let field = |name: &str| -> Result<u64> {
        let line = text
            .lines()
            .find(|l| l.starts_with(name))
            .with_context(|| format!("{name} missing from /proc/meminfo"))?;
        let kb: u64 = line
            .split_whitespace()
            .nth(1)
            .and_then(|v| v.parse().ok())
            .with_context(|| format!("Unparseable meminfo line: {line}"))?;
        Ok(kb * 1024)
    };
    Ok(MemInfo {
        total: field("MemTotal:")?,
        swap: field("SwapTotal:")?,
    })
}

/// Size of the block device backing the workload volumes.
///
/// Any failure to measure is a [`NodeError::DiskMeasurement`].
pub fn disk_size(device: &str) -> Result<u64> {
    let measure = || -> Result<u64> {
        let out = shell::run_checked("blockdev", &["--getsize64", device])?;
        out.parse()
            .with_context(|| format!("Unexpected blockdev output: {out}"))
    };
    measure().map_err(|e| {
        NodeError::DiskMeasurement {
            device: device.to_string(),
            detail: format!("{e:#}"),
        }
        .into()
    })
}

/// Average `count` readings taken `interval` apart.
pub fn sample_average(sampling: Sampling, measure: impl Fn() -> Result<u64>) -> Result<f64> {
    let count = sampling.count.max(1);
    let mut total = 0f64;
    for i in 0..count {
        total += measure()? as f64;
        if i + 1 < count && !sampling.interval.is_zero() {
            thread::sleep(sampling.interval);
        }
    }
    Ok(total / count as f64)
}

/// `ID` and `VERSION_ID` from `/etc/os-release`; empty strings when unknown.
pub fn os_release() -> (String, String) {
    let text = shell::run_stdout("cat", &["/etc/os-release"]).unwrap_or_default();
    let value = |key: &str| {
        text.lines()
            .find_map(|l| l.strip_prefix(key))
            .map(|v| v.trim().trim_matches('"').to_string())
            .unwrap_or_default()
    };
    (value("ID="), value("VERSION_ID="))
}

/// Effective uid of the invoking process.
pub fn current_uid() -> u32 {
    // SAFETY: geteuid has no preconditions and cannot fail.
    unsafe { libc::geteuid() }
}
