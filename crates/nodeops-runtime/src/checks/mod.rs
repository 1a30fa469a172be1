//! Readiness check engine.
//!
//! A [`Checker`] declares its probes in a static table of [`ProbeDef`]s.
//! The engine filters probes by phase, runs each one inside a single
//! recovery boundary, and merges the results into the persisted report.

pub mod docker;
pub mod machine;
pub mod packages;

use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use anyhow::Result;
use serde_json::Value;
use tracing::{debug, info, warn};

use nodeops_core::checks::{self, CheckResult, CheckStatus, CheckType};

use crate::store;

pub use docker::DockerChecker;
pub use machine::MachineChecker;
pub use packages::PackageChecker;

/// What a probe measured, when it managed to measure anything.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Pass(Option<Value>),
    Fail(Option<Value>),
}

/// `Err` means the probe could not run and is reported as `error`.
pub type ProbeResult = Result<Verdict>;

/// Compare a measured quantity against a minimum.
pub fn at_least(expected: u64, actual: u64) -> Verdict {
    let info = Some(serde_json::json!({ "expected": expected, "actual": actual }));
    if actual < expected {
        Verdict::Fail(info)
    } else {
        Verdict::Pass(info)
    }
}

/// Static declaration of a probe on checker `C`.
pub struct ProbeDef<C> {
    pub name: &'static str,
    pub phases: &'static [CheckType],
    pub run: fn(&C) -> ProbeResult,
}

/// A probe bound to its checker, ready to run.
pub struct Probe<'a> {
    pub name: &'static str,
    pub phases: &'static [CheckType],
    run: Box<dyn Fn() -> ProbeResult + 'a>,
}

impl Probe<'_> {
    pub fn runs_in(&self, check_type: CheckType) -> bool {
        self.phases.contains(&check_type)
    }
}

pub trait Checker {
    fn name(&self) -> &'static str;

    fn probes(&self) -> Vec<Probe<'_>>;
}

/// Bind a checker's static probe table to the checker instance.
pub fn bind<'a, C>(checker: &'a C, defs: &'static [ProbeDef<C>]) -> Vec<Probe<'a>> {
    defs.iter()
        .map(|def| Probe {
            name: def.name,
            phases: def.phases,
            run: Box::new(move || (def.run)(checker)),
        })
        .collect()
}

/// Probes of every checker, optionally restricted to one phase.
pub fn get_checks<'a>(
    checkers: &[&'a dyn Checker],
    check_type: Option<CheckType>,
) -> Vec<Probe<'a>> {
    checkers
        .iter()
        .copied()
        .flat_map(|c| c.probes())
        .filter(|p| check_type.is_none_or(|t| p.runs_in(t)))
        .collect()
}

/// Run probes. Nothing a probe does escapes this function: errors and
/// panics both become `error` results.
pub fn check(probes: &[Probe<'_>]) -> Vec<CheckResult> {
    probes
        .iter()
        .map(|probe| {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| (probe.run)()));
            let result = match outcome {
                Ok(Ok(Verdict::Pass(info))) => CheckResult::new(probe.name, CheckStatus::Ok, info),
                Ok(Ok(Verdict::Fail(info))) => {
                    CheckResult::new(probe.name, CheckStatus::Failed, info)
                }
                Ok(Err(e)) => CheckResult::new(
                    probe.name,
                    CheckStatus::Error,
                    Some(Value::String(format!("{e:#}"))),
                ),
                Err(payload) => CheckResult::new(
                    probe.name,
                    CheckStatus::Error,
                    Some(Value::String(panic_message(payload.as_ref()))),
                ),
            };
            debug!(probe = probe.name, status = %result.status, "probe finished");
            result
        })
        .collect()
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("probe panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("probe panicked: {s}")
    } else {
        "probe panicked".to_string()
    }
}

/// Run the phase's probes, merge into the report at `report_path`, and
/// return the results that did not pass.
pub fn run_checks(
    checkers: &[&dyn Checker],
    check_type: Option<CheckType>,
    report_path: &Path,
) -> Result<Vec<CheckResult>> {
    let probes = get_checks(checkers, check_type);
    let results = check(&probes);

    let old = store::get_report(report_path)?;
    let merged = checks::merge_reports(&old, &results);
    store::save_report(report_path, &merged)?;

    let failed = checks::failed_checks(&results);
    let phase = check_type.map(|t| t.to_string()).unwrap_or_else(|| "all".into());
    if failed.is_empty() {
        info!(phase = %phase, total = results.len(), "checks passed");
    } else {
        warn!(phase = %phase, failed = failed.len(), total = results.len(), "checks did not pass");
    }
    Ok(failed)
}
