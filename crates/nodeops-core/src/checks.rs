//! Check result types and report merging.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Outcome of a single probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    /// The measured value meets the requirement.
    Ok,
    /// The measured value does not meet the requirement.
    Failed,
    /// The probe itself could not run.
    Error,
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckStatus::Ok => write!(f, "ok"),
            CheckStatus::Failed => write!(f, "failed"),
            CheckStatus::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    #[serde(default)]
    pub info: Option<serde_json::Value>,
}

impl CheckResult {
    pub fn new(
        name: impl Into<String>,
        status: CheckStatus,
        info: Option<serde_json::Value>,
    ) -> Self {
        Self {
            name: name.into(),
            status,
            info,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == CheckStatus::Ok
    }

    /// Render `info` for a single table cell.
    pub fn info_text(&self) -> String {
        match &self.info {
            None | Some(serde_json::Value::Null) => String::new(),
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        }
    }
}

/// Persisted collection of results, one per probe name.
pub type Report = Vec<CheckResult>;

/// Which phase of a transition a probe belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckType {
    /// Run before any host mutation.
    Preinstall,
    /// Only meaningful once the container runtime is configured.
    Postinstall,
}

impl fmt::Display for CheckType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckType::Preinstall => write!(f, "preinstall"),
            CheckType::Postinstall => write!(f, "postinstall"),
        }
    }
}

impl FromStr for CheckType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "preinstall" => Ok(CheckType::Preinstall),
            "postinstall" => Ok(CheckType::Postinstall),
            other => anyhow::bail!("unknown check type: {other}"),
        }
    }
}

/// Merge a fresh result set into a previously persisted report.
///
/// Names present in `new` take `new`'s value; names only in `old` are carried
/// forward. Order is `old`'s order followed by names first seen in `new`.
pub fn merge_reports(old: &[CheckResult], new: &[CheckResult]) -> Report {
    let latest: HashMap<&str, &CheckResult> = new.iter().map(|r| (r.name.as_str(), r)).collect();

    let mut merged: Report = old
        .iter()
        .map(|r| latest.get(r.name.as_str()).copied().unwrap_or(r).clone())
        .collect();

    for result in new {
        if !merged.iter().any(|r| r.name == result.name) {
            merged.push(result.clone());
        }
    }
    merged
}

/// Results that did not pass, in report order.
pub fn failed_checks(results: &[CheckResult]) -> Vec<CheckResult> {
    results.iter().filter(|r| !r.is_ok()).cloned().collect()
}
