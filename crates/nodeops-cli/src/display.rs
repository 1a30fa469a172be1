//! Plain-text renderings shared by commands and the error block.

use colored::Colorize;
use nodeops_core::alloc::{ResourceAllocation, Tier};
use nodeops_core::checks::{CheckResult, CheckStatus};

const NAME_WIDTH: usize = 24;
const STATUS_WIDTH: usize = 8;

fn status_cell(status: CheckStatus) -> String {
    let text = format!("{:<STATUS_WIDTH$}", status.to_string());
    match status {
        CheckStatus::Ok => text.green().to_string(),
        CheckStatus::Failed => text.red().to_string(),
        CheckStatus::Error => text.yellow().to_string(),
    }
}

/// NAME / STATUS / INFO table for probe results.
pub fn report_table(results: &[CheckResult]) -> String {
    let mut out = format!(
        "  {:<NAME_WIDTH$} {:<STATUS_WIDTH$} {}\n",
        "PROBE".bold(),
        "STATUS".bold(),
        "INFO".bold()
    );
    for result in results {
        out.push_str(&format!(
            "  {:<NAME_WIDTH$} {} {}\n",
            result.name,
            status_cell(result.status),
            result.info_text()
        ));
    }
    out.trim_end().to_string()
}

/// Per-tier summary of an allocation.
pub fn allocation_table(alloc: &ResourceAllocation) -> String {
    let mut out = format!(
        "  {:<8} {:>12} {:>16} {:>18} {:>12} {:>16}\n",
        "TIER", "CPU SHARES", "MEMORY", "DISK", "COMP CPU", "COMP MEMORY"
    );
    for tier in Tier::ALL {
        out.push_str(&format!(
            "  {:<8} {:>12} {:>16} {:>18} {:>12} {:>16}\n",
            tier.as_str(),
            alloc.workload.cpu_shares.get(tier),
            alloc.workload.mem.get(tier),
            alloc.workload.disk.get(tier),
            alloc.companion.cpu_shares.get(tier),
            alloc.companion.mem.get(tier),
        ));
    }
    out.trim_end().to_string()
}

pub fn pretty_json(value: &serde_json::Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

pub fn indent(text: &str, spaces: usize) -> String {
    let pad = " ".repeat(spaces);
    text.lines()
        .map(|l| format!("{pad}{l}"))
        .collect::<Vec<_>>()
        .join("\n")
}
