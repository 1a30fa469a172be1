//! Operator-facing progress output. Kept apart from the tracing stream,
//! which goes to stderr.

use colored::Colorize;

const TAG: &str = "[nodeops]";

fn tag() -> colored::ColoredString {
    TAG.bold().cyan()
}

pub fn info(msg: &str) {
    println!("{} {msg}", tag());
}

pub fn success(msg: &str) {
    println!("{} {}", tag(), msg.green());
}

pub fn warn(msg: &str) {
    println!("{} {}", tag(), msg.yellow());
}

/// Step counter for one transition run.
pub struct Progress {
    transition: String,
    total: usize,
}

impl Progress {
    pub fn new(transition: &str, total: usize) -> Self {
        Self {
            transition: transition.to_string(),
            total,
        }
    }

    fn counter(&self, n: usize) -> String {
        format!("{} {n}/{}", self.transition, self.total)
    }

    /// `[nodeops] init 3/14 configure docker daemon`
    pub fn running(&self, n: usize, step: &str) {
        println!("{} {} {step}", tag(), self.counter(n).bold().yellow());
    }

    pub fn skipped(&self, n: usize, step: &str) {
        println!(
            "{} {}",
            tag(),
            format!("{} {step} (already done)", self.counter(n)).dimmed()
        );
    }

    pub fn finished(&self) {
        success(&format!("{} finished ({} steps)", self.transition, self.total));
    }
}

/// Right-aligns keys so the colons line up.
fn banner_rows(rows: &[(&str, String)]) -> Vec<String> {
    let key_width = rows.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
    rows.iter()
        .map(|(k, v)| format!("{k:>key_width$}: {v}"))
        .collect()
}

/// Header block: a title and aligned `key: value` rows.
pub fn banner(title: &str, rows: &[(&str, String)]) {
    let body = banner_rows(rows);
    let width = body
        .iter()
        .map(String::len)
        .chain(std::iter::once(title.len()))
        .max()
        .unwrap_or(0);
    let rule = "=".repeat(width + 4);

    println!();
    println!("{}", rule.green());
    println!("  {}", title.bold().green());
    for line in body {
        println!("  {line}");
    }
    println!("{}", rule.green());
}
