use std::io::IsTerminal;

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use nodeops_core::error::{NodeError, exit_code_for, find_node_error};

use crate::display;

pub use nodeops_runtime::ui::{banner, info, success, warn};

// ---------------------------------------------------------------------------
// Error block
// ---------------------------------------------------------------------------

/// Print a fatal error: title, cause chain, failed probes or backend payload,
/// and the exit code the process is about to return.
pub fn error_block(err: &anyhow::Error) {
    let code = exit_code_for(err);
    eprintln!();
    eprintln!("{} {}", "[nodeops]".bold().red(), "ERROR".bold().red());
    eprintln!("  {}", err.to_string().red());
    for cause in err.chain().skip(1) {
        eprintln!("  {} {}", "caused by:".dimmed(), cause);
    }

    match find_node_error(err) {
        Some(NodeError::BadApiResponse {
            payload: Some(payload),
            ..
        }) => {
            eprintln!("  {}", "payload:".dimmed());
            eprintln!("{}", display::indent(&display::pretty_json(payload), 4));
        }
        Some(node_err) => {
            if let Some(failed) = node_err.failed_checks() {
                eprintln!();
                eprintln!("{}", display::report_table(failed));
            }
        }
        None => {}
    }

    eprintln!(
        "  {} {}",
        "exit code:".dimmed(),
        code.code().to_string().bold()
    );
}

// ---------------------------------------------------------------------------
// Status table
// ---------------------------------------------------------------------------

/// Print the status header.
pub fn status_header() {
    println!("{}", "nodeops status".bold());
    println!("{}", "--------------".dimmed());
}

/// Print a status line with a bold label and a colored value.
pub fn status_line(label: &str, value: &str) {
    let colored_value = if value.starts_with("Up") || value == "Initialized" {
        value.green().to_string()
    } else if value.starts_with("Exited") || value == "Uninitialized" {
        value.yellow().to_string()
    } else if value == "-" {
        value.dimmed().to_string()
    } else {
        value.to_string()
    };

    println!("{} {}", format!("{:<28}", label).bold(), colored_value);
}

// ---------------------------------------------------------------------------
// Interactive prompts
// ---------------------------------------------------------------------------

/// Ask the operator to confirm. Without a terminal on stdin there is nobody
/// to ask, so this fails instead of silently declining.
pub fn confirm(msg: &str) -> anyhow::Result<bool> {
    if !std::io::stdin().is_terminal() {
        anyhow::bail!("stdin is not a terminal; pass --yes to confirm non-interactively");
    }
    match inquire::Confirm::new(msg).with_default(false).prompt() {
        Ok(answer) => Ok(answer),
        Err(
            inquire::InquireError::OperationCanceled
            | inquire::InquireError::OperationInterrupted,
        ) => Ok(false),
        Err(e) => Err(anyhow::Error::new(e).context("Confirmation prompt failed")),
    }
}

// ---------------------------------------------------------------------------
// Spinners
// ---------------------------------------------------------------------------

/// Create and start a spinner with the given message.
/// Call `.finish_with_message()` or `.finish_and_clear()` when done.
pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner()
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
        .template("{spinner:.cyan} {msg}")
    {
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(80));
    pb
}
