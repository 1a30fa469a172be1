use std::collections::BTreeMap;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use anyhow::{Context, Result};
use nodeops_core::error::NodeError;

/// Printable form of a command, also the key the test mock matches on.
pub fn command_line(cmd: &str, args: &[&str]) -> String {
    if args.is_empty() {
        cmd.to_string()
    } else {
        format!("{} {}", cmd, args.join(" "))
    }
}

/// Run a command on the host, capturing output.
pub fn run_host(cmd: &str, args: &[&str]) -> Result<Output> {
    run_host_env(cmd, args, &BTreeMap::new(), None)
}

/// Run a command on the host with extra environment and an optional working directory.
pub fn run_host_env(
    cmd: &str,
    args: &[&str],
    envs: &BTreeMap<String, String>,
    cwd: Option<&Path>,
) -> Result<Output> {
    let line = command_line(cmd, args);
    tracing::debug!(command = %line, "exec");

    #[cfg(test)]
    if let Some(output) = super::shell_mock::intercept(&line) {
        return output.with_context(|| format!("Failed to run: {}", line));
    }

    let mut command = Command::new(cmd);
    command.args(args).envs(envs).stdin(Stdio::null());
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }
    command
        .output()
        .with_context(|| format!("Failed to run: {}", line))
}

/// Run a command and escalate a non-zero exit to [`NodeError::CommandFailed`].
/// Returns trimmed stdout.
pub fn run_checked(cmd: &str, args: &[&str]) -> Result<String> {
    run_checked_env(cmd, args, &BTreeMap::new(), None)
}

pub fn run_checked_env(
    cmd: &str,
    args: &[&str],
    envs: &BTreeMap<String, String>,
    cwd: Option<&Path>,
) -> Result<String> {
    let output = run_host_env(cmd, args, envs, cwd)?;
    if !output.status.success() {
        return Err(NodeError::CommandFailed {
            command: command_line(cmd, args),
            code: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
        .into());
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Run a command and return trimmed stdout regardless of exit status.
pub fn run_stdout(cmd: &str, args: &[&str]) -> Result<String> {
    let output = run_host(cmd, args)?;
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Whether a command exits zero. Spawn failures count as `false`.
pub fn succeeds(cmd: &str, args: &[&str]) -> bool {
    run_host(cmd, args)
        .map(|o| o.status.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell_mock::{MockResponse, mock_shell};

    #[test]
    fn test_command_line() {
        assert_eq!(command_line("nproc", &[]), "nproc");
        assert_eq!(command_line("git", &["-C", "/x", "pull"]), "git -C /x pull");
    }

    #[test]
    fn test_run_checked_escalates_non_zero_exit() {
        let (_guard, calls) = mock_shell()
            .respond("docker compose", MockResponse::fail(2, "boom"))
            .install();

        let err = run_checked("docker", &["compose", "up"]).unwrap_err();
        match err.downcast_ref::<NodeError>() {
            Some(NodeError::CommandFailed { code, stderr, .. }) => {
                assert_eq!(*code, 2);
                assert_eq!(stderr, "boom");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(calls.count("docker compose up"), 1);
    }

    #[test]
    fn test_run_checked_returns_trimmed_stdout() {
        let (_guard, _calls) = mock_shell()
            .respond("nproc", MockResponse::ok("8\n"))
            .install();
        assert_eq!(run_checked("nproc", &["--all"]).unwrap(), "8");
    }

    #[test]
    fn test_missing_tool_is_an_error() {
        let (_guard, _calls) = mock_shell()
            .respond("lscpu", MockResponse::missing())
            .install();
        assert!(run_host("lscpu", &[]).is_err());
        assert!(!succeeds("lscpu", &[]));
    }
}
