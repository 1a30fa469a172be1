//! Version-control sync for the service-definition and volume-manager checkouts.

use std::path::Path;

use anyhow::Result;
use tracing::{info, instrument};

use crate::shell;

fn git(dir: &Path, args: &[&str]) -> Result<String> {
    let dir = dir.to_string_lossy();
    let mut full = vec!["-C", dir.as_ref()];
    full.extend_from_slice(args);
    shell::run_checked("git", &full)
}

pub fn is_checkout(dir: &Path) -> bool {
    dir.join(".git").exists()
}

pub fn clone(url: &str, dest: &Path) -> Result<()> {
    let dest = dest.to_string_lossy();
    shell::run_checked("git", &["clone", url, dest.as_ref()])?;
    Ok(())
}

/// Whether `git_ref` names a branch on the remote (as opposed to a tag or commit).
pub fn is_branch(dir: &Path, git_ref: &str) -> bool {
    let remote_ref = format!("refs/remotes/origin/{git_ref}");
    let dir = dir.to_string_lossy();
    shell::succeeds(
        "git",
        &["-C", dir.as_ref(), "show-ref", "--verify", "--quiet", &remote_ref],
    )
}

/// Fetch and check out `git_ref`; branches are fast-forwarded to the remote.
#[instrument]
pub fn sync(dir: &Path, git_ref: &str) -> Result<()> {
    git(dir, &["fetch", "--all", "--tags", "--force"])?;
    git(dir, &["checkout", git_ref])?;
    if is_branch(dir, git_ref) {
        git(dir, &["pull", "--ff-only", "origin", git_ref])?;
    }
    info!(dir = %dir.display(), git_ref, "checkout synced");
    Ok(())
}

/// Clone when absent, then sync to `git_ref`.
pub fn ensure_repo(url: &str, dest: &Path, git_ref: &str) -> Result<()> {
    if !is_checkout(dest) {
        clone(url, dest)?;
    }
    sync(dest, git_ref)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell_mock::{MockResponse, mock_shell};

    #[test]
    fn test_ensure_repo_clones_missing_checkout() {
        let (_guard, calls) = mock_shell().install();
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("config");

        ensure_repo("https://example.com/cfg.git", &dest, "2.1.0").unwrap();

        let line = format!("git clone https://example.com/cfg.git {}", dest.display());
        assert_eq!(calls.position(&line), Some(0));
        assert!(calls.contains(&format!("git -C {} checkout 2.1.0", dest.display())));
    }

    #[test]
    fn test_sync_pulls_branches_only() {
        let dir = tempfile::tempdir().unwrap();
        let d = dir.path().display().to_string();

        let (_guard, calls) = mock_shell()
            .respond(&format!("git -C {d} show-ref"), MockResponse::fail(1, ""))
            .install();
        sync(dir.path(), "2.1.0").unwrap();
        assert!(!calls.contains(&format!("git -C {d} pull")));
        drop(_guard);

        let (_guard, calls) = mock_shell().install();
        sync(dir.path(), "develop").unwrap();
        assert!(calls.contains(&format!("git -C {d} pull --ff-only origin develop")));
    }

    #[test]
    fn test_existing_checkout_is_not_recloned() {
        let (_guard, calls) = mock_shell().install();
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".git")).unwrap();

        ensure_repo("https://example.com/cfg.git", dir.path(), "master").unwrap();
        assert!(!calls.contains("git clone"));
    }

    #[test]
    fn test_failed_checkout_propagates() {
        let (_guard, _calls) = mock_shell()
            .respond("git -C", MockResponse::fail(1, "pathspec did not match"))
            .install();
        let dir = tempfile::tempdir().unwrap();
        assert!(sync(dir.path(), "nope").is_err());
    }
}
