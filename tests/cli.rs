use assert_cmd::Command;
use predicates::prelude::*;
use std::path::{Path, PathBuf};

const NODE_PARAMS: &str = r#"
env_type = "devnet"
container_configs_url = "https://example.com/node-services.git"
container_configs_stream = "2.1.0"
volume_manager_url = "https://example.com/volume-manager.git"
volume_manager_stream = "1.0.2"
disk_mountpoint = "/dev/sdb"
endpoint = "http://10.0.0.1:8545"
manager_contracts_url = "https://example.com/manager.json"
bridge_contracts_url = "https://example.com/bridge.json"
"#;

/// Binary pointed at an isolated node root; nothing touches the real host paths.
fn nodeops(home: &Path) -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("nodeops").unwrap();
    cmd.env("NODEOPS_HOME", home)
        .env("NODEOPS_BACKEND_URL", "http://127.0.0.1:9")
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG");
    cmd
}

fn write_params(dir: &Path, text: &str) -> PathBuf {
    let path = dir.join("node.toml");
    std::fs::write(&path, text).unwrap();
    path
}

#[test]
fn test_help_exits_successfully() {
    let home = tempfile::tempdir().unwrap();
    nodeops(home.path()).arg("--help").assert().success();
}

#[test]
fn test_version_exits_successfully() {
    let home = tempfile::tempdir().unwrap();
    nodeops(home.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("nodeops"));
}

#[test]
fn test_no_args_shows_usage() {
    let home = tempfile::tempdir().unwrap();
    nodeops(home.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_help_lists_all_subcommands() {
    let home = tempfile::tempdir().unwrap();
    let assert = nodeops(home.path()).arg("--help").assert().success();
    let output = String::from_utf8(assert.get_output().stdout.clone()).unwrap();

    for cmd in [
        "init",
        "update",
        "turn-off",
        "turn-on",
        "restore",
        "backup",
        "checks",
        "resources",
        "options",
        "node",
        "status",
        "completions",
    ] {
        assert!(
            output.contains(cmd),
            "Help output should list '{}' subcommand",
            cmd
        );
    }
}

#[test]
fn test_update_on_uninitialized_node_is_a_state_error() {
    let home = tempfile::tempdir().unwrap();
    let params = write_params(home.path(), NODE_PARAMS);
    nodeops(home.path())
        .args(["update", "--yes", "--config"])
        .arg(&params)
        .assert()
        .code(8)
        .stderr(predicate::str::contains("not initialized"));
}

#[test]
fn test_turn_on_and_backup_require_init() {
    let home = tempfile::tempdir().unwrap();
    let params = write_params(home.path(), NODE_PARAMS);
    nodeops(home.path())
        .args(["turn-on", "--config"])
        .arg(&params)
        .assert()
        .code(8);
    nodeops(home.path())
        .arg("backup")
        .arg(home.path())
        .assert()
        .code(8);
}

#[test]
fn test_turn_off_without_terminal_requires_yes() {
    let home = tempfile::tempdir().unwrap();
    let params = write_params(home.path(), NODE_PARAMS);
    std::fs::create_dir_all(home.path().join("node_data")).unwrap();
    std::fs::write(home.path().join("node_data/resource_allocation.json"), "{}").unwrap();

    nodeops(home.path())
        .args(["turn-off", "--config"])
        .arg(&params)
        .write_stdin("")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--yes"))
        .stdout(predicate::str::contains("cancelled").not());
}

#[test]
fn test_missing_params_file_fails() {
    let home = tempfile::tempdir().unwrap();
    nodeops(home.path())
        .args(["init", "--config", "/nonexistent/node.toml"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("node parameters"));
}

#[test]
fn test_empty_required_key_is_rejected_before_any_step() {
    let home = tempfile::tempdir().unwrap();
    let params = write_params(
        home.path(),
        &NODE_PARAMS.replace("endpoint = \"http://10.0.0.1:8545\"", "endpoint = \"\""),
    );
    nodeops(home.path())
        .args(["init", "--config"])
        .arg(&params)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("endpoint"))
        .stdout(predicate::str::contains("Step").not());
}

#[test]
fn test_options_set_then_show() {
    let home = tempfile::tempdir().unwrap();
    nodeops(home.path())
        .args(["options", "set", "catchup", "true"])
        .assert()
        .success();

    let stored =
        std::fs::read_to_string(home.path().join("node_data/node_options.json")).unwrap();
    assert!(stored.contains("\"catchup\": true"), "{stored}");

    nodeops(home.path())
        .args(["options", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("catchup"))
        .stdout(predicate::str::contains("historic_state"));
}

#[test]
fn test_options_set_unknown_key_fails() {
    let home = tempfile::tempdir().unwrap();
    nodeops(home.path())
        .args(["options", "set", "turbo", "true"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("unknown node option"));
}

#[test]
fn test_status_on_uninitialized_node() {
    let home = tempfile::tempdir().unwrap();
    nodeops(home.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Uninitialized"));
    assert!(
        !home.path().join("meta.json").exists(),
        "status must not create metadata"
    );
}

#[test]
fn test_resources_show_without_allocation() {
    let home = tempfile::tempdir().unwrap();
    nodeops(home.path())
        .args(["resources", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No resource allocation"));
}

#[test]
fn test_checks_rejects_unknown_type() {
    let home = tempfile::tempdir().unwrap();
    let params = write_params(home.path(), NODE_PARAMS);
    nodeops(home.path())
        .args(["checks", "--type", "midflight", "--config"])
        .arg(&params)
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

#[test]
fn test_completions_bash() {
    let home = tempfile::tempdir().unwrap();
    nodeops(home.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("nodeops"));
}
