use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Settings pointing every network endpoint at a closed local port.
fn offline_settings(temp: &TempDir) -> std::path::PathBuf {
    let path = temp.path().join("lifecycle.toml");
    let content = format!(
        "install_root = \"{root}\"\nunit_dir = \"{units}\"\nrelease_index_url = \"http://127.0.0.1:9/releases\"\nstatus_url = \"http://127.0.0.1:9/admin/proving/status\"\nstatus_timeout_secs = 2\nmetadata_timeout_secs = 2\n",
        root = temp.path().join("opt/piri").display(),
        units = temp.path().join("units").display(),
    );
    fs::write(&path, content).unwrap();
    path
}

fn piri() -> Command {
    let mut cmd = Command::cargo_bin("piri").unwrap();
    cmd.env_remove("RUST_LOG").env_remove("INVOCATION_ID");
    cmd
}

#[test]
fn test_help_lists_public_commands() {
    piri()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("install"))
        .stdout(predicate::str::contains("uninstall"))
        .stdout(predicate::str::contains("update"))
        .stdout(predicate::str::contains("update-internal").not());
}

#[test]
fn test_version_flag() {
    piri()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_install_requires_config() {
    piri()
        .arg("install")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--config"));
}

#[test]
fn test_missing_settings_file_is_reported() {
    let temp = TempDir::new().unwrap();
    piri()
        .args(["update", "--dry-run", "--settings"])
        .arg(temp.path().join("missing.toml"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Failed to read settings"));
}

#[test]
fn test_update_defers_when_node_unreachable() {
    let temp = TempDir::new().unwrap();
    let settings = offline_settings(&temp);

    piri()
        .args(["update", "--dry-run", "--no-progress", "--settings"])
        .arg(&settings)
        .assert()
        .success()
        .stdout(predicate::str::contains("Update deferred"));
}

#[test]
fn test_update_internal_deferral_exits_zero() {
    let temp = TempDir::new().unwrap();
    let settings = offline_settings(&temp);

    piri()
        .args(["update-internal", "--settings"])
        .arg(&settings)
        .assert()
        .success()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("deferred"));
}
