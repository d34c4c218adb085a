//! Integration tests for the CLI interface
//!
//! Tests the main entry point and command parsing logic

mod common;

use assert_cmd::Command;
use common::orders_config_path;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn switchyard() -> Command {
    let mut cmd = Command::cargo_bin("switchyard").unwrap();
    cmd.env_remove("SWITCHYARD_LOG");
    cmd
}

fn write_config(dir: &TempDir, content: &str) -> std::path::PathBuf {
    let path = dir.path().join("engine.toml");
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_cli_help_flag() {
    switchyard()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("Commands:"));
}

#[test]
fn test_cli_without_command_fails() {
    switchyard()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}

#[test]
fn test_invalid_command() {
    switchyard()
        .arg("invalid-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error:"));
}

#[test]
fn test_validate_bundled_config() {
    switchyard()
        .arg("validate")
        .arg(orders_config_path())
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "1 pool(s), 1 route(s), 1 multicast group(s)",
        ));
}

#[test]
fn test_validate_missing_file_exits_with_config_status() {
    let dir = TempDir::new().unwrap();
    switchyard()
        .arg("validate")
        .arg(dir.path().join("absent.toml"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Failed to load configuration"));
}

#[test]
fn test_validate_route_without_default() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
[[routes]]
channel = "incomingOrders"

[[routes.rules]]
when = "always"
to = "xmlOrders"
"#,
    );

    switchyard()
        .arg("-v")
        .arg("validate")
        .arg(&path)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("has no default destination"));
}

#[test]
fn test_validate_rejects_bad_pattern() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
[[routes]]
channel = "incomingOrders"
default = "badOrders"

[[routes.rules]]
when = { header_matches = { header = "CamelFileName", pattern = "(csv" } }
to = "csvOrders"
"#,
    );

    switchyard()
        .arg("-v")
        .arg("validate")
        .arg(&path)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Invalid pattern '(csv'"));
}

#[test]
fn test_route_prints_destination() {
    let cases = [
        ("order.xml", "xmlOrders"),
        ("message2.csv", "csvOrders"),
        ("message4.txt", "badOrders"),
    ];
    for (file_name, expected) in cases {
        switchyard()
            .arg("route")
            .arg(orders_config_path())
            .args(["--channel", "incomingOrders"])
            .args(["-H", &format!("CamelFileName={file_name}")])
            .assert()
            .success()
            .stdout(predicate::str::diff(format!("{expected}\n")));
    }
}

#[test]
fn test_route_without_headers_uses_default() {
    switchyard()
        .arg("route")
        .arg(orders_config_path())
        .args(["--channel", "incomingOrders", "--body", "<order/>"])
        .assert()
        .success()
        .stdout(predicate::str::contains("badOrders"));
}

#[test]
fn test_route_unknown_channel_fails() {
    switchyard()
        .arg("route")
        .arg(orders_config_path())
        .args(["--channel", "nowhere"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("No route is bound to channel 'nowhere'"));
}

#[test]
fn test_route_rejects_malformed_header() {
    switchyard()
        .arg("route")
        .arg(orders_config_path())
        .args(["--channel", "incomingOrders", "-H", "CamelFileName"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("expected KEY=VALUE"));
}

#[test]
fn test_demo_runs_every_scenario() {
    switchyard()
        .arg("demo")
        .assert()
        .success()
        .stdout(predicate::str::contains("message1.xml -> xmlOrders"))
        .stdout(predicate::str::contains("message3.csl -> csvOrders"))
        .stdout(predicate::str::contains("message4.txt -> badOrders"))
        .stdout(predicate::str::contains("message1.xml => marginCompQueue (ok)"))
        .stdout(predicate::str::contains("message5.xml filtered out as a test order"))
        .stdout(predicate::str::contains("audit received 5 order(s)"))
        .stdout(predicate::str::contains("Aggregated X+Y+Z"))
        .stdout(predicate::str::contains(r#"pool orders: {"capacity":12"#));
}
