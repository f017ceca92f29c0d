#![allow(clippy::unwrap_used, clippy::expect_used)]

//! CLI smoke tests for the crm-server binary: help, version, `check`,
//! configuration errors and a `run` that cannot reach its database.

use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::timeout;

fn run_crm_server(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_crm-server"))
        .args(args)
        .env_remove("RUST_LOG")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .expect("Failed to execute crm-server")
}

async fn run_crm_server_with_timeout(
    args: &[&str],
    timeout_duration: Duration,
) -> Result<std::process::Output, Box<dyn std::error::Error>> {
    let mut cmd = tokio::process::Command::new(env!("CARGO_BIN_EXE_crm-server"));
    cmd.args(args)
        .env_remove("RUST_LOG")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = cmd.spawn()?;
    match timeout(timeout_duration, child.wait_with_output()).await {
        Ok(result) => result.map_err(Into::into),
        Err(_elapsed) => Err("elapsed".into()),
    }
}

fn write_config(dir: &TempDir, name: &str, content: &str) -> String {
    let path = dir.path().join(name);
    std::fs::write(&path, content).expect("Failed to write config file");
    path_str(&path)
}

fn path_str(path: &Path) -> String {
    path.to_str().unwrap().to_owned()
}

#[test]
fn test_cli_help_command() {
    let output = run_crm_server(&["--help"]);
    assert!(output.status.success(), "Help command should succeed");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage:"), "Should contain usage information");
    assert!(stdout.contains("run"), "Should contain 'run' subcommand");
    assert!(stdout.contains("check"), "Should contain 'check' subcommand");
    assert!(stdout.contains("--config"));
    assert!(stdout.contains("--grpc-port"));
    assert!(stdout.contains("--skip-migrations"));
}

#[test]
fn test_cli_version_command() {
    let output = run_crm_server(&["--version"]);
    assert!(output.status.success(), "Version command should succeed");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("crm-server"), "Should contain binary name");
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_cli_invalid_command() {
    let output = run_crm_server(&["invalid-command"]);
    assert!(!output.status.success(), "Invalid command should fail");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("error"), "Should report the bad command: {stderr}");
}

#[test]
fn test_cli_config_validation_missing_file() {
    let output = run_crm_server(&["--config", "/nonexistent/crm.yaml", "check"]);
    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("does not exist"),
        "Should indicate config file not found: {stderr}"
    );
}

#[test]
fn test_cli_config_validation_invalid_yaml() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "invalid.yaml", "grpc: [unclosed");

    let output = run_crm_server(&["--config", &path, "check"]);
    assert!(!output.status.success(), "Should fail with invalid YAML");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("failed to load configuration"),
        "Should mention the load failure: {stderr}"
    );
}

#[test]
fn test_cli_config_validation_rule_violation() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        "same_ports.yaml",
        "grpc:\n  port: 7000\nhttp:\n  port: 7000\n",
    );

    let output = run_crm_server(&["--config", &path, "check"]);
    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("grpc.port and http.port must differ"),
        "Should name the broken rule: {stderr}"
    );
}

#[test]
fn test_cli_check_valid_config_masks_password() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        "valid.yaml",
        r#"
server:
  environment: staging
database:
  host: db.internal
  user: crm
  password: "s3cret"
  name: crm
grpc:
  port: 50100
logging:
  level: warn
"#,
    );

    let output = run_crm_server(&["--config", &path, "check"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(output.status.success(), "STDERR: {stderr}\nSTDOUT: {stdout}");

    assert!(stdout.contains("Configuration is valid"));
    assert!(stdout.contains("50100"));
    assert!(stdout.contains("staging"));
    assert!(!stdout.contains("s3cret"), "Password must be masked: {stdout}");
}

#[test]
fn test_cli_port_override_is_validated() {
    // Default http.port is 9055; moving gRPC onto it must fail validation.
    let output = run_crm_server(&["--grpc-port", "9055", "check"]);
    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("must differ"), "{stderr}");
}

#[test]
fn test_cli_print_config_exits_without_serving() {
    let output = run_crm_server(&["--print-config", "--http-port", "9100"]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Effective configuration"));
    assert!(stdout.contains("9100"));
}

#[tokio::test]
async fn test_cli_run_fails_when_database_is_unreachable() {
    let dir = TempDir::new().unwrap();
    // Nothing listens on port 1.
    let path = write_config(
        &dir,
        "unreachable.yaml",
        "database:\n  host: 127.0.0.1\n  port: 1\n  acquire_timeout: 1s\n",
    );

    let output = run_crm_server_with_timeout(
        &["--config", &path, "run"],
        Duration::from_secs(30),
    )
    .await
    .expect("run should exit on its own");
    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("failed to connect to Postgres"),
        "Should report the connection failure: {stderr}"
    );
}
