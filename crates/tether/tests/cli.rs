//! End-to-end tests of the tether binary

use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::str::contains;
use tempfile::TempDir;

fn tether(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("tether").unwrap();
    cmd.env("XDG_CONFIG_HOME", home)
        .env("XDG_RUNTIME_DIR", home)
        .env_remove("RUST_LOG");
    cmd
}

/// A port nothing listens on
fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

fn write_config(dir: &TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("tether.toml");
    std::fs::write(&path, body).unwrap();
    path
}

fn stdout_json(output: &std::process::Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).unwrap()
}

fn stderr_json(output: &std::process::Output) -> serde_json::Value {
    serde_json::from_slice(&output.stderr).unwrap()
}

#[test]
fn test_status_reports_disconnected_when_nothing_runs() {
    let dir = TempDir::new().unwrap();
    let config = write_config(
        &dir,
        &format!(
            "supervisor_port = {}\ndashboard_port = {}\nprobe_timeout_ms = 500\n",
            closed_port(),
            closed_port()
        ),
    );

    let output = tether(dir.path())
        .args(["--json", "--config"])
        .arg(&config)
        .arg("status")
        .output()
        .unwrap();

    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["ok"], true);
    assert_eq!(json["data"]["state"], "disconnected");
    assert_eq!(json["data"]["supervisor_healthy"], false);
    assert_eq!(json["data"]["consecutive_failures"], 1);
}

#[test]
fn test_invalid_config_exits_with_config_error() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, "probe_timeout_ms = 0\n");

    let output = tether(dir.path())
        .args(["--json", "--config"])
        .arg(&config)
        .arg("status")
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(2));
    let json = stderr_json(&output);
    assert_eq!(json["ok"], false);
    assert_eq!(json["error"]["code"], "invalid_config");
}

#[test]
fn test_missing_explicit_config_is_an_error() {
    let dir = TempDir::new().unwrap();
    tether(dir.path())
        .args(["--config"])
        .arg(dir.path().join("nope.toml"))
        .arg("status")
        .assert()
        .code(2)
        .stderr(contains("config file not found"));
}

#[test]
fn test_activate_disabled_is_skipped() {
    let dir = TempDir::new().unwrap();
    let output = tether(dir.path())
        .args(["--json", "activate", "--startup", "off"])
        .output()
        .unwrap();

    assert!(output.status.success());
    assert_eq!(stdout_json(&output)["data"]["outcome"], "skipped");
}

#[test]
fn test_request_without_supervisor_is_unreachable() {
    let dir = TempDir::new().unwrap();
    let config = write_config(
        &dir,
        &format!(
            "transport = \"remote\"\ncontrol_endpoint = \"tcp://127.0.0.1:{}\"\nconnect_timeout_ms = 300\n",
            closed_port()
        ),
    );

    let output = tether(dir.path())
        .args(["--json", "--config"])
        .arg(&config)
        .args(["request", "instances"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(3));
    assert_eq!(stderr_json(&output)["error"]["code"], "unreachable");
}

#[test]
fn test_raw_request_rejects_bad_json() {
    let dir = TempDir::new().unwrap();
    tether(dir.path())
        .args(["request", "raw", "{not json"])
        .assert()
        .failure()
        .stderr(contains("malformed payload"));
}

#[test]
fn test_request_round_trip_over_tcp() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = std::thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        let mut line = String::new();
        reader.read_line(&mut line).unwrap();
        let mut writer = stream;
        writer
            .write_all(b"{\"ok\":true,\"data\":{\"instances\":[{\"port\":3460}]}}\n")
            .unwrap();
        writer.flush().unwrap();
        line
    });

    let dir = TempDir::new().unwrap();
    let config = write_config(
        &dir,
        &format!(
            "transport = \"remote\"\ncontrol_endpoint = \"127.0.0.1:{}\"\n",
            port
        ),
    );

    let output = tether(dir.path())
        .args(["--json", "--config"])
        .arg(&config)
        .args(["request", "instances"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["data"]["request_type"], "ListMcpInstances");
    assert_eq!(json["data"]["data"]["instances"][0]["port"], 3460);

    let sent: serde_json::Value = serde_json::from_str(server.join().unwrap().trim()).unwrap();
    assert_eq!(sent, serde_json::json!({"type": "ListMcpInstances"}));
}
