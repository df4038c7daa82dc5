use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn sensor_lander() -> Command {
    let mut cmd = Command::cargo_bin("sensor-lander").unwrap();
    for var in [
        "BATCH_SIZE",
        "DATABASE_PATH",
        "TABLE_NAME",
        "ARCHIVE_ROOT",
        "KEY",
        "SINK_TIMEOUT_SECS",
        "LOG_LEVEL",
        "RUST_LOG",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn test_help_command() {
    sensor_lander()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("process"))
        .stdout(predicate::str::contains("completions"));
}

#[test]
fn test_version_command() {
    sensor_lander()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("sensor_lander"));
}

#[test]
fn test_process_help() {
    sensor_lander()
        .args(["process", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--batch-size"))
        .stdout(predicate::str::contains("--archive-root"))
        .stdout(predicate::str::contains("[env: BATCH_SIZE=]"));
}

#[test]
fn test_process_requires_sink_locations() {
    sensor_lander()
        .args(["process", "-"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--database"));
}

#[test]
fn test_process_rejects_zero_batch_size() {
    let temp_dir = TempDir::new().unwrap();
    sensor_lander()
        .current_dir(temp_dir.path())
        .args([
            "process",
            "-",
            "--database",
            "sensors.db",
            "--archive-root",
            "archive",
            "--batch-size",
            "0",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("value must be at least 1"));

    assert!(!temp_dir.path().join("sensors.db").exists());
}

#[test]
fn test_process_rejects_zero_batch_size_from_env() {
    let temp_dir = TempDir::new().unwrap();
    sensor_lander()
        .current_dir(temp_dir.path())
        .env("BATCH_SIZE", "0")
        .args([
            "process",
            "-",
            "--database",
            "sensors.db",
            "--archive-root",
            "archive",
        ])
        .assert()
        .failure();
}

#[test]
fn test_process_rejects_non_event_input() {
    let temp_dir = TempDir::new().unwrap();
    sensor_lander()
        .current_dir(temp_dir.path())
        .args([
            "process",
            "-",
            "--database",
            "sensors.db",
            "--archive-root",
            "archive",
        ])
        .write_stdin("[1, 2, 3]")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Kinesis event"));
}

#[test]
fn test_completions_command() {
    sensor_lander()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("sensor-lander"));
}
