//! Smoke tests -- verify the binary runs and rejects bad input early.

use assert_cmd::Command;

#[test]
fn test_cli_help() {
    Command::cargo_bin("netsoak")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicates::str::contains(
            "Budget-bounded multi-stream network throughput tester",
        ));
}

#[test]
fn test_cli_version() {
    Command::cargo_bin("netsoak")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicates::str::contains("netsoak"));
}

#[test]
fn test_run_subcommand_exists() {
    Command::cargo_bin("netsoak")
        .unwrap()
        .args(["run", "--help"])
        .assert()
        .success();
}

#[test]
fn test_endpoints_lists_builtins() {
    Command::cargo_bin("netsoak")
        .unwrap()
        .arg("endpoints")
        .assert()
        .success()
        .stdout(predicates::str::contains("cloudflare"))
        .stdout(predicates::str::contains("tele2"));
}

#[test]
fn test_endpoints_json_output() {
    Command::cargo_bin("netsoak")
        .unwrap()
        .args(["endpoints", "--json"])
        .assert()
        .success()
        .stdout(predicates::str::contains("\"id\": \"cloudflare\""));
}

#[test]
fn test_run_rejects_bad_budget() {
    // Budget parsing fails before any network activity.
    Command::cargo_bin("netsoak")
        .unwrap()
        .args([
            "run",
            "--url",
            "http://127.0.0.1:9/file.bin",
            "--budget",
            "lots",
        ])
        .assert()
        .failure();
}

#[test]
fn test_run_rejects_bad_thread_count() {
    Command::cargo_bin("netsoak")
        .unwrap()
        .args([
            "run",
            "--url",
            "http://127.0.0.1:9/file.bin",
            "--budget",
            "1MB",
            "--threads",
            "0",
        ])
        .assert()
        .failure();
}

#[test]
fn test_run_rejects_bad_url() {
    Command::cargo_bin("netsoak")
        .unwrap()
        .args(["run", "--url", "ftp://example.com/file.bin", "--budget", "1MB"])
        .assert()
        .failure();
}

#[test]
fn test_probe_rejects_unknown_target() {
    Command::cargo_bin("netsoak")
        .unwrap()
        .args(["probe", "no-such-preset"])
        .assert()
        .failure();
}
