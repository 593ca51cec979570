#![allow(deprecated)] // cargo_bin is deprecated in favor of cargo_bin_cmd! macro

use assert_cmd::Command;
use predicates::prelude::*;

const TEMPLATE: &str = "\
AUTH_SECRET=
KEY_VAULTS_SECRET=
POSTGRES_PASSWORD=
MINIO_ROOT_PASSWORD=
POSTGRES_USER=postgres
LOBE_PORT=3210
";

fn lobe_setup(home: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("lobe-setup").unwrap();
    // Keep preferences out of the real user config directory.
    cmd.env("HOME", home).env("XDG_CONFIG_HOME", home.join(".config"));
    cmd
}

fn mock_source(server: &mut mockito::Server) -> Vec<mockito::Mock> {
    vec![
        server
            .mock("GET", "/docker-compose/local/docker-compose.yml")
            .with_body("services: {}\n")
            .create(),
        server.mock("GET", "/docker-compose/local/.env.example").with_body(TEMPLATE).create(),
        server.mock("GET", "/docker-compose/local/init_data.json").with_status(404).create(),
        server.mock("GET", "/docker-compose/local/README.md").with_status(404).create(),
    ]
}

#[test]
fn help_flag_shows_usage() {
    let home = tempfile::tempdir().unwrap();
    lobe_setup(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Provision a self-hosted LobeChat"));
}

#[test]
fn version_flag_shows_version() {
    let home = tempfile::tempdir().unwrap();
    lobe_setup(home.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("lobe-setup 0.3.0"));
}

#[test]
fn unknown_mode_is_a_configuration_error() {
    let home = tempfile::tempdir().unwrap();
    lobe_setup(home.path())
        .args(["--yes", "--mode", "kubernetes"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("unknown deployment mode"));
}

#[test]
fn stale_lock_file_rejects_the_run() {
    let home = tempfile::tempdir().unwrap();
    let target = tempfile::tempdir().unwrap();
    std::fs::write(target.path().join(".lobe-setup.lock"), "").unwrap();

    lobe_setup(home.path())
        .args(["--yes", "--mode", "local"])
        .arg("--dir")
        .arg(target.path())
        .assert()
        .code(3)
        .stderr(predicate::str::contains("another install appears to be in progress"));
}

#[test]
fn full_local_install_via_cli() {
    let mut server = mockito::Server::new();
    let _mocks = mock_source(&mut server);
    let home = tempfile::tempdir().unwrap();
    let target = tempfile::tempdir().unwrap();

    lobe_setup(home.path())
        .args(["--yes", "--mode", "local", "--url", &server.url()])
        .arg("--dir")
        .arg(target.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Installation complete"))
        .stdout(predicate::str::contains("docker compose up -d"));

    let env = std::fs::read_to_string(target.path().join(".env")).unwrap();
    assert!(env.contains("DEPLOYMENT_MODE=local"));
    assert!(env.contains("APP_URL=http://localhost:3210"));
    assert_eq!(
        std::fs::read_to_string(target.path().join("docker-compose.yml")).unwrap(),
        "services: {}\n"
    );
    // The lock is gone once the run finishes.
    assert!(!target.path().join(".lobe-setup.lock").exists());
}

#[test]
fn remote_mode_without_host_exits_with_configuration_code() {
    let mut server = mockito::Server::new();
    let _mocks = mock_source(&mut server);
    let home = tempfile::tempdir().unwrap();
    let target = tempfile::tempdir().unwrap();

    lobe_setup(home.path())
        .args(["--yes", "--mode", "remote", "--url", &server.url()])
        .arg("--dir")
        .arg(target.path())
        .assert()
        .code(3)
        .stderr(predicate::str::contains("resolving deployment mode failed"));

    assert!(!target.path().join(".env").exists());
}

#[test]
fn unreachable_source_exits_with_network_code() {
    let home = tempfile::tempdir().unwrap();
    let target = tempfile::tempdir().unwrap();

    lobe_setup(home.path())
        .args(["--yes", "--mode", "local", "--url", "http://127.0.0.1:9"])
        .arg("--dir")
        .arg(target.path())
        .assert()
        .code(2)
        .stderr(predicate::str::contains("fetching artifacts failed"));
}

#[test]
fn rerun_via_cli_preserves_generated_secrets() {
    let mut server = mockito::Server::new();
    let _mocks = mock_source(&mut server);
    let home = tempfile::tempdir().unwrap();
    let target = tempfile::tempdir().unwrap();

    let run = |host: &str| {
        lobe_setup(home.path())
            .args(["--yes", "--mode", "s3", "--url", &server.url(), "--host", host])
            .arg("--dir")
            .arg(target.path())
            .assert()
            .success();
    };
    run("http://localhost:3210");
    let first = std::fs::read_to_string(target.path().join(".env")).unwrap();
    run("http://chat.example.com");
    let second = std::fs::read_to_string(target.path().join(".env")).unwrap();

    let value = |env: &str, key: &str| {
        env.lines()
            .find(|l| l.starts_with(&format!("{key}=")))
            .map(|l| l.split_once('=').unwrap().1.to_string())
            .unwrap()
    };
    assert_eq!(value(&first, "AUTH_SECRET"), value(&second, "AUTH_SECRET"));
    assert_ne!(value(&first, "APP_URL"), value(&second, "APP_URL"));
    assert_eq!(value(&second, "APP_URL"), "http://chat.example.com");
}
