//! CLI contract tests.

use std::fs;

use assert_cmd::Command;

fn overheard(home: &tempfile::TempDir) -> Command {
    let mut cmd = Command::cargo_bin("overheard").expect("binary should build");
    cmd.current_dir(home.path())
        .env("HOME", home.path())
        .env_remove("RUST_LOG")
        .env_remove("DISCORD_TOKEN")
        .env_remove("BLUESKY_USERNAME")
        .env_remove("BLUESKY_APP_PASSWORD");
    cmd
}

#[test]
fn help_lists_subcommands() {
    let home = tempfile::tempdir().expect("should create temp dir");
    let output = overheard(&home).arg("--help").output().expect("should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("start"));
    assert!(stdout.contains("check"));
}

#[test]
fn check_rejects_invalid_config() {
    let home = tempfile::tempdir().expect("should create temp dir");
    let config = home.path().join("config.toml");
    let write = fs::write(&config, "[media]\nmax_images = 9\n");
    assert!(write.is_ok());

    let output = overheard(&home)
        .arg("check")
        .arg("--config")
        .arg(&config)
        .output()
        .expect("should run");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("max_images"), "stderr was: {stderr}");
}

#[test]
fn check_requires_discord_token() {
    let home = tempfile::tempdir().expect("should create temp dir");

    let output = overheard(&home).arg("check").output().expect("should run");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("missing required credential: DISCORD_TOKEN"),
        "stderr was: {stderr}"
    );
}
