//! Integration tests for the `storng` CLI binary.
//!
//! Argument parsing, completions and config handling run without a
//! network; request commands run against a wiremock server.
#![allow(clippy::unwrap_used)]

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::{Value, json};
use tempfile::TempDir;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

/// A `storng` command with its config directories inside `home` and no
/// `STORNG_*` variables leaking in from the environment.
fn storng_cmd(home: &TempDir) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("storng");
    cmd.env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path().join(".config"))
        .env_remove("RUST_LOG");
    for var in [
        "STORNG_PROFILE",
        "STORNG_API_URL",
        "STORNG_TOKEN",
        "STORNG_OUTPUT",
        "STORNG_INSECURE",
        "STORNG_TIMEOUT",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

/// Run the command off the runtime thread and return its output.
async fn run(mut cmd: assert_cmd::Command) -> std::process::Output {
    tokio::task::spawn_blocking(move || cmd.output().unwrap())
        .await
        .unwrap()
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).unwrap()
}

fn stderr(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn no_args_shows_help() {
    let home = TempDir::new().unwrap();
    let output = storng_cmd(&home).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    let text = format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        stderr(&output)
    );
    assert!(text.contains("Usage"), "expected usage text:\n{text}");
}

#[test]
fn help_lists_commands() {
    let home = TempDir::new().unwrap();
    storng_cmd(&home).arg("--help").assert().success().stdout(
        predicate::str::contains("fetch")
            .and(predicate::str::contains("call"))
            .and(predicate::str::contains("config"))
            .and(predicate::str::contains("completions")),
    );
}

#[test]
fn version_flag() {
    let home = TempDir::new().unwrap();
    storng_cmd(&home)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("storng"));
}

#[test]
fn invalid_strategy_is_rejected() {
    let home = TempDir::new().unwrap();
    storng_cmd(&home)
        .args(["call", "profile", "/me", "--strategy", "explode"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("explode"));
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn completions_zsh() {
    let home = TempDir::new().unwrap();
    storng_cmd(&home)
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

#[test]
fn completions_bash() {
    let home = TempDir::new().unwrap();
    storng_cmd(&home)
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn request_without_config_explains_setup() {
    let home = TempDir::new().unwrap();
    storng_cmd(&home)
        .args(["fetch", "/health"])
        .assert()
        .code(1)
        .stderr(
            predicate::str::contains("No API URL configured")
                .and(predicate::str::contains("storng config init")),
        );
}

#[test]
fn unknown_profile_is_reported() {
    let home = TempDir::new().unwrap();
    storng_cmd(&home)
        .args(["--profile", "nope", "fetch", "/health"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Profile 'nope' not found"));
}

#[test]
fn config_path_points_into_config_dir() {
    let home = TempDir::new().unwrap();
    storng_cmd(&home)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn config_show_defaults_as_json() {
    let home = TempDir::new().unwrap();
    let output = storng_cmd(&home)
        .args(["config", "show", "-o", "json"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", stderr(&output));
    let shown = stdout_json(&output);
    assert_eq!(shown["default_profile"], "default");
    assert_eq!(shown["defaults"]["timeout"], 30);
}

// ── fetch ───────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn fetch_prints_response_data() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/items/7"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"ok": true, "data": {"id": 7, "name": "seven"}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let home = TempDir::new().unwrap();
    let mut cmd = storng_cmd(&home);
    cmd.args(["--api-url", &server.uri(), "-o", "json-compact"])
        .args(["fetch", "/items/{id}", "--data", r#"{"id": 7}"#]);
    let output = run(cmd).await;

    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(stdout_json(&output), json!({"id": 7, "name": "seven"}));
}

#[tokio::test(flavor = "multi_thread")]
async fn private_fetch_sends_bearer_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/notes"))
        .and(header("authorization", "Bearer opaque-token"))
        .and(body_json(json!({"text": "hi"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true, "data": {"id": 1}})))
        .expect(1)
        .mount(&server)
        .await;

    let home = TempDir::new().unwrap();
    let mut cmd = storng_cmd(&home);
    cmd.args(["--api-url", &server.uri(), "--token", "opaque-token", "-o", "json"])
        .args(["fetch", "/notes", "-X", "post", "--private"])
        .args(["--data", r#"{"text": "hi"}"#]);
    let output = run(cmd).await;

    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(stdout_json(&output), json!({"id": 1}));
}

#[tokio::test(flavor = "multi_thread")]
async fn private_fetch_without_token_exits_with_auth_code() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let home = TempDir::new().unwrap();
    let mut cmd = storng_cmd(&home);
    cmd.args(["--api-url", &server.uri(), "fetch", "/me", "--private"]);
    let output = run(cmd).await;

    assert_eq!(output.status.code(), Some(3));
    assert!(stderr(&output).contains("No access token configured"));
}

#[tokio::test(flavor = "multi_thread")]
async fn failure_envelope_exits_with_remote_code() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/items/3"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"ok": false, "message": "locked"})),
        )
        .mount(&server)
        .await;

    let home = TempDir::new().unwrap();
    let mut cmd = storng_cmd(&home);
    cmd.args(["--api-url", &server.uri()])
        .args(["fetch", "/items/3", "-X", "DELETE"]);
    let output = run(cmd).await;

    assert_eq!(output.status.code(), Some(4));
    assert!(stderr(&output).contains("DELETE /items/3 failed: locked"));
}

#[test]
fn malformed_data_is_a_usage_error() {
    let home = TempDir::new().unwrap();
    storng_cmd(&home)
        .args(["--api-url", "http://127.0.0.1:1", "fetch", "/x", "--data", "{oops"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Invalid JSON for --data"));
}

// ── call ────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn call_prints_the_updated_entry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/profile"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"ok": true, "data": {"image": "me.png"}})),
        )
        .mount(&server)
        .await;

    let home = TempDir::new().unwrap();
    let mut cmd = storng_cmd(&home);
    cmd.args(["--api-url", &server.uri(), "-o", "json"])
        .args(["call", "profile", "/profile"])
        .args(["--init", r#"{"name": "ada"}"#]);
    let output = run(cmd).await;

    assert!(output.status.success(), "{}", stderr(&output));
    let entry = stdout_json(&output);
    assert_eq!(entry["data"], json!({"name": "ada", "image": "me.png"}));
    assert_eq!(entry["loadingStatus"]["isLoaded"], true);
    assert_eq!(entry["loadingStatus"]["isLoading"], false);
    assert_eq!(entry["loadingStatus"]["initial"], false);
}

#[tokio::test(flavor = "multi_thread")]
async fn call_with_deep_merge_keeps_nested_fields() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/settings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            json!({"ok": true, "data": {"ui": {"theme": "dark"}}}),
        ))
        .mount(&server)
        .await;

    let home = TempDir::new().unwrap();
    let mut cmd = storng_cmd(&home);
    cmd.args(["--api-url", &server.uri(), "-o", "json-compact"])
        .args(["call", "settings", "/settings", "-X", "patch"])
        .args(["--strategy", "deep-merge"])
        .args(["--init", r#"{"ui": {"lang": "en"}}"#]);
    let output = run(cmd).await;

    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(
        stdout_json(&output)["data"],
        json!({"ui": {"lang": "en", "theme": "dark"}})
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_call_still_prints_the_recorded_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/profile"))
        .and(header("authorization", "Bearer t1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"ok": false, "message": "gone"})),
        )
        .mount(&server)
        .await;

    let home = TempDir::new().unwrap();
    let mut cmd = storng_cmd(&home);
    cmd.args(["--api-url", &server.uri(), "--token", "t1", "-o", "json"])
        .args(["call", "profile", "/profile", "--private", "--strategy", "replace"]);
    let output = run(cmd).await;

    assert_eq!(output.status.code(), Some(4));
    let entry = stdout_json(&output);
    assert_eq!(entry["loadingStatus"]["error"]["message"], "gone");
    assert_eq!(entry["loadingStatus"]["isLoading"], false);
}
