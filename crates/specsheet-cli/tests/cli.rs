#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// A `specsheet` invocation with a clean environment, run inside `dir`.
fn specsheet(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("specsheet").unwrap();
    cmd.current_dir(dir.path())
        .env_clear()
        .env("SPECSHEET_DATA_DIR", dir.path());
    cmd
}

fn write_config(dir: &TempDir, yaml: &str) -> std::path::PathBuf {
    let path = dir.path().join("specsheet.yaml");
    std::fs::write(&path, yaml).unwrap();
    path
}

#[test]
fn help_lists_commands() {
    let dir = TempDir::new().unwrap();
    specsheet(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("generate"))
        .stdout(predicate::str::contains("config"));
}

// ---------------------------------------------------------------------------
// specsheet config
// ---------------------------------------------------------------------------

#[test]
fn config_check_without_identity_key_fails() {
    let dir = TempDir::new().unwrap();
    specsheet(&dir)
        .args(["config", "check"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("FIREBASE_API_KEY"))
        .stderr(predicate::str::contains("config validation found errors"));
}

#[test]
fn config_check_json_reports_disabled_features() {
    let dir = TempDir::new().unwrap();
    let output = specsheet(&dir)
        .env("FIREBASE_API_KEY", "web-key")
        .args(["config", "check", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let warnings = value["warnings"].as_array().unwrap();
    assert!(warnings.iter().all(|w| w["level"] == "warning"));
    assert!(warnings
        .iter()
        .any(|w| w["message"].as_str().unwrap().contains("ALGOLIA_APP_ID")));
}

#[test]
fn config_check_reads_yaml_file() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        "identity:\n  api_key: web-key\n\
         search:\n  app_id: APP\n  api_key: search-key\n\
         email:\n  client_id: cid\n  client_secret: secret\n\
         store:\n  backend: redb\n",
    );
    specsheet(&dir)
        .arg("--config")
        .arg(&path)
        .args(["config", "check"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Config is valid"));
}

#[test]
fn config_check_rejects_malformed_yaml() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "server: [not, a, map");
    specsheet(&dir)
        .arg("--config")
        .arg(&path)
        .args(["config", "check"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load config"));
}

#[test]
fn config_check_rejects_unknown_store_backend() {
    let dir = TempDir::new().unwrap();
    specsheet(&dir)
        .env("SPECSHEET_STORE", "postgres")
        .args(["config", "check"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown store backend"));
}

#[test]
fn config_show_redacts_secrets() {
    let dir = TempDir::new().unwrap();
    specsheet(&dir)
        .env("FIREBASE_API_KEY", "very-secret-key")
        .env("DRIVE_FOLDER_NAME", "Team Specs")
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Team Specs"))
        .stdout(predicate::str::contains("very-secret-key").not());
}

// ---------------------------------------------------------------------------
// specsheet generate
// ---------------------------------------------------------------------------

#[test]
fn generate_blank_idea_fails_before_any_request() {
    let dir = TempDir::new().unwrap();
    specsheet(&dir)
        .args(["generate", "   "])
        .assert()
        .failure()
        .stderr(predicate::str::contains("productIdea is required"));
}

#[test]
fn generate_without_api_key_fails() {
    let dir = TempDir::new().unwrap();
    specsheet(&dir)
        .args(["generate", "a todo app", "--language", "go"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("GOOGLE_GENERATIVE_AI_API_KEY"));
}

#[test]
fn generate_rejects_unknown_option_value() {
    let dir = TempDir::new().unwrap();
    specsheet(&dir)
        .args(["generate", "a todo app", "--deploy", "heroku"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("heroku"));
}
