use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tempfile::TempDir;

fn repo_chat_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_repo-chat"))
}

/// Temp workspace with a config (no network collaborators) and a small
/// repository under `repo/`.
fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let repo = root.join("repo");
    fs::create_dir_all(repo.join("src/app")).unwrap();
    fs::create_dir_all(repo.join("node_modules")).unwrap();
    fs::write(repo.join("src/app/a.ts"), "export const a = 1;\n".repeat(25)).unwrap();
    fs::write(repo.join("node_modules/x.js"), "module.exports = {};").unwrap();
    fs::write(repo.join("img.png"), [0x89u8, 0x50, 0x4e, 0x47]).unwrap();

    let config_content = format!(
        r#"[model]
name = "gpt-3.5-turbo"

[embedding]
provider = "disabled"

[generation]
provider = "disabled"

[store]
backend = "sqlite"
path = "{}/data/repo-chat.sqlite"
"#,
        root.display()
    );

    let config_path = config_dir.join("repo-chat.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_repo_chat(config_path: &Path, args: &[&str], stdin: &str) -> (String, String, bool) {
    let binary = repo_chat_binary();
    let mut child = Command::new(&binary)
        .arg("--config")
        .arg(config_path)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap_or_else(|e| panic!("Failed to run repo-chat binary at {:?}: {}", binary, e));

    child
        .stdin
        .take()
        .unwrap()
        .write_all(stdin.as_bytes())
        .unwrap();
    let output = child.wait_with_output().unwrap();

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn repo_dir(config_path: &Path) -> String {
    config_path
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .join("repo")
        .display()
        .to_string()
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_repo_chat(&config_path, &["init"], "");
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/repo-chat.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_repo_chat(&config_path, &["init"], "");
    assert!(success1, "First init failed");
    let (_, _, success2) = run_repo_chat(&config_path, &["init"], "");
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_estimate_prints_usage() {
    let (_tmp, config_path) = setup_test_env();
    let repo = repo_dir(&config_path);

    let (stdout, stderr, success) = run_repo_chat(&config_path, &["estimate", &repo], "");
    assert!(success, "estimate failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("! Usage Estimate"));
    assert!(stdout.contains("> Token: "));
    assert!(stdout.contains("> Price: $"));
    assert!(!stdout.contains("> Token: 0\n"));
}

#[test]
fn test_estimate_unsupported_model_fails() {
    let (_tmp, config_path) = setup_test_env();
    let repo = repo_dir(&config_path);
    let content = fs::read_to_string(&config_path)
        .unwrap()
        .replace("gpt-3.5-turbo", "not-a-model");
    fs::write(&config_path, content).unwrap();

    let (stdout, stderr, success) = run_repo_chat(&config_path, &["estimate", &repo], "");
    assert!(!success);
    assert!(!stdout.contains("Usage Estimate"));
    assert!(stderr.contains("unsupported model 'not-a-model'"), "stderr={}", stderr);
}

#[test]
fn test_estimate_missing_dir_fails() {
    let (tmp, config_path) = setup_test_env();
    let missing = tmp.path().join("nope").display().to_string();

    let (_, stderr, success) = run_repo_chat(&config_path, &["estimate", &missing], "");
    assert!(!success);
    assert!(stderr.contains("filesystem error"), "stderr={}", stderr);
}

#[test]
fn test_ingest_declined_says_bye() {
    let (_tmp, config_path) = setup_test_env();
    let repo = repo_dir(&config_path);

    let (stdout, stderr, success) = run_repo_chat(&config_path, &["ingest", &repo], "n\n");
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("! Usage Estimate"));
    assert!(stdout.contains("? Are you sure you want continue? [y/N]"));
    assert!(stdout.contains("Bye!"));
    assert!(!stdout.contains("> Done."));
}

#[test]
fn test_ingest_embedding_failure_is_labelled() {
    let (_tmp, config_path) = setup_test_env();
    let repo = repo_dir(&config_path);

    let (stdout, stderr, success) = run_repo_chat(
        &config_path,
        &["ingest", &repo, "--yes", "--no-chat", "--progress", "off"],
        "",
    );
    assert!(!success);
    assert!(!stdout.contains("> Done."));
    assert!(stderr.contains("embedding provider error"), "stderr={}", stderr);
}

#[test]
fn test_ingest_rejects_unknown_progress_mode() {
    let (_tmp, config_path) = setup_test_env();
    let repo = repo_dir(&config_path);

    let (_, stderr, success) = run_repo_chat(
        &config_path,
        &["ingest", &repo, "--yes", "--progress", "loud"],
        "",
    );
    assert!(!success);
    assert!(stderr.contains("--progress"));
}

#[test]
fn test_chat_exit_says_goodbye() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_repo_chat(&config_path, &["chat"], "  EXIT \n");
    assert!(success, "chat failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("AI: What question do you have about your repo?"));
    assert!(stdout.contains("Goodbye!"));
}

#[test]
fn test_chat_turn_error_does_not_end_loop() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) =
        run_repo_chat(&config_path, &["chat"], "where is main?\nexit\n");
    assert!(success, "chat failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("! embedding provider error"), "stdout={}", stdout);
    assert_eq!(
        stdout
            .matches("AI: What question do you have about your repo?")
            .count(),
        2
    );
    assert!(stdout.contains("Goodbye!"));
}

#[test]
fn test_chat_ends_on_eof() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_repo_chat(&config_path, &["chat"], "");
    assert!(success, "chat failed: stdout={}, stderr={}", stdout, stderr);
    assert!(!stdout.contains("Goodbye!"));
}
