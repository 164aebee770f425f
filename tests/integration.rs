use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn forge_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_forge"))
}

fn write_config(root: &Path, embedding: &str) -> PathBuf {
    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/forge.sqlite"

{}

[retrieval]
top_k = 3
threshold = 0.4

[server]
bind = "127.0.0.1:8000"
"#,
        root.display(),
        embedding
    );

    let config_path = config_dir.join("forge.toml");
    fs::write(&config_path, config_content).unwrap();
    config_path
}

/// Temp workspace with embeddings disabled and a few files to ingest.
fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let files_dir = root.join("files");
    fs::create_dir_all(&files_dir).unwrap();
    fs::write(
        files_dir.join("warranty.md"),
        "# Warranty\n\nAll furniture carries a two year warranty.\n\nRepairs are free within that period.",
    )
    .unwrap();
    fs::write(files_dir.join("photo.jpg"), [0xffu8, 0xd8, 0xff, 0xe0]).unwrap();

    let config_path = write_config(
        &root,
        "[embedding]\nprovider = \"disabled\"",
    );
    (tmp, config_path)
}

fn run_forge(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = forge_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run forge binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

/// First id printed by `forge add` / `forge ingest`.
fn stored_id(stdout: &str) -> String {
    stdout
        .lines()
        .find_map(|l| l.strip_prefix("stored "))
        .unwrap_or_else(|| panic!("no id in output: {}", stdout))
        .trim()
        .to_string()
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_forge(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/forge.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_forge(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_forge(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_add_without_embeddings_then_list() {
    let (_tmp, config_path) = setup_test_env();
    run_forge(&config_path, &["init"]);

    let (stdout, stderr, success) = run_forge(
        &config_path,
        &["add", "--title", "Pricing", "Hourly rate is 40."],
    );
    assert!(success, "add failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("embedded: no"));
    let id = stored_id(&stdout);

    let (stdout, _, success) = run_forge(&config_path, &["list"]);
    assert!(success);
    assert!(stdout.contains(&id));
    assert!(stdout.contains("[note] Pricing"));
    assert!(stdout.contains("(not embedded)"));
}

#[test]
fn test_list_empty() {
    let (_tmp, config_path) = setup_test_env();
    run_forge(&config_path, &["init"]);

    let (stdout, _, success) = run_forge(&config_path, &["list"]);
    assert!(success);
    assert!(stdout.contains("No knowledge stored."));
}

#[test]
fn test_add_rejects_empty_content() {
    let (_tmp, config_path) = setup_test_env();
    run_forge(&config_path, &["init"]);

    let (_, stderr, success) = run_forge(&config_path, &["add", "--title", "Empty", "   "]);
    assert!(!success);
    assert!(stderr.contains("content must not be empty"));
}

#[test]
fn test_ingest_markdown_file() {
    let (tmp, config_path) = setup_test_env();
    run_forge(&config_path, &["init"]);

    let file = tmp.path().join("files/warranty.md");
    let (stdout, stderr, success) = run_forge(&config_path, &["ingest", file.to_str().unwrap()]);
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("title: warranty.md"));

    let (stdout, _, _) = run_forge(&config_path, &["list"]);
    assert!(stdout.contains("[document] warranty.md"));
}

#[test]
fn test_ingest_unsupported_file_fails() {
    let (tmp, config_path) = setup_test_env();
    run_forge(&config_path, &["init"]);

    let file = tmp.path().join("files/photo.jpg");
    let (_, stderr, success) = run_forge(&config_path, &["ingest", file.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("unsupported file type"));
}

#[test]
fn test_delete_removes_item() {
    let (_tmp, config_path) = setup_test_env();
    run_forge(&config_path, &["init"]);

    let (stdout, _, _) = run_forge(&config_path, &["add", "--title", "Temp", "Short lived."]);
    let id = stored_id(&stdout);

    let (stdout, _, success) = run_forge(&config_path, &["delete", &id]);
    assert!(success);
    assert!(stdout.contains(&format!("deleted {}", id)));

    let (stdout, _, _) = run_forge(&config_path, &["list"]);
    assert!(!stdout.contains(&id));

    let (_, stderr, success) = run_forge(&config_path, &["delete", &id]);
    assert!(!success);
    assert!(stderr.contains("not found"));
}

#[test]
fn test_retrieve_without_embeddings_finds_nothing() {
    let (_tmp, config_path) = setup_test_env();
    run_forge(&config_path, &["init"]);
    run_forge(&config_path, &["add", "--title", "Pricing", "Hourly rate is 40."]);

    let (stdout, stderr, success) = run_forge(&config_path, &["retrieve", "hourly rate"]);
    assert!(success, "retrieve failed: stderr={}", stderr);
    assert!(stdout.contains("No relevant knowledge."));
}

#[test]
fn test_retrieve_rejects_invalid_threshold() {
    let (_tmp, config_path) = setup_test_env();
    run_forge(&config_path, &["init"]);

    let (_, stderr, success) = run_forge(
        &config_path,
        &["retrieve", "anything", "--threshold", "1.5"],
    );
    assert!(!success);
    assert!(stderr.contains("threshold"));
}

#[test]
fn test_status_disabled() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_forge(&config_path, &["status"]);
    assert!(success);
    assert!(stdout.contains("embedding: offline (disabled)"));
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_forge(&tmp.path().join("nope.toml"), &["init"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}

#[test]
fn test_invalid_config_threshold_fails() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("forge.toml");
    fs::write(
        &config_path,
        "[db]\npath = \"x.sqlite\"\n\n[retrieval]\nthreshold = 2.0\n",
    )
    .unwrap();

    let (_, stderr, success) = run_forge(&config_path, &["list"]);
    assert!(!success);
    assert!(stderr.contains("threshold"));
}

async fn mount_embedding(server: &MockServer, prompt: &str, embedding: &[f32]) {
    Mock::given(method("POST"))
        .and(path("/api/embeddings"))
        .and(body_partial_json(serde_json::json!({ "prompt": prompt })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "embedding": embedding })),
        )
        .mount(server)
        .await;
}

async fn run_forge_async(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let config_path = config_path.to_path_buf();
    let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
    tokio::task::spawn_blocking(move || {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        run_forge(&config_path, &args)
    })
    .await
    .unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn test_retrieve_end_to_end_with_ollama() {
    let server = MockServer::start().await;
    mount_embedding(&server, "Hourly rate is 40, materials at cost.", &[1.0, 0.0]).await;
    mount_embedding(&server, "Open from 9 to 5 on weekdays.", &[0.0, 1.0]).await;
    mount_embedding(&server, "how much per hour", &[0.9, 0.1]).await;

    let tmp = TempDir::new().unwrap();
    let config_path = write_config(
        tmp.path(),
        &format!(
            "[embedding]\nprovider = \"ollama\"\nurl = \"{}\"\ntimeout_secs = 5",
            server.uri()
        ),
    );

    run_forge_async(&config_path, &["init"]).await;
    let (stdout, _, success) = run_forge_async(
        &config_path,
        &["add", "--title", "Pricing", "Hourly rate is 40, materials at cost."],
    )
    .await;
    assert!(success);
    assert!(stdout.contains("embedded: yes"));
    run_forge_async(
        &config_path,
        &["add", "--title", "Hours", "Open from 9 to 5 on weekdays."],
    )
    .await;

    let (stdout, stderr, success) =
        run_forge_async(&config_path, &["retrieve", "how much per hour"]).await;
    assert!(success, "retrieve failed: stderr={}", stderr);
    assert!(stdout.contains("1. [0.99] Pricing"), "got: {}", stdout);
    assert!(!stdout.contains("Hours"));

    let (stdout, _, success) = run_forge_async(
        &config_path,
        &["retrieve", "how much per hour", "--context"],
    )
    .await;
    assert!(success);
    assert!(stdout.starts_with("[KNOWLEDGE CONTEXT]:\nHourly rate is 40"));
}
