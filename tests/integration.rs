//! CLI integration tests.
//!
//! Each test gets its own temp directory holding the config, the encrypted
//! store and its key, then drives the `ragdesk` binary end to end. None of
//! these need a running Ollama: embedding calls either never happen or are
//! pointed at a closed port.

use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn ragdesk_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_ragdesk"))
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let files_dir = root.join("files");
    fs::create_dir_all(&files_dir).unwrap();
    fs::write(
        files_dir.join("alpha.md"),
        "# Alpha\n\nDeploys happen on Fridays after the standup.",
    )
    .unwrap();

    let config_content = format!(
        r#"[store]
path = "{root}/data/rag-store.enc"
key_path = "{root}/data/rag-store.key"

[embedding]
timeout_secs = 5
max_retries = 0

[log]
level = "warn"
"#,
        root = root.display()
    );
    let config_path = root.join("ragdesk.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = ragdesk_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path)
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run ragdesk binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

/// Run a command that must succeed and print JSON.
fn run_json(config_path: &Path, args: &[&str]) -> Value {
    let (stdout, stderr, ok) = run(config_path, args);
    assert!(ok, "ragdesk {:?} failed: {}", args, stderr);
    serde_json::from_str(&stdout)
        .unwrap_or_else(|e| panic!("ragdesk {:?} printed invalid JSON ({}): {}", args, e, stdout))
}

fn add_note(config: &Path, label: &str, text: &str) -> String {
    let source = run_json(
        config,
        &["sources", "add", "--kind", "note", "--label", label, "--note", text],
    );
    source["id"].as_str().unwrap().to_string()
}

#[test]
fn test_status_on_fresh_store() {
    let (_tmp, config) = setup_test_env();

    let (stdout, stderr, ok) = run(&config, &["status"]);
    assert!(ok, "status failed: {}", stderr);
    assert!(stdout.contains("Index Status"));
    assert!(stdout.contains("never"));

    let overview = run_json(&config, &["status", "--json"]);
    assert_eq!(overview["status"]["sourcesIndexed"], 0);
    assert_eq!(overview["status"]["chunks"], 0);
    assert_eq!(overview["config"]["topK"], 6);
}

#[test]
fn test_store_is_encrypted_on_disk() {
    let (tmp, config) = setup_test_env();
    add_note(&config, "Secret", "the launch code is tangerine");

    let bytes = fs::read(tmp.path().join("data/rag-store.enc")).unwrap();
    let as_text = String::from_utf8_lossy(&bytes);
    assert!(!as_text.contains("tangerine"));
    assert!(!as_text.contains("Secret"));
    assert!(tmp.path().join("data/rag-store.key").exists());
}

#[test]
fn test_source_lifecycle() {
    let (tmp, config) = setup_test_env();
    let folder = tmp.path().join("files");

    let added = run_json(
        &config,
        &["sources", "add", "--kind", "folder", "--path", folder.to_str().unwrap()],
    );
    assert_eq!(added["kind"], "folder");
    assert_eq!(added["label"], "files");
    assert_eq!(added["enabled"], true);
    let id = added["id"].as_str().unwrap().to_string();
    assert!(id.starts_with("src_"));

    let updated = run_json(
        &config,
        &["sources", "update", &id, "--label", "Work", "--disable"],
    );
    assert_eq!(updated["label"], "Work");
    assert_eq!(updated["enabled"], false);

    let listed = run_json(&config, &["sources", "list"]);
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let removed = run_json(&config, &["sources", "delete", &id]);
    assert_eq!(removed["removed"], true);
    let removed_again = run_json(&config, &["sources", "delete", &id]);
    assert_eq!(removed_again["removed"], false);
}

#[test]
fn test_invalid_source_is_rejected() {
    let (_tmp, config) = setup_test_env();

    let (_, stderr, ok) = run(&config, &["sources", "add", "--kind", "note"]);
    assert!(!ok);
    assert!(stderr.contains("label"), "stderr: {}", stderr);

    let (_, _, ok) = run(&config, &["sources", "add", "--kind", "url", "--path", "x"]);
    assert!(!ok);

    let (_, stderr, ok) = run(&config, &["sources", "update", "src_missing", "--label", "x"]);
    assert!(!ok);
    assert!(stderr.contains("src_missing"), "stderr: {}", stderr);
}

#[test]
fn test_corpus_and_thread_selection() {
    let (_tmp, config) = setup_test_env();
    let a = add_note(&config, "A", "first note");
    let b = add_note(&config, "B", "second note");

    let corpus = run_json(
        &config,
        &["corpora", "upsert", "--name", "Mine", "--source", &a, "--source", &b, "--source", &a],
    );
    let corpus_id = corpus["id"].as_str().unwrap().to_string();
    assert!(corpus_id.starts_with("corpus_"));
    assert_eq!(corpus["sourceIds"].as_array().unwrap().len(), 2);

    let selection = run_json(&config, &["convo", "set", "thread-1", "--corpus", &corpus_id]);
    assert_eq!(selection["corpusIds"][0], corpus_id.as_str());
    let fetched = run_json(&config, &["convo", "get", "thread-1"]);
    assert_eq!(fetched["corpusIds"][0], corpus_id.as_str());

    // Deleting a member source drops it from the corpus.
    run_json(&config, &["sources", "delete", &a]);
    let corpora = run_json(&config, &["corpora", "list"]);
    assert_eq!(corpora[0]["sourceIds"], serde_json::json!([b]));

    // Deleting the corpus clears the thread selection.
    run_json(&config, &["corpora", "delete", &corpus_id]);
    let fetched = run_json(&config, &["convo", "get", "thread-1"]);
    assert_eq!(fetched["corpusIds"].as_array().unwrap().len(), 0);
}

#[test]
fn test_config_set_ignores_zero_and_rejects_nan() {
    let (_tmp, config) = setup_test_env();

    let cfg = run_json(&config, &["config", "set", "--top-k", "3", "--min-score", "0.4"]);
    assert_eq!(cfg["topK"], 3);

    let cfg = run_json(&config, &["config", "set", "--top-k", "0"]);
    assert_eq!(cfg["topK"], 3);

    let (_, _, ok) = run(&config, &["config", "set", "--min-score", "NaN"]);
    assert!(!ok);
    let cfg = run_json(&config, &["config", "get"]);
    assert!((cfg["minScore"].as_f64().unwrap() - 0.4).abs() < 1e-6);
}

#[test]
fn test_blank_query_returns_empty_context() {
    let (_tmp, config) = setup_test_env();
    let a = add_note(&config, "A", "first note");
    let corpus = run_json(&config, &["corpora", "upsert", "--name", "C", "--source", &a]);
    let corpus_id = corpus["id"].as_str().unwrap();

    let response = run_json(&config, &["query", "   ", "--corpus", corpus_id]);
    assert_eq!(response["context"], "");
    assert_eq!(response["sources"].as_array().unwrap().len(), 0);
    assert_eq!(response["corpusIds"][0], corpus_id);
}

#[test]
fn test_index_with_unreachable_embedder_reports_errors() {
    let (_tmp, config) = setup_test_env();
    let a = add_note(&config, "A", "first note");

    // Nothing listens on the discard port.
    run_json(
        &config,
        &["config", "set", "--ollama-base-url", "http://127.0.0.1:9"],
    );

    let run = run_json(&config, &["index", "--all"]);
    let errors = run["result"]["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["sourceId"], a.as_str());
    assert_eq!(run["status"]["chunks"], 0);
}
