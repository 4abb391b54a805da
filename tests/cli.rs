use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn rag_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("rag");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[chunking]
max_chars = 400
overlap_chars = 40

[retrieval]
top_k = 3

[ingest]
pdf_dir = "{}/pdfs"

[vector_store]
backend = "sqlite"
uri = "{}/data/rag.sqlite"
collection = "test_chunks"
"#,
        root.display(),
        root.display()
    );

    let config_path = config_dir.join("rag.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_rag(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = rag_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run rag binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_help_lists_commands() {
    let output = Command::new(rag_binary()).arg("--help").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for cmd in ["ingest", "ask", "chat", "serve"] {
        assert!(stdout.contains(cmd), "help should mention {}: {}", cmd, stdout);
    }
}

#[test]
fn test_ask_takes_no_session_flag() {
    let output = Command::new(rag_binary())
        .args(["ask", "--help"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(!stdout.contains("--session"), "ask help: {}", stdout);

    let (_tmp, config_path) = setup_test_env();
    let (_stdout, stderr, success) =
        run_rag(&config_path, &["ask", "--session", "alice", "What?"]);
    assert!(!success);
    assert!(stderr.contains("--session"), "stderr: {}", stderr);
}

#[test]
fn test_ask_rejects_blank_question() {
    let (_tmp, config_path) = setup_test_env();
    let (_stdout, stderr, success) = run_rag(&config_path, &["ask", "   "]);
    assert!(!success);
    assert!(
        stderr.contains("Question is required."),
        "stderr: {}",
        stderr
    );
}

#[test]
fn test_blank_question_rejected_even_without_config() {
    let tmp = TempDir::new().unwrap();
    let (_stdout, stderr, success) = run_rag(&tmp.path().join("missing.toml"), &["ask", ""]);
    assert!(!success);
    assert!(stderr.contains("Question is required."), "stderr: {}", stderr);
}

#[test]
fn test_ingest_without_pdfs_is_a_noop() {
    let (tmp, config_path) = setup_test_env();
    let (stdout, stderr, success) = run_rag(&config_path, &["ingest"]);
    assert!(success, "ingest failed: {}", stderr);
    assert!(stdout.contains("No PDFs found"), "stdout: {}", stdout);
    // The directory is created for the user to drop PDFs into.
    assert!(tmp.path().join("pdfs").is_dir());
    // Nothing was indexed, so no store was opened.
    assert!(!tmp.path().join("data").join("rag.sqlite").exists());
}

#[test]
fn test_ingest_skips_unreadable_pdf() {
    let (tmp, config_path) = setup_test_env();
    let pdf_dir = tmp.path().join("other");
    fs::create_dir_all(&pdf_dir).unwrap();
    fs::write(pdf_dir.join("bad.pdf"), b"not a valid pdf").unwrap();

    let (stdout, stderr, success) = run_rag(
        &config_path,
        &["ingest", "--dir", pdf_dir.to_str().unwrap()],
    );
    assert!(success, "ingest should not fail on a bad PDF: {}", stderr);
    assert!(stdout.contains("No chunks to index."), "stdout: {}", stdout);
    assert!(stderr.contains("bad.pdf"), "stderr: {}", stderr);
}

#[test]
fn test_invalid_config_is_reported() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("rag.toml");
    fs::write(&config_path, "[chunking]\nmax_chars = 10\noverlap_chars = 10\n").unwrap();

    let (_stdout, stderr, success) = run_rag(&config_path, &["ingest"]);
    assert!(!success);
    assert!(stderr.contains("overlap_chars"), "stderr: {}", stderr);
}
