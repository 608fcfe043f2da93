//! End-to-end tests for the nowledge-download binary.

use std::process::Command;

use tempfile::TempDir;

fn downloader() -> Command {
    Command::new(env!("CARGO_BIN_EXE_nowledge-download"))
}

#[test]
fn test_invalid_worker_count_exits_one() {
    let temp = TempDir::new().unwrap();
    let output = downloader()
        .env("NOWLEDGE_MAX_WORKERS", "0")
        .env("NOWLEDGE_MODEL_PATH", temp.path())
        .output()
        .expect("Failed to run nowledge-download");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("max_workers"), "stderr: {stderr}");
    // Nothing fetched, nothing announced
    assert!(output.stdout.is_empty());
}

#[test]
fn test_missing_config_file_exits_one() {
    let output = downloader()
        .args(["--config", "/nonexistent/nowledge.toml"])
        .output()
        .expect("Failed to run nowledge-download");

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("configuration"));
}

#[test]
fn test_help_exits_zero() {
    let output = downloader()
        .arg("--help")
        .output()
        .expect("Failed to run nowledge-download");

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("--model-id"));
}

#[test]
#[ignore = "requires network access"]
fn test_unknown_model_exits_one_and_names_it() {
    let temp = TempDir::new().unwrap();
    let output = downloader()
        .env("NOWLEDGE_MODEL_ID", "nowledge-test/definitely-not-a-model")
        .env("NOWLEDGE_MODEL_PATH", temp.path())
        .output()
        .expect("Failed to run nowledge-download");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("nowledge-test/definitely-not-a-model"));
}

#[test]
#[ignore = "requires network access"]
fn test_download_twice_succeeds() {
    let temp = TempDir::new().unwrap();
    let target = temp.path().join("models-test");

    for _ in 0..2 {
        let output = downloader()
            .arg("--model-path")
            .arg(&target)
            .output()
            .expect("Failed to run nowledge-download");
        assert!(output.status.success(), "{:?}", output);
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("TaylorAI/bge-micro-v2"));
    }

    assert!(target.join("config.json").is_file());
    assert!(target.join("tokenizer.json").is_file());
}
