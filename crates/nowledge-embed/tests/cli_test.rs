//! End-to-end tests for the nowledge-embed binary.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use tempfile::TempDir;

fn embed(args: &[&str], stdin: &str) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_nowledge-embed"))
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to spawn nowledge-embed");

    // The binary may exit on a usage error before reading stdin
    let _ = child.stdin.take().unwrap().write_all(stdin.as_bytes());
    child.wait_with_output().expect("nowledge-embed did not exit")
}

/// Model fetched by `nowledge-download --model-path ./models-test` from the
/// workspace root, unless NOWLEDGE_TEST_MODEL_PATH points elsewhere.
fn test_model_path() -> PathBuf {
    std::env::var("NOWLEDGE_TEST_MODEL_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            Path::new(env!("CARGO_MANIFEST_DIR"))
                .join("../..")
                .join("models-test")
        })
}

#[test]
fn test_missing_model_path_is_usage_error() {
    let output = embed(&[], "hello world");

    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Usage"), "stderr: {stderr}");
}

#[test]
fn test_nonexistent_model_fails_without_output() {
    let temp = TempDir::new().unwrap();
    let missing = temp.path().join("no-such-model.gguf");
    let output = embed(&[missing.to_str().unwrap()], "hello world");

    assert_eq!(output.status.code(), Some(2));
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("no-such-model.gguf"), "stderr: {stderr}");
}

#[test]
fn test_corrupt_model_dir_fails_without_output() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("config.json"), b"{ not json").unwrap();
    std::fs::write(temp.path().join("tokenizer.json"), b"{}").unwrap();
    let output = embed(&[temp.path().to_str().unwrap()], "hello world");

    assert_eq!(output.status.code(), Some(2));
    assert!(output.stdout.is_empty());
}

#[test]
fn test_zero_context_window_is_usage_error() {
    let output = embed(&["./models", "--context-window", "0"], "hello");
    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
}

#[test]
#[ignore = "requires a downloaded model (run nowledge-download --model-path ./models-test)"]
fn test_hello_world_produces_one_array() {
    let model = test_model_path();
    let output = embed(&[model.to_str().unwrap()], "hello world\n");
    assert!(output.status.success(), "{:?}", output);

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_eq!(stdout.lines().count(), 1);
    let vector: Vec<f64> = serde_json::from_str(stdout.trim()).unwrap();
    // bge-micro-v2 hidden size
    assert_eq!(vector.len(), 384);
}

#[test]
#[ignore = "requires a downloaded model (run nowledge-download --model-path ./models-test)"]
fn test_same_text_same_vector() {
    let model = test_model_path();
    let run = || {
        let output = embed(&[model.to_str().unwrap()], "  the quick brown fox  ");
        assert!(output.status.success(), "{:?}", output);
        serde_json::from_slice::<Vec<f32>>(&output.stdout).unwrap()
    };

    let first = run();
    let second = run();
    assert_eq!(first.len(), second.len());
    for (a, b) in first.iter().zip(&second) {
        assert!((a - b).abs() < 1e-6);
    }
}

#[test]
#[ignore = "requires a downloaded model (run nowledge-download --model-path ./models-test)"]
fn test_overlong_input_is_truncated_not_rejected() {
    let model = test_model_path();
    let text = "lorem ipsum ".repeat(2_000);
    let output = embed(&[model.to_str().unwrap()], &text);
    assert!(output.status.success(), "{:?}", output);
    let vector: Vec<f32> = serde_json::from_slice(&output.stdout).unwrap();
    assert!(!vector.is_empty());
}
