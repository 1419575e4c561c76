//! CLI integration tests for `colon-cli tokens` / `colon-cli parse`.
//!
//! These tests invoke the compiled binary to verify end-to-end behavior.

use std::path::PathBuf;
use std::process::{Command, Output};

fn colon_bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_colon-cli"))
}

fn write_source(dir: &tempfile::TempDir, name: &str, src: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, src).expect("write source");
    path
}

fn run(args: &[&str]) -> Output {
    colon_bin().args(args).output().expect("run binary")
}

#[test]
fn cli_parse_clean_program() {
    let dir = tempfile::tempdir().expect("create tempdir");
    let file = write_source(
        &dir,
        "clean.colon",
        "def area(w, h):\n    return w * h\n\nx = area(2, 3)\n",
    );

    let output = run(&["parse", file.to_str().unwrap()]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        output.status.success(),
        "parse should succeed, stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(
        stdout.trim(),
        "(program (def area (param w) (param h) (block (return (* w h)))) (= x (call area 2 3)))"
    );
}

#[test]
fn cli_parse_reports_diagnostics_with_line_and_column() {
    let dir = tempfile::tempdir().expect("create tempdir");
    let file = write_source(&dir, "broken.colon", "a = 1\nx = )\n");
    let path = file.to_str().unwrap();

    let output = run(&["parse", path]);
    assert_eq!(output.status.code(), Some(1));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("(error \"\")"), "partial tree expected: {stdout}");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains(&format!("{path}:2:5: expected expression, found ')'")),
        "stderr: {stderr}"
    );
}

#[test]
fn cli_parse_json_includes_diagnostics() {
    let dir = tempfile::tempdir().expect("create tempdir");
    let file = write_source(&dir, "json.colon", "if a:\nb\n");

    let output = run(&["parse", file.to_str().unwrap(), "--format", "json"]);
    assert_eq!(output.status.code(), Some(1));

    let json: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout is valid JSON");
    let diagnostics = json["diagnostics"].as_array().expect("diagnostics array");
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0]["message"], "expected an indented block");
    assert_eq!(diagnostics[0]["span"]["start"], 6);
    assert!(json["ast"]["nodes"].as_array().is_some_and(|n| !n.is_empty()));
}

#[test]
fn cli_tokens_hides_whitespace_by_default() {
    let dir = tempfile::tempdir().expect("create tempdir");
    let file = write_source(&dir, "toks.colon", "if x: y // c\n");
    let path = file.to_str().unwrap();

    let output = run(&["tokens", path]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<_> = stdout.lines().collect();
    assert_eq!(lines.len(), 5, "stdout: {stdout}");
    assert_eq!(lines[0], "1:1  0..2  Keyword  \"if\"");
    assert!(lines[4].contains("Comment"));
    assert!(!stdout.contains("Whitespace"));

    let output = run(&["tokens", path, "--all"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Whitespace"));
}

#[test]
fn cli_tokens_json_round_trips_the_source() {
    let dir = tempfile::tempdir().expect("create tempdir");
    let src = "x = 'a' @ 3.5\n";
    let file = write_source(&dir, "all.colon", src);

    let output = run(&["tokens", file.to_str().unwrap(), "--all", "--format", "json"]);
    assert!(output.status.success());

    let tokens: Vec<serde_json::Value> =
        serde_json::from_slice(&output.stdout).expect("stdout is valid JSON");
    let joined: String = tokens
        .iter()
        .map(|t| t["text"].as_str().unwrap())
        .collect();
    assert_eq!(joined, src);
    assert!(tokens.iter().any(|t| t["kind"] == "Error"));
}

#[test]
fn cli_rejects_missing_file() {
    let output = run(&["parse", "/nonexistent/path/to/file.colon"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to read source file"), "stderr: {stderr}");
}

#[test]
fn cli_rejects_oversized_file() {
    let dir = tempfile::tempdir().expect("create tempdir");
    let big = "x = 1\n".repeat(200_000);
    let file = write_source(&dir, "big.colon", &big);

    let output = run(&["tokens", file.to_str().unwrap()]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("exceeds 1MB limit"), "stderr: {stderr}");
}
