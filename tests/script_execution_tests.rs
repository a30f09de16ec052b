//! Script runner integration tests
//!
//! These spawn real bash children against scripts written into a temp
//! repo root, exercising streaming, sanitization, timeouts, cancellation,
//! and the last-stdout-line contract.

use devforge::error::DevforgeError;
use devforge::script_runner::{run_check, run_script, CancelToken};
use devforge::TimeoutScope;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

fn write_script(root: &Path, rel: &str, body: &str) -> PathBuf {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, format!("#!/usr/bin/env bash\n{}\n", body)).unwrap();
    path
}

fn streaming(
    root: &Path,
    rel: &str,
    timeout: Duration,
    cancel: CancelToken,
) -> devforge::script_runner::ScriptHandle {
    run_script(root, rel, None, &[], timeout, TimeoutScope::Stage, cancel)
}

#[test]
fn test_run_check_returns_last_line() {
    let dir = tempfile::tempdir().unwrap();
    write_script(
        dir.path(),
        "check.sh",
        "echo noise\necho 'INSTALLED|1.2.3|apt|/usr/bin/x|1.2.4'",
    );
    let line = run_check(dir.path(), "check.sh").unwrap();
    assert_eq!(line, "INSTALLED|1.2.3|apt|/usr/bin/x|1.2.4");
}

#[test]
fn test_run_check_nonzero_exit_with_output_is_ok() {
    let dir = tempfile::tempdir().unwrap();
    write_script(
        dir.path(),
        "check.sh",
        "echo 'Not Installed|-|-|-|2.0.0'\nexit 1",
    );
    let line = run_check(dir.path(), "check.sh").unwrap();
    assert_eq!(line, "Not Installed|-|-|-|2.0.0");
}

#[test]
fn test_run_check_nonzero_exit_without_output_is_error() {
    let dir = tempfile::tempdir().unwrap();
    write_script(dir.path(), "check.sh", "exit 7");
    let err = run_check(dir.path(), "check.sh").unwrap_err();
    assert!(matches!(err, DevforgeError::ScriptExit { code: 7 }));
}

#[test]
fn test_run_script_streams_stdout_and_stderr() {
    let dir = tempfile::tempdir().unwrap();
    write_script(
        dir.path(),
        "noisy.sh",
        "echo out-one\necho err-one >&2\necho out-two",
    );
    let handle = streaming(
        dir.path(),
        "noisy.sh",
        Duration::from_secs(10),
        CancelToken::new(),
    );

    let lines: Vec<_> = handle.output.iter().collect();
    let result = handle.result.recv().unwrap().unwrap();

    assert_eq!(result.exit_code, 0);
    assert_eq!(result.last_line, "out-two");

    let stdout: Vec<_> = lines.iter().filter(|l| !l.is_error).map(|l| l.text.as_str()).collect();
    let stderr: Vec<_> = lines.iter().filter(|l| l.is_error).map(|l| l.text.as_str()).collect();
    assert_eq!(stdout, vec!["out-one", "out-two"]);
    assert_eq!(stderr, vec!["err-one"]);
}

#[test]
fn test_run_script_sanitizes_progress_bars() {
    let dir = tempfile::tempdir().unwrap();
    write_script(
        dir.path(),
        "progress.sh",
        "printf 'Downloading 10%%\\rDownloading 100%%\\n'\nprintf '\\033[32mgreen\\033[0m\\n'",
    );
    let handle = streaming(
        dir.path(),
        "progress.sh",
        Duration::from_secs(10),
        CancelToken::new(),
    );
    let lines: Vec<_> = handle.output.iter().map(|l| l.text).collect();
    let _ = handle.result.recv().unwrap().unwrap();

    assert_eq!(lines, vec!["Downloading 100%", "green"]);
}

#[test]
fn test_run_script_passes_args_and_env() {
    let dir = tempfile::tempdir().unwrap();
    write_script(dir.path(), "args.sh", "echo \"arg=$1 env=$DEVFORGE_TEST\"");

    let mut env = HashMap::new();
    env.insert("DEVFORGE_TEST".to_string(), "overlay".to_string());
    let handle = run_script(
        dir.path(),
        "args.sh",
        Some(env),
        &["snap".to_string()],
        Duration::from_secs(10),
        TimeoutScope::Stage,
        CancelToken::new(),
    );
    let result = handle.result.recv().unwrap().unwrap();
    assert_eq!(result.last_line, "arg=snap env=overlay");
}

#[test]
fn test_run_script_timeout_kills_child() {
    let dir = tempfile::tempdir().unwrap();
    write_script(dir.path(), "slow.sh", "echo started\nsleep 30\necho done");

    let start = Instant::now();
    let handle = streaming(
        dir.path(),
        "slow.sh",
        Duration::from_millis(300),
        CancelToken::new(),
    );
    // Drain so the channel closes with the child.
    let _lines: Vec<_> = handle.output.iter().collect();
    let err = handle.result.recv().unwrap().unwrap_err();

    assert!(err.is_timeout(), "expected timeout, got {}", err);
    assert!(
        start.elapsed() < Duration::from_secs(5),
        "timeout did not kill the child promptly"
    );
}

#[test]
fn test_run_script_cancellation_kills_child() {
    let dir = tempfile::tempdir().unwrap();
    write_script(dir.path(), "slow.sh", "echo started\nsleep 30");

    let cancel = CancelToken::new();
    let handle = streaming(dir.path(), "slow.sh", Duration::from_secs(60), cancel.clone());

    // Wait for the child to produce a line, then cancel.
    let first = handle.output.recv().unwrap();
    assert_eq!(first.text, "started");
    cancel.cancel();

    let _rest: Vec<_> = handle.output.iter().collect();
    let err = handle.result.recv().unwrap().unwrap_err();
    assert!(err.is_cancelled(), "expected cancellation, got {}", err);
}

#[test]
fn test_dropping_output_stream_cancels_run() {
    let dir = tempfile::tempdir().unwrap();
    write_script(
        dir.path(),
        "chatty.sh",
        "for i in $(seq 1 10000); do echo line-$i; done\nsleep 30",
    );
    let handle = streaming(
        dir.path(),
        "chatty.sh",
        Duration::from_secs(60),
        CancelToken::new(),
    );

    // Consumer walks away: the bounded channel fills, the writer detects
    // the disconnect, and the run cancels instead of hanging.
    drop(handle.output);
    let start = Instant::now();
    let result = handle.result.recv().unwrap();
    assert!(result.is_err());
    assert!(start.elapsed() < Duration::from_secs(10));
}

#[test]
fn test_missing_script_reports_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let handle = streaming(
        dir.path(),
        "does-not-exist.sh",
        Duration::from_secs(10),
        CancelToken::new(),
    );
    let _lines: Vec<_> = handle.output.iter().collect();
    let result = handle.result.recv().unwrap().unwrap();
    // bash exits 127 for a missing file.
    assert_eq!(result.exit_code, 127);
}
