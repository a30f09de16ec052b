//! Script execution with real-time output streaming
//!
//! All tool scripts run through this module: probes via [`run_check`],
//! lifecycle stages via [`run_script`]. Children are spawned in their own
//! process group and registered with the global [`ChildRegistry`], so
//! cancellation and parent death reach the whole script tree.
//!
//! Output lines are sanitized before they cross the channel: a raw `\r`
//! progress bar or an ANSI color sequence would corrupt the TUI viewport.

use crate::error::{DevforgeError, Result, TimeoutScope};
use crate::process_guard::{kill_child_group, ChildRegistry, ProcessGroupExt};
use log::{debug, warn};
use std::collections::HashMap;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant, SystemTime};

/// Hard wall-clock budget for check probes.
pub const CHECK_TIMEOUT: Duration = Duration::from_secs(30);

/// Default wall-clock budget for lifecycle scripts.
pub const SCRIPT_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Output channel capacity; scripts that outrun the UI block here rather
/// than ballooning memory.
const OUTPUT_CHANNEL_CAPACITY: usize = 100;

/// How often the monitor thread polls the child and the cancel token.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Cooperative cancellation shared between the orchestrator and a running
/// script. Cancelling kills the child's process group.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// A single line of script output.
#[derive(Debug, Clone)]
pub struct OutputLine {
    pub text: String,
    pub timestamp: SystemTime,
    /// true if the line came from stderr
    pub is_error: bool,
}

/// The outcome of a script execution.
#[derive(Debug, Clone)]
pub struct ScriptResult {
    pub exit_code: i32,
    pub duration: Duration,
    /// Last line of stdout at child exit (probes report status there)
    pub last_line: String,
}

/// Handle to a running script: a stream of sanitized output lines and a
/// one-shot result. Both channels close when the child exits, times out,
/// or is cancelled. Dropping the output receiver cancels the run.
pub struct ScriptHandle {
    pub output: Receiver<OutputLine>,
    pub result: Receiver<Result<ScriptResult>>,
}

/// Remove control sequences that would break the TUI viewport.
///
/// 1. Keep only the segment after the final `\r` (what a real terminal
///    would show after line-overwriting progress bars)
/// 2. Strip ANSI CSI sequences (`ESC [ params final-letter`)
/// 3. Drop remaining control characters except tab and newline
pub fn sanitize_output(text: &str) -> String {
    let text = match text.rfind('\r') {
        Some(idx) => &text[idx + 1..],
        None => text,
    };

    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\u{1b}' {
            if chars.peek() == Some(&'[') {
                chars.next();
                // Parameter bytes run until the final letter
                for p in chars.by_ref() {
                    if p.is_ascii_alphabetic() {
                        break;
                    }
                }
            }
            continue;
        }
        if c >= ' ' || c == '\t' || c == '\n' {
            result.push(c);
        }
    }
    result
}

/// Execute a check probe synchronously and return its final stdout line.
///
/// Probes report "not installed" through their exit code, so a non-zero
/// exit with output is not an error; only an empty-handed failure is.
pub fn run_check(repo_root: &Path, script_path: &str) -> Result<String> {
    let full_path = repo_root.join(script_path);
    debug!("run_check: {}", full_path.display());

    let mut child = Command::new("bash")
        .arg(&full_path)
        .current_dir(repo_root)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .new_process_group()
        .spawn()?;

    let pid = child.id();
    register_child(pid);

    let stdout = child.stdout.take();
    let collector = thread::spawn(move || {
        let mut lines = Vec::new();
        if let Some(out) = stdout {
            for line in BufReader::new(out).lines().map_while(|l| l.ok()) {
                lines.push(line);
            }
        }
        lines
    });

    let deadline = Instant::now() + CHECK_TIMEOUT;
    let status = loop {
        match child.try_wait()? {
            Some(status) => break status,
            None => {
                if Instant::now() >= deadline {
                    kill_child_group(pid);
                    let _ = child.wait();
                    unregister_child(pid);
                    return Err(DevforgeError::timeout(TimeoutScope::Probe, CHECK_TIMEOUT));
                }
                thread::sleep(POLL_INTERVAL);
            }
        }
    };
    unregister_child(pid);

    let lines = collector.join().unwrap_or_default();
    let last = lines
        .iter()
        .rev()
        .map(|l| l.trim())
        .find(|l| !l.is_empty())
        .unwrap_or("")
        .to_string();

    if last.is_empty() && !status.success() {
        return Err(DevforgeError::ScriptExit {
            code: status.code().unwrap_or(-1),
        });
    }
    Ok(last)
}

/// Spawn a lifecycle script with streaming output.
///
/// Runs `bash <script_path> <args...>` with cwd `repo_root` and the parent
/// environment plus `env`. Lines from stdout and stderr are read
/// concurrently, sanitized, and delivered over the bounded output channel;
/// the result channel yields exactly one value when the child exits, the
/// `timeout` fires, or `cancel` trips.
pub fn run_script(
    repo_root: &Path,
    script_path: &str,
    env: Option<HashMap<String, String>>,
    args: &[String],
    timeout: Duration,
    scope: TimeoutScope,
    cancel: CancelToken,
) -> ScriptHandle {
    let (output_tx, output_rx) = sync_channel::<OutputLine>(OUTPUT_CHANNEL_CAPACITY);
    let (result_tx, result_rx) = sync_channel::<Result<ScriptResult>>(1);

    let repo_root = repo_root.to_path_buf();
    let script_path = script_path.to_string();
    let args = args.to_vec();

    thread::spawn(move || {
        let outcome = run_script_inner(
            &repo_root,
            &script_path,
            env,
            &args,
            timeout,
            scope,
            cancel,
            output_tx,
        );
        let _ = result_tx.send(outcome);
    });

    ScriptHandle {
        output: output_rx,
        result: result_rx,
    }
}

#[allow(clippy::too_many_arguments)]
fn run_script_inner(
    repo_root: &Path,
    script_path: &str,
    env: Option<HashMap<String, String>>,
    args: &[String],
    timeout: Duration,
    scope: TimeoutScope,
    cancel: CancelToken,
    output_tx: SyncSender<OutputLine>,
) -> Result<ScriptResult> {
    let full_path: PathBuf = repo_root.join(script_path);
    debug!("run_script: {} {:?}", full_path.display(), args);

    let mut cmd = Command::new("bash");
    cmd.arg(&full_path)
        .args(args)
        .current_dir(repo_root)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .new_process_group();
    if let Some(env) = env {
        cmd.envs(env);
    }

    let start = Instant::now();
    let mut child = cmd.spawn()?;
    let pid = child.id();
    register_child(pid);

    // Guarded against the race between the stdout reader and child exit:
    // the reader may still be draining the pipe when wait() returns.
    let last_line = Arc::new(Mutex::new(String::new()));

    let stdout_reader = child.stdout.take().map(|out| {
        let tx = output_tx.clone();
        let cancel = cancel.clone();
        let last_line = Arc::clone(&last_line);
        thread::spawn(move || {
            for line in BufReader::new(out).lines().map_while(|l| l.ok()) {
                if let Ok(mut guard) = last_line.lock() {
                    *guard = line.clone();
                }
                if !deliver(&tx, &cancel, sanitize_output(&line), false) {
                    break;
                }
            }
        })
    });

    let stderr_reader = child.stderr.take().map(|err| {
        let tx = output_tx;
        let cancel = cancel.clone();
        thread::spawn(move || {
            for line in BufReader::new(err).lines().map_while(|l| l.ok()) {
                if !deliver(&tx, &cancel, sanitize_output(&line), true) {
                    break;
                }
            }
        })
    });

    let deadline = start + timeout;
    let status = loop {
        if cancel.is_cancelled() {
            kill_child_group(pid);
            let _ = child.wait();
            unregister_child(pid);
            join_readers(stdout_reader, stderr_reader);
            return Err(DevforgeError::Cancelled);
        }
        if Instant::now() >= deadline {
            kill_child_group(pid);
            let _ = child.wait();
            unregister_child(pid);
            join_readers(stdout_reader, stderr_reader);
            return Err(DevforgeError::timeout(scope, timeout));
        }
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => {
                unregister_child(pid);
                join_readers(stdout_reader, stderr_reader);
                return Err(e.into());
            }
        }
    };
    unregister_child(pid);

    // Let the readers drain the pipes fully before reading last_line.
    join_readers(stdout_reader, stderr_reader);

    let last = last_line
        .lock()
        .map(|l| l.clone())
        .unwrap_or_default();

    Ok(ScriptResult {
        exit_code: status.code().unwrap_or(-1),
        duration: start.elapsed(),
        last_line: last,
    })
}

/// Push a line into the bounded channel, blocking briefly while the UI
/// catches up. A disconnected receiver means the consumer is gone; trip
/// the cancel token so the monitor kills the child.
fn deliver(tx: &SyncSender<OutputLine>, cancel: &CancelToken, text: String, is_error: bool) -> bool {
    let mut line = OutputLine {
        text,
        timestamp: SystemTime::now(),
        is_error,
    };
    loop {
        match tx.try_send(line) {
            Ok(()) => return true,
            Err(TrySendError::Full(back)) => {
                if cancel.is_cancelled() {
                    return false;
                }
                line = back;
                thread::sleep(Duration::from_millis(5));
            }
            Err(TrySendError::Disconnected(_)) => {
                cancel.cancel();
                return false;
            }
        }
    }
}

fn join_readers(stdout: Option<thread::JoinHandle<()>>, stderr: Option<thread::JoinHandle<()>>) {
    if let Some(h) = stdout {
        if h.join().is_err() {
            warn!("stdout reader thread panicked");
        }
    }
    if let Some(h) = stderr {
        if h.join().is_err() {
            warn!("stderr reader thread panicked");
        }
    }
}

fn register_child(pid: u32) {
    if let Ok(mut registry) = ChildRegistry::global().lock() {
        registry.register(pid);
    }
}

fn unregister_child(pid: u32) {
    if let Ok(mut registry) = ChildRegistry::global().lock() {
        registry.unregister(pid);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_plain_text() {
        assert_eq!(sanitize_output("hello world"), "hello world");
    }

    #[test]
    fn test_sanitize_carriage_return_keeps_last_segment() {
        assert_eq!(sanitize_output("Downloading 10%\rDownloading 99%"), "Downloading 99%");
    }

    #[test]
    fn test_sanitize_strips_ansi_colors() {
        assert_eq!(sanitize_output("\u{1b}[32mok\u{1b}[0m done"), "ok done");
    }

    #[test]
    fn test_sanitize_drops_control_chars_keeps_tab() {
        assert_eq!(sanitize_output("a\u{7}b\tc"), "ab\tc");
    }

    #[test]
    fn test_sanitize_bare_escape_without_bracket() {
        assert_eq!(sanitize_output("x\u{1b}y"), "xy");
    }

    #[test]
    fn test_cancel_token_trips_once() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        token.cancel();
        assert!(token.is_cancelled());
        let clone = token.clone();
        assert!(clone.is_cancelled());
    }
}
