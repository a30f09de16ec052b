//! Two-phase fix execution
//!
//! User-level fixes always run before privileged ones, so a sudo prompt
//! failure cannot strand half the harmless fixes. Each fix is one
//! `bash -c` child with a 60-second budget. Cancellation aborts between
//! fixes, never mid-fix.

use super::{separate_by_sudo, Issue};
use crate::error::TimeoutScope;
use crate::process_guard::{kill_child_group, ChildRegistry, ProcessGroupExt};
use crate::script_runner::CancelToken;
use log::info;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// Per-fix wall-clock budget.
pub const FIX_TIMEOUT: Duration = Duration::from_secs(60);

/// The result of one fix attempt.
#[derive(Debug, Clone)]
pub struct FixResult {
    pub issue: Issue,
    pub success: bool,
    /// Combined stdout + stderr of the fix command
    pub output: String,
    pub error: Option<String>,
    pub duration: Duration,
}

/// The results of a batch fix operation.
#[derive(Debug, Clone, Default)]
pub struct BatchFixResult {
    pub user_level: Vec<FixResult>,
    pub sudo_level: Vec<FixResult>,
    pub total_fixed: usize,
    pub total_failed: usize,
    pub duration: Duration,
    pub needs_reboot: bool,
}

impl BatchFixResult {
    /// Human-readable summary of the batch.
    pub fn summary(&self) -> String {
        let mut s = format!(
            "Fix complete in {}ms\nFixed: {}, Failed: {}\n",
            self.duration.as_millis(),
            self.total_fixed,
            self.total_failed
        );
        if !self.user_level.is_empty() {
            s.push_str(&format!("User-level: {} commands\n", self.user_level.len()));
        }
        if !self.sudo_level.is_empty() {
            s.push_str(&format!("System-level: {} commands\n", self.sudo_level.len()));
        }
        if self.needs_reboot {
            s.push_str("\nReboot recommended to apply changes");
        }
        s
    }

    pub fn all_successful(&self) -> bool {
        self.total_failed == 0 && self.total_fixed > 0
    }

    /// Issues whose fixes did not succeed.
    pub fn failed_issues(&self) -> Vec<Issue> {
        self.user_level
            .iter()
            .chain(self.sudo_level.iter())
            .filter(|r| !r.success)
            .map(|r| r.issue.clone())
            .collect()
    }
}

/// Executes issue fixes.
pub struct Fixer {
    repo_root: PathBuf,
    demo_mode: bool,
    sudo_cached: bool,
}

impl Fixer {
    pub fn new(repo_root: &Path, demo_mode: bool, sudo_cached: bool) -> Self {
        Self {
            repo_root: repo_root.to_path_buf(),
            demo_mode,
            sudo_cached,
        }
    }

    /// Execute a single fix command.
    pub fn execute_fix(&self, issue: &Issue) -> FixResult {
        let mut result = FixResult {
            issue: issue.clone(),
            success: false,
            output: String::new(),
            error: None,
            duration: Duration::ZERO,
        };

        if !issue.is_fixable() || issue.fix_command.is_empty() {
            result.error = Some("issue is not fixable".to_string());
            return result;
        }

        // Demo mode describes privileged commands instead of executing them,
        // unless credentials are known cached.
        if self.demo_mode && issue.requires_sudo() && !self.sudo_cached {
            result.error = Some("skipped in demo mode (requires sudo)".to_string());
            result.output = format!("[DEMO] Would execute: {}", issue.fix_command);
            return result;
        }

        info!("fix: {}", issue.fix_command);
        let start = Instant::now();
        match run_fix_command(&self.repo_root, &issue.fix_command) {
            FixOutcome::Exited { code, output } => {
                result.duration = start.elapsed();
                result.output = output;
                if code == 0 {
                    result.success = true;
                } else {
                    result.error = Some(format!("command failed with exit code {}", code));
                }
            }
            FixOutcome::TimedOut { output } => {
                result.duration = start.elapsed();
                result.output = output;
                result.error = Some(format!(
                    "{} timed out after {:?}",
                    TimeoutScope::Fix,
                    FIX_TIMEOUT
                ));
            }
            FixOutcome::Failed(message) => {
                result.duration = start.elapsed();
                result.error = Some(message);
            }
        }
        result
    }

    /// Execute fixes for a batch of issues in two phases: every user-level
    /// fix first, then every privileged fix. Cancellation is honored
    /// between fixes.
    pub fn execute_batch(&self, issues: &[Issue], cancel: &CancelToken) -> BatchFixResult {
        let start = Instant::now();
        let mut result = BatchFixResult::default();

        let (user_level, sudo_level) = separate_by_sudo(issues);

        for issue in &user_level {
            if cancel.is_cancelled() {
                result.duration = start.elapsed();
                return result;
            }
            let fix = self.execute_fix(issue);
            if fix.success {
                result.total_fixed += 1;
            } else {
                result.total_failed += 1;
            }
            result.user_level.push(fix);
        }

        for issue in &sudo_level {
            if cancel.is_cancelled() {
                result.duration = start.elapsed();
                return result;
            }
            let fix = self.execute_fix(issue);
            if fix.success {
                result.total_fixed += 1;
            } else {
                result.total_failed += 1;
            }
            result.sudo_level.push(fix);
        }

        result.needs_reboot = recommend_reboot(issues);
        result.duration = start.elapsed();
        result
    }
}

/// Whether applying these fixes warrants a reboot recommendation.
fn recommend_reboot(issues: &[Issue]) -> bool {
    issues.iter().any(|issue| {
        matches!(
            issue.issue_type.as_str(),
            "ORPHANED_SERVICE" | "FAILED_SERVICE" | "NETWORK_WAIT"
        ) || issue.fix_command.contains("daemon-reload")
    })
}

enum FixOutcome {
    Exited { code: i32, output: String },
    TimedOut { output: String },
    Failed(String),
}

/// Run `bash -c <command>` with combined output capture and the fix budget.
/// Fix commands do not stream; their output is read whole when they finish.
/// Cancellation is not checked here: the boundary is between fixes.
fn run_fix_command(repo_root: &Path, command: &str) -> FixOutcome {
    let mut child = match Command::new("bash")
        .args(["-c", command])
        .current_dir(repo_root)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .new_process_group()
        .spawn()
    {
        Ok(child) => child,
        Err(e) => return FixOutcome::Failed(format!("failed to spawn fix: {}", e)),
    };

    let pid = child.id();
    if let Ok(mut registry) = ChildRegistry::global().lock() {
        registry.register(pid);
    }

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let collector = thread::spawn(move || {
        let mut output = String::new();
        if let Some(mut out) = stdout {
            let _ = out.read_to_string(&mut output);
        }
        if let Some(mut err) = stderr {
            let _ = err.read_to_string(&mut output);
        }
        output
    });

    let deadline = Instant::now() + FIX_TIMEOUT;
    let outcome = loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                break FixOutcome::Exited {
                    code: status.code().unwrap_or(-1),
                    output: String::new(),
                }
            }
            Ok(None) => {
                if Instant::now() >= deadline {
                    kill_child_group(pid);
                    let _ = child.wait();
                    break FixOutcome::TimedOut {
                        output: String::new(),
                    };
                }
                thread::sleep(Duration::from_millis(50));
            }
            Err(e) => {
                break FixOutcome::Failed(format!("failed waiting for fix: {}", e));
            }
        }
    };

    if let Ok(mut registry) = ChildRegistry::global().lock() {
        registry.unregister(pid);
    }

    let output = collector.join().unwrap_or_default();
    match outcome {
        FixOutcome::Exited { code, .. } => FixOutcome::Exited { code, output },
        FixOutcome::TimedOut { .. } => FixOutcome::TimedOut { output },
        failed => failed,
    }
}
