//! Detector execution: parallel fan-out over the detector scripts
//!
//! Each detector runs as its own bash child with a 30-second budget; a
//! non-zero exit with parseable output still counts (detectors exit
//! non-zero to flag "issues found"), while a timeout, spawn failure, or an
//! empty-handed failure counts against `scripts_failed`.

use super::{parse_issues, Issue};
use crate::error::{DevforgeError, TimeoutScope};
use crate::script_runner::{run_script, CancelToken};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant, SystemTime};

/// Per-detector wall-clock budget.
pub const DETECTOR_TIMEOUT: Duration = Duration::from_secs(30);

/// Detector script paths relative to the repo root, in a fixed order.
pub fn detector_scripts() -> &'static [&'static str] {
    &[
        "scripts/100-diagnostics/detect_failed_services.sh",
        "scripts/100-diagnostics/detect_orphaned_services.sh",
        "scripts/100-diagnostics/detect_network_wait.sh",
        "scripts/100-diagnostics/detect_stale_snaps.sh",
        "scripts/100-diagnostics/detect_cosmetic_warnings.sh",
    ]
}

/// The complete result of one diagnostics scan.
#[derive(Debug, Clone)]
pub struct ScanResult {
    pub issues: Vec<Issue>,
    /// One message per failed detector
    pub errors: Vec<String>,
    pub scan_time: SystemTime,
    pub duration: Duration,
    pub scripts_ran: usize,
    pub scripts_failed: usize,
}

impl ScanResult {
    /// Human-readable scan summary with per-severity counts.
    pub fn summary(&self) -> String {
        let groups = super::group_by_severity(&self.issues);
        let mut parts = Vec::new();
        for (severity, label) in [
            (super::IssueSeverity::Critical, "critical"),
            (super::IssueSeverity::Moderate, "moderate"),
            (super::IssueSeverity::Low, "low"),
        ] {
            let count = groups[&severity].len();
            if count > 0 {
                parts.push(format!("{} {}", count, label));
            }
        }

        let breakdown = if parts.is_empty() {
            "no issues found".to_string()
        } else {
            parts.join(", ")
        };

        let mut summary = format!(
            "Scan completed in {}ms\nFound {} issues: {}",
            self.duration.as_millis(),
            self.issues.len(),
            breakdown
        );
        if self.scripts_failed > 0 {
            summary.push_str(&format!(" ({} scripts failed)", self.scripts_failed));
        }
        summary
    }
}

struct DetectorOutcome {
    issues: Vec<Issue>,
    error: Option<String>,
}

/// Run every detector concurrently and aggregate their parsed issues.
pub fn run_full_scan(repo_root: &Path, cancel: &CancelToken) -> ScanResult {
    let start = Instant::now();
    let scan_time = SystemTime::now();
    let scripts = detector_scripts();

    let (tx, rx) = mpsc::channel::<DetectorOutcome>();
    for script in scripts {
        let tx = tx.clone();
        let repo_root: PathBuf = repo_root.to_path_buf();
        let cancel = cancel.clone();
        thread::spawn(move || {
            let outcome = run_single_detector(&repo_root, script, &cancel);
            let _ = tx.send(outcome);
        });
    }
    drop(tx);

    let mut issues = Vec::new();
    let mut errors = Vec::new();
    for outcome in rx.iter() {
        if let Some(error) = outcome.error {
            errors.push(error);
        }
        issues.extend(outcome.issues);
    }

    let scripts_failed = errors.len();
    ScanResult {
        issues,
        errors,
        scan_time,
        duration: start.elapsed(),
        scripts_ran: scripts.len(),
        scripts_failed,
    }
}

/// Run one detector and parse its stdout.
fn run_single_detector(
    repo_root: &Path,
    script_path: &str,
    cancel: &CancelToken,
) -> DetectorOutcome {
    let handle = run_script(
        repo_root,
        script_path,
        None,
        &[],
        DETECTOR_TIMEOUT,
        TimeoutScope::Detector,
        cancel.clone(),
    );

    // Issue records arrive on stdout; stderr is detector chatter.
    let mut stdout = String::new();
    for line in handle.output.iter() {
        if !line.is_error {
            stdout.push_str(&line.text);
            stdout.push('\n');
        }
    }

    match handle.result.recv() {
        Ok(Ok(result)) => {
            if result.exit_code != 0 && stdout.trim().is_empty() {
                return DetectorOutcome {
                    issues: Vec::new(),
                    error: Some(format!(
                        "{}: exited with code {} and no output",
                        script_path, result.exit_code
                    )),
                };
            }
            DetectorOutcome {
                issues: parse_issues(&stdout),
                error: None,
            }
        }
        Ok(Err(err)) => DetectorOutcome {
            issues: Vec::new(),
            error: Some(format!("{}: {}", script_path, err)),
        },
        Err(_) => DetectorOutcome {
            issues: Vec::new(),
            error: Some(format!("{}: {}", script_path, DevforgeError::Cancelled)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn scan_result(issue_lines: &str, failed: usize) -> ScanResult {
        ScanResult {
            issues: parse_issues(issue_lines),
            errors: vec!["x".to_string(); failed],
            scan_time: SystemTime::now(),
            duration: Duration::from_millis(1234),
            scripts_ran: 5,
            scripts_failed: failed,
        }
    }

    #[test]
    fn test_summary_counts_are_decimal() {
        // Twelve issues: counters must render ≥10 correctly.
        let mut lines = String::new();
        for i in 0..12 {
            lines.push_str(&format!("T|CRITICAL|svc{}|d|NO|\n", i));
        }
        let summary = scan_result(&lines, 0).summary();
        assert!(summary.contains("Found 12 issues"), "{}", summary);
        assert!(summary.contains("12 critical"), "{}", summary);
    }

    #[test]
    fn test_summary_no_issues() {
        let summary = scan_result("", 0).summary();
        assert!(summary.contains("no issues found"));
    }

    #[test]
    fn test_summary_reports_failed_scripts() {
        let summary = scan_result("T|LOW|a|d|NO|\n", 2).summary();
        assert!(summary.contains("(2 scripts failed)"));
    }

    #[test]
    fn test_detector_order_is_stable() {
        let scripts = detector_scripts();
        assert_eq!(scripts.len(), 5);
        assert!(scripts[0].contains("failed_services"));
    }
}
