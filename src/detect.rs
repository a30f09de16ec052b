//! System detection and install-method recommendation
//!
//! Reads `/etc/os-release` and probes for snap support to recommend an
//! installation method for multi-method tools. The method selector shows
//! the recommendation and its reasoning; the user always has the final say.

use crate::registry::InstallMethod;
use std::path::Path;
use std::process::Command;

/// Detected workstation facts relevant to method selection.
#[derive(Debug, Clone, Default)]
pub struct SystemInfo {
    /// os-release ID, e.g. "ubuntu"
    pub os_id: String,
    /// os-release PRETTY_NAME
    pub os_name: String,
    /// os-release VERSION_ID, e.g. "24.04"
    pub os_version: String,
    /// uname -m, e.g. "x86_64"
    pub architecture: String,
    pub has_snap: bool,
}

/// A method recommendation with the reasoning shown in the selector.
#[derive(Debug, Clone)]
pub struct MethodRecommendation {
    pub method: InstallMethod,
    pub reason: String,
    pub estimated_time: &'static str,
    pub pros: Vec<&'static str>,
    pub cons: Vec<&'static str>,
}

/// Detect system facts. Failures degrade to empty fields rather than
/// erroring; the recommendation logic tolerates unknowns.
pub fn detect_system() -> SystemInfo {
    let mut info = SystemInfo::default();

    if let Ok(text) = std::fs::read_to_string("/etc/os-release") {
        for line in text.lines() {
            if let Some((key, value)) = line.split_once('=') {
                let value = value.trim_matches('"').to_string();
                match key {
                    "ID" => info.os_id = value,
                    "PRETTY_NAME" => info.os_name = value,
                    "VERSION_ID" => info.os_version = value,
                    _ => {}
                }
            }
        }
    }

    info.architecture = Command::new("uname")
        .arg("-m")
        .output()
        .ok()
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
        .unwrap_or_default();

    info.has_snap = Path::new("/usr/bin/snap").exists() || Path::new("/snap").exists();

    log::debug!(
        "detected system: {} {} ({}), snap={}",
        info.os_id,
        info.os_version,
        info.architecture,
        info.has_snap
    );
    info
}

/// Recommend an install method for the terminal emulator.
pub fn recommend_terminal_method(info: &SystemInfo) -> MethodRecommendation {
    if info.has_snap {
        MethodRecommendation {
            method: InstallMethod::Snap,
            reason: format!(
                "snap is available on {} and installs a prebuilt package",
                if info.os_name.is_empty() {
                    "this system"
                } else {
                    &info.os_name
                }
            ),
            estimated_time: "~30 seconds",
            pros: vec!["Fast", "Automatic updates", "Easy rollback"],
            cons: vec!["Sandboxed (limited shell integration)", "Larger on disk"],
        }
    } else {
        MethodRecommendation {
            method: InstallMethod::Source,
            reason: "snap is not available; building from source".to_string(),
            estimated_time: "5-15 minutes",
            pros: vec!["Latest version", "Full shell integration"],
            cons: vec!["Slow first build", "Needs build dependencies"],
        }
    }
}
