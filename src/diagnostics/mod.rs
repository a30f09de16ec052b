//! Boot diagnostics engine
//!
//! Detector scripts scan the system for boot problems (failed units,
//! orphaned services, network waits) and report them as pipe-delimited
//! issue records. This module owns the issue model and parsing; the
//! submodules run detectors in parallel, cache results keyed by boot id,
//! and execute fixes in two phases.

mod cache;
mod detector;
mod fixer;

pub use cache::{CacheStore, DiagnosticsCache, DIAGNOSTICS_TTL};
pub use detector::{detector_scripts, run_full_scan, ScanResult, DETECTOR_TIMEOUT};
pub use fixer::{BatchFixResult, FixResult, Fixer, FIX_TIMEOUT};

use crate::privilege;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::{Display, EnumString};

/// Severity of a boot issue.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumString, Serialize,
    Deserialize,
)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
#[serde(rename_all = "UPPERCASE")]
pub enum IssueSeverity {
    /// Prevents system functionality
    Critical,
    /// May slow boot or cause warnings
    Moderate,
    /// Cosmetic, or a known bug with no impact
    Low,
}

impl IssueSeverity {
    /// Parse detector output; anything unrecognized is demoted to Low.
    pub fn parse(s: &str) -> Self {
        s.trim().parse().unwrap_or(Self::Low)
    }
}

/// Whether an issue can be fixed automatically.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
#[serde(rename_all = "UPPERCASE")]
pub enum FixableStatus {
    Yes,
    No,
    Maybe,
}

impl FixableStatus {
    /// Parse detector output; anything unrecognized coerces to No.
    pub fn parse(s: &str) -> Self {
        s.trim().parse().unwrap_or(Self::No)
    }
}

/// A single boot diagnostic issue, parsed from a detector line of the form
/// `TYPE|SEVERITY|NAME|DESCRIPTION|FIXABLE|FIX_COMMAND`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    /// Issue type tag (ORPHANED_SERVICE, FAILED_SERVICE, ...)
    #[serde(rename = "type")]
    pub issue_type: String,
    pub severity: IssueSeverity,
    /// Service/component name
    pub name: String,
    pub description: String,
    pub fixable: FixableStatus,
    /// Shell command that fixes the issue
    pub fix_command: String,
}

impl Issue {
    pub fn is_fixable(&self) -> bool {
        matches!(self.fixable, FixableStatus::Yes | FixableStatus::Maybe)
    }

    /// Whether the fix command needs elevated privileges.
    pub fn requires_sudo(&self) -> bool {
        privilege::requires_sudo(&self.fix_command)
    }
}

/// Parse a single detector line. Comments (`#`), blank lines, and records
/// with fewer than six fields are dropped.
pub fn parse_issue(line: &str) -> Option<Issue> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let parts: Vec<&str> = line.split('|').collect();
    if parts.len() < 6 {
        return None;
    }

    Some(Issue {
        issue_type: parts[0].trim().to_string(),
        severity: IssueSeverity::parse(parts[1]),
        name: parts[2].trim().to_string(),
        description: parts[3].trim().to_string(),
        fixable: FixableStatus::parse(parts[4]),
        fix_command: parts[5].trim().to_string(),
    })
}

/// Parse a full detector output blob into issues.
pub fn parse_issues(output: &str) -> Vec<Issue> {
    output.lines().filter_map(parse_issue).collect()
}

/// Group issues by severity. Every severity is present in the result even
/// when empty, so views can iterate a fixed order.
pub fn group_by_severity(issues: &[Issue]) -> BTreeMap<IssueSeverity, Vec<Issue>> {
    let mut groups: BTreeMap<IssueSeverity, Vec<Issue>> = BTreeMap::new();
    for severity in [
        IssueSeverity::Critical,
        IssueSeverity::Moderate,
        IssueSeverity::Low,
    ] {
        groups.insert(severity, Vec::new());
    }
    for issue in issues {
        groups.entry(issue.severity).or_default().push(issue.clone());
    }
    groups
}

/// Count fixable issues.
pub fn count_fixable(issues: &[Issue]) -> usize {
    issues.iter().filter(|i| i.is_fixable()).count()
}

/// Split fixable issues into user-level and sudo-level lists, preserving
/// order. Unfixable issues and empty fix commands are dropped.
pub fn separate_by_sudo(issues: &[Issue]) -> (Vec<Issue>, Vec<Issue>) {
    let mut user_level = Vec::new();
    let mut sudo_level = Vec::new();
    for issue in issues {
        if !issue.is_fixable() || issue.fix_command.is_empty() {
            continue;
        }
        if issue.requires_sudo() {
            sudo_level.push(issue.clone());
        } else {
            user_level.push(issue.clone());
        }
    }
    (user_level, sudo_level)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_line() {
        let issue = parse_issue(
            "FAILED_SERVICE|CRITICAL|nvidia-powerd.service|Unit failed to start|YES|sudo systemctl restart nvidia-powerd.service",
        )
        .expect("parses");
        assert_eq!(issue.issue_type, "FAILED_SERVICE");
        assert_eq!(issue.severity, IssueSeverity::Critical);
        assert_eq!(issue.name, "nvidia-powerd.service");
        assert!(issue.is_fixable());
        assert!(issue.requires_sudo());
    }

    #[test]
    fn test_parse_drops_comments_and_blanks() {
        assert!(parse_issue("# a comment").is_none());
        assert!(parse_issue("   ").is_none());
        assert!(parse_issue("").is_none());
    }

    #[test]
    fn test_parse_drops_short_records() {
        assert!(parse_issue("A|B|C|D|E").is_none());
    }

    #[test]
    fn test_unknown_severity_coerces_low() {
        let issue = parse_issue("X|WHATEVER|n|d|YES|cmd").unwrap();
        assert_eq!(issue.severity, IssueSeverity::Low);
    }

    #[test]
    fn test_unknown_fixable_coerces_no() {
        let issue = parse_issue("X|LOW|n|d|PERHAPS|cmd").unwrap();
        assert_eq!(issue.fixable, FixableStatus::No);
        assert!(!issue.is_fixable());
    }

    #[test]
    fn test_maybe_counts_as_fixable() {
        let issue = parse_issue("X|LOW|n|d|MAYBE|cmd").unwrap();
        assert!(issue.is_fixable());
    }

    #[test]
    fn test_parse_issues_multiline() {
        let output = "\
# header comment
FAILED_SERVICE|CRITICAL|a.service|desc|YES|sudo systemctl restart a
ORPHANED_SERVICE|MODERATE|b.service|desc|MAYBE|systemctl --user disable b

COSMETIC|LOW|c|desc|NO|";
        let issues = parse_issues(output);
        assert_eq!(issues.len(), 3);
    }

    #[test]
    fn test_separate_by_sudo_partitions_and_filters() {
        let issues = parse_issues(
            "A|LOW|a|d|YES|sudo fix-a\nB|LOW|b|d|YES|fix-b\nC|LOW|c|d|NO|sudo fix-c\nD|LOW|d|d|YES|",
        );
        let (user, sudo) = separate_by_sudo(&issues);
        assert_eq!(user.len(), 1);
        assert_eq!(user[0].issue_type, "B");
        assert_eq!(sudo.len(), 1);
        assert_eq!(sudo[0].issue_type, "A");
    }

    #[test]
    fn test_group_by_severity_has_all_keys() {
        let groups = group_by_severity(&[]);
        assert_eq!(groups.len(), 3);
        assert!(groups[&IssueSeverity::Critical].is_empty());
    }
}
