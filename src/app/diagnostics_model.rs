//! Diagnostics view model
//!
//! Holds the issue list, the selection set for batch fixing, and the
//! scan/fix state machine. Scans and fixes run on worker threads; their
//! results arrive as app messages.

use crate::diagnostics::{count_fixable, BatchFixResult, Issue, ScanResult};
use crate::script_runner::CancelToken;
use std::collections::HashSet;

/// Diagnostics view state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagState {
    Scanning,
    Ready,
    Fixing,
    FixDone,
}

pub struct DiagnosticsModel {
    pub state: DiagState,
    pub issues: Vec<Issue>,
    pub detector_errors: Vec<String>,
    pub summary: Option<String>,
    /// Cursor into the flat issue list
    pub cursor: usize,
    /// Indices of issues selected for fixing
    pub selected: HashSet<usize>,
    pub fix_result: Option<BatchFixResult>,
    /// Age string of the cache the issues came from ("2h ago", "just now")
    pub cache_age: String,
    pub from_cache: bool,
    pub cancel: CancelToken,
}

impl DiagnosticsModel {
    /// A model waiting on a scan in flight.
    pub fn scanning() -> Self {
        Self {
            state: DiagState::Scanning,
            issues: Vec::new(),
            detector_errors: Vec::new(),
            summary: None,
            cursor: 0,
            selected: HashSet::new(),
            fix_result: None,
            cache_age: "never".to_string(),
            from_cache: false,
            cancel: CancelToken::new(),
        }
    }

    /// A model primed from valid cached results.
    pub fn from_cached(issues: Vec<Issue>, cache_age: String) -> Self {
        Self {
            state: DiagState::Ready,
            issues,
            detector_errors: Vec::new(),
            summary: None,
            cursor: 0,
            selected: HashSet::new(),
            fix_result: None,
            cache_age,
            from_cache: true,
            cancel: CancelToken::new(),
        }
    }

    /// Apply a finished scan.
    pub fn apply_scan(&mut self, result: &ScanResult) {
        self.state = DiagState::Ready;
        self.summary = Some(result.summary());
        self.issues = result.issues.clone();
        self.detector_errors = result.errors.clone();
        self.cursor = 0;
        self.selected.clear();
        self.cache_age = "just now".to_string();
        self.from_cache = false;
    }

    /// Apply a finished batch fix.
    pub fn apply_fix_result(&mut self, result: BatchFixResult) {
        self.state = DiagState::FixDone;
        self.fix_result = Some(result);
        self.selected.clear();
    }

    /// Toggle selection of the issue under the cursor (fixable issues only).
    pub fn toggle_selected(&mut self) {
        if let Some(issue) = self.issues.get(self.cursor) {
            if !issue.is_fixable() {
                return;
            }
            if !self.selected.insert(self.cursor) {
                self.selected.remove(&self.cursor);
            }
        }
    }

    /// Select every fixable issue.
    pub fn select_all_fixable(&mut self) {
        self.selected = self
            .issues
            .iter()
            .enumerate()
            .filter(|(_, issue)| issue.is_fixable())
            .map(|(i, _)| i)
            .collect();
    }

    /// The issues currently selected for fixing, in list order.
    pub fn selected_issues(&self) -> Vec<Issue> {
        let mut indices: Vec<usize> = self.selected.iter().copied().collect();
        indices.sort_unstable();
        indices
            .into_iter()
            .filter_map(|i| self.issues.get(i).cloned())
            .collect()
    }

    /// Whether any selected fix needs sudo.
    pub fn selection_needs_sudo(&self) -> bool {
        self.selected_issues().iter().any(|i| i.requires_sudo())
    }

    pub fn fixable_count(&self) -> usize {
        count_fixable(&self.issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::parse_issues;
    use std::time::{Duration, SystemTime};

    fn scan(lines: &str) -> ScanResult {
        ScanResult {
            issues: parse_issues(lines),
            errors: Vec::new(),
            scan_time: SystemTime::now(),
            duration: Duration::from_millis(10),
            scripts_ran: 5,
            scripts_failed: 0,
        }
    }

    #[test]
    fn test_scan_transitions_to_ready() {
        let mut model = DiagnosticsModel::scanning();
        assert_eq!(model.state, DiagState::Scanning);
        model.apply_scan(&scan("A|LOW|a|d|YES|fix-a\n"));
        assert_eq!(model.state, DiagState::Ready);
        assert_eq!(model.issues.len(), 1);
        assert!(!model.from_cache);
    }

    #[test]
    fn test_toggle_skips_unfixable() {
        let mut model = DiagnosticsModel::scanning();
        model.apply_scan(&scan("A|LOW|a|d|NO|\nB|LOW|b|d|YES|fix-b\n"));

        model.cursor = 0;
        model.toggle_selected();
        assert!(model.selected.is_empty());

        model.cursor = 1;
        model.toggle_selected();
        assert_eq!(model.selected_issues().len(), 1);
        model.toggle_selected();
        assert!(model.selected.is_empty());
    }

    #[test]
    fn test_select_all_fixable() {
        let mut model = DiagnosticsModel::scanning();
        model.apply_scan(&scan(
            "A|LOW|a|d|NO|\nB|LOW|b|d|YES|fix-b\nC|LOW|c|d|MAYBE|sudo fix-c\n",
        ));
        model.select_all_fixable();
        assert_eq!(model.selected_issues().len(), 2);
        assert!(model.selection_needs_sudo());
        assert_eq!(model.fixable_count(), 2);
    }

    #[test]
    fn test_cached_model_reports_age() {
        let issues = parse_issues("A|LOW|a|d|NO|\n");
        let model = DiagnosticsModel::from_cached(issues, "3h ago".to_string());
        assert_eq!(model.state, DiagState::Ready);
        assert!(model.from_cache);
        assert_eq!(model.cache_age, "3h ago");
    }
}
