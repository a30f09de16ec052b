//! Installer view model
//!
//! Owns the running pipeline handle, the stage table, and the scrolling
//! output tail. The model transitions Idle → Running → Success/Failed, or
//! to Paused when the user cancels mid-run. Failed and Paused states offer
//! recovery buttons; Back is always first and focused by default.

use crate::executor::{
    CheckpointStore, Pipeline, PipelineStage, SingleStagePipeline, StageProgress,
};
use crate::registry::Tool;
use crate::script_runner::OutputLine;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Output lines kept in memory for the viewport.
const MAX_OUTPUT_LINES: usize = 500;

/// What kind of lifecycle operation the installer view is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallerMode {
    Install,
    Uninstall,
    Configure,
    Update,
}

impl InstallerMode {
    pub fn action_label(self) -> &'static str {
        match self {
            Self::Install => "Installation",
            Self::Uninstall => "Uninstallation",
            Self::Configure => "Configuration",
            Self::Update => "Update",
        }
    }

    pub fn title_verb(self) -> &'static str {
        match self {
            Self::Install => "Installing",
            Self::Uninstall => "Uninstalling",
            Self::Configure => "Configuring",
            Self::Update => "Updating",
        }
    }
}

/// Installer view state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallerState {
    Idle,
    Running,
    /// Cancelled mid-run; recovery buttons shown
    Paused,
    Success,
    Failed,
}

/// The pipeline being driven; cancel goes through here.
pub enum PipelineHandle {
    Multi(Arc<Pipeline>),
    Single(Arc<SingleStagePipeline>),
}

impl PipelineHandle {
    pub fn cancel(&self) {
        let result = match self {
            Self::Multi(p) => p.cancel(),
            Self::Single(p) => p.cancel(),
        };
        if let Err(e) = result {
            log::debug!("cancel ignored: {}", e);
        }
    }
}

/// One row of the stage table.
#[derive(Debug, Clone)]
pub struct StageRow {
    pub stage: PipelineStage,
    pub complete: bool,
    pub success: bool,
    pub duration: Option<Duration>,
}

/// Recovery actions offered after failure or pause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    Back,
    Retry,
    Resume,
}

/// A selectable recovery button.
#[derive(Debug, Clone)]
pub struct RecoveryButton {
    pub label: &'static str,
    pub shortcut: &'static str,
    pub action: RecoveryAction,
}

/// The installer view model.
pub struct InstallerModel {
    pub tool: Tool,
    pub mode: InstallerMode,
    pub state: InstallerState,
    pub stages: Vec<StageRow>,
    pub current_stage_idx: usize,
    pub output: VecDeque<OutputLine>,
    pub started_at: Instant,
    pub last_error: Option<String>,
    pub has_checkpoint: bool,
    pub recovery_buttons: Vec<RecoveryButton>,
    pub recovery_focused: usize,
    pub handle: Option<PipelineHandle>,
    /// Resume flag of the run in flight, kept for Retry semantics
    pub resumed: bool,
}

impl InstallerModel {
    pub fn new(tool: Tool, mode: InstallerMode) -> Self {
        let stage_list: &[PipelineStage] = match mode {
            InstallerMode::Install => &PipelineStage::CANONICAL,
            InstallerMode::Update => &PipelineStage::UPDATE,
            InstallerMode::Uninstall => &[PipelineStage::Uninstall],
            InstallerMode::Configure => &[PipelineStage::Configure],
        };
        let stages = stage_list
            .iter()
            .map(|&stage| StageRow {
                stage,
                complete: false,
                success: false,
                duration: None,
            })
            .collect();

        Self {
            tool,
            mode,
            state: InstallerState::Idle,
            stages,
            current_stage_idx: 0,
            output: VecDeque::with_capacity(MAX_OUTPUT_LINES),
            started_at: Instant::now(),
            last_error: None,
            has_checkpoint: false,
            recovery_buttons: Vec::new(),
            recovery_focused: 0,
            handle: None,
            resumed: false,
        }
    }

    /// Reset stage rows and timers for a new run.
    pub fn begin_run(&mut self, start_stage: PipelineStage) {
        for row in &mut self.stages {
            row.complete = false;
            row.success = false;
            row.duration = None;
        }
        self.current_stage_idx = self
            .stages
            .iter()
            .position(|r| r.stage == start_stage)
            .unwrap_or(0);
        self.output.clear();
        self.state = InstallerState::Running;
        self.started_at = Instant::now();
        self.last_error = None;
    }

    pub fn is_running(&self) -> bool {
        self.state == InstallerState::Running
    }

    pub fn is_success(&self) -> bool {
        self.state == InstallerState::Success
    }

    pub fn is_uninstall(&self) -> bool {
        self.mode == InstallerMode::Uninstall
    }

    /// The stage currently executing, for the header line.
    pub fn current_stage(&self) -> PipelineStage {
        self.stages
            .get(self.current_stage_idx)
            .map(|r| r.stage)
            .unwrap_or(PipelineStage::Check)
    }

    /// Append an output line, keeping only the tail.
    pub fn push_output(&mut self, line: OutputLine) {
        if self.output.len() >= MAX_OUTPUT_LINES {
            self.output.pop_front();
        }
        self.output.push_back(line);
    }

    /// Apply a stage progress event to the stage table.
    pub fn apply_progress(&mut self, progress: &StageProgress) {
        if let Some(row) = self.stages.iter_mut().find(|r| r.stage == progress.stage) {
            row.complete = progress.complete;
            row.success = progress.success;
            if !progress.duration.is_zero() {
                // Display rounds to whole milliseconds.
                row.duration = Some(Duration::from_millis(progress.duration.as_millis() as u64));
            }
        }

        // Advance the header to the next pending stage.
        if progress.complete {
            if let Some(idx) = self.stages.iter().position(|r| r.stage == progress.stage) {
                if idx + 1 < self.stages.len() {
                    self.current_stage_idx = idx + 1;
                }
            }
        }
    }

    /// Handle pipeline completion: settle the state machine and build
    /// recovery buttons on failure.
    pub fn on_complete(
        &mut self,
        success: bool,
        error: Option<String>,
        checkpoints: &CheckpointStore,
    ) {
        self.handle = None;
        if success {
            self.state = InstallerState::Success;
            // The progress channel may still have been mid-drain; settle
            // the table to its final shape.
            for row in &mut self.stages {
                row.complete = true;
                row.success = true;
            }
            return;
        }

        // A cancel arrives as completion too; Paused was already set by the
        // ESC handler and keeps its recovery buttons.
        if self.state == InstallerState::Paused {
            return;
        }

        self.state = InstallerState::Failed;
        self.last_error = error;
        self.has_checkpoint = checkpoints.has_resumable(self.tool.id);
        self.build_recovery_buttons();
    }

    /// Move to Paused after a user cancel. The stage-start checkpoint of
    /// the interrupted run makes Resume available.
    pub fn on_cancelled(&mut self, checkpoints: &CheckpointStore) {
        self.state = InstallerState::Paused;
        self.has_checkpoint = checkpoints.has_resumable(self.tool.id);
        self.build_recovery_buttons();
    }

    /// Back first (default focus, the safe option), Retry always, Resume
    /// only for interrupted multi-stage runs with a resumable checkpoint.
    pub fn build_recovery_buttons(&mut self) {
        self.recovery_buttons = vec![
            RecoveryButton {
                label: "Back",
                shortcut: "ESC",
                action: RecoveryAction::Back,
            },
            RecoveryButton {
                label: "Retry",
                shortcut: "R",
                action: RecoveryAction::Retry,
            },
        ];

        let multi_stage = matches!(self.mode, InstallerMode::Install);
        let interrupted = matches!(
            self.state,
            InstallerState::Failed | InstallerState::Paused
        );
        if interrupted && multi_stage && self.has_checkpoint {
            self.recovery_buttons.push(RecoveryButton {
                label: "Resume",
                shortcut: "C",
                action: RecoveryAction::Resume,
            });
        }
        self.recovery_focused = 0;
    }

    /// Currently focused recovery action, if buttons are shown.
    pub fn focused_recovery(&self) -> Option<RecoveryAction> {
        self.recovery_buttons
            .get(self.recovery_focused)
            .map(|b| b.action)
    }

    /// Recovery button by shortcut key ("R" or "C").
    pub fn recovery_by_shortcut(&self, shortcut: &str) -> Option<RecoveryAction> {
        self.recovery_buttons
            .iter()
            .find(|b| b.shortcut == shortcut)
            .map(|b| b.action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(mode: InstallerMode) -> InstallerModel {
        InstallerModel::new(crate::registry::find("wezterm").unwrap(), mode)
    }

    #[test]
    fn test_stage_table_shapes() {
        assert_eq!(model(InstallerMode::Install).stages.len(), 5);
        assert_eq!(model(InstallerMode::Update).stages.len(), 3);
        assert_eq!(model(InstallerMode::Uninstall).stages.len(), 1);
        assert_eq!(model(InstallerMode::Configure).stages.len(), 1);
    }

    #[test]
    fn test_begin_run_from_resume_stage() {
        let mut m = model(InstallerMode::Install);
        m.begin_run(PipelineStage::Install);
        assert_eq!(m.current_stage(), PipelineStage::Install);
        assert!(m.is_running());
    }

    #[test]
    fn test_progress_advances_current_stage() {
        let mut m = model(InstallerMode::Install);
        m.begin_run(PipelineStage::Check);

        m.apply_progress(&StageProgress {
            stage: PipelineStage::Check,
            complete: true,
            success: true,
            duration: Duration::from_millis(120),
            exit_code: 0,
            error: None,
        });
        assert_eq!(m.current_stage(), PipelineStage::InstallDeps);
        assert!(m.stages[0].complete && m.stages[0].success);
        assert_eq!(m.stages[0].duration, Some(Duration::from_millis(120)));
    }

    #[test]
    fn test_failure_builds_recovery_buttons_back_first() {
        let dir = tempfile::tempdir().unwrap();
        let checkpoints = CheckpointStore::with_base_dir(dir.path().join("pipelines"));
        checkpoints
            .save_failure("wezterm", PipelineStage::Install, "boom", 2)
            .unwrap();

        let mut m = model(InstallerMode::Install);
        m.begin_run(PipelineStage::Check);
        m.on_complete(false, Some("stage failed".to_string()), &checkpoints);

        assert_eq!(m.state, InstallerState::Failed);
        assert_eq!(m.recovery_buttons[0].action, RecoveryAction::Back);
        assert_eq!(m.recovery_focused, 0);
        assert!(m
            .recovery_buttons
            .iter()
            .any(|b| b.action == RecoveryAction::Resume));
    }

    #[test]
    fn test_uninstall_failure_has_no_resume() {
        let dir = tempfile::tempdir().unwrap();
        let checkpoints = CheckpointStore::with_base_dir(dir.path().join("pipelines"));

        let mut m = model(InstallerMode::Uninstall);
        m.begin_run(PipelineStage::Uninstall);
        m.on_complete(false, Some("exit 1".to_string()), &checkpoints);

        assert!(m
            .recovery_buttons
            .iter()
            .all(|b| b.action != RecoveryAction::Resume));
    }

    #[test]
    fn test_success_settles_all_stages() {
        let dir = tempfile::tempdir().unwrap();
        let checkpoints = CheckpointStore::with_base_dir(dir.path().join("pipelines"));

        let mut m = model(InstallerMode::Install);
        m.begin_run(PipelineStage::Check);
        m.on_complete(true, None, &checkpoints);

        assert!(m.is_success());
        assert!(m.stages.iter().all(|s| s.complete && s.success));
    }

    #[test]
    fn test_cancel_keeps_paused_after_completion_message() {
        let dir = tempfile::tempdir().unwrap();
        let checkpoints = CheckpointStore::with_base_dir(dir.path().join("pipelines"));

        let mut m = model(InstallerMode::Install);
        m.begin_run(PipelineStage::Check);
        m.on_cancelled(&checkpoints);
        assert_eq!(m.state, InstallerState::Paused);

        // The worker thread reports the cancelled run as unsuccessful.
        m.on_complete(false, Some("operation cancelled".to_string()), &checkpoints);
        assert_eq!(m.state, InstallerState::Paused);
    }

    #[test]
    fn test_output_tail_is_bounded() {
        let mut m = model(InstallerMode::Install);
        for i in 0..(MAX_OUTPUT_LINES + 50) {
            m.push_output(OutputLine {
                text: format!("line {}", i),
                timestamp: std::time::SystemTime::now(),
                is_error: false,
            });
        }
        assert_eq!(m.output.len(), MAX_OUTPUT_LINES);
        assert_eq!(m.output.back().unwrap().text, format!("line {}", MAX_OUTPUT_LINES + 49));
    }
}
