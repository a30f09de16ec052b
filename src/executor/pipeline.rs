//! Multi-stage installation pipeline orchestration
//!
//! A [`Pipeline`] owns one run of the canonical five-stage install pipeline
//! or the three-stage in-place update pipeline. It drives stage scripts
//! through the script runner, persists a checkpoint before each stage,
//! classifies failures, and streams output and progress over bounded
//! channels created at construction.
//!
//! Credentials are verified non-interactively before the first stage: the
//! executor must never prompt (it does not own the terminal), so a missing
//! sudo cache fails fast with `AuthRequired` and the orchestrator reprimes.

use super::checkpoint::CheckpointStore;
use super::{PipelineStage, StageProgress};
use crate::error::{DevforgeError, Result, TimeoutScope};
use crate::privilege;
use crate::registry::Tool;
use crate::script_runner::{run_script, CancelToken, OutputLine, SCRIPT_TIMEOUT};
use log::{debug, info};
use std::path::PathBuf;
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::Mutex;
use std::time::{Duration, Instant, SystemTime};

/// Capacity of the per-run output channel.
const OUTPUT_CAPACITY: usize = 100;
/// Capacity of the per-run progress channel.
const PROGRESS_CAPACITY: usize = 10;

/// Configuration for pipeline execution.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Timeout per stage (default: 5 min)
    pub stage_timeout: Duration,
    /// Overall run timeout (default: 30 min)
    pub overall_timeout: Duration,
    /// Repository root the scripts run from
    pub repo_root: PathBuf,
}

impl PipelineConfig {
    pub fn new(repo_root: PathBuf) -> Self {
        Self {
            stage_timeout: SCRIPT_TIMEOUT,
            overall_timeout: Duration::from_secs(30 * 60),
            repo_root,
        }
    }
}

/// Error severity for a failed pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Continue without comment (an uninstalled tool fails its check)
    Info,
    /// Emit a warning line and continue
    Warn,
    /// Stop the pipeline and persist a resumable failure
    Fatal,
}

/// Classify a non-zero exit by the stage it happened in.
pub fn classify_error(stage: PipelineStage, exit_code: i32) -> ErrorSeverity {
    if exit_code == 0 {
        return ErrorSeverity::Info;
    }
    match stage {
        // Check failures just mean "not installed yet"
        PipelineStage::Check => ErrorSeverity::Info,
        // Without dependencies there is nothing to build
        PipelineStage::InstallDeps | PipelineStage::VerifyDeps => ErrorSeverity::Fatal,
        PipelineStage::Install => ErrorSeverity::Fatal,
        // A failed confirmation after a successful install is cosmetic
        PipelineStage::Confirm => ErrorSeverity::Warn,
        _ => ErrorSeverity::Fatal,
    }
}

/// Consumer ends of a pipeline's streams, handed out at construction.
/// Both close when the run finishes (any outcome).
pub struct PipelineStreams {
    pub output: Receiver<OutputLine>,
    pub progress: Receiver<StageProgress>,
}

struct ExecState {
    running: bool,
    cancel: Option<CancelToken>,
    // Moved out for the run and dropped at its end, closing the streams.
    output_tx: Option<SyncSender<OutputLine>>,
    progress_tx: Option<SyncSender<StageProgress>>,
}

/// Orchestrates staged pipeline execution for one tool. A pipeline drives
/// at most one run; the installer view creates a fresh one per attempt.
pub struct Pipeline {
    config: PipelineConfig,
    checkpoint: CheckpointStore,
    tool: Tool,
    state: Mutex<ExecState>,
}

impl Pipeline {
    /// Create a pipeline and the consumer ends of its streams.
    pub fn new(tool: Tool, config: PipelineConfig) -> (Self, PipelineStreams) {
        Self::with_checkpoint_store(tool, config, CheckpointStore::new())
    }

    /// Create a pipeline with an explicit checkpoint store (tests).
    pub fn with_checkpoint_store(
        tool: Tool,
        config: PipelineConfig,
        checkpoint: CheckpointStore,
    ) -> (Self, PipelineStreams) {
        let (output_tx, output_rx) = sync_channel(OUTPUT_CAPACITY);
        let (progress_tx, progress_rx) = sync_channel(PROGRESS_CAPACITY);

        let pipeline = Self {
            config,
            checkpoint,
            tool,
            state: Mutex::new(ExecState {
                running: false,
                cancel: None,
                output_tx: Some(output_tx),
                progress_tx: Some(progress_tx),
            }),
        };
        let streams = PipelineStreams {
            output: output_rx,
            progress: progress_rx,
        };
        (pipeline, streams)
    }

    /// Run the full canonical pipeline from the beginning. Any checkpoint
    /// from an earlier attempt is discarded: a fresh run records only its
    /// own progress.
    pub fn execute(&self) -> Result<()> {
        self.pre_auth()?;
        self.execute_from(&PipelineStage::CANONICAL, PipelineStage::Check, true)
    }

    /// Resume the canonical pipeline from a specific stage (taken from the
    /// checkpoint's resume stage). The existing checkpoint is kept so
    /// completed stages carry over.
    pub fn resume_from(&self, stage: PipelineStage) -> Result<()> {
        self.pre_auth()?;
        self.execute_from(&PipelineStage::CANONICAL, stage, false)
    }

    /// Run the non-destructive in-place update pipeline
    /// (Check → Update → Confirm). Preserves user-owned artifacts that a
    /// clean reinstall would destroy.
    pub fn execute_update(&self) -> Result<()> {
        self.pre_auth()?;
        self.execute_from(&PipelineStage::UPDATE, PipelineStage::Check, true)
    }

    /// Verify sudo credentials are cached, without prompting. The UI layer
    /// requests interactive auth before dispatching; this is the backstop.
    fn pre_auth(&self) -> Result<()> {
        if !privilege::sudo_cached() {
            return Err(DevforgeError::AuthRequired);
        }
        Ok(())
    }

    fn execute_from(&self, stages: &[PipelineStage], start: PipelineStage, fresh: bool) -> Result<()> {
        let (cancel, output_tx, progress_tx) = {
            let mut state = self
                .state
                .lock()
                .map_err(|e| DevforgeError::state(e.to_string()))?;
            if state.running {
                return Err(DevforgeError::AlreadyRunning);
            }
            let (output_tx, progress_tx) = match (state.output_tx.take(), state.progress_tx.take())
            {
                (Some(o), Some(p)) => (o, p),
                // Streams already consumed: this pipeline has run before.
                _ => return Err(DevforgeError::AlreadyRunning),
            };
            state.running = true;
            let cancel = CancelToken::new();
            state.cancel = Some(cancel.clone());
            (cancel, output_tx, progress_tx)
        };

        let result = if fresh {
            self.checkpoint
                .clear(self.tool.id)
                .and_then(|_| self.drive(stages, start, &cancel, &output_tx, &progress_tx))
        } else {
            self.drive(stages, start, &cancel, &output_tx, &progress_tx)
        };

        let mut state = self
            .state
            .lock()
            .map_err(|e| DevforgeError::state(e.to_string()))?;
        state.running = false;
        state.cancel = None;
        // output_tx/progress_tx drop here, closing both streams.
        drop(output_tx);
        drop(progress_tx);

        result
    }

    /// The stage driver shared by the canonical and update pipelines.
    fn drive(
        &self,
        stages: &[PipelineStage],
        start: PipelineStage,
        cancel: &CancelToken,
        output_tx: &SyncSender<OutputLine>,
        progress_tx: &SyncSender<StageProgress>,
    ) -> Result<()> {
        let start_idx = stages.iter().position(|s| *s == start).unwrap_or(0);
        let overall_deadline = Instant::now() + self.config.overall_timeout;

        for &stage in &stages[start_idx..] {
            if cancel.is_cancelled() {
                return Err(DevforgeError::Cancelled);
            }

            let remaining = overall_deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(DevforgeError::timeout(
                    TimeoutScope::Pipeline,
                    self.config.overall_timeout,
                ));
            }

            // Persist where we are before running anything, preserving
            // prior completions so an interrupted run stays resumable.
            self.checkpoint.save_stage_start(self.tool.id, stage)?;

            let script_path = script_path_for(&self.tool, stage);
            if script_path.is_empty() {
                debug!("{}: no script for {}, skipping", self.tool.id, stage);
                let _ = progress_tx.send(StageProgress::skipped(stage));
                self.checkpoint.mark_stage_complete(self.tool.id, stage)?;
                continue;
            }

            let args: Vec<String> = match self.tool.method_override {
                Some(method) => vec![method.to_string()],
                None => Vec::new(),
            };

            let stage_timeout = self.config.stage_timeout.min(remaining);
            let stage_start = Instant::now();
            info!("{}: running stage {} ({})", self.tool.id, stage, script_path);

            let handle = run_script(
                &self.config.repo_root,
                script_path,
                None,
                &args,
                stage_timeout,
                TimeoutScope::Stage,
                cancel.clone(),
            );
            let (script_output, script_result) = (handle.output, handle.result);

            // Forward every output event before the stage-complete progress
            // event: the output channel drains fully when the child exits.
            let mut consumer_alive = true;
            for line in script_output.iter() {
                if output_tx.send(line).is_err() {
                    consumer_alive = false;
                    break;
                }
            }
            if !consumer_alive {
                // Our consumer is gone; dropping the stream tells the
                // runner to kill the child instead of blocking on it.
                drop(script_output);
            }

            let result = script_result
                .recv()
                .unwrap_or(Err(DevforgeError::Cancelled));

            match result {
                Ok(script_result) => {
                    let success = script_result.exit_code == 0;
                    let progress = StageProgress {
                        stage,
                        complete: true,
                        success,
                        duration: script_result.duration,
                        exit_code: script_result.exit_code,
                        error: (!success).then(|| {
                            format!("script exited with code {}", script_result.exit_code)
                        }),
                    };
                    let _ = progress_tx.send(progress);

                    match classify_error(stage, script_result.exit_code) {
                        ErrorSeverity::Info => {
                            if success {
                                self.checkpoint.mark_stage_complete(self.tool.id, stage)?;
                            }
                            // Non-zero Info exits (Check on a fresh system)
                            // continue silently.
                        }
                        ErrorSeverity::Warn => {
                            let _ = output_tx.send(OutputLine {
                                text: format!(
                                    "[WARN] stage {} had non-fatal error: exit code {}",
                                    stage, script_result.exit_code
                                ),
                                timestamp: SystemTime::now(),
                                is_error: true,
                            });
                        }
                        ErrorSeverity::Fatal => {
                            let err = DevforgeError::ScriptExit {
                                code: script_result.exit_code,
                            };
                            self.checkpoint.save_failure(
                                self.tool.id,
                                stage,
                                &err.to_string(),
                                script_result.exit_code,
                            )?;
                            return Err(err.at_stage(stage.name()));
                        }
                    }
                }
                Err(err) if err.is_cancelled() => {
                    // Leave the checkpoint as-is: cancellation is not a
                    // failure and must not clobber a resumable record.
                    let _ = progress_tx.send(StageProgress {
                        stage,
                        complete: false,
                        success: false,
                        duration: stage_start.elapsed(),
                        exit_code: -1,
                        error: Some(err.to_string()),
                    });
                    return Err(DevforgeError::Cancelled);
                }
                Err(err) => {
                    // Timeout or spawn failure: fatal at every stage.
                    let _ = progress_tx.send(StageProgress {
                        stage,
                        complete: true,
                        success: false,
                        duration: stage_start.elapsed(),
                        exit_code: -1,
                        error: Some(err.to_string()),
                    });
                    self.checkpoint
                        .save_failure(self.tool.id, stage, &err.to_string(), -1)?;
                    return Err(err.at_stage(stage.name()));
                }
            }
        }

        // Full run done: nothing left to resume.
        self.checkpoint.clear(self.tool.id)?;
        Ok(())
    }

    /// Cancel the running pipeline. Idempotent while running; an error when
    /// nothing is running.
    pub fn cancel(&self) -> Result<()> {
        let state = self
            .state
            .lock()
            .map_err(|e| DevforgeError::state(e.to_string()))?;
        match (&state.cancel, state.running) {
            (Some(token), true) => {
                token.cancel();
                Ok(())
            }
            _ => Err(DevforgeError::NotRunning),
        }
    }

    /// Whether a run is currently in flight.
    pub fn is_running(&self) -> bool {
        self.state.lock().map(|s| s.running).unwrap_or(false)
    }

    /// The checkpoint store backing this pipeline.
    pub fn checkpoint_store(&self) -> &CheckpointStore {
        &self.checkpoint
    }
}

/// Resolve the script path for a stage from the tool's script table.
pub(crate) fn script_path_for(tool: &Tool, stage: PipelineStage) -> &'static str {
    match stage {
        PipelineStage::Check => tool.scripts.check,
        PipelineStage::InstallDeps => tool.scripts.install_deps,
        PipelineStage::VerifyDeps => tool.scripts.verify_deps,
        PipelineStage::Install => tool.scripts.install,
        PipelineStage::Confirm => tool.scripts.confirm,
        PipelineStage::Uninstall => tool.scripts.uninstall,
        PipelineStage::Configure => tool.scripts.configure,
        PipelineStage::Update => tool.scripts.update,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classifier_matrix() {
        use ErrorSeverity::*;
        assert_eq!(classify_error(PipelineStage::Check, 0), Info);
        assert_eq!(classify_error(PipelineStage::Check, 1), Info);
        assert_eq!(classify_error(PipelineStage::InstallDeps, 1), Fatal);
        assert_eq!(classify_error(PipelineStage::VerifyDeps, 2), Fatal);
        assert_eq!(classify_error(PipelineStage::Install, 137), Fatal);
        assert_eq!(classify_error(PipelineStage::Confirm, 1), Warn);
        assert_eq!(classify_error(PipelineStage::Uninstall, 1), Fatal);
    }

    #[test]
    fn test_cancel_when_idle_is_not_running() {
        let tool = crate::registry::find("wezterm").unwrap();
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, _streams) = Pipeline::with_checkpoint_store(
            tool,
            PipelineConfig::new(dir.path().to_path_buf()),
            CheckpointStore::with_base_dir(dir.path().join("pipelines")),
        );
        assert!(matches!(pipeline.cancel(), Err(DevforgeError::NotRunning)));
        assert!(!pipeline.is_running());
    }

    #[test]
    fn test_script_path_table() {
        let tool = crate::registry::find("zsh").unwrap();
        assert!(script_path_for(&tool, PipelineStage::Check).contains("check_zsh"));
        assert!(script_path_for(&tool, PipelineStage::Configure).contains("configure_zsh"));
        assert!(script_path_for(&tool, PipelineStage::Update).is_empty());
    }
}
