//! Single-stage pipelines: uninstall, configure, standalone update
//!
//! These share the script runner and the output/progress stream semantics
//! with the canonical pipeline, but skip what a one-script operation has no
//! use for: checkpointing, error classification, and the sudo pre-check
//! (the orchestrator primes credentials before dispatching them).

use super::pipeline::script_path_for;
use super::{PipelineStage, StageProgress};
use crate::error::{DevforgeError, Result, TimeoutScope};
use crate::registry::Tool;
use crate::script_runner::{run_script, CancelToken, OutputLine};
use log::info;
use std::path::PathBuf;
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::Mutex;
use std::time::{Duration, Instant};

const OUTPUT_CAPACITY: usize = 100;
const PROGRESS_CAPACITY: usize = 2;

/// Which single-script operation to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SingleStageOp {
    Uninstall,
    Configure,
    Update,
}

impl SingleStageOp {
    pub fn stage(self) -> PipelineStage {
        match self {
            Self::Uninstall => PipelineStage::Uninstall,
            Self::Configure => PipelineStage::Configure,
            Self::Update => PipelineStage::Update,
        }
    }
}

struct ExecState {
    running: bool,
    cancel: Option<CancelToken>,
    output_tx: Option<SyncSender<OutputLine>>,
    progress_tx: Option<SyncSender<StageProgress>>,
}

/// Runs one lifecycle script with streaming output. Like [`super::Pipeline`],
/// an instance drives at most one run.
pub struct SingleStagePipeline {
    repo_root: PathBuf,
    timeout: Duration,
    tool: Tool,
    op: SingleStageOp,
    state: Mutex<ExecState>,
}

/// Consumer streams plus the pipeline, as for the multi-stage executor.
pub struct SingleStageStreams {
    pub output: Receiver<OutputLine>,
    pub progress: Receiver<StageProgress>,
}

impl SingleStagePipeline {
    pub fn new(
        tool: Tool,
        op: SingleStageOp,
        repo_root: PathBuf,
        timeout: Duration,
    ) -> (Self, SingleStageStreams) {
        let (output_tx, output_rx) = sync_channel(OUTPUT_CAPACITY);
        let (progress_tx, progress_rx) = sync_channel(PROGRESS_CAPACITY);

        let pipeline = Self {
            repo_root,
            timeout,
            tool,
            op,
            state: Mutex::new(ExecState {
                running: false,
                cancel: None,
                output_tx: Some(output_tx),
                progress_tx: Some(progress_tx),
            }),
        };
        let streams = SingleStageStreams {
            output: output_rx,
            progress: progress_rx,
        };
        (pipeline, streams)
    }

    /// Run the script. Failure propagates as a single unsuccessful progress
    /// event and an error return; no checkpoint is written.
    pub fn execute(&self) -> Result<()> {
        let stage = self.op.stage();
        let script_path = script_path_for(&self.tool, stage);

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
                _ => return Err(DevforgeError::AlreadyRunning),
            };
            state.running = true;
            let cancel = CancelToken::new();
            state.cancel = Some(cancel.clone());
            (cancel, output_tx, progress_tx)
        };

        let result = self.run_stage(stage, script_path, &cancel, output_tx, progress_tx);

        let mut state = self
            .state
            .lock()
            .map_err(|e| DevforgeError::state(e.to_string()))?;
        state.running = false;
        state.cancel = None;

        result
    }

    fn run_stage(
        &self,
        stage: PipelineStage,
        script_path: &str,
        cancel: &CancelToken,
        output_tx: SyncSender<OutputLine>,
        progress_tx: SyncSender<StageProgress>,
    ) -> Result<()> {
        if script_path.is_empty() {
            return Err(DevforgeError::state(format!(
                "no {} script available for {}",
                stage,
                self.tool.display_name
            )));
        }

        let _ = progress_tx.send(StageProgress::pending(stage));
        info!("{}: running {} ({})", self.tool.id, stage, script_path);
        let start = Instant::now();

        let handle = run_script(
            &self.repo_root,
            script_path,
            None,
            &[],
            self.timeout,
            TimeoutScope::Stage,
            cancel.clone(),
        );
        let (script_output, script_result) = (handle.output, handle.result);

        let mut consumer_alive = true;
        for line in script_output.iter() {
            if output_tx.send(line).is_err() {
                consumer_alive = false;
                break;
            }
        }
        if !consumer_alive {
            drop(script_output);
        }

        let result = script_result
            .recv()
            .unwrap_or(Err(DevforgeError::Cancelled));

        match result {
            Ok(script_result) => {
                let success = script_result.exit_code == 0;
                let _ = progress_tx.send(StageProgress {
                    stage,
                    complete: true,
                    success,
                    duration: script_result.duration,
                    exit_code: script_result.exit_code,
                    error: (!success)
                        .then(|| format!("{} exited with code {}", stage, script_result.exit_code)),
                });
                if success {
                    Ok(())
                } else {
                    Err(DevforgeError::ScriptExit {
                        code: script_result.exit_code,
                    }
                    .at_stage(stage.name()))
                }
            }
            Err(err) => {
                let _ = progress_tx.send(StageProgress {
                    stage,
                    complete: !err.is_cancelled(),
                    success: false,
                    duration: start.elapsed(),
                    exit_code: -1,
                    error: Some(err.to_string()),
                });
                Err(err)
            }
        }
    }

    /// Cancel the running script.
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

    pub fn is_running(&self) -> bool {
        self.state.lock().map(|s| s.running).unwrap_or(false)
    }
}
