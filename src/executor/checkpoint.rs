//! Atomic checkpoint persistence for pipeline resume
//!
//! One JSON file per tool under `~/.cache/devforge/pipelines/`. Writes go
//! through the temp-file-then-rename path, so a crash mid-save leaves the
//! previous checkpoint intact. A successful pipeline run clears its file.

use super::PipelineStage;
use crate::atomic_file::{read_json, write_json_atomic, MODE_SHARED};
use crate::error::{DevforgeError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::SystemTime;

/// Incremented when the checkpoint format changes; reads of older versions
/// go through [`migrate_checkpoint`].
pub const CHECKPOINT_VERSION: u32 = 1;

/// Checkpoint log entries are capped; only the tail survives.
const MAX_LOG_ENTRIES: usize = 100;

/// Details about a pipeline failure, kept for the resume prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureInfo {
    pub stage: PipelineStage,
    #[serde(rename = "error")]
    pub error_message: String,
    pub exit_code: i32,
    pub recoverable: bool,
    pub timestamp: SystemTime,
}

/// A single log entry captured during execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionLog {
    pub stage: PipelineStage,
    pub message: String,
    pub timestamp: SystemTime,
    pub is_error: bool,
}

/// The saved state of a pipeline execution for one tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub version: u32,
    pub tool_id: String,
    pub timestamp: SystemTime,
    pub current_stage: PipelineStage,
    #[serde(default)]
    pub completed_stages: Vec<PipelineStage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_stage: Option<FailureInfo>,
    pub is_resumable: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub logs: Vec<ExecutionLog>,
}

impl Checkpoint {
    fn new(tool_id: &str, stage: PipelineStage) -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            tool_id: tool_id.to_string(),
            timestamp: SystemTime::now(),
            current_stage: stage,
            completed_stages: Vec::new(),
            failed_stage: None,
            is_resumable: false,
            logs: Vec::new(),
        }
    }
}

/// Whether a failure at a stage can be resumed. Everything is recoverable
/// except an OOM kill (exit 137) during the Install stage, which can leave
/// the build tree corrupt.
fn is_recoverable(stage: PipelineStage, exit_code: i32) -> bool {
    match stage {
        PipelineStage::Install => exit_code != 137,
        _ => true,
    }
}

/// Handles version upgrades on load. No migrations exist yet; older
/// versions are stamped current.
fn migrate_checkpoint(mut old: Checkpoint) -> Checkpoint {
    old.version = CHECKPOINT_VERSION;
    old
}

/// Manages checkpoint files for all tools. Operations serialize on an
/// internal lock, so concurrent saves for the same tool cannot interleave.
pub struct CheckpointStore {
    base_dir: PathBuf,
    lock: Mutex<()>,
}

impl CheckpointStore {
    /// Store rooted at the default per-user cache directory.
    pub fn new() -> Self {
        let base = dirs::cache_dir().unwrap_or_else(|| PathBuf::from("/tmp"));
        Self::with_base_dir(base.join("devforge").join("pipelines"))
    }

    /// Store rooted at an explicit directory (tests).
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self {
            base_dir,
            lock: Mutex::new(()),
        }
    }

    fn path_for(&self, tool_id: &str) -> PathBuf {
        self.base_dir.join(format!("{}.json", tool_id))
    }

    /// Atomically persist a checkpoint, stamping version and timestamp.
    pub fn save(&self, tool_id: &str, mut checkpoint: Checkpoint) -> Result<()> {
        let _guard = self.lock.lock().map_err(|e| DevforgeError::state(e.to_string()))?;
        checkpoint.version = CHECKPOINT_VERSION;
        checkpoint.timestamp = SystemTime::now();
        if checkpoint.logs.len() > MAX_LOG_ENTRIES {
            let excess = checkpoint.logs.len() - MAX_LOG_ENTRIES;
            checkpoint.logs.drain(..excess);
        }
        write_json_atomic(&self.path_for(tool_id), &checkpoint, MODE_SHARED)?;
        Ok(())
    }

    /// Read a checkpoint. `Ok(None)` when no file exists; parse errors
    /// propagate.
    pub fn load(&self, tool_id: &str) -> Result<Option<Checkpoint>> {
        let checkpoint: Option<Checkpoint> = read_json(&self.path_for(tool_id))
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::InvalidData => {
                    DevforgeError::parse("checkpoint", e.to_string())
                }
                _ => DevforgeError::Io(e),
            })?;
        Ok(checkpoint.map(|c| {
            if c.version < CHECKPOINT_VERSION {
                migrate_checkpoint(c)
            } else {
                c
            }
        }))
    }

    /// Record that a stage is about to run, preserving prior completions.
    pub fn save_stage_start(&self, tool_id: &str, stage: PipelineStage) -> Result<()> {
        let mut checkpoint = self
            .load(tool_id)
            .unwrap_or(None)
            .unwrap_or_else(|| Checkpoint::new(tool_id, stage));
        checkpoint.current_stage = stage;
        checkpoint.is_resumable = true;
        self.save(tool_id, checkpoint)
    }

    /// Save a resumable failure record, preserving the completed stages and
    /// logs from any existing checkpoint.
    pub fn save_failure(
        &self,
        tool_id: &str,
        stage: PipelineStage,
        error_message: &str,
        exit_code: i32,
    ) -> Result<()> {
        let existing = self.load(tool_id).unwrap_or(None);

        let mut checkpoint = Checkpoint::new(tool_id, stage);
        checkpoint.is_resumable = true;
        checkpoint.failed_stage = Some(FailureInfo {
            stage,
            error_message: error_message.to_string(),
            exit_code,
            recoverable: is_recoverable(stage, exit_code),
            timestamp: SystemTime::now(),
        });
        if let Some(existing) = existing {
            checkpoint.completed_stages = existing.completed_stages;
            checkpoint.logs = existing.logs;
        }
        self.save(tool_id, checkpoint)
    }

    /// Mark a stage complete (idempotent) and advance `current_stage` to the
    /// next canonical stage. Clears any previous failure record.
    pub fn mark_stage_complete(&self, tool_id: &str, stage: PipelineStage) -> Result<()> {
        let mut checkpoint = self
            .load(tool_id)
            .unwrap_or(None)
            .unwrap_or_else(|| Checkpoint::new(tool_id, stage));

        if !checkpoint.completed_stages.contains(&stage) {
            checkpoint.completed_stages.push(stage);
        }
        if let Some(next) = stage.next_canonical() {
            checkpoint.current_stage = next;
        }
        checkpoint.is_resumable = true;
        checkpoint.failed_stage = None;

        self.save(tool_id, checkpoint)
    }

    /// Append a log entry to the checkpoint.
    pub fn add_log(
        &self,
        tool_id: &str,
        stage: PipelineStage,
        message: &str,
        is_error: bool,
    ) -> Result<()> {
        let mut checkpoint = self
            .load(tool_id)
            .unwrap_or(None)
            .unwrap_or_else(|| Checkpoint::new(tool_id, stage));
        checkpoint.logs.push(ExecutionLog {
            stage,
            message: message.to_string(),
            timestamp: SystemTime::now(),
            is_error,
        });
        self.save(tool_id, checkpoint)
    }

    /// Remove a tool's checkpoint (after successful completion). Missing
    /// files are fine.
    pub fn clear(&self, tool_id: &str) -> Result<()> {
        let _guard = self.lock.lock().map_err(|e| DevforgeError::state(e.to_string()))?;
        match std::fs::remove_file(self.path_for(tool_id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Whether any checkpoint file exists for the tool.
    pub fn exists(&self, tool_id: &str) -> bool {
        self.path_for(tool_id).exists()
    }

    /// Whether a resumable checkpoint exists.
    pub fn has_resumable(&self, tool_id: &str) -> bool {
        matches!(self.load(tool_id), Ok(Some(c)) if c.is_resumable)
    }

    /// The stage to resume from. If a failure record exists its stage wins,
    /// otherwise the saved `current_stage`. The bool is false when there is
    /// nothing to resume.
    pub fn get_resume_stage(&self, tool_id: &str) -> (PipelineStage, bool) {
        let checkpoint = match self.load(tool_id) {
            Ok(Some(c)) if c.is_resumable => c,
            _ => return (PipelineStage::Check, false),
        };
        match checkpoint.failed_stage {
            Some(failure) => (failure.stage, true),
            None => (checkpoint.current_stage, true),
        }
    }
}

impl Default for CheckpointStore {
    fn default() -> Self {
        Self::new()
    }
}
