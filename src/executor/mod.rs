//! Pipeline execution engine
//!
//! Drives tool lifecycle operations as staged state machines over the
//! script runner, with atomic checkpoints for resume:
//!
//! - [`Pipeline`] — the five-stage canonical install pipeline
//!   (Check → InstallDeps → VerifyDeps → Install → Confirm) and the
//!   three-stage non-destructive update pipeline (Check → Update → Confirm)
//! - [`SingleStagePipeline`] — uninstall / configure / standalone update,
//!   one script, no checkpointing
//! - [`CheckpointStore`] — durable per-tool progress records
//!
//! The stage order is the code order: no dynamic dispatch, no hidden
//! coroutine state.

mod checkpoint;
mod pipeline;
mod single_stage;

pub use checkpoint::{
    Checkpoint, CheckpointStore, ExecutionLog, FailureInfo, CHECKPOINT_VERSION,
};
pub use pipeline::{ErrorSeverity, Pipeline, PipelineConfig, PipelineStreams};
pub use single_stage::{SingleStageOp, SingleStagePipeline, SingleStageStreams};

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A stage in a tool lifecycle pipeline.
///
/// The first five compose the canonical install pipeline in declaration
/// order. `Uninstall`, `Configure` and `Update` are single-stage
/// pseudo-stages; `Update` also appears as the middle stage of the in-place
/// update pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PipelineStage {
    Check,
    InstallDeps,
    VerifyDeps,
    Install,
    Confirm,
    Uninstall,
    Configure,
    Update,
}

impl PipelineStage {
    /// The canonical install pipeline, in execution order.
    pub const CANONICAL: [PipelineStage; 5] = [
        Self::Check,
        Self::InstallDeps,
        Self::VerifyDeps,
        Self::Install,
        Self::Confirm,
    ];

    /// The in-place update pipeline, in execution order.
    pub const UPDATE: [PipelineStage; 3] = [Self::Check, Self::Update, Self::Confirm];

    /// Position within the canonical pipeline, if this stage is part of it.
    pub fn canonical_index(self) -> Option<usize> {
        Self::CANONICAL.iter().position(|s| *s == self)
    }

    /// The stage after this one in the canonical pipeline. `None` at the
    /// terminal stage and for pseudo-stages.
    pub fn next_canonical(self) -> Option<Self> {
        let idx = self.canonical_index()?;
        Self::CANONICAL.get(idx + 1).copied()
    }

    /// Human-readable stage name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Check => "Checking installation",
            Self::InstallDeps => "Installing dependencies",
            Self::VerifyDeps => "Verifying dependencies",
            Self::Install => "Building and installing",
            Self::Confirm => "Confirming installation",
            Self::Uninstall => "Uninstalling",
            Self::Configure => "Configuring",
            Self::Update => "Updating",
        }
    }

    /// Present-continuous form for the spinner line.
    pub fn active_form(self) -> &'static str {
        match self {
            Self::Check => "Checking...",
            Self::InstallDeps => "Installing dependencies...",
            Self::VerifyDeps => "Verifying dependencies...",
            Self::Install => "Building and installing...",
            Self::Confirm => "Confirming installation...",
            Self::Uninstall => "Uninstalling...",
            Self::Configure => "Configuring...",
            Self::Update => "Updating...",
        }
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Progress through a pipeline stage, emitted once per stage boundary.
#[derive(Debug, Clone)]
pub struct StageProgress {
    pub stage: PipelineStage,
    pub complete: bool,
    pub success: bool,
    pub duration: Duration,
    pub exit_code: i32,
    /// Error message for failed stages (display only)
    pub error: Option<String>,
}

impl StageProgress {
    pub(crate) fn pending(stage: PipelineStage) -> Self {
        Self {
            stage,
            complete: false,
            success: false,
            duration: Duration::ZERO,
            exit_code: 0,
            error: None,
        }
    }

    pub(crate) fn skipped(stage: PipelineStage) -> Self {
        Self {
            stage,
            complete: true,
            success: true,
            duration: Duration::ZERO,
            exit_code: 0,
            error: None,
        }
    }
}
