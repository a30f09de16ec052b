//! devforge library
//!
//! Core functionality for the devforge workstation installer TUI: status
//! caching, script execution, pipeline orchestration, boot diagnostics,
//! and the event-loop orchestrator.

pub mod app;
pub mod atomic_file;
pub mod cli;
pub mod detect;
pub mod diagnostics;
pub mod error;
pub mod executor;
pub mod preferences;
pub mod privilege;
pub mod process_guard;
pub mod registry;
pub mod script_runner;
pub mod secrets;
pub mod status_cache;
pub mod theme;
pub mod ui;

// Re-export main types for convenience
pub use error::{DevforgeError, Result, TimeoutScope};
pub use executor::{
    Checkpoint, CheckpointStore, ErrorSeverity, Pipeline, PipelineConfig, PipelineStage,
    SingleStageOp, SingleStagePipeline, StageProgress,
};
pub use process_guard::{ChildRegistry, ProcessGroupExt, ProcessGuard};
pub use script_runner::{run_check, run_script, CancelToken, OutputLine, ScriptResult};
pub use status_cache::{parse_probe_output, StatusCache, ToolState, ToolStatus};
