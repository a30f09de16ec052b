//! Pipeline executor integration tests
//!
//! Drives the canonical and update pipelines against real bash scripts in
//! a temp repo root, covering the happy path, failure + resume, the OOM
//! special case, cancellation, and smart routing decisions.

use devforge::app::{decide_install_route, InstallRoute};
use devforge::error::DevforgeError;
use devforge::executor::{
    CheckpointStore, Pipeline, PipelineConfig, PipelineStage, SingleStageOp, SingleStagePipeline,
    StageProgress,
};
use devforge::registry::{self, Tool};
use devforge::status_cache::parse_probe_output;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    _dir: tempfile::TempDir,
    root: std::path::PathBuf,
    tool: Tool,
}

impl Harness {
    /// Temp repo root with every canonical script for the tool exiting 0.
    fn new(tool_id: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let tool = registry::find(tool_id).unwrap();

        for (rel, body) in [
            (tool.scripts.check, "echo 'Not Installed|-|-|-|1.0'"),
            (tool.scripts.install_deps, "echo deps-ok"),
            (tool.scripts.verify_deps, "echo verify-ok"),
            (tool.scripts.install, "echo install-ok"),
            (tool.scripts.confirm, "echo confirm-ok"),
            (tool.scripts.uninstall, "echo uninstall-ok"),
        ] {
            write_script(&root, rel, body);
        }
        if !tool.scripts.update.is_empty() {
            write_script(&root, tool.scripts.update, "echo update-ok");
        }

        Self {
            _dir: dir,
            root,
            tool,
        }
    }

    fn set_script(&self, rel: &str, body: &str) {
        write_script(&self.root, rel, body);
    }

    fn pipeline(&self) -> (Pipeline, devforge::executor::PipelineStreams, CheckpointStore) {
        let store = CheckpointStore::with_base_dir(self.root.join("checkpoints"));
        // The pipeline gets its own store handle over the same directory.
        let pipeline_store = CheckpointStore::with_base_dir(self.root.join("checkpoints"));
        let (pipeline, streams) = Pipeline::with_checkpoint_store(
            self.tool.clone(),
            PipelineConfig::new(self.root.clone()),
            pipeline_store,
        );
        (pipeline, streams, store)
    }
}

fn write_script(root: &Path, rel: &str, body: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, format!("#!/usr/bin/env bash\n{}\n", body)).unwrap();
}

fn assert_strictly_increasing(events: &[StageProgress], order: &[PipelineStage]) {
    let positions: Vec<usize> = events
        .iter()
        .map(|e| order.iter().position(|s| *s == e.stage).expect("known stage"))
        .collect();
    for window in positions.windows(2) {
        assert!(
            window[0] < window[1],
            "progress stages not strictly increasing: {:?}",
            positions
        );
    }
}

// S1: fresh install happy path.
#[test]
fn test_fresh_install_happy_path() {
    let harness = Harness::new("neovim");
    let (pipeline, streams, store) = harness.pipeline();

    pipeline.execute().expect("pipeline succeeds");

    let events: Vec<_> = streams.progress.iter().collect();
    assert_eq!(events.len(), 5);
    assert!(events.iter().all(|e| e.complete && e.success));
    assert_strictly_increasing(&events, &PipelineStage::CANONICAL);
    assert_eq!(events.last().unwrap().stage, PipelineStage::Confirm);

    // No checkpoint remains after success.
    assert!(!store.exists("neovim"));
}

// S2: failure at Install, then resume from Install.
#[test]
fn test_failure_at_install_then_resume() {
    let harness = Harness::new("neovim");
    harness.set_script(harness.tool.scripts.install, "echo broken >&2\nexit 2");

    let (pipeline, streams, store) = harness.pipeline();
    let err = pipeline.execute().expect_err("install fails");
    assert!(err.to_string().contains("exited with code 2"), "{}", err);

    let events: Vec<_> = streams.progress.iter().collect();
    assert_strictly_increasing(&events, &PipelineStage::CANONICAL);
    let failed = events.last().unwrap();
    assert_eq!(failed.stage, PipelineStage::Install);
    assert!(failed.complete && !failed.success);
    assert_eq!(failed.exit_code, 2);

    let checkpoint = store.load("neovim").unwrap().expect("checkpoint saved");
    // Check exits non-zero on a fresh system and is Info severity, so the
    // completed set holds the stages that actually succeeded.
    assert_eq!(
        checkpoint.completed_stages,
        vec![
            PipelineStage::Check,
            PipelineStage::InstallDeps,
            PipelineStage::VerifyDeps
        ]
    );
    let failure = checkpoint.failed_stage.expect("failure recorded");
    assert_eq!(failure.stage, PipelineStage::Install);
    assert!(failure.recoverable);
    assert!(checkpoint.is_resumable);
    assert_eq!(store.get_resume_stage("neovim"), (PipelineStage::Install, true));

    // Fix the script and resume: the run starts at Install.
    harness.set_script(harness.tool.scripts.install, "echo fixed");
    let (pipeline, streams, store) = harness.pipeline();
    let (stage, ok) = store.get_resume_stage("neovim");
    assert!(ok);
    pipeline.resume_from(stage).expect("resume succeeds");

    let events: Vec<_> = streams.progress.iter().collect();
    assert_eq!(events.first().unwrap().stage, PipelineStage::Install);
    assert_eq!(events.len(), 2); // Install, Confirm
    assert!(!store.exists("neovim"));
}

// S3: OOM kill during Install is not recoverable.
#[test]
fn test_oom_at_install_not_recoverable() {
    let harness = Harness::new("neovim");
    harness.set_script(harness.tool.scripts.install, "exit 137");

    let (pipeline, _streams, store) = harness.pipeline();
    pipeline.execute().expect_err("install fails");

    let failure = store
        .load("neovim")
        .unwrap()
        .unwrap()
        .failed_stage
        .expect("failure recorded");
    assert_eq!(failure.exit_code, 137);
    assert!(!failure.recoverable);
}

// S4: cancel mid-stage kills the child and preserves the checkpoint.
#[test]
fn test_cancel_mid_install() {
    let harness = Harness::new("neovim");
    harness.set_script(harness.tool.scripts.install, "echo installing\nsleep 30");

    let (pipeline, streams, store) = harness.pipeline();
    let pipeline = Arc::new(pipeline);

    let runner = {
        let pipeline = Arc::clone(&pipeline);
        std::thread::spawn(move || pipeline.execute())
    };

    // Wait until the install stage is producing output, then cancel.
    for line in streams.output.iter() {
        if line.text == "installing" {
            break;
        }
    }
    while pipeline.cancel().is_err() {
        std::thread::sleep(Duration::from_millis(10));
    }

    let result = runner.join().unwrap();
    assert!(matches!(result, Err(ref e) if e.is_cancelled()), "{:?}", result);

    // No failure record was written; the stage-start checkpoint remains
    // resumable at Install.
    let checkpoint = store.load("neovim").unwrap().expect("checkpoint");
    assert!(checkpoint.failed_stage.is_none());
    assert!(checkpoint.is_resumable);
    assert_eq!(checkpoint.current_stage, PipelineStage::Install);
}

// Confirm failures are warnings: the pipeline still succeeds.
#[test]
fn test_confirm_failure_is_nonfatal() {
    let harness = Harness::new("neovim");
    harness.set_script(harness.tool.scripts.confirm, "exit 1");

    let (pipeline, streams, store) = harness.pipeline();
    pipeline.execute().expect("confirm warning does not abort");

    let warned: Vec<_> = streams
        .output
        .iter()
        .filter(|l| l.text.contains("[WARN]"))
        .collect();
    assert_eq!(warned.len(), 1);
    assert!(!store.exists("neovim"));
}

// Stage timeout is fatal and persists a resumable failure.
#[test]
fn test_stage_timeout_is_fatal() {
    let harness = Harness::new("neovim");
    harness.set_script(harness.tool.scripts.install_deps, "sleep 30");

    let (pipeline, _streams, store) = {
        let store = CheckpointStore::with_base_dir(harness.root.join("checkpoints"));
        let pipeline_store = CheckpointStore::with_base_dir(harness.root.join("checkpoints"));
        let mut config = PipelineConfig::new(harness.root.clone());
        config.stage_timeout = Duration::from_millis(300);
        let (pipeline, streams) =
            Pipeline::with_checkpoint_store(harness.tool.clone(), config, pipeline_store);
        (pipeline, streams, store)
    };

    let err = pipeline.execute().expect_err("times out");
    assert!(err.is_timeout(), "{}", err);

    let failure = store.load("neovim").unwrap().unwrap().failed_stage.unwrap();
    assert_eq!(failure.stage, PipelineStage::InstallDeps);
}

// The three-stage update pipeline skips a missing update script.
#[test]
fn test_update_pipeline_stages() {
    let harness = Harness::new("wezterm");
    let (pipeline, streams, store) = harness.pipeline();

    pipeline.execute_update().expect("update succeeds");

    let events: Vec<_> = streams.progress.iter().collect();
    let stages: Vec<_> = events.iter().map(|e| e.stage).collect();
    assert_eq!(
        stages,
        vec![PipelineStage::Check, PipelineStage::Update, PipelineStage::Confirm]
    );
    assert!(events.iter().all(|e| e.complete && e.success));
    assert!(!store.exists("wezterm"));
}

#[test]
fn test_update_pipeline_skips_missing_update_script() {
    // neovim declares no update script; the Update stage is skipped with a
    // successful zero-duration progress event.
    let harness = Harness::new("neovim");
    let (pipeline, streams, _store) = harness.pipeline();

    pipeline.execute_update().expect("update succeeds");
    let events: Vec<_> = streams.progress.iter().collect();
    let update = events
        .iter()
        .find(|e| e.stage == PipelineStage::Update)
        .expect("update progress present");
    assert!(update.complete && update.success);
    assert!(update.duration.is_zero());
}

// A pipeline object drives at most one run.
#[test]
fn test_second_execute_is_lifecycle_misuse() {
    let harness = Harness::new("neovim");
    let (pipeline, _streams, _store) = harness.pipeline();

    pipeline.execute().unwrap();
    assert!(matches!(
        pipeline.execute(),
        Err(DevforgeError::AlreadyRunning)
    ));
}

// Single-stage uninstall reports one progress pair and no checkpoint.
#[test]
fn test_single_stage_uninstall() {
    let harness = Harness::new("neovim");
    let (pipeline, streams) = SingleStagePipeline::new(
        harness.tool.clone(),
        SingleStageOp::Uninstall,
        harness.root.clone(),
        Duration::from_secs(10),
    );

    pipeline.execute().expect("uninstall succeeds");
    let events: Vec<_> = streams.progress.iter().collect();
    assert_eq!(events.len(), 2);
    assert!(!events[0].complete);
    assert!(events[1].complete && events[1].success);
    assert_eq!(events[1].stage, PipelineStage::Uninstall);
}

#[test]
fn test_single_stage_failure_propagates() {
    let harness = Harness::new("neovim");
    harness.set_script(harness.tool.scripts.uninstall, "exit 4");

    let (pipeline, streams) = SingleStagePipeline::new(
        harness.tool.clone(),
        SingleStageOp::Uninstall,
        harness.root.clone(),
        Duration::from_secs(10),
    );

    let err = pipeline.execute().expect_err("uninstall fails");
    assert!(err.to_string().contains("exited with code 4"), "{}", err);

    let events: Vec<_> = streams.progress.iter().collect();
    let last = events.last().unwrap();
    assert!(last.complete && !last.success);
    assert_eq!(last.exit_code, 4);
}

// S5: smart routing decisions.
#[test]
fn test_smart_routing() {
    let wezterm = registry::find("wezterm").unwrap();
    let neovim = registry::find("neovim").unwrap();

    // Installed + update available + update script → in-place update.
    let needs_update = parse_probe_output("wezterm", "INSTALLED|1.0|snap|/snap/bin|2.0");
    assert_eq!(
        decide_install_route(&wezterm, Some(&needs_update), None, false),
        InstallRoute::InPlaceUpdate
    );

    // Forced reinstall ignores the update path.
    assert_eq!(
        decide_install_route(&wezterm, Some(&needs_update), None, true),
        InstallRoute::CleanInstall
    );

    // Installed and current → clean install.
    let current = parse_probe_output("wezterm", "INSTALLED|2.0|snap|/snap/bin|2.0");
    assert_eq!(
        decide_install_route(&wezterm, Some(&current), None, false),
        InstallRoute::CleanInstall
    );

    // Not installed, multi-method, no preference → method selector.
    assert_eq!(
        decide_install_route(&wezterm, None, None, false),
        InstallRoute::MethodSelect
    );

    // Not installed, multi-method, saved preference → canonical with the
    // preference as override.
    assert_eq!(
        decide_install_route(
            &wezterm,
            None,
            Some(devforge::registry::InstallMethod::Snap),
            false
        ),
        InstallRoute::Canonical {
            method_override: Some(devforge::registry::InstallMethod::Snap)
        }
    );

    // Installed tool without an update script → clean install even when a
    // newer version is known.
    let nv = parse_probe_output("neovim", "INSTALLED|0.9|tarball|/usr/local/bin|0.10");
    assert_eq!(
        decide_install_route(&neovim, Some(&nv), None, false),
        InstallRoute::CleanInstall
    );
}

// Method override is forwarded as the script's positional argument.
#[test]
fn test_method_override_reaches_script() {
    let harness = Harness::new("wezterm");
    harness.set_script(harness.tool.scripts.install, "echo \"method=$1\"");

    let mut tool = harness.tool.clone();
    tool.method_override = Some(devforge::registry::InstallMethod::Snap);

    let store = CheckpointStore::with_base_dir(harness.root.join("checkpoints"));
    let (pipeline, streams) = Pipeline::with_checkpoint_store(
        tool,
        PipelineConfig::new(harness.root.clone()),
        store,
    );
    pipeline.execute().unwrap();

    let saw_method = streams
        .output
        .iter()
        .any(|l| l.text == "method=snap");
    assert!(saw_method, "install script did not receive the method arg");
}
