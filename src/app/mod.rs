//! Application orchestrator
//!
//! The root event loop following the model-update-view discipline: handlers
//! mutate state and return, blocking work runs on worker threads that send
//! [`AppMessage`]s back through an mpsc channel drained by the loop. The
//! only mutable state shared with workers is the status map behind a
//! reader-writer lock; everything else crosses thread boundaries as
//! messages.
//!
//! # Module Structure
//! - `models` - child view models (one per view, at most one live each)
//! - `installer_model` - the installer view state machine
//! - `diagnostics_model` - the diagnostics view state machine

mod diagnostics_model;
mod installer_model;
mod models;

pub use diagnostics_model::{DiagState, DiagnosticsModel};
pub use installer_model::{
    InstallerMode, InstallerModel, InstallerState, PipelineHandle, RecoveryAction,
};
pub use models::{
    BatchAction, BatchPreviewModel, ConfirmContext, ConfirmModel, ExtrasModel, McpPrereqModel,
    McpServerSummary, McpServersModel, MethodSelectModel, NerdFontsModel, SecretsWizardModel,
    ToolAction, ToolDetailModel,
};
use crate::detect;
use crate::diagnostics::{BatchFixResult, CacheStore, Fixer, ScanResult};
use crate::executor::{
    CheckpointStore, Pipeline, PipelineConfig, PipelineStage, SingleStageOp, SingleStagePipeline,
    StageProgress,
};
use crate::preferences::PreferenceStore;
use crate::privilege;
use crate::process_guard::ProcessGuard;
use crate::registry::{self, PrerequisiteResult, Tool};
use crate::script_runner::{run_check, OutputLine, SCRIPT_TIMEOUT};
use crate::secrets::SecretsStore;
use crate::status_cache::{parse_probe_output, StatusCache, ToolStatus};
use crate::ui;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use log::{debug, info, warn};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use std::collections::{HashMap, HashSet};
use std::io::Stdout;
use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::Duration;

/// Terminal type used by the event loop.
pub type Tui = Terminal<CrosstermBackend<Stdout>>;

/// The current screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Dashboard,
    ToolDetail,
    Extras,
    NerdFonts,
    McpServers,
    McpPrereq,
    SecretsWizard,
    MethodSelect,
    Installer,
    Diagnostics,
    Confirm,
    BatchPreview,
}

/// Messages sent from worker threads into the event loop.
pub enum AppMessage {
    StatusLoaded {
        tool_id: String,
        status: ToolStatus,
    },
    /// Completion marker: always the last message of a refresh fan-out
    AllStatusesLoaded,
    PipelineOutput(OutputLine),
    PipelineProgress(StageProgress),
    PipelineComplete {
        success: bool,
        error: Option<String>,
    },
    McpChecked(Vec<(String, McpServerSummary, Vec<PrerequisiteResult>)>),
    ScanComplete(Box<ScanResult>),
    FixComplete(Box<BatchFixResult>),
}

/// Status data shared between the event loop and its views.
#[derive(Default)]
pub struct StatusState {
    pub statuses: HashMap<String, ToolStatus>,
    pub loading: HashSet<String>,
}

/// Shared handle to the status map; child view models hold this by
/// reference so event dispatch never splits the state.
pub type SharedStatus = Arc<RwLock<StatusState>>;

/// Batch workflow state for Install All / Update All.
#[derive(Default)]
pub struct BatchState {
    pub queue: Vec<Tool>,
    pub index: usize,
    pub mode_on: bool,
    pub update_mode: bool,
}

impl BatchState {
    fn reset(&mut self) {
        self.queue.clear();
        self.index = 0;
        self.mode_on = false;
        self.update_mode = false;
    }
}

/// The root application model.
pub struct App {
    // View state
    pub view: View,
    pub previous_view: View,

    // Shared status data
    pub state: SharedStatus,
    pub cache: StatusCache,
    pub checkpoints: CheckpointStore,
    pub diag_cache: Arc<CacheStore>,
    pub prefs: PreferenceStore,
    pub secrets: SecretsStore,

    pub repo_root: PathBuf,
    pub demo_mode: bool,

    // Cursors
    pub main_cursor: usize,

    // Child view models (at most one of each)
    pub tool_detail: Option<ToolDetailModel>,
    pub extras: Option<ExtrasModel>,
    pub nerd_fonts: Option<NerdFontsModel>,
    pub mcp_servers: Option<McpServersModel>,
    pub mcp_prereq: Option<McpPrereqModel>,
    pub secrets_wizard: Option<SecretsWizardModel>,
    pub method_select: Option<MethodSelectModel>,
    pub installer: Option<InstallerModel>,
    pub diagnostics: Option<DiagnosticsModel>,
    pub confirm: Option<ConfirmModel>,
    pub batch_preview: Option<BatchPreviewModel>,

    // Batch orchestration
    pub batch: BatchState,

    // Smart install routing
    pub pending_clean_install: Option<Tool>,
    pub sudo_auth_done: bool,

    // Refresh bookkeeping
    pub loading: bool,
    pub refresh_pending: bool,

    tx: Sender<AppMessage>,
    rx: Receiver<AppMessage>,

    /// Terminates stray script children when the app drops
    _process_guard: ProcessGuard,
}

impl App {
    pub fn new(repo_root: PathBuf, demo_mode: bool, sudo_cached: bool) -> Self {
        let (tx, rx) = channel();
        Self {
            view: View::Dashboard,
            previous_view: View::Dashboard,
            state: Arc::new(RwLock::new(StatusState::default())),
            cache: StatusCache::new(),
            checkpoints: CheckpointStore::new(),
            diag_cache: Arc::new(CacheStore::new()),
            prefs: PreferenceStore::new(),
            secrets: SecretsStore::new(),
            repo_root,
            demo_mode,
            main_cursor: 0,
            tool_detail: None,
            extras: None,
            nerd_fonts: None,
            mcp_servers: None,
            mcp_prereq: None,
            secrets_wizard: None,
            method_select: None,
            installer: None,
            diagnostics: None,
            confirm: None,
            batch_preview: None,
            batch: BatchState::default(),
            pending_clean_install: None,
            sudo_auth_done: sudo_cached,
            loading: true,
            refresh_pending: false,
            tx,
            rx,
            _process_guard: ProcessGuard::new(),
        }
    }

    /// Menu rows below the dashboard tool table.
    pub fn dashboard_menu() -> &'static [&'static str] {
        &["Extras", "Nerd Fonts", "MCP Servers", "Boot Diagnostics", "Exit"]
    }

    /// Look up a tool's status in the shared map.
    pub fn status_of(&self, tool_id: &str) -> Option<ToolStatus> {
        self.state
            .read()
            .ok()
            .and_then(|s| s.statuses.get(tool_id).cloned())
    }

    /// Main event loop: draw, drain messages, handle one input event.
    pub fn run(&mut self, terminal: &mut Tui) -> anyhow::Result<()> {
        self.refresh_statuses(registry::main_tools());

        loop {
            terminal.draw(|frame| ui::draw(frame, self))?;

            while let Ok(msg) = self.rx.try_recv() {
                self.handle_message(msg);
            }

            if event::poll(Duration::from_millis(50))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press && !self.handle_key(key, terminal) {
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    // ========================================================================
    // Message handling
    // ========================================================================

    fn handle_message(&mut self, msg: AppMessage) {
        match msg {
            AppMessage::StatusLoaded { tool_id, status } => {
                if let Ok(mut state) = self.state.write() {
                    state.loading.remove(&tool_id);
                    state.statuses.insert(tool_id, status);
                }
            }
            AppMessage::AllStatusesLoaded => {
                self.loading = false;
                self.refresh_pending = false;
            }
            AppMessage::PipelineOutput(line) => {
                if let Some(installer) = self.installer.as_mut() {
                    installer.push_output(line);
                }
            }
            AppMessage::PipelineProgress(progress) => {
                if let Some(installer) = self.installer.as_mut() {
                    installer.apply_progress(&progress);
                }
            }
            AppMessage::PipelineComplete { success, error } => {
                self.handle_pipeline_complete(success, error);
            }
            AppMessage::McpChecked(results) => {
                if let Some(model) = self.mcp_servers.as_mut() {
                    model.checking = false;
                    for (id, summary, prereqs) in results {
                        model.results.insert(id.clone(), prereqs);
                        model.summaries.insert(id, summary);
                    }
                }
            }
            AppMessage::ScanComplete(result) => {
                if let Some(diag) = self.diagnostics.as_mut() {
                    diag.apply_scan(&result);
                }
            }
            AppMessage::FixComplete(result) => {
                if let Some(diag) = self.diagnostics.as_mut() {
                    diag.apply_fix_result(*result);
                }
            }
        }
    }

    fn handle_pipeline_complete(&mut self, success: bool, error: Option<String>) {
        let Some(installer) = self.installer.as_mut() else {
            return;
        };
        installer.on_complete(success, error, &self.checkpoints);
        let is_uninstall = installer.is_uninstall();
        let succeeded = installer.is_success();
        let tool_id = installer.tool.id;

        // Clean-install chain: a successful uninstall flows into install,
        // inside or outside a batch.
        if is_uninstall && succeeded {
            if let Some(tool) = self.pending_clean_install.take() {
                self.start_canonical(tool, false);
                return;
            }
        }
        if is_uninstall && !succeeded {
            self.pending_clean_install = None;
        }

        // Batch mode: auto-continue to the next tool, or wind down.
        if self.batch.mode_on {
            if succeeded {
                self.batch.index += 1;
                if self.batch.index < self.batch.queue.len() {
                    let next = self.batch.queue[self.batch.index].clone();
                    if self.batch.update_mode {
                        self.start_update(next);
                    } else {
                        self.route_install(next, false, false);
                    }
                    return;
                }
                info!("batch complete: {} tool(s)", self.batch.queue.len());
            }
            // Either finished or failed partway; the failing tool keeps its
            // resumable checkpoint and the installer view shows recovery.
            self.batch.reset();
            if succeeded {
                self.exit_installer();
            }
            return;
        }

        // Single-tool success: refresh statuses in the background while the
        // user reads the success screen.
        if succeeded && !self.refresh_pending {
            self.cache.invalidate(tool_id);
            self.refresh_statuses(registry::main_tools());
        }
    }

    // ========================================================================
    // Status refresh fan-out
    // ========================================================================

    /// Dispatch status probes for `tools`. Cached entries answer
    /// immediately; the rest fan out as probe threads. The completion
    /// marker is sent after every probe has finished, so it arrives last.
    pub fn refresh_statuses(&mut self, tools: Vec<Tool>) {
        if self.refresh_pending {
            return;
        }
        self.refresh_pending = true;
        self.loading = true;

        let mut to_probe = Vec::new();
        for tool in tools {
            if let Some(status) = self.cache.get(tool.id) {
                let _ = self.tx.send(AppMessage::StatusLoaded {
                    tool_id: tool.id.to_string(),
                    status,
                });
            } else {
                if let Ok(mut state) = self.state.write() {
                    state.loading.insert(tool.id.to_string());
                }
                to_probe.push(tool);
            }
        }

        let tx = self.tx.clone();
        let cache = self.cache.clone();
        let repo_root = self.repo_root.clone();
        thread::spawn(move || {
            let mut handles = Vec::new();
            for tool in to_probe {
                let tx = tx.clone();
                let cache = cache.clone();
                let repo_root = repo_root.clone();
                handles.push(thread::spawn(move || {
                    let status = match run_check(&repo_root, tool.scripts.check) {
                        Ok(line) => {
                            let status = parse_probe_output(tool.id, &line);
                            cache.set(status.clone());
                            status
                        }
                        Err(e) => {
                            debug!("probe {} failed: {}", tool.id, e);
                            ToolStatus::unknown(tool.id)
                        }
                    };
                    let _ = tx.send(AppMessage::StatusLoaded {
                        tool_id: tool.id.to_string(),
                        status,
                    });
                }));
            }
            for handle in handles {
                let _ = handle.join();
            }
            let _ = tx.send(AppMessage::AllStatusesLoaded);
        });
    }

    // ========================================================================
    // Privilege pre-auth
    // ========================================================================

    /// Make sure sudo credentials are cached before dispatching privileged
    /// work. May suspend the TUI to hand the terminal to sudo. Returns
    /// false when the user failed or aborted authentication.
    fn ensure_sudo_auth(&mut self, terminal: &mut Tui) -> bool {
        if self.sudo_auth_done || privilege::sudo_cached() {
            self.sudo_auth_done = true;
            return true;
        }
        if self.demo_mode {
            // Demo runs never prompt; privileged work is described instead.
            return true;
        }

        let authed = suspend_terminal(terminal, privilege::prime_sudo_interactive)
            .unwrap_or(Ok(false))
            .unwrap_or(false);
        if authed {
            self.sudo_auth_done = true;
        } else {
            warn!("sudo authentication failed or aborted");
        }
        authed
    }

    // ========================================================================
    // Smart install routing
    // ========================================================================

    /// User intent to install/reinstall a tool. Verifies privileges first,
    /// then routes.
    fn intent_install(&mut self, tool: Tool, resume: bool, force: bool, terminal: &mut Tui) {
        if !self.ensure_sudo_auth(terminal) {
            return;
        }
        self.route_install(tool, resume, force);
    }

    /// Route an install intent per [`decide_install_route`].
    fn route_install(&mut self, tool: Tool, resume: bool, force: bool) {
        let status = self.status_of(tool.id);
        let saved_method = self.prefs.terminal_method();

        match decide_install_route(&tool, status.as_ref(), saved_method, force) {
            InstallRoute::InPlaceUpdate => {
                // Non-destructive: preserves user-owned artifacts such as
                // npm globals and tokens.
                self.start_update(tool);
            }
            InstallRoute::CleanInstall => {
                self.pending_clean_install = Some(tool.clone());
                self.start_single(tool, SingleStageOp::Uninstall);
            }
            InstallRoute::MethodSelect => {
                let system = detect::detect_system();
                let recommendation = detect::recommend_terminal_method(&system);
                self.method_select =
                    Some(MethodSelectModel::new(tool, system, recommendation, resume));
                self.enter_view(View::MethodSelect);
            }
            InstallRoute::Canonical { method_override } => {
                let mut tool = tool;
                if method_override.is_some() {
                    tool.method_override = method_override;
                }
                self.start_canonical(tool, resume);
            }
        }
    }

    // ========================================================================
    // Pipeline dispatch
    // ========================================================================

    fn spawn_stream_forwarders(
        &self,
        output: std::sync::mpsc::Receiver<OutputLine>,
        progress: std::sync::mpsc::Receiver<StageProgress>,
    ) {
        let tx = self.tx.clone();
        thread::spawn(move || {
            for line in output.iter() {
                if tx.send(AppMessage::PipelineOutput(line)).is_err() {
                    break;
                }
            }
        });
        let tx = self.tx.clone();
        thread::spawn(move || {
            for event in progress.iter() {
                if tx.send(AppMessage::PipelineProgress(event)).is_err() {
                    break;
                }
            }
        });
    }

    fn start_canonical(&mut self, tool: Tool, resume: bool) {
        let start_stage = if resume {
            self.checkpoints.get_resume_stage(tool.id).0
        } else {
            PipelineStage::Check
        };

        let mut model = InstallerModel::new(tool.clone(), InstallerMode::Install);
        let (pipeline, streams) =
            Pipeline::new(tool, PipelineConfig::new(self.repo_root.clone()));
        let pipeline = Arc::new(pipeline);
        model.handle = Some(PipelineHandle::Multi(Arc::clone(&pipeline)));
        model.resumed = resume;
        model.begin_run(start_stage);

        self.spawn_stream_forwarders(streams.output, streams.progress);
        let tx = self.tx.clone();
        thread::spawn(move || {
            let result = if resume {
                pipeline.resume_from(start_stage)
            } else {
                pipeline.execute()
            };
            let (success, error) = match result {
                Ok(()) => (true, None),
                Err(e) => (false, Some(e.to_string())),
            };
            let _ = tx.send(AppMessage::PipelineComplete { success, error });
        });

        self.installer = Some(model);
        self.enter_view(View::Installer);
    }

    fn start_update(&mut self, tool: Tool) {
        let mut model = InstallerModel::new(tool.clone(), InstallerMode::Update);
        let (pipeline, streams) =
            Pipeline::new(tool, PipelineConfig::new(self.repo_root.clone()));
        let pipeline = Arc::new(pipeline);
        model.handle = Some(PipelineHandle::Multi(Arc::clone(&pipeline)));
        model.begin_run(PipelineStage::Check);

        self.spawn_stream_forwarders(streams.output, streams.progress);
        let tx = self.tx.clone();
        thread::spawn(move || {
            let result = pipeline.execute_update();
            let (success, error) = match result {
                Ok(()) => (true, None),
                Err(e) => (false, Some(e.to_string())),
            };
            let _ = tx.send(AppMessage::PipelineComplete { success, error });
        });

        self.installer = Some(model);
        self.enter_view(View::Installer);
    }

    fn start_single(&mut self, tool: Tool, op: SingleStageOp) {
        let mode = match op {
            SingleStageOp::Uninstall => InstallerMode::Uninstall,
            SingleStageOp::Configure => InstallerMode::Configure,
            SingleStageOp::Update => InstallerMode::Update,
        };
        let mut model = InstallerModel::new(tool.clone(), mode);
        let (pipeline, streams) =
            SingleStagePipeline::new(tool, op, self.repo_root.clone(), SCRIPT_TIMEOUT);
        let pipeline = Arc::new(pipeline);
        model.handle = Some(PipelineHandle::Single(Arc::clone(&pipeline)));
        model.begin_run(op.stage());

        self.spawn_stream_forwarders(streams.output, streams.progress);
        let tx = self.tx.clone();
        thread::spawn(move || {
            let result = pipeline.execute();
            let (success, error) = match result {
                Ok(()) => (true, None),
                Err(e) => (false, Some(e.to_string())),
            };
            let _ = tx.send(AppMessage::PipelineComplete { success, error });
        });

        self.installer = Some(model);
        self.enter_view(View::Installer);
    }

    // ========================================================================
    // Diagnostics dispatch
    // ========================================================================

    fn enter_diagnostics(&mut self) {
        if self.diag_cache.is_valid() {
            let issues = self.diag_cache.issues();
            self.diagnostics = Some(DiagnosticsModel::from_cached(
                issues,
                self.diag_cache.age_string(),
            ));
            self.enter_view(View::Diagnostics);
            return;
        }
        if self.diag_cache.reboot_detected() {
            info!(
                "reboot detected (boot id {}), cached scan discarded",
                self.diag_cache.boot_id()
            );
        }
        self.start_scan();
        self.enter_view(View::Diagnostics);
    }

    fn start_scan(&mut self) {
        let model = DiagnosticsModel::scanning();
        let cancel = model.cancel.clone();
        self.diagnostics = Some(model);

        let tx = self.tx.clone();
        let repo_root = self.repo_root.clone();
        let diag_cache = Arc::clone(&self.diag_cache);
        thread::spawn(move || {
            let result = crate::diagnostics::run_full_scan(&repo_root, &cancel);
            if let Err(e) = diag_cache.save(&result) {
                warn!("diagnostics cache save failed: {}", e);
            }
            let _ = tx.send(AppMessage::ScanComplete(Box::new(result)));
        });
    }

    fn start_fix(&mut self, terminal: &mut Tui) {
        let Some(diag) = self.diagnostics.as_ref() else {
            return;
        };
        let issues = diag.selected_issues();
        if issues.is_empty() {
            return;
        }
        if diag.selection_needs_sudo() && !self.ensure_sudo_auth(terminal) {
            return;
        }

        let Some(diag) = self.diagnostics.as_mut() else {
            return;
        };
        diag.state = DiagState::Fixing;
        let cancel = diag.cancel.clone();

        let tx = self.tx.clone();
        let repo_root = self.repo_root.clone();
        let demo_mode = self.demo_mode;
        let sudo_cached = self.sudo_auth_done;
        let diag_cache = Arc::clone(&self.diag_cache);
        thread::spawn(move || {
            let fixer = Fixer::new(&repo_root, demo_mode, sudo_cached);
            let result = fixer.execute_batch(&issues, &cancel);
            // Applied fixes make the cached scan stale.
            if let Err(e) = diag_cache.clear() {
                warn!("diagnostics cache clear failed: {}", e);
            }
            let _ = tx.send(AppMessage::FixComplete(Box::new(result)));
        });
    }

    // ========================================================================
    // View transitions
    // ========================================================================

    fn enter_view(&mut self, view: View) {
        self.previous_view = self.view;
        self.view = view;
    }

    /// Leave the installer view: reset batch state and return to where the
    /// user came from, refreshing the dashboard table.
    fn exit_installer(&mut self) {
        self.batch.reset();
        self.pending_clean_install = None;
        self.installer = None;

        if self.extras.is_some() {
            self.view = View::Extras;
            self.refresh_pending = false;
            return;
        }
        self.view = View::Dashboard;
        self.loading = true;
        self.refresh_statuses(registry::main_tools());
    }

    // ========================================================================
    // Key handling
    // ========================================================================

    /// Returns false to quit the application.
    fn handle_key(&mut self, key: KeyEvent, terminal: &mut Tui) -> bool {
        // Ctrl+C quits from anywhere.
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return false;
        }

        match self.view {
            View::Dashboard => self.handle_dashboard_key(key, terminal),
            View::ToolDetail => self.handle_tool_detail_key(key, terminal),
            View::Extras => self.handle_extras_key(key),
            View::NerdFonts => self.handle_nerd_fonts_key(key, terminal),
            View::McpServers => self.handle_mcp_servers_key(key),
            View::McpPrereq => self.handle_mcp_prereq_key(key),
            View::SecretsWizard => self.handle_secrets_wizard_key(key),
            View::MethodSelect => self.handle_method_select_key(key),
            View::Installer => self.handle_installer_key(key),
            View::Diagnostics => self.handle_diagnostics_key(key, terminal),
            View::Confirm => self.handle_confirm_key(key, terminal),
            View::BatchPreview => self.handle_batch_preview_key(key, terminal),
        }
    }

    fn handle_dashboard_key(&mut self, key: KeyEvent, _terminal: &mut Tui) -> bool {
        let tool_count = registry::main_tool_count();
        let row_count = tool_count + Self::dashboard_menu().len();

        match key.code {
            KeyCode::Char('q') => return false,
            KeyCode::Up | KeyCode::Char('k') => {
                self.main_cursor = self.main_cursor.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.main_cursor + 1 < row_count {
                    self.main_cursor += 1;
                }
            }
            KeyCode::Char('r') => {
                self.cache.invalidate_all();
                self.refresh_statuses(registry::main_tools());
            }
            KeyCode::Char('a') => {
                self.batch_preview = Some(BatchPreviewModel::new(
                    registry::main_tools(),
                    BatchAction::InstallAll,
                ));
                self.enter_view(View::BatchPreview);
            }
            KeyCode::Char('u') => {
                let tools: Vec<Tool> = registry::main_tools()
                    .into_iter()
                    .filter(|t| {
                        t.has_update_script()
                            && self
                                .status_of(t.id)
                                .map(|s| s.needs_update())
                                .unwrap_or(false)
                    })
                    .collect();
                if !tools.is_empty() {
                    self.batch_preview =
                        Some(BatchPreviewModel::new(tools, BatchAction::UpdateAll));
                    self.enter_view(View::BatchPreview);
                }
            }
            KeyCode::Enter => {
                if self.main_cursor < tool_count {
                    let tool = registry::main_tools()[self.main_cursor].clone();
                    self.tool_detail = Some(ToolDetailModel::new(tool));
                    self.enter_view(View::ToolDetail);
                } else {
                    match self.main_cursor - tool_count {
                        0 => {
                            self.extras = Some(ExtrasModel::new());
                            let extras = registry::extras_tools();
                            self.refresh_statuses(extras);
                            self.enter_view(View::Extras);
                        }
                        1 => {
                            let status = self.status_of("nerdfonts");
                            self.nerd_fonts = Some(NerdFontsModel::new(status.as_ref()));
                            self.enter_view(View::NerdFonts);
                        }
                        2 => self.enter_mcp_servers(),
                        3 => self.enter_diagnostics(),
                        _ => return false,
                    }
                }
            }
            _ => {}
        }
        true
    }

    fn enter_mcp_servers(&mut self) {
        let model = McpServersModel::new();
        let servers = model.servers.clone();
        self.mcp_servers = Some(model);
        self.enter_view(View::McpServers);

        let tx = self.tx.clone();
        let secrets_path_store = SecretsStore::new();
        thread::spawn(move || {
            let mut results = Vec::new();
            for server in servers {
                let prereqs = server.check_prerequisites();
                let summary = McpServerSummary {
                    prereqs_passed: prereqs.iter().filter(|r| r.passed).count(),
                    prereqs_total: prereqs.len(),
                    secrets_present: server
                        .secrets
                        .iter()
                        .filter(|s| secrets_path_store.has(s.env_var))
                        .count(),
                    secrets_required: server.required_secrets().len(),
                };
                results.push((server.id.to_string(), summary, prereqs));
            }
            let _ = tx.send(AppMessage::McpChecked(results));
        });
    }

    fn handle_tool_detail_key(&mut self, key: KeyEvent, terminal: &mut Tui) -> bool {
        let Some(detail) = self.tool_detail.as_mut() else {
            self.view = View::Dashboard;
            return true;
        };
        let status = self
            .state
            .read()
            .ok()
            .and_then(|s| s.statuses.get(detail.tool.id).cloned());
        let actions = detail.actions(status.as_ref());

        match key.code {
            KeyCode::Char('q') => return false,
            KeyCode::Esc => {
                self.tool_detail = None;
                self.view = if self.extras.is_some() {
                    View::Extras
                } else {
                    View::Dashboard
                };
            }
            KeyCode::Up | KeyCode::Char('k') => {
                detail.cursor = detail.cursor.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if detail.cursor + 1 < actions.len() {
                    detail.cursor += 1;
                }
            }
            KeyCode::Enter => {
                let action = actions[detail.cursor.min(actions.len() - 1)];
                let tool = detail.tool.clone();
                match action {
                    ToolAction::Install => self.intent_install(tool, false, false, terminal),
                    ToolAction::Update => {
                        if self.ensure_sudo_auth(terminal) {
                            self.start_update(tool);
                        }
                    }
                    ToolAction::Reinstall => self.intent_install(tool, false, true, terminal),
                    ToolAction::Uninstall => {
                        self.confirm = Some(ConfirmModel::uninstall(tool));
                        self.enter_view(View::Confirm);
                    }
                    ToolAction::Configure => self.start_single(tool, SingleStageOp::Configure),
                    ToolAction::Back => {
                        self.tool_detail = None;
                        self.view = if self.extras.is_some() {
                            View::Extras
                        } else {
                            View::Dashboard
                        };
                    }
                }
            }
            _ => {}
        }
        true
    }

    fn handle_extras_key(&mut self, key: KeyEvent) -> bool {
        let Some(extras) = self.extras.as_mut() else {
            self.view = View::Dashboard;
            return true;
        };

        match key.code {
            KeyCode::Char('q') => return false,
            KeyCode::Esc => {
                self.extras = None;
                self.view = View::Dashboard;
            }
            KeyCode::Up | KeyCode::Char('k') => {
                extras.cursor = extras.cursor.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if extras.cursor + 1 < extras.row_count() {
                    extras.cursor += 1;
                }
            }
            KeyCode::Enter => {
                if extras.is_back() {
                    self.extras = None;
                    self.view = View::Dashboard;
                } else if extras.is_install_all() {
                    let tools = extras.tools.clone();
                    self.batch_preview =
                        Some(BatchPreviewModel::new(tools, BatchAction::InstallAll));
                    self.enter_view(View::BatchPreview);
                } else if let Some(tool) = extras.selected_tool().cloned() {
                    self.tool_detail = Some(ToolDetailModel::new(tool));
                    self.enter_view(View::ToolDetail);
                }
            }
            _ => {}
        }
        true
    }

    fn handle_nerd_fonts_key(&mut self, key: KeyEvent, terminal: &mut Tui) -> bool {
        let Some(fonts) = self.nerd_fonts.as_mut() else {
            self.view = View::Dashboard;
            return true;
        };

        match key.code {
            KeyCode::Char('q') => return false,
            KeyCode::Esc => {
                self.nerd_fonts = None;
                self.view = View::Dashboard;
            }
            KeyCode::Up | KeyCode::Char('k') => {
                fonts.cursor = fonts.cursor.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if fonts.cursor + 1 < fonts.row_count() {
                    fonts.cursor += 1;
                }
            }
            KeyCode::Enter => {
                if fonts.is_back() {
                    self.nerd_fonts = None;
                    self.view = View::Dashboard;
                } else if let Some(tool) = registry::find("nerdfonts") {
                    // Single family or Install All: the font scripts decide
                    // what is missing; the pipeline is the same either way.
                    self.intent_install(tool, false, false, terminal);
                }
            }
            _ => {}
        }
        true
    }

    fn handle_mcp_servers_key(&mut self, key: KeyEvent) -> bool {
        let Some(model) = self.mcp_servers.as_mut() else {
            self.view = View::Dashboard;
            return true;
        };

        match key.code {
            KeyCode::Char('q') => return false,
            KeyCode::Esc => {
                self.mcp_servers = None;
                self.view = View::Dashboard;
            }
            KeyCode::Up | KeyCode::Char('k') => {
                model.cursor = model.cursor.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if model.cursor + 1 < model.servers.len() {
                    model.cursor += 1;
                }
            }
            KeyCode::Enter => {
                if let Some(server) = model.selected_server().cloned() {
                    let results = model.results.get(server.id).cloned().unwrap_or_default();
                    self.mcp_prereq = Some(McpPrereqModel {
                        server,
                        results,
                    });
                    self.enter_view(View::McpPrereq);
                }
            }
            KeyCode::Char('s') => {
                if let Some(server) = model.selected_server() {
                    if !server.secrets.is_empty() {
                        self.secrets_wizard = Some(SecretsWizardModel::new(server));
                        self.enter_view(View::SecretsWizard);
                    }
                }
            }
            _ => {}
        }
        true
    }

    fn handle_mcp_prereq_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Char('q') => return false,
            KeyCode::Esc | KeyCode::Enter => {
                self.mcp_prereq = None;
                self.view = View::McpServers;
            }
            _ => {}
        }
        true
    }

    fn handle_secrets_wizard_key(&mut self, key: KeyEvent) -> bool {
        let Some(wizard) = self.secrets_wizard.as_mut() else {
            self.view = View::McpServers;
            return true;
        };

        if wizard.done {
            // Any key dismisses the summary.
            self.secrets_wizard = None;
            self.view = View::McpServers;
            // Secret counts changed; re-probe.
            self.enter_mcp_servers();
            return true;
        }

        match key.code {
            KeyCode::Esc => {
                self.secrets_wizard = None;
                self.view = View::McpServers;
            }
            KeyCode::Enter => {
                if let Some(secret) = wizard.current_secret() {
                    if !wizard.input.is_empty() {
                        match self.secrets.set(secret.env_var, &wizard.input) {
                            Ok(()) => {
                                info!("saved secret {}", secret.env_var);
                                wizard.saved += 1;
                            }
                            Err(e) => warn!("saving {} failed: {}", secret.env_var, e),
                        }
                    }
                }
                wizard.advance();
            }
            KeyCode::Backspace => {
                wizard.input.pop();
            }
            KeyCode::Char(c) => {
                wizard.input.push(c);
            }
            _ => {}
        }
        true
    }

    fn handle_method_select_key(&mut self, key: KeyEvent) -> bool {
        let Some(selector) = self.method_select.as_mut() else {
            self.view = View::Dashboard;
            return true;
        };

        match key.code {
            KeyCode::Char('q') => return false,
            KeyCode::Esc => {
                self.method_select = None;
                self.view = self.previous_view;
            }
            KeyCode::Up | KeyCode::Char('k') => {
                selector.cursor = selector.cursor.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if selector.cursor + 1 < selector.tool.supported_methods.len() {
                    selector.cursor += 1;
                }
            }
            KeyCode::Char('p') | KeyCode::Char(' ') => {
                selector.save_preference = !selector.save_preference;
            }
            KeyCode::Enter => {
                let method = selector.selected_method();
                let mut tool = selector.tool.clone();
                let resume = selector.resume;
                let save = selector.save_preference;
                tool.method_override = Some(method);

                if save {
                    if let Err(e) = self.prefs.set_terminal_method(method) {
                        warn!("saving method preference failed: {}", e);
                    }
                }
                self.method_select = None;
                self.start_canonical(tool, resume);
            }
            _ => {}
        }
        true
    }

    fn handle_installer_key(&mut self, key: KeyEvent) -> bool {
        let Some(installer) = self.installer.as_mut() else {
            self.view = View::Dashboard;
            return true;
        };

        match installer.state {
            InstallerState::Running => {
                if key.code == KeyCode::Esc {
                    if let Some(handle) = installer.handle.as_ref() {
                        handle.cancel();
                    }
                    installer.on_cancelled(&self.checkpoints);
                }
            }
            InstallerState::Success => {
                if key.code == KeyCode::Esc {
                    self.exit_installer();
                }
            }
            InstallerState::Failed | InstallerState::Paused => {
                let action = match key.code {
                    KeyCode::Left | KeyCode::Char('h') => {
                        installer.recovery_focused = installer.recovery_focused.saturating_sub(1);
                        None
                    }
                    KeyCode::Right | KeyCode::Char('l') => {
                        if installer.recovery_focused + 1 < installer.recovery_buttons.len() {
                            installer.recovery_focused += 1;
                        }
                        None
                    }
                    KeyCode::Tab => {
                        if !installer.recovery_buttons.is_empty() {
                            installer.recovery_focused = (installer.recovery_focused + 1)
                                % installer.recovery_buttons.len();
                        }
                        None
                    }
                    KeyCode::Enter => installer.focused_recovery(),
                    KeyCode::Esc => Some(RecoveryAction::Back),
                    KeyCode::Char('r') | KeyCode::Char('R') => {
                        installer.recovery_by_shortcut("R")
                    }
                    KeyCode::Char('c') | KeyCode::Char('C') => {
                        installer.recovery_by_shortcut("C")
                    }
                    _ => None,
                };

                if let Some(action) = action {
                    let tool = installer.tool.clone();
                    let mode = installer.mode;
                    match action {
                        RecoveryAction::Back => self.exit_installer(),
                        RecoveryAction::Retry => match mode {
                            InstallerMode::Install => self.start_canonical(tool, false),
                            InstallerMode::Update => self.start_update(tool),
                            InstallerMode::Uninstall => {
                                self.start_single(tool, SingleStageOp::Uninstall)
                            }
                            InstallerMode::Configure => {
                                self.start_single(tool, SingleStageOp::Configure)
                            }
                        },
                        RecoveryAction::Resume => self.start_canonical(tool, true),
                    }
                }
            }
            InstallerState::Idle => {
                if key.code == KeyCode::Esc {
                    self.exit_installer();
                }
            }
        }
        true
    }

    fn handle_diagnostics_key(&mut self, key: KeyEvent, terminal: &mut Tui) -> bool {
        let Some(diag) = self.diagnostics.as_mut() else {
            self.view = View::Dashboard;
            return true;
        };

        match diag.state {
            DiagState::Scanning | DiagState::Fixing => {
                if key.code == KeyCode::Esc {
                    diag.cancel.cancel();
                    self.diagnostics = None;
                    self.view = View::Dashboard;
                }
            }
            DiagState::Ready => match key.code {
                KeyCode::Char('q') => return false,
                KeyCode::Esc => {
                    self.diagnostics = None;
                    self.view = View::Dashboard;
                }
                KeyCode::Up | KeyCode::Char('k') => {
                    diag.cursor = diag.cursor.saturating_sub(1);
                }
                KeyCode::Down | KeyCode::Char('j') => {
                    if diag.cursor + 1 < diag.issues.len() {
                        diag.cursor += 1;
                    }
                }
                KeyCode::Char(' ') => diag.toggle_selected(),
                KeyCode::Char('a') => diag.select_all_fixable(),
                KeyCode::Char('r') => self.start_scan(),
                KeyCode::Char('f') => self.start_fix(terminal),
                _ => {}
            },
            DiagState::FixDone => match key.code {
                KeyCode::Esc => {
                    self.diagnostics = None;
                    self.view = View::Dashboard;
                }
                KeyCode::Enter | KeyCode::Char('r') => {
                    // Re-scan to see what the fixes changed.
                    self.start_scan();
                }
                _ => {}
            },
        }
        true
    }

    fn handle_confirm_key(&mut self, key: KeyEvent, terminal: &mut Tui) -> bool {
        let Some(confirm) = self.confirm.as_mut() else {
            self.view = self.previous_view;
            return true;
        };

        let resolved = match key.code {
            KeyCode::Left | KeyCode::Char('h') => {
                confirm.focused = 0;
                None
            }
            KeyCode::Right | KeyCode::Char('l') => {
                confirm.focused = 1;
                None
            }
            KeyCode::Tab => {
                confirm.focused = 1 - confirm.focused;
                None
            }
            KeyCode::Char('y') | KeyCode::Char('Y') => Some(true),
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => Some(false),
            KeyCode::Enter => Some(confirm.confirmed()),
            _ => None,
        };

        if let Some(confirmed) = resolved {
            let context = confirm.context.clone();
            self.confirm = None;
            self.view = self.previous_view;

            if confirmed {
                match context {
                    ConfirmContext::UninstallTool(tool) => {
                        // Explicit uninstall: no reinstall chained afterwards.
                        self.pending_clean_install = None;
                        if self.ensure_sudo_auth(terminal) {
                            self.start_single(tool, SingleStageOp::Uninstall);
                        }
                    }
                }
            }
        }
        true
    }

    fn handle_batch_preview_key(&mut self, key: KeyEvent, terminal: &mut Tui) -> bool {
        let Some(preview) = self.batch_preview.as_mut() else {
            self.view = self.previous_view;
            return true;
        };

        match key.code {
            KeyCode::Esc => {
                self.batch_preview = None;
                self.view = self.previous_view;
            }
            KeyCode::Left | KeyCode::Right | KeyCode::Tab | KeyCode::Char('h')
            | KeyCode::Char('l') => {
                preview.cursor = 1 - preview.cursor;
            }
            KeyCode::Enter => {
                let confirmed = preview.cursor == 0;
                let tools = preview.tools.clone();
                let action = preview.action;
                self.batch_preview = None;

                if !confirmed || tools.is_empty() {
                    self.view = self.previous_view;
                    return true;
                }
                if !self.ensure_sudo_auth(terminal) {
                    self.view = self.previous_view;
                    return true;
                }

                self.batch.queue = tools;
                self.batch.index = 0;
                self.batch.mode_on = true;
                self.batch.update_mode = action == BatchAction::UpdateAll;

                let first = self.batch.queue[0].clone();
                if self.batch.update_mode {
                    self.start_update(first);
                } else {
                    self.route_install(first, false, false);
                }
            }
            _ => {}
        }
        true
    }
}

/// Where an install intent is dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallRoute {
    /// Tool is installed and a non-destructive update suffices
    InPlaceUpdate,
    /// Tool is installed; uninstall first, then chain into install
    CleanInstall,
    /// Multi-method tool with no saved preference: ask the user
    MethodSelect,
    /// Straight to the five-stage pipeline
    Canonical {
        method_override: Option<crate::registry::InstallMethod>,
    },
}

/// The smart install routing decision, separated from dispatch so the
/// policy is testable on its own.
pub fn decide_install_route(
    tool: &Tool,
    status: Option<&ToolStatus>,
    saved_method: Option<crate::registry::InstallMethod>,
    force_reinstall: bool,
) -> InstallRoute {
    let installed = status.map(|s| s.is_installed()).unwrap_or(false);

    if installed {
        let update_suffices = !force_reinstall
            && tool.has_update_script()
            && status.map(|s| s.needs_update()).unwrap_or(false);
        if update_suffices {
            return InstallRoute::InPlaceUpdate;
        }
        return InstallRoute::CleanInstall;
    }

    if tool.supports_multiple_methods() {
        return match saved_method {
            Some(method) => InstallRoute::Canonical {
                method_override: Some(method),
            },
            None => InstallRoute::MethodSelect,
        };
    }

    InstallRoute::Canonical {
        method_override: None,
    }
}

/// Hand the terminal to a subprocess (the sudo prompt), then restore the
/// TUI. Raw mode and the alternate screen are torn down around `f`.
fn suspend_terminal<T>(
    terminal: &mut Tui,
    f: impl FnOnce() -> std::io::Result<T>,
) -> std::io::Result<std::io::Result<T>> {
    disable_raw_mode()?;
    execute!(std::io::stdout(), LeaveAlternateScreen)?;

    let result = f();

    enable_raw_mode()?;
    execute!(std::io::stdout(), EnterAlternateScreen)?;
    terminal.clear()?;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app() -> App {
        App::new(PathBuf::from("/tmp"), true, true)
    }

    #[test]
    fn test_new_app_starts_on_dashboard() {
        let app = app();
        assert_eq!(app.view, View::Dashboard);
        assert!(app.installer.is_none());
        assert!(!app.batch.mode_on);
        assert!(app.sudo_auth_done);
    }

    #[test]
    fn test_status_map_shared_across_handles() {
        let app = app();
        let shared = Arc::clone(&app.state);
        {
            let mut state = shared.write().unwrap();
            state
                .statuses
                .insert("wezterm".to_string(), ToolStatus::unknown("wezterm"));
        }
        assert!(app.status_of("wezterm").is_some());
    }

    #[test]
    fn test_batch_reset() {
        let mut batch = BatchState {
            queue: registry::main_tools(),
            index: 2,
            mode_on: true,
            update_mode: true,
        };
        batch.reset();
        assert!(batch.queue.is_empty());
        assert!(!batch.mode_on);
        assert!(!batch.update_mode);
    }

    #[test]
    fn test_dashboard_menu_has_exit_last() {
        let menu = App::dashboard_menu();
        assert_eq!(*menu.last().unwrap(), "Exit");
    }
}
