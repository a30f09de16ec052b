//! Child view models
//!
//! Each view owns a small state struct; at most one of each exists at a
//! time, created on view entry and dropped on exit. Key handling lives in
//! the orchestrator (`app::App`), rendering in `crate::ui`.

use crate::detect::{MethodRecommendation, SystemInfo};
use crate::registry::{FontFamily, McpSecret, McpServer, PrerequisiteResult, Tool};
use crate::status_cache::ToolStatus;

/// What a confirmation dialog is about; returned to the previous view with
/// the user's answer.
#[derive(Debug, Clone)]
pub enum ConfirmContext {
    UninstallTool(Tool),
}

/// Modal yes/no dialog. Defaults to No.
pub struct ConfirmModel {
    pub question: String,
    /// 0 = No, 1 = Yes
    pub focused: usize,
    pub context: ConfirmContext,
}

impl ConfirmModel {
    pub fn uninstall(tool: Tool) -> Self {
        Self {
            question: format!(
                "Uninstall {}? This removes the installed version.",
                tool.display_name
            ),
            focused: 0,
            context: ConfirmContext::UninstallTool(tool),
        }
    }

    pub fn confirmed(&self) -> bool {
        self.focused == 1
    }
}

/// Install-method selection for multi-method tools.
pub struct MethodSelectModel {
    pub tool: Tool,
    pub system: SystemInfo,
    pub recommendation: MethodRecommendation,
    pub cursor: usize,
    /// Whether to persist the choice to preferences
    pub save_preference: bool,
    /// Carried through to the dispatched pipeline
    pub resume: bool,
}

impl MethodSelectModel {
    pub fn new(
        tool: Tool,
        system: SystemInfo,
        recommendation: MethodRecommendation,
        resume: bool,
    ) -> Self {
        // Preselect the recommended method.
        let cursor = tool
            .supported_methods
            .iter()
            .position(|m| *m == recommendation.method)
            .unwrap_or(0);
        Self {
            tool,
            system,
            recommendation,
            cursor,
            save_preference: false,
            resume,
        }
    }

    pub fn selected_method(&self) -> crate::registry::InstallMethod {
        self.tool.supported_methods[self.cursor]
    }
}

/// What a batch operation will do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchAction {
    InstallAll,
    UpdateAll,
}

impl BatchAction {
    pub fn label(self) -> &'static str {
        match self {
            Self::InstallAll => "Install All",
            Self::UpdateAll => "Update All",
        }
    }
}

/// Preview of a batch operation before it starts.
pub struct BatchPreviewModel {
    pub tools: Vec<Tool>,
    pub action: BatchAction,
    /// 0 = Confirm, 1 = Cancel
    pub cursor: usize,
}

impl BatchPreviewModel {
    pub fn new(tools: Vec<Tool>, action: BatchAction) -> Self {
        Self {
            tools,
            action,
            cursor: 0,
        }
    }
}

/// Extras screen: the extras catalog plus menu rows.
pub struct ExtrasModel {
    pub tools: Vec<Tool>,
    pub cursor: usize,
}

impl ExtrasModel {
    pub fn new() -> Self {
        Self {
            tools: crate::registry::extras_tools(),
            cursor: 0,
        }
    }

    /// Rows after the tools: Install All, Back.
    pub fn menu_rows() -> usize {
        2
    }

    pub fn row_count(&self) -> usize {
        self.tools.len() + Self::menu_rows()
    }

    pub fn selected_tool(&self) -> Option<&Tool> {
        self.tools.get(self.cursor)
    }

    pub fn is_install_all(&self) -> bool {
        self.cursor == self.tools.len()
    }

    pub fn is_back(&self) -> bool {
        self.cursor == self.tools.len() + 1
    }
}

/// Nerd Fonts screen: the font families with status derived from the
/// nerdfonts tool's probe sub-details.
pub struct NerdFontsModel {
    pub fonts: Vec<FontFamily>,
    pub cursor: usize,
}

impl NerdFontsModel {
    pub fn new(status: Option<&ToolStatus>) -> Self {
        let mut fonts = crate::registry::font_families();
        if let Some(status) = status {
            for font in &mut fonts {
                // Probe detail lines look like "JetBrainsMono v3.2.1".
                let detail = status
                    .details
                    .iter()
                    .find(|d| d.starts_with(font.display_name));
                if let Some(detail) = detail {
                    font.status = "Installed".to_string();
                    font.version = detail
                        .strip_prefix(font.display_name)
                        .unwrap_or("")
                        .trim()
                        .to_string();
                } else {
                    font.status = "Missing".to_string();
                }
            }
        }
        Self { fonts, cursor: 0 }
    }

    /// Rows after the fonts: Install All, Back.
    pub fn row_count(&self) -> usize {
        self.fonts.len() + 2
    }

    pub fn is_install_all(&self) -> bool {
        self.cursor == self.fonts.len()
    }

    pub fn is_back(&self) -> bool {
        self.cursor == self.fonts.len() + 1
    }

    pub fn installed_count(&self) -> usize {
        self.fonts.iter().filter(|f| f.is_installed()).count()
    }
}

/// Per-server prerequisite/secret summary for the MCP dashboard.
#[derive(Debug, Clone, Default)]
pub struct McpServerSummary {
    pub prereqs_passed: usize,
    pub prereqs_total: usize,
    pub secrets_present: usize,
    pub secrets_required: usize,
}

/// MCP servers screen.
pub struct McpServersModel {
    pub servers: Vec<McpServer>,
    pub cursor: usize,
    /// Filled asynchronously once the prerequisite probes finish
    pub summaries: std::collections::HashMap<String, McpServerSummary>,
    /// Full prerequisite results per server id, for the detail view
    pub results: std::collections::HashMap<String, Vec<PrerequisiteResult>>,
    pub checking: bool,
}

impl McpServersModel {
    pub fn new() -> Self {
        Self {
            servers: crate::registry::mcp_servers(),
            cursor: 0,
            summaries: std::collections::HashMap::new(),
            results: std::collections::HashMap::new(),
            checking: true,
        }
    }

    pub fn selected_server(&self) -> Option<&McpServer> {
        self.servers.get(self.cursor)
    }
}

/// Detailed prerequisite results for one server.
pub struct McpPrereqModel {
    pub server: McpServer,
    pub results: Vec<PrerequisiteResult>,
}

/// Secrets wizard: collects values for a server's secret env vars, one at
/// a time. Input is masked in the view; values go straight to the private
/// secrets store and are never logged.
pub struct SecretsWizardModel {
    pub server_name: String,
    pub secrets: Vec<McpSecret>,
    pub index: usize,
    pub input: String,
    pub saved: usize,
    pub done: bool,
}

impl SecretsWizardModel {
    pub fn new(server: &McpServer) -> Self {
        Self {
            server_name: server.display_name.to_string(),
            secrets: server.secrets.to_vec(),
            index: 0,
            input: String::new(),
            saved: 0,
            done: false,
        }
    }

    pub fn current_secret(&self) -> Option<&McpSecret> {
        self.secrets.get(self.index)
    }

    /// Advance past the current secret; returns true when the wizard is
    /// finished.
    pub fn advance(&mut self) -> bool {
        self.index += 1;
        self.input.clear();
        if self.index >= self.secrets.len() {
            self.done = true;
        }
        self.done
    }
}

/// Tool detail screen: one tool, its live status, and the action menu.
pub struct ToolDetailModel {
    pub tool: Tool,
    pub cursor: usize,
}

/// Action rows on the tool detail screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolAction {
    Install,
    Update,
    Reinstall,
    Uninstall,
    Configure,
    Back,
}

impl ToolAction {
    pub fn label(self) -> &'static str {
        match self {
            Self::Install => "Install",
            Self::Update => "Update",
            Self::Reinstall => "Reinstall",
            Self::Uninstall => "Uninstall",
            Self::Configure => "Configure",
            Self::Back => "Back",
        }
    }
}

impl ToolDetailModel {
    pub fn new(tool: Tool) -> Self {
        Self { tool, cursor: 0 }
    }

    /// The action menu, computed from live status: Update replaces Install
    /// when one is available, Configure appears only for tools that have a
    /// configure script.
    pub fn actions(&self, status: Option<&ToolStatus>) -> Vec<ToolAction> {
        let mut actions = Vec::new();
        let needs_update = status.map(|s| s.needs_update()).unwrap_or(false);
        if needs_update && self.tool.has_update_script() {
            actions.push(ToolAction::Update);
        } else {
            actions.push(ToolAction::Install);
        }
        actions.push(ToolAction::Reinstall);
        actions.push(ToolAction::Uninstall);
        if self.tool.has_configure_script() {
            actions.push(ToolAction::Configure);
        }
        actions.push(ToolAction::Back);
        actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status_cache::{parse_probe_output, ToolState};

    #[test]
    fn test_confirm_defaults_to_no() {
        let tool = crate::registry::find("zsh").unwrap();
        let confirm = ConfirmModel::uninstall(tool);
        assert!(!confirm.confirmed());
    }

    #[test]
    fn test_tool_actions_prefer_update_when_available() {
        let tool = crate::registry::find("wezterm").unwrap();
        let model = ToolDetailModel::new(tool);

        let status = parse_probe_output("wezterm", "INSTALLED|1.0|snap|/snap/bin|2.0");
        let actions = model.actions(Some(&status));
        assert_eq!(actions[0], ToolAction::Update);
        assert!(!actions.contains(&ToolAction::Configure));
    }

    #[test]
    fn test_tool_actions_install_when_current() {
        let tool = crate::registry::find("wezterm").unwrap();
        let model = ToolDetailModel::new(tool);
        let actions = model.actions(None);
        assert_eq!(actions[0], ToolAction::Install);
        assert_eq!(*actions.last().unwrap(), ToolAction::Back);
    }

    #[test]
    fn test_configure_action_for_zsh() {
        let tool = crate::registry::find("zsh").unwrap();
        let model = ToolDetailModel::new(tool);
        assert!(model.actions(None).contains(&ToolAction::Configure));
    }

    #[test]
    fn test_nerdfonts_status_from_details() {
        let mut status = parse_probe_output(
            "nerdfonts",
            "INSTALLED|3.2.1|github|~/.local/share/fonts^JetBrainsMono v3.2.1^Hack v3.2.1|3.2.1",
        );
        assert_eq!(status.status, ToolState::Installed);

        let model = NerdFontsModel::new(Some(&status));
        assert_eq!(model.installed_count(), 2);
        let jb = model.fonts.iter().find(|f| f.id == "jetbrainsmono").unwrap();
        assert!(jb.is_installed());
        assert_eq!(jb.version, "v3.2.1");

        status.details.clear();
        let model = NerdFontsModel::new(Some(&status));
        assert_eq!(model.installed_count(), 0);
    }

    #[test]
    fn test_secrets_wizard_advance() {
        let server = crate::registry::mcp_servers()
            .into_iter()
            .find(|s| s.id == "context7")
            .unwrap();
        let mut wizard = SecretsWizardModel::new(&server);
        assert_eq!(wizard.secrets.len(), 1);
        assert!(!wizard.done);
        assert!(wizard.advance());
        assert!(wizard.done);
    }

    #[test]
    fn test_extras_menu_rows() {
        let extras = ExtrasModel::new();
        let mut model = extras;
        model.cursor = model.tools.len();
        assert!(model.is_install_all());
        model.cursor += 1;
        assert!(model.is_back());
    }
}
