//! Data-driven tool catalog
//!
//! Every installable item is described by a [`Tool`]: an id, a script table,
//! and a handful of behavioral flags. The TUI never hardcodes per-tool logic;
//! it walks this catalog and dispatches the scripts it names.
//!
//! Script paths are relative to the repository root. An empty path means the
//! stage is skipped by the pipeline executor.

mod fonts;
mod mcp;

pub use fonts::{font_families, FontFamily};
pub use mcp::{
    mcp_servers, McpPrerequisite, McpSecret, McpServer, McpTransport, PrerequisiteResult,
};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// How a tool is installed on the workstation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum InstallMethod {
    /// Built from a source checkout
    Source,
    /// Snap package
    Snap,
    /// Distribution package (apt)
    Apt,
    /// Upstream tarball unpacked under /usr/local
    Tarball,
    /// Vendor install script (curl | bash style, wrapped by our scripts)
    Script,
    /// GitHub release asset
    Github,
    /// npm global package
    Npm,
}

/// Groups tools in the TUI menus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// Shown on the main dashboard table
    Main,
    /// Shown on the extras screen
    Extras,
}

/// Paths to the lifecycle scripts for one tool, relative to the repo root.
///
/// An empty string means the tool has no script for that stage and the
/// pipeline skips it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolScripts {
    pub check: &'static str,
    pub uninstall: &'static str,
    pub install_deps: &'static str,
    pub verify_deps: &'static str,
    pub install: &'static str,
    pub confirm: &'static str,
    pub configure: &'static str,
    pub update: &'static str,
}

/// A component of an aggregate tool (e.g. the AI CLI bundle).
#[derive(Debug, Clone)]
pub struct SubTool {
    pub id: &'static str,
    pub name: &'static str,
    /// Command probed for existence, e.g. "claude"
    pub command: &'static str,
}

/// A single installable tool.
#[derive(Debug, Clone)]
pub struct Tool {
    /// Unique identifier, e.g. "wezterm"
    pub id: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
    pub category: Category,
    /// Default installation method
    pub method: InstallMethod,
    /// All supported methods; more than one enables the method selector
    pub supported_methods: &'static [InstallMethod],
    /// Per-session override chosen in the method selector; passed to the
    /// stage scripts as their single positional argument
    pub method_override: Option<InstallMethod>,
    pub scripts: ToolScripts,
    /// True for multi-tool aggregates (the AI CLI bundle)
    pub is_aggregate: bool,
    pub sub_tools: &'static [SubTool],
    /// Node.js-specific: the probe reports globally installed packages as
    /// sub-details, which a clean reinstall would destroy
    pub has_globals: bool,
}

impl Tool {
    /// Whether the user can choose between installation methods.
    pub fn supports_multiple_methods(&self) -> bool {
        self.supported_methods.len() > 1
    }

    /// Whether the tool supports a non-destructive in-place update.
    pub fn has_update_script(&self) -> bool {
        !self.scripts.update.is_empty()
    }

    /// Whether the tool has a post-install configure step.
    pub fn has_configure_script(&self) -> bool {
        !self.scripts.configure.is_empty()
    }
}

macro_rules! scripts_for {
    ($id:literal) => {
        ToolScripts {
            check: concat!("scripts/000-check/check_", $id, ".sh"),
            uninstall: concat!("scripts/001-uninstall/uninstall_", $id, ".sh"),
            install_deps: concat!("scripts/002-install-deps/install_deps_", $id, ".sh"),
            verify_deps: concat!("scripts/003-verify/verify_deps_", $id, ".sh"),
            install: concat!("scripts/004-install/install_", $id, ".sh"),
            confirm: concat!("scripts/005-confirm/confirm_", $id, ".sh"),
            configure: "",
            update: "",
        }
    };
}

/// The static catalog. Order matters: it is the display order of the
/// dashboard and the execution order of batch operations.
fn catalog() -> Vec<Tool> {
    vec![
        Tool {
            id: "wezterm",
            display_name: "WezTerm",
            description: "GPU-accelerated terminal emulator",
            category: Category::Main,
            method: InstallMethod::Source,
            supported_methods: &[InstallMethod::Snap, InstallMethod::Source],
            method_override: None,
            scripts: ToolScripts {
                update: "scripts/006-update/update_wezterm.sh",
                ..scripts_for!("wezterm")
            },
            is_aggregate: false,
            sub_tools: &[],
            has_globals: false,
        },
        Tool {
            id: "neovim",
            display_name: "Neovim",
            description: "Hyperextensible text editor",
            category: Category::Main,
            method: InstallMethod::Tarball,
            supported_methods: &[InstallMethod::Tarball],
            method_override: None,
            scripts: scripts_for!("neovim"),
            is_aggregate: false,
            sub_tools: &[],
            has_globals: false,
        },
        Tool {
            id: "nerdfonts",
            display_name: "Nerd Fonts",
            description: "Developer fonts (8 families)",
            category: Category::Main,
            method: InstallMethod::Github,
            supported_methods: &[InstallMethod::Github],
            method_override: None,
            scripts: scripts_for!("nerdfonts"),
            is_aggregate: false,
            sub_tools: &[],
            has_globals: false,
        },
        Tool {
            id: "nodejs",
            display_name: "Node.js",
            description: "JavaScript runtime via fnm",
            category: Category::Main,
            method: InstallMethod::Script,
            supported_methods: &[InstallMethod::Script],
            method_override: None,
            scripts: ToolScripts {
                update: "scripts/006-update/update_nodejs.sh",
                ..scripts_for!("nodejs")
            },
            is_aggregate: false,
            sub_tools: &[],
            has_globals: true,
        },
        Tool {
            id: "ai_tools",
            display_name: "AI CLI Tools",
            description: "Claude Code, Gemini CLI, Copilot",
            category: Category::Main,
            method: InstallMethod::Npm,
            supported_methods: &[InstallMethod::Npm],
            method_override: None,
            scripts: ToolScripts {
                update: "scripts/006-update/update_ai_tools.sh",
                ..scripts_for!("ai_tools")
            },
            is_aggregate: true,
            sub_tools: &[
                SubTool {
                    id: "claude",
                    name: "Claude Code",
                    command: "claude",
                },
                SubTool {
                    id: "gemini",
                    name: "Gemini CLI",
                    command: "gemini",
                },
                SubTool {
                    id: "copilot",
                    name: "Copilot CLI",
                    command: "copilot",
                },
            ],
            has_globals: false,
        },
        // === EXTRAS ===
        Tool {
            id: "ripgrep",
            display_name: "ripgrep",
            description: "Fast recursive grep",
            category: Category::Extras,
            method: InstallMethod::Apt,
            supported_methods: &[InstallMethod::Apt],
            method_override: None,
            scripts: scripts_for!("ripgrep"),
            is_aggregate: false,
            sub_tools: &[],
            has_globals: false,
        },
        Tool {
            id: "lazygit",
            display_name: "Lazygit",
            description: "Terminal UI for git",
            category: Category::Extras,
            method: InstallMethod::Github,
            supported_methods: &[InstallMethod::Github],
            method_override: None,
            scripts: scripts_for!("lazygit"),
            is_aggregate: false,
            sub_tools: &[],
            has_globals: false,
        },
        Tool {
            id: "starship",
            display_name: "Starship",
            description: "Cross-shell prompt",
            category: Category::Extras,
            method: InstallMethod::Script,
            supported_methods: &[InstallMethod::Script],
            method_override: None,
            scripts: scripts_for!("starship"),
            is_aggregate: false,
            sub_tools: &[],
            has_globals: false,
        },
        Tool {
            id: "zsh",
            display_name: "Zsh",
            description: "Z shell with workstation defaults",
            category: Category::Extras,
            method: InstallMethod::Apt,
            supported_methods: &[InstallMethod::Apt],
            method_override: None,
            scripts: ToolScripts {
                configure: "scripts/007-configure/configure_zsh.sh",
                ..scripts_for!("zsh")
            },
            is_aggregate: false,
            sub_tools: &[],
            has_globals: false,
        },
        Tool {
            id: "uv",
            display_name: "Python uv",
            description: "Python toolchain manager",
            category: Category::Extras,
            method: InstallMethod::Script,
            supported_methods: &[InstallMethod::Script],
            method_override: None,
            scripts: scripts_for!("uv"),
            is_aggregate: false,
            sub_tools: &[],
            has_globals: false,
        },
        Tool {
            id: "go",
            display_name: "Go",
            description: "Go toolchain",
            category: Category::Extras,
            method: InstallMethod::Tarball,
            supported_methods: &[InstallMethod::Tarball],
            method_override: None,
            scripts: scripts_for!("go"),
            is_aggregate: false,
            sub_tools: &[],
            has_globals: false,
        },
    ]
}

/// All tools shown on the main dashboard, in display order.
pub fn main_tools() -> Vec<Tool> {
    catalog()
        .into_iter()
        .filter(|t| t.category == Category::Main)
        .collect()
}

/// All tools shown on the extras screen, in display order.
pub fn extras_tools() -> Vec<Tool> {
    catalog()
        .into_iter()
        .filter(|t| t.category == Category::Extras)
        .collect()
}

/// Number of main-dashboard tools (cursor math in the orchestrator).
pub fn main_tool_count() -> usize {
    main_tools().len()
}

/// Look up a tool by id.
pub fn find(id: &str) -> Option<Tool> {
    catalog().into_iter().find(|t| t.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_tool_ids_are_unique() {
        let mut seen = HashSet::new();
        for tool in catalog() {
            assert!(seen.insert(tool.id), "duplicate tool id {}", tool.id);
        }
    }

    #[test]
    fn test_every_tool_has_core_scripts() {
        for tool in catalog() {
            assert!(!tool.scripts.check.is_empty(), "{} missing check", tool.id);
            assert!(
                !tool.scripts.install.is_empty(),
                "{} missing install",
                tool.id
            );
            assert!(
                !tool.scripts.uninstall.is_empty(),
                "{} missing uninstall",
                tool.id
            );
        }
    }

    #[test]
    fn test_multi_method_detection() {
        let wezterm = find("wezterm").unwrap();
        assert!(wezterm.supports_multiple_methods());

        let neovim = find("neovim").unwrap();
        assert!(!neovim.supports_multiple_methods());
    }

    #[test]
    fn test_update_scripts_only_where_declared() {
        assert!(find("wezterm").unwrap().has_update_script());
        assert!(find("nodejs").unwrap().has_update_script());
        assert!(!find("ripgrep").unwrap().has_update_script());
    }

    #[test]
    fn test_configure_only_zsh() {
        for tool in catalog() {
            assert_eq!(
                tool.has_configure_script(),
                tool.id == "zsh",
                "unexpected configure script on {}",
                tool.id
            );
        }
    }

    #[test]
    fn test_install_method_roundtrip() {
        use std::str::FromStr;
        for m in [
            InstallMethod::Source,
            InstallMethod::Snap,
            InstallMethod::Npm,
        ] {
            let s = m.to_string();
            assert_eq!(InstallMethod::from_str(&s).unwrap(), m);
        }
    }
}
