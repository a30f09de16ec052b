//! User interface rendering module
//!
//! One render function per view, dispatched from [`draw`]. Rendering is
//! pure: it reads the app model and paints widgets, never mutating state.
//!
//! - `dashboard` - main status table and menu
//! - `tool_detail` - per-tool status and action menu
//! - `extras` - extras catalog and nerd-fonts screens
//! - `mcp` - MCP server dashboard, prerequisites, secrets wizard
//! - `installer` - pipeline progress, output tail, recovery buttons
//! - `diagnostics` - issue list, fix selection, fix results
//! - `dialogs` - confirmation, batch preview, method selector

mod dashboard;
mod dialogs;
mod diagnostics;
mod extras;
mod installer;
mod mcp;
mod tool_detail;

use crate::app::{App, View};
use crate::theme::Styles;
use ratatui::layout::Rect;
use ratatui::text::Line;
use ratatui::widgets::Paragraph;
use ratatui::Frame;

/// Render the active view.
pub fn draw(frame: &mut Frame, app: &App) {
    match app.view {
        View::Dashboard => dashboard::render(frame, app),
        View::ToolDetail => tool_detail::render(frame, app),
        View::Extras => extras::render_extras(frame, app),
        View::NerdFonts => extras::render_nerd_fonts(frame, app),
        View::McpServers => mcp::render_servers(frame, app),
        View::McpPrereq => mcp::render_prereqs(frame, app),
        View::SecretsWizard => mcp::render_secrets_wizard(frame, app),
        View::MethodSelect => dialogs::render_method_select(frame, app),
        View::Installer => installer::render(frame, app),
        View::Diagnostics => diagnostics::render(frame, app),
        View::Confirm => dialogs::render_confirm(frame, app),
        View::BatchPreview => dialogs::render_batch_preview(frame, app),
    }
}

/// Render a one-line help bar at the bottom of `area`.
pub(crate) fn render_help(frame: &mut Frame, area: Rect, text: &str) {
    if area.height == 0 {
        return;
    }
    let help_area = Rect {
        y: area.y + area.height - 1,
        height: 1,
        ..area
    };
    frame.render_widget(
        Paragraph::new(Line::styled(text, Styles::help())),
        help_area,
    );
}

/// A centered rect of the given size, clamped to `area`.
pub(crate) fn centered_rect(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}
