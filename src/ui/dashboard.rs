//! Dashboard view: the main status table, diagnostics banner, and menu.

use crate::app::App;
use crate::registry;
use crate::theme::{status_style, Icons, Styles};
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

pub fn render(frame: &mut Frame, app: &App) {
    let area = frame.size();
    let chunks = Layout::vertical([
        Constraint::Length(2),
        Constraint::Min(8),
        Constraint::Length(7),
        Constraint::Length(1),
    ])
    .split(area);

    frame.render_widget(
        Paragraph::new(Line::styled(
            "devforge • developer tools, fonts, MCP servers",
            Styles::header(),
        )),
        chunks[0],
    );

    render_table(frame, chunks[1], app);
    render_menu(frame, chunks[2], app);
    super::render_help(
        frame,
        chunks[3],
        "↑↓ navigate • enter select • r refresh • a install all • u update all • q quit",
    );
}

fn render_table(frame: &mut Frame, area: Rect, app: &App) {
    let mut lines: Vec<Line> = Vec::new();

    // Diagnostics banner when cached issues exist.
    let issues = app.diag_cache.issues();
    if !issues.is_empty() {
        let critical = issues
            .iter()
            .filter(|i| i.severity == crate::diagnostics::IssueSeverity::Critical)
            .count();
        let banner = if critical > 0 {
            format!(
                "{} {} boot issues found ({} critical) - see Boot Diagnostics",
                Icons::WARNING,
                issues.len(),
                critical
            )
        } else {
            format!(
                "{} {} boot issues found - see Boot Diagnostics",
                Icons::WARNING,
                issues.len()
            )
        };
        lines.push(Line::styled(banner, Styles::warning_banner()));
        lines.push(Line::raw(""));
    }

    lines.push(Line::styled(
        format!(
            "{:<22} {:<14} {:<18} {:<18} {:<8}",
            "TOOL", "STATUS", "VERSION", "LATEST", "METHOD"
        ),
        Styles::table_header(),
    ));

    let state = match app.state.read() {
        Ok(state) => state,
        Err(_) => return,
    };

    for (i, tool) in registry::main_tools().iter().enumerate() {
        let status = state.statuses.get(tool.id);
        let probing = state.loading.contains(tool.id);

        let (status_text, version, latest, method, style) = match status {
            Some(s) => {
                let icon = if s.needs_update() {
                    Icons::WARNING
                } else if s.is_installed() {
                    Icons::CHECK
                } else {
                    Icons::CROSS
                };
                let text = if s.needs_update() {
                    format!("{} Update", icon)
                } else {
                    format!("{} {}", icon, s.status)
                };
                (
                    text,
                    s.version.clone(),
                    s.latest_version.clone(),
                    s.method.clone(),
                    status_style(s.is_installed(), s.needs_update(), false),
                )
            }
            None if probing || app.loading => (
                "… Loading".to_string(),
                "-".to_string(),
                "-".to_string(),
                "-".to_string(),
                Styles::unknown(),
            ),
            None => (
                "Unknown".to_string(),
                "-".to_string(),
                "-".to_string(),
                "-".to_string(),
                Styles::unknown(),
            ),
        };

        let row_style = if i == app.main_cursor {
            Styles::selected()
        } else {
            Styles::detail()
        };
        let cursor = if i == app.main_cursor {
            Icons::CURSOR
        } else {
            " "
        };

        lines.push(Line::from(vec![
            Span::styled(format!("{} {:<20} ", cursor, tool.display_name), row_style),
            Span::styled(format!("{:<14} ", status_text), style),
            Span::styled(
                format!("{:<18} {:<18} {:<8}", version, latest, method),
                Styles::detail(),
            ),
        ]));

        if let Some(s) = status {
            if !s.location.is_empty() && s.location != "-" {
                lines.push(Line::styled(
                    format!("    {} {}", Icons::FOLDER, s.location),
                    Styles::detail(),
                ));
            }
            for detail in &s.details {
                if !detail.is_empty() {
                    lines.push(Line::styled(format!("      {}", detail), Styles::detail()));
                }
            }
        }
    }

    frame.render_widget(
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL)),
        area,
    );
}

fn render_menu(frame: &mut Frame, area: Rect, app: &App) {
    let tool_count = registry::main_tool_count();
    let mut lines = vec![Line::raw("Choose:")];

    for (i, item) in App::dashboard_menu().iter().enumerate() {
        let selected = app.main_cursor == tool_count + i;
        let cursor = if selected { Icons::CURSOR } else { " " };
        let style = if selected {
            Styles::selected()
        } else {
            Styles::detail()
        };
        lines.push(Line::styled(format!("{} {}", cursor, item), style));
    }

    frame.render_widget(Paragraph::new(lines), area);
}
