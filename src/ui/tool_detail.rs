//! Tool detail view: live status for one tool plus the action menu.

use crate::app::App;
use crate::theme::{status_style, Icons, Styles};
use ratatui::layout::{Constraint, Layout};
use ratatui::text::Line;
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

pub fn render(frame: &mut Frame, app: &App) {
    let Some(detail) = app.tool_detail.as_ref() else {
        return;
    };
    let area = frame.size();
    let chunks = Layout::vertical([
        Constraint::Length(2),
        Constraint::Min(6),
        Constraint::Length(1),
    ])
    .split(area);

    frame.render_widget(
        Paragraph::new(Line::styled(
            format!("{} - Actions", detail.tool.display_name),
            Styles::header(),
        )),
        chunks[0],
    );

    let status = app.status_of(detail.tool.id);
    let mut lines = Vec::new();

    lines.push(Line::styled(detail.tool.description, Styles::detail()));
    lines.push(Line::raw(""));

    match status.as_ref() {
        Some(s) => {
            let mut status_line = format!("Status: {}", s.status);
            if !s.version.is_empty() && s.version != "-" {
                status_line.push_str(&format!(" (v{})", s.version));
            }
            lines.push(Line::styled(
                status_line,
                status_style(s.is_installed(), s.needs_update(), false),
            ));
            if s.needs_update() {
                lines.push(Line::styled(
                    format!("Update available: {} → {}", s.version, s.latest_version),
                    Styles::update_available(),
                ));
            }
            if !s.location.is_empty() && s.location != "-" {
                lines.push(Line::styled(
                    format!("{} {}", Icons::FOLDER, s.location),
                    Styles::detail(),
                ));
            }
            for item in &s.details {
                lines.push(Line::styled(format!("  {}", item), Styles::detail()));
            }
        }
        None => lines.push(Line::styled("Status: Unknown", Styles::unknown())),
    }

    lines.push(Line::raw(""));
    lines.push(Line::raw("Choose action:"));

    for (i, action) in detail.actions(status.as_ref()).iter().enumerate() {
        let selected = detail.cursor == i;
        let cursor = if selected { Icons::CURSOR } else { " " };
        let style = if selected {
            Styles::selected()
        } else {
            Styles::detail()
        };
        lines.push(Line::styled(format!("{} {}", cursor, action.label()), style));
    }

    frame.render_widget(
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL)),
        chunks[1],
    );

    super::render_help(frame, chunks[2], "↑↓ navigate • enter select • esc back");
}
