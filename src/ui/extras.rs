//! Extras and Nerd Fonts views.

use crate::app::App;
use crate::theme::{status_style, Icons, Styles};
use ratatui::layout::{Constraint, Layout};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

pub fn render_extras(frame: &mut Frame, app: &App) {
    let Some(extras) = app.extras.as_ref() else {
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
        Paragraph::new(Line::styled("Extras", Styles::header())),
        chunks[0],
    );

    let state = app.state.read().ok();
    let mut lines = vec![Line::styled(
        format!("{:<20} {:<14} {:<16}", "TOOL", "STATUS", "VERSION"),
        Styles::table_header(),
    )];

    for (i, tool) in extras.tools.iter().enumerate() {
        let selected = extras.cursor == i;
        let cursor = if selected { Icons::CURSOR } else { " " };
        let row_style = if selected {
            Styles::selected()
        } else {
            Styles::detail()
        };

        let status = state
            .as_ref()
            .and_then(|s| s.statuses.get(tool.id));
        let (status_text, version, style) = match status {
            Some(s) => {
                let icon = if s.is_installed() {
                    Icons::CHECK
                } else {
                    Icons::CROSS
                };
                (
                    format!("{} {}", icon, s.status),
                    s.version.clone(),
                    status_style(s.is_installed(), s.needs_update(), false),
                )
            }
            None => ("Unknown".to_string(), "-".to_string(), Styles::unknown()),
        };

        lines.push(Line::from(vec![
            Span::styled(format!("{} {:<18} ", cursor, tool.display_name), row_style),
            Span::styled(format!("{:<14} ", status_text), style),
            Span::styled(version, Styles::detail()),
        ]));
    }

    lines.push(Line::raw(""));
    for (offset, item) in ["Install All", "Back"].iter().enumerate() {
        let selected = extras.cursor == extras.tools.len() + offset;
        let cursor = if selected { Icons::CURSOR } else { " " };
        let style = if selected {
            Styles::selected()
        } else {
            Styles::detail()
        };
        lines.push(Line::styled(format!("{} {}", cursor, item), style));
    }

    frame.render_widget(
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL)),
        chunks[1],
    );
    super::render_help(frame, chunks[2], "↑↓ navigate • enter select • esc back");
}

pub fn render_nerd_fonts(frame: &mut Frame, app: &App) {
    let Some(fonts) = app.nerd_fonts.as_ref() else {
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
            format!(
                "Nerd Fonts ({}/{} installed)",
                fonts.installed_count(),
                fonts.fonts.len()
            ),
            Styles::header(),
        )),
        chunks[0],
    );

    let mut lines = vec![Line::styled(
        format!("{:<20} {:<12} {:<10}", "FAMILY", "STATUS", "VERSION"),
        Styles::table_header(),
    )];

    for (i, font) in fonts.fonts.iter().enumerate() {
        let selected = fonts.cursor == i;
        let cursor = if selected { Icons::CURSOR } else { " " };
        let row_style = if selected {
            Styles::selected()
        } else {
            Styles::detail()
        };
        let style = if font.is_installed() {
            Styles::installed()
        } else {
            Styles::missing()
        };
        let status = if font.status.is_empty() {
            "Unknown"
        } else {
            font.status.as_str()
        };

        lines.push(Line::from(vec![
            Span::styled(format!("{} {:<18} ", cursor, font.display_name), row_style),
            Span::styled(format!("{:<12} ", status), style),
            Span::styled(font.version.clone(), Styles::detail()),
        ]));
    }

    lines.push(Line::raw(""));
    for (offset, item) in ["Install All", "Back"].iter().enumerate() {
        let selected = fonts.cursor == fonts.fonts.len() + offset;
        let cursor = if selected { Icons::CURSOR } else { " " };
        let style = if selected {
            Styles::selected()
        } else {
            Styles::detail()
        };
        lines.push(Line::styled(format!("{} {}", cursor, item), style));
    }

    frame.render_widget(
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL)),
        chunks[1],
    );
    super::render_help(frame, chunks[2], "↑↓ navigate • enter install • esc back");
}
