//! Installer view: stage table, scrolling output tail, status line, and
//! recovery buttons.

use crate::app::{App, InstallerState};
use crate::theme::{Icons, Styles};
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

pub fn render(frame: &mut Frame, app: &App) {
    let Some(installer) = app.installer.as_ref() else {
        return;
    };
    let area = frame.size();
    let chunks = Layout::vertical([
        Constraint::Length(2),
        Constraint::Length(2),
        Constraint::Min(8),
        Constraint::Length(2),
        Constraint::Length(3),
    ])
    .split(area);

    // Title
    let title = match installer.state {
        InstallerState::Success => format!(
            "{} {} complete",
            Icons::CHECK,
            installer.mode.action_label()
        ),
        InstallerState::Failed => format!(
            "{} {} failed",
            Icons::CROSS,
            installer.mode.action_label()
        ),
        InstallerState::Paused => format!(
            "{} {} paused",
            Icons::WARNING,
            installer.mode.action_label()
        ),
        _ if installer.resumed => format!(
            "{} {} (resumed)",
            installer.mode.title_verb(),
            installer.tool.display_name
        ),
        _ => format!(
            "{} {}",
            installer.mode.title_verb(),
            installer.tool.display_name
        ),
    };
    let title_style = match installer.state {
        InstallerState::Success => Styles::installed(),
        InstallerState::Failed => Styles::missing(),
        InstallerState::Paused => Styles::update_available(),
        _ => Styles::header(),
    };
    frame.render_widget(Paragraph::new(Line::styled(title, title_style)), chunks[0]);

    // Stage info line (multi-stage pipelines only)
    if installer.stages.len() > 1 {
        let elapsed = installer.started_at.elapsed().as_secs();
        let info = format!(
            "Stage {}/{}: {}  (elapsed: {}s)",
            installer.current_stage_idx + 1,
            installer.stages.len(),
            installer.current_stage(),
            elapsed
        );
        frame.render_widget(
            Paragraph::new(Line::styled(info, Styles::detail())),
            chunks[1],
        );
    }

    render_output_tail(frame, chunks[2], app);
    render_stage_list(frame, chunks[3], app);
    render_footer(frame, chunks[4], app);
}

fn render_output_tail(frame: &mut Frame, area: Rect, app: &App) {
    let Some(installer) = app.installer.as_ref() else {
        return;
    };
    let visible = area.height.saturating_sub(2) as usize;
    let lines: Vec<Line> = installer
        .output
        .iter()
        .rev()
        .take(visible)
        .rev()
        .map(|line| {
            let style = if line.is_error {
                Styles::output_error()
            } else {
                Styles::output_line()
            };
            Line::styled(line.text.clone(), style)
        })
        .collect();

    frame.render_widget(
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("output")),
        area,
    );
}

fn render_stage_list(frame: &mut Frame, area: Rect, app: &App) {
    let Some(installer) = app.installer.as_ref() else {
        return;
    };
    if installer.stages.len() <= 1 {
        return;
    }

    let mut spans: Vec<Span> = Vec::new();
    for (i, row) in installer.stages.iter().enumerate() {
        if i > 0 {
            spans.push(Span::raw("  "));
        }
        let (text, style) = if row.complete {
            let icon = if row.success { Icons::CHECK } else { Icons::CROSS };
            let mut text = format!("{} {}", icon, row.stage);
            if let Some(duration) = row.duration {
                text.push_str(&format!(" ({}ms)", duration.as_millis()));
            }
            (
                text,
                if row.success {
                    Styles::installed()
                } else {
                    Styles::missing()
                },
            )
        } else if i == installer.current_stage_idx && installer.is_running() {
            (format!("{} {}", Icons::ARROW, row.stage), Styles::update_available())
        } else {
            (row.stage.to_string(), Styles::unknown())
        };
        spans.push(Span::styled(text, style));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_footer(frame: &mut Frame, area: Rect, app: &App) {
    let Some(installer) = app.installer.as_ref() else {
        return;
    };

    match installer.state {
        InstallerState::Running => {
            super::render_help(frame, area, "[ESC] Cancel");
        }
        InstallerState::Success => {
            super::render_help(frame, area, "[ESC] Back to dashboard");
        }
        InstallerState::Failed | InstallerState::Paused => {
            let mut lines = Vec::new();
            if let Some(error) = installer.last_error.as_ref() {
                lines.push(Line::styled(format!("Error: {}", error), Styles::missing()));
            }

            let mut spans: Vec<Span> = Vec::new();
            for (i, button) in installer.recovery_buttons.iter().enumerate() {
                if i > 0 {
                    spans.push(Span::raw("  "));
                }
                let label = format!(" {} [{}] ", button.label, button.shortcut);
                let style = if i == installer.recovery_focused {
                    Styles::button_focused()
                } else {
                    Styles::button()
                };
                spans.push(Span::styled(label, style));
            }
            lines.push(Line::from(spans));
            lines.push(Line::styled(
                "[←/→] Select  [Enter] Confirm  [R/C/ESC] Quick select",
                Styles::help(),
            ));

            frame.render_widget(Paragraph::new(lines), area);
        }
        InstallerState::Idle => {
            super::render_help(frame, area, "[ESC] Back");
        }
    }
}
