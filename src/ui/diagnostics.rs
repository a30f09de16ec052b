//! Diagnostics view: severity-grouped issue list, fix selection, and fix
//! results.

use crate::app::{App, DiagState};
use crate::diagnostics::{group_by_severity, IssueSeverity};
use crate::theme::{Icons, Styles};
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::Style;
use ratatui::text::Line;
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

fn severity_style(severity: IssueSeverity) -> Style {
    match severity {
        IssueSeverity::Critical => Styles::missing(),
        IssueSeverity::Moderate => Styles::update_available(),
        IssueSeverity::Low => Styles::detail(),
    }
}

pub fn render(frame: &mut Frame, app: &App) {
    let Some(diag) = app.diagnostics.as_ref() else {
        return;
    };
    let area = frame.size();
    let chunks = Layout::vertical([
        Constraint::Length(2),
        Constraint::Min(6),
        Constraint::Length(1),
    ])
    .split(area);

    let subtitle = match diag.state {
        DiagState::Scanning => "scanning…".to_string(),
        DiagState::Fixing => "applying fixes…".to_string(),
        _ if diag.from_cache => format!("cached results from {}", diag.cache_age),
        _ => format!("scanned {}", diag.cache_age),
    };
    frame.render_widget(
        Paragraph::new(Line::styled(
            format!("Boot Diagnostics ({})", subtitle),
            Styles::header(),
        )),
        chunks[0],
    );

    match diag.state {
        DiagState::Scanning => {
            frame.render_widget(
                Paragraph::new(Line::styled(
                    "Running detector scripts…",
                    Styles::detail(),
                ))
                .block(Block::default().borders(Borders::ALL)),
                chunks[1],
            );
            super::render_help(frame, chunks[2], "esc cancel");
        }
        DiagState::Fixing => {
            frame.render_widget(
                Paragraph::new(Line::styled(
                    "Applying fixes (user-level first, then privileged)…",
                    Styles::detail(),
                ))
                .block(Block::default().borders(Borders::ALL)),
                chunks[1],
            );
            super::render_help(frame, chunks[2], "esc abort between fixes");
        }
        DiagState::Ready => {
            render_issue_list(frame, chunks[1], app);
            super::render_help(
                frame,
                chunks[2],
                "↑↓ navigate • space select • a all fixable • f fix • r rescan • esc back",
            );
        }
        DiagState::FixDone => {
            render_fix_results(frame, chunks[1], app);
            super::render_help(frame, chunks[2], "enter rescan • esc back");
        }
    }
}

fn render_issue_list(frame: &mut Frame, area: Rect, app: &App) {
    let Some(diag) = app.diagnostics.as_ref() else {
        return;
    };

    let mut lines = Vec::new();
    if let Some(summary) = diag.summary.as_ref() {
        for line in summary.lines() {
            lines.push(Line::styled(line.to_string(), Styles::detail()));
        }
        lines.push(Line::raw(""));
    }

    if diag.issues.is_empty() {
        lines.push(Line::styled(
            format!("{} No boot issues found.", Icons::CHECK),
            Styles::installed(),
        ));
    } else {
        // Severity counts header, then the flat list the cursor walks.
        let groups = group_by_severity(&diag.issues);
        let counts = format!(
            "{} critical, {} moderate, {} low",
            groups[&IssueSeverity::Critical].len(),
            groups[&IssueSeverity::Moderate].len(),
            groups[&IssueSeverity::Low].len()
        );
        lines.push(Line::styled(counts, Styles::table_header()));
        lines.push(Line::raw(""));

        for (index, issue) in diag.issues.iter().enumerate() {
            let cursor = if index == diag.cursor {
                Icons::CURSOR
            } else {
                " "
            };
            let marker = if diag.selected.contains(&index) {
                "[x]"
            } else if issue.is_fixable() {
                "[ ]"
            } else {
                "   "
            };
            let style = if index == diag.cursor {
                Styles::selected()
            } else {
                severity_style(issue.severity)
            };
            lines.push(Line::styled(
                format!(
                    "{} {} {:<8} {} - {}",
                    cursor, marker, issue.severity, issue.name, issue.description
                ),
                style,
            ));
        }

        lines.push(Line::raw(""));
        lines.push(Line::styled(
            format!(
                "{} fixable, {} selected",
                diag.fixable_count(),
                diag.selected.len()
            ),
            Styles::detail(),
        ));
    }

    for error in &diag.detector_errors {
        lines.push(Line::styled(
            format!("{} {}", Icons::WARNING, error),
            Styles::update_available(),
        ));
    }

    frame.render_widget(
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL)),
        area,
    );
}

fn render_fix_results(frame: &mut Frame, area: Rect, app: &App) {
    let Some(diag) = app.diagnostics.as_ref() else {
        return;
    };
    let Some(result) = diag.fix_result.as_ref() else {
        return;
    };

    let mut lines = Vec::new();
    for line in result.summary().lines() {
        lines.push(Line::styled(line.to_string(), Styles::detail()));
    }
    lines.push(Line::raw(""));

    for fix in result.user_level.iter().chain(result.sudo_level.iter()) {
        let (icon, style) = if fix.success {
            (Icons::CHECK, Styles::installed())
        } else {
            (Icons::CROSS, Styles::missing())
        };
        let mut text = format!("{} {}", icon, fix.issue.name);
        if let Some(error) = fix.error.as_ref() {
            text.push_str(&format!(" ({})", error));
        }
        lines.push(Line::styled(text, style));
    }

    if result.needs_reboot {
        lines.push(Line::raw(""));
        lines.push(Line::styled(
            format!("{} Reboot recommended to apply changes", Icons::WARNING),
            Styles::warning_banner(),
        ));
    }

    frame.render_widget(
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL)),
        area,
    );
}
