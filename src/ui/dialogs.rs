//! Modal dialogs: confirmation, batch preview, and method selection.

use crate::app::App;
use crate::theme::{Icons, Styles};
use ratatui::layout::{Constraint, Layout};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use ratatui::Frame;

pub fn render_confirm(frame: &mut Frame, app: &App) {
    let Some(confirm) = app.confirm.as_ref() else {
        return;
    };
    let area = super::centered_rect(frame.size(), 60, 8);
    frame.render_widget(Clear, area);

    let no_style = if confirm.focused == 0 {
        Styles::button_focused()
    } else {
        Styles::button()
    };
    let yes_style = if confirm.focused == 1 {
        Styles::button_focused()
    } else {
        Styles::button()
    };

    let lines = vec![
        Line::raw(""),
        Line::raw(confirm.question.clone()),
        Line::raw(""),
        Line::from(vec![
            Span::raw("      "),
            Span::styled("  No  ", no_style),
            Span::raw("    "),
            Span::styled("  Yes  ", yes_style),
        ]),
        Line::raw(""),
        Line::styled("←/→ select • enter confirm • y/n • esc cancel", Styles::help()),
    ];

    frame.render_widget(
        Paragraph::new(lines).block(
            Block::default()
                .borders(Borders::ALL)
                .title("Confirm")
                .border_style(Styles::header()),
        ),
        area,
    );
}

pub fn render_batch_preview(frame: &mut Frame, app: &App) {
    let Some(preview) = app.batch_preview.as_ref() else {
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
            format!("{} - {} tool(s)", preview.action.label(), preview.tools.len()),
            Styles::header(),
        )),
        chunks[0],
    );

    let mut lines = vec![Line::styled(
        format!("{:<22} {:<16} {:<16}", "TOOL", "INSTALLED", "LATEST"),
        Styles::table_header(),
    )];

    for tool in &preview.tools {
        let status = app.status_of(tool.id);
        let (installed, latest) = match status {
            Some(s) => {
                let version = if s.version.is_empty() { "-".to_string() } else { s.version };
                (version, s.latest_version)
            }
            None => ("-".to_string(), "-".to_string()),
        };
        lines.push(Line::styled(
            format!("  {:<20} {:<16} {:<16}", tool.display_name, installed, latest),
            Styles::detail(),
        ));
    }

    lines.push(Line::raw(""));
    let confirm_style = if preview.cursor == 0 {
        Styles::button_focused()
    } else {
        Styles::button()
    };
    let cancel_style = if preview.cursor == 1 {
        Styles::button_focused()
    } else {
        Styles::button()
    };
    lines.push(Line::from(vec![
        Span::styled("  Confirm  ", confirm_style),
        Span::raw("    "),
        Span::styled("  Cancel  ", cancel_style),
    ]));

    frame.render_widget(
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL)),
        chunks[1],
    );
    super::render_help(frame, chunks[2], "←/→ select • enter confirm • esc back");
}

pub fn render_method_select(frame: &mut Frame, app: &App) {
    let Some(selector) = app.method_select.as_ref() else {
        return;
    };
    let area = frame.size();
    let chunks = Layout::vertical([
        Constraint::Length(2),
        Constraint::Min(8),
        Constraint::Length(1),
    ])
    .split(area);

    frame.render_widget(
        Paragraph::new(Line::styled(
            format!("{} - Installation Method", selector.tool.display_name),
            Styles::header(),
        )),
        chunks[0],
    );

    let mut lines = Vec::new();
    if !selector.system.os_name.is_empty() {
        lines.push(Line::styled(
            format!(
                "Detected: {} ({})",
                selector.system.os_name, selector.system.architecture
            ),
            Styles::detail(),
        ));
    }
    lines.push(Line::styled(
        format!(
            "Recommended: {} — {}",
            selector.recommendation.method, selector.recommendation.reason
        ),
        Styles::update_available(),
    ));
    lines.push(Line::raw(""));

    for (i, method) in selector.tool.supported_methods.iter().enumerate() {
        let selected = selector.cursor == i;
        let cursor = if selected { Icons::CURSOR } else { " " };
        let style = if selected {
            Styles::selected()
        } else {
            Styles::detail()
        };
        let mut label = format!("{} {}", cursor, method);
        if *method == selector.recommendation.method {
            label.push_str(&format!(
                " (recommended, {})",
                selector.recommendation.estimated_time
            ));
        }
        lines.push(Line::styled(label, style));
    }

    lines.push(Line::raw(""));
    for pro in &selector.recommendation.pros {
        lines.push(Line::styled(format!("  + {}", pro), Styles::installed()));
    }
    for con in &selector.recommendation.cons {
        lines.push(Line::styled(format!("  - {}", con), Styles::detail()));
    }

    lines.push(Line::raw(""));
    let marker = if selector.save_preference { "[x]" } else { "[ ]" };
    lines.push(Line::styled(
        format!("{} Remember this choice (p)", marker),
        Styles::detail(),
    ));

    frame.render_widget(
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL)),
        chunks[1],
    );
    super::render_help(
        frame,
        chunks[2],
        "↑↓ select method • p remember • enter install • esc back",
    );
}
