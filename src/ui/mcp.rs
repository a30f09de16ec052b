//! MCP server dashboard, prerequisite detail, and secrets wizard views.

use crate::app::App;
use crate::registry::McpTransport;
use crate::theme::{Icons, Styles};
use ratatui::layout::{Constraint, Layout};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

pub fn render_servers(frame: &mut Frame, app: &App) {
    let Some(model) = app.mcp_servers.as_ref() else {
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
        Paragraph::new(Line::styled("MCP Servers", Styles::header())),
        chunks[0],
    );

    let mut lines = vec![Line::styled(
        format!(
            "{:<16} {:<10} {:<14} {:<12}",
            "SERVER", "TRANSPORT", "PREREQS", "SECRETS"
        ),
        Styles::table_header(),
    )];

    for (i, server) in model.servers.iter().enumerate() {
        let selected = model.cursor == i;
        let cursor = if selected { Icons::CURSOR } else { " " };
        let row_style = if selected {
            Styles::selected()
        } else {
            Styles::detail()
        };

        let transport = match server.transport {
            McpTransport::Http => "http",
            McpTransport::Stdio => "stdio",
        };

        let (prereqs, prereq_style) = match model.summaries.get(server.id) {
            Some(summary) if summary.prereqs_total > 0 => {
                let ok = summary.prereqs_passed == summary.prereqs_total;
                (
                    format!("{}/{} passed", summary.prereqs_passed, summary.prereqs_total),
                    if ok {
                        Styles::installed()
                    } else {
                        Styles::missing()
                    },
                )
            }
            Some(_) => ("none".to_string(), Styles::detail()),
            None if model.checking => ("checking…".to_string(), Styles::unknown()),
            None => ("-".to_string(), Styles::unknown()),
        };

        let secrets = match model.summaries.get(server.id) {
            Some(summary) if summary.secrets_required > 0 => format!(
                "{}/{} set",
                summary.secrets_present, summary.secrets_required
            ),
            _ if server.secrets.is_empty() => "none".to_string(),
            _ => "-".to_string(),
        };

        lines.push(Line::from(vec![
            Span::styled(format!("{} {:<14} ", cursor, server.display_name), row_style),
            Span::styled(format!("{:<10} ", transport), Styles::detail()),
            Span::styled(format!("{:<14} ", prereqs), prereq_style),
            Span::styled(secrets, Styles::detail()),
        ]));
        lines.push(Line::styled(
            format!("    {}", server.description),
            Styles::detail(),
        ));
    }

    frame.render_widget(
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL)),
        chunks[1],
    );
    super::render_help(
        frame,
        chunks[2],
        "↑↓ navigate • enter prerequisites • s secrets • esc back",
    );
}

pub fn render_prereqs(frame: &mut Frame, app: &App) {
    let Some(model) = app.mcp_prereq.as_ref() else {
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
            format!("{} - Prerequisites", model.server.display_name),
            Styles::header(),
        )),
        chunks[0],
    );

    let mut lines = Vec::new();
    if model.results.is_empty() {
        lines.push(Line::styled(
            "No prerequisites required.",
            Styles::detail(),
        ));
    }
    for result in &model.results {
        let (icon, style) = if result.passed {
            (Icons::CHECK, Styles::installed())
        } else {
            (Icons::CROSS, Styles::missing())
        };
        lines.push(Line::styled(
            format!("{} {}", icon, result.prerequisite.name),
            style,
        ));
        if !result.passed {
            lines.push(Line::styled(
                format!("    {}", result.prerequisite.fix_instructions),
                Styles::detail(),
            ));
        }
    }

    for secret in model.server.secrets {
        lines.push(Line::raw(""));
        lines.push(Line::styled(
            format!(
                "Secret: {} ({})",
                secret.name,
                if secret.required { "required" } else { "optional" }
            ),
            Styles::detail(),
        ));
        lines.push(Line::styled(
            format!("    Get it at {}", secret.get_url),
            Styles::detail(),
        ));
    }

    frame.render_widget(
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL)),
        chunks[1],
    );
    super::render_help(frame, chunks[2], "esc back");
}

pub fn render_secrets_wizard(frame: &mut Frame, app: &App) {
    let Some(wizard) = app.secrets_wizard.as_ref() else {
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
            format!("{} - Secrets", wizard.server_name),
            Styles::header(),
        )),
        chunks[0],
    );

    let mut lines = Vec::new();

    if wizard.done {
        lines.push(Line::styled(
            format!("{} Saved {} secret(s).", Icons::CHECK, wizard.saved),
            Styles::installed(),
        ));
        lines.push(Line::raw(""));
        lines.push(Line::styled("Press any key to continue.", Styles::detail()));
    } else if let Some(secret) = wizard.current_secret() {
        lines.push(Line::styled(
            format!(
                "Secret {}/{}: {}",
                wizard.index + 1,
                wizard.secrets.len(),
                secret.name
            ),
            Styles::detail(),
        ));
        lines.push(Line::styled(secret.description, Styles::detail()));
        lines.push(Line::styled(
            format!("Get it at {}", secret.get_url),
            Styles::detail(),
        ));
        lines.push(Line::raw(""));
        // Never echo the value itself.
        let masked = "•".repeat(wizard.input.chars().count());
        lines.push(Line::from(vec![
            Span::styled(format!("{}= ", secret.env_var), Styles::detail()),
            Span::styled(masked, Styles::selected()),
        ]));
        lines.push(Line::raw(""));
        lines.push(Line::styled(
            "enter save • enter (empty) skip • esc cancel",
            Styles::help(),
        ));
    }

    frame.render_widget(
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL)),
        chunks[1],
    );
    super::render_help(frame, chunks[2], "values are stored in a 0600 env file");
}
