//! Centralized theme and styling for the TUI
//!
//! Single source of truth for colors, styles, and icons. Components take
//! styles from here rather than hardcoding them, so the dashboard, the
//! installer viewport and the diagnostics list stay visually consistent.

#![allow(dead_code)]

use ratatui::style::{Color, Modifier, Style};

/// Core color palette.
pub struct Colors;

impl Colors {
    /// Primary accent - borders, titles, highlights
    pub const PRIMARY: Color = Color::Cyan;
    /// Selected items, emphasis
    pub const HIGHLIGHT: Color = Color::Yellow;
    /// Muted chrome (separators, help lines)
    pub const MUTED: Color = Color::DarkGray;
    /// Default foreground
    pub const FG: Color = Color::White;

    pub const SUCCESS: Color = Color::Green;
    pub const WARNING: Color = Color::Yellow;
    pub const ERROR: Color = Color::Red;
    pub const INFO: Color = Color::Blue;
}

/// Pre-built styles used across views.
pub struct Styles;

impl Styles {
    pub fn header() -> Style {
        Style::default()
            .fg(Colors::PRIMARY)
            .add_modifier(Modifier::BOLD)
    }

    pub fn table_header() -> Style {
        Style::default()
            .fg(Colors::FG)
            .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
    }

    pub fn selected() -> Style {
        Style::default()
            .fg(Colors::HIGHLIGHT)
            .add_modifier(Modifier::BOLD)
    }

    pub fn help() -> Style {
        Style::default().fg(Colors::MUTED)
    }

    pub fn detail() -> Style {
        Style::default().fg(Color::Gray)
    }

    pub fn installed() -> Style {
        Style::default().fg(Colors::SUCCESS)
    }

    pub fn missing() -> Style {
        Style::default().fg(Colors::ERROR)
    }

    pub fn update_available() -> Style {
        Style::default().fg(Colors::WARNING)
    }

    pub fn unknown() -> Style {
        Style::default().fg(Colors::MUTED)
    }

    pub fn output_line() -> Style {
        Style::default().fg(Color::Gray)
    }

    pub fn output_error() -> Style {
        Style::default().fg(Colors::ERROR)
    }

    pub fn warning_banner() -> Style {
        Style::default()
            .fg(Colors::WARNING)
            .add_modifier(Modifier::BOLD)
    }

    pub fn button() -> Style {
        Style::default().fg(Colors::FG)
    }

    pub fn button_focused() -> Style {
        Style::default()
            .fg(Colors::PRIMARY)
            .add_modifier(Modifier::BOLD | Modifier::REVERSED)
    }
}

/// Status icons shared across the dashboard and detail views.
pub struct Icons;

impl Icons {
    pub const CHECK: &'static str = "✓";
    pub const CROSS: &'static str = "✗";
    pub const WARNING: &'static str = "⚠";
    pub const ARROW: &'static str = "→";
    pub const FOLDER: &'static str = "📁";
    pub const CURSOR: &'static str = ">";
}

/// Style for a tool status cell.
pub fn status_style(installed: bool, needs_update: bool, unknown: bool) -> Style {
    if unknown {
        Styles::unknown()
    } else if needs_update {
        Styles::update_available()
    } else if installed {
        Styles::installed()
    } else {
        Styles::missing()
    }
}
