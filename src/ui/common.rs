//! Common UI components shared across views.
//!
//! This module contains the header bar, tab bar, status bar, and help overlay.

use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Tabs},
    Frame,
};

use crate::app::{App, DisplayState, View};
use crate::data::duration::format_age;
use crate::data::HealthStatus;

/// Render the header bar with a network constraint overview.
///
/// Displays: status indicator, record counts by health, data timestamp.
pub fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let Some(ref data) = app.data else {
        let line = Line::from(vec![
            Span::styled(" GRIDWATCH ", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(match app.state {
                DisplayState::Error => "| Unavailable",
                _ => "| Loading...",
            }),
        ]);
        frame.render_widget(Paragraph::new(line), area);
        return;
    };

    let (healthy, warning, critical) = data.counts();
    let status_style = app.theme.status_style(data.worst());

    let latest = data
        .latest_timestamp()
        .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| "-".to_string());

    let mut spans = vec![
        Span::styled(" ● ", status_style),
        Span::styled("GRIDWATCH ", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw("│ "),
        Span::styled(format!("{}", healthy), Style::default().fg(app.theme.healthy)),
        Span::raw(" ok "),
        if warning > 0 {
            Span::styled(format!("{}", warning), Style::default().fg(app.theme.warning))
        } else {
            Span::styled("0", Style::default().add_modifier(Modifier::DIM))
        },
        Span::raw(" near "),
        if critical > 0 {
            Span::styled(
                format!("{}", critical),
                Style::default().fg(app.theme.critical).add_modifier(Modifier::BOLD),
            )
        } else {
            Span::styled("0", Style::default().add_modifier(Modifier::DIM))
        },
        Span::raw(" over │ "),
        Span::styled(format!("{}", data.len()), Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(" records"),
    ];
    if let Some(total) = data.total_count {
        spans.push(Span::raw(format!(" of {}", total)));
    }
    spans.push(Span::raw(format!(" │ latest {}", latest)));

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// Render the tab bar showing available views.
///
/// Highlights the currently active view.
pub fn render_tabs(frame: &mut Frame, app: &App, area: Rect) {
    let titles: Vec<Line> = vec![Line::from(" 1:Chart "), Line::from(" 2:Table ")];

    let selected = match app.current_view {
        View::Chart => 0,
        View::Table => 1,
    };

    let tabs = Tabs::new(titles)
        .select(selected)
        .style(app.theme.tab_inactive)
        .highlight_style(app.theme.tab_active)
        .divider("|");

    frame.render_widget(tabs, area);
}

/// Render the status bar at the bottom.
///
/// Shows: data source, time since last successful fetch, staleness marker,
/// available controls. Also displays temporary status messages and errors.
pub fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    // Check for temporary status message first
    if let Some(msg) = app.get_status_message() {
        let paragraph =
            Paragraph::new(format!(" {} ", msg)).style(Style::default().fg(app.theme.highlight));
        frame.render_widget(paragraph, area);
        return;
    }

    let controls = if app.filter_active {
        "Type to search | Enter:apply Esc:cancel"
    } else {
        match app.current_view {
            View::Chart => "↑↓:select Tab:switch Enter:detail r:refresh ?:help q:quit",
            View::Table => "/:search s:sort S:reverse Enter:detail r:refresh ?:help q:quit",
        }
    };

    let age = app
        .data_age()
        .map(|d| format!("Updated {} ago", format_age(d)))
        .unwrap_or_else(|| "Waiting for data".to_string());

    let mut spans = vec![Span::styled(
        format!(" {} | {}", app.source_description(), age),
        Style::default().add_modifier(Modifier::DIM),
    )];

    if app.is_stale() {
        spans.push(Span::styled(
            format!(" | STALE ({} failed)", app.consecutive_failures),
            app.theme.status_style(HealthStatus::Warning),
        ));
    } else if app.state == DisplayState::Idle {
        if let Some(ref err) = app.last_error {
            spans.push(Span::styled(
                format!(" | {}", err),
                app.theme.status_style(HealthStatus::Warning),
            ));
        }
    }

    spans.push(Span::styled(
        format!(" | {}", controls),
        Style::default().add_modifier(Modifier::DIM),
    ));

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// Render the help overlay with keyboard shortcuts.
///
/// Displayed as a centered modal on top of the current view.
pub fn render_help(frame: &mut Frame, app: &App, area: Rect) {
    let help_text = vec![
        Line::from(vec![Span::styled("Keyboard Shortcuts", app.theme.header)]),
        Line::from(""),
        Line::from(vec![Span::styled(
            " Navigation",
            Style::default().add_modifier(Modifier::BOLD),
        )]),
        Line::from("  ←/→ Tab     Switch views"),
        Line::from("  1/2         Chart / Table"),
        Line::from("  ↑/↓ j/k     Navigate list"),
        Line::from("  PgUp/PgDn   Jump 10 items"),
        Line::from("  Home/End    Jump to first/last"),
        Line::from("  Enter       View detail"),
        Line::from("  Esc         Go back"),
        Line::from(""),
        Line::from(vec![Span::styled(
            " Table",
            Style::default().add_modifier(Modifier::BOLD),
        )]),
        Line::from("  /         Start filter/search"),
        Line::from("  c         Clear filter"),
        Line::from("  s         Cycle sort column"),
        Line::from("  S         Toggle sort direction"),
        Line::from(""),
        Line::from(vec![Span::styled(
            " General",
            Style::default().add_modifier(Modifier::BOLD),
        )]),
        Line::from("  r         Fetch now"),
        Line::from("  e         Export to JSON"),
        Line::from("  q         Quit"),
        Line::from(""),
        Line::from(vec![Span::styled(
            "Press any key to close",
            Style::default().add_modifier(Modifier::DIM),
        )]),
    ];

    let block = Block::default()
        .title(" Help ")
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.highlight));

    let paragraph = Paragraph::new(help_text).block(block);

    // Center the help overlay - responsive to terminal size
    let help_width = 42u16.min(area.width.saturating_sub(4));
    let help_height = 26u16.min(area.height.saturating_sub(2));
    let x = area.x + (area.width.saturating_sub(help_width)) / 2;
    let y = area.y + (area.height.saturating_sub(help_height)) / 2;
    let help_area = Rect::new(x, y, help_width, help_height);

    // Clear the area behind the help
    frame.render_widget(ratatui::widgets::Clear, help_area);
    frame.render_widget(paragraph, help_area);
}
