//! Terminal UI rendering using ratatui.
//!
//! This module contains all the view-specific rendering logic for the TUI.
//! Each view is implemented in its own submodule with a `render` function.
//!
//! ## Submodules
//!
//! - [`chart`]: Line chart of the top constraints with the allowable utilisation line
//! - [`table`]: Sortable, filterable table of every record in the latest batch
//! - [`detail`]: Modal overlay showing detailed record information
//! - [`common`]: Shared components (header, tabs, status bar, help overlay)
//! - [`theme`]: Light/dark theme support with terminal auto-detection
//!
//! ## Rendering Architecture
//!
//! [`render`] draws a whole frame:
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │ Header (common::render_header)       │
//! ├──────────────────────────────────────┤
//! │ Tabs (common::render_tabs)           │
//! ├──────────────────────────────────────┤
//! │ Error banner (Error state only)      │
//! │ View Content                         │
//! │ (chart/table::render)                │
//! │                                      │
//! ├──────────────────────────────────────┤
//! │ Status Bar (common::render_status)   │
//! └──────────────────────────────────────┘
//!         ↑
//!    Overlays rendered on top:
//!    - detail::render_overlay
//!    - common::render_help
//! ```

pub mod chart;
pub mod common;
pub mod detail;
pub mod table;
pub mod theme;

pub use theme::Theme;

use ratatui::{
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use crate::app::{App, DisplayState, View};

/// Minimum terminal size for usable display.
pub const MIN_WIDTH: u16 = 60;
pub const MIN_HEIGHT: u16 = 12;

/// Row where view content starts (after header and tabs).
pub const CONTENT_START_ROW: u16 = 2;

/// Draw a full frame: chrome, current view and overlays.
pub fn render(frame: &mut Frame, app: &App) {
    let area = frame.area();

    // Check for minimum terminal size
    if area.width < MIN_WIDTH || area.height < MIN_HEIGHT {
        let msg = format!(
            "Terminal too small: {}x{}\nMinimum: {}x{}\n\nResize to continue",
            area.width, area.height, MIN_WIDTH, MIN_HEIGHT
        );
        let paragraph = Paragraph::new(msg)
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::Yellow));
        let centered = Rect::new(0, (area.height / 2).saturating_sub(2), area.width, 5.min(area.height));
        frame.render_widget(paragraph, centered);
        return;
    }

    let chunks = Layout::vertical([
        Constraint::Length(1), // Header bar
        Constraint::Length(1), // Tabs
        Constraint::Min(8),    // Content
        Constraint::Length(1), // Status bar
    ])
    .split(area);

    common::render_header(frame, app, chunks[0]);
    common::render_tabs(frame, app, chunks[1]);
    render_content(frame, app, chunks[2]);
    common::render_status_bar(frame, app, chunks[3]);

    if app.show_detail_overlay {
        detail::render_overlay(frame, app, area);
    }

    if app.show_help {
        common::render_help(frame, app, area);
    }
}

/// Render the current view, with an error banner above it in the Error state.
fn render_content(frame: &mut Frame, app: &App, area: Rect) {
    let area = if app.state == DisplayState::Error && app.data.is_some() {
        let chunks = Layout::vertical([Constraint::Length(3), Constraint::Min(5)]).split(area);
        render_error_banner(frame, app, chunks[0]);
        chunks[1]
    } else {
        area
    };

    match app.current_view {
        View::Chart => chart::render(frame, app, area),
        View::Table => table::render(frame, app, area),
    }
}

fn render_error_banner(frame: &mut Frame, app: &App, area: Rect) {
    let message = app.last_error.as_deref().unwrap_or("Fetch failed");
    let line = Line::from(vec![
        Span::styled(
            format!(" {} consecutive fetch failures: ", app.consecutive_failures),
            Style::default().fg(app.theme.critical).add_modifier(Modifier::BOLD),
        ),
        Span::raw(message.to_string()),
        Span::styled(
            " (showing last good data)",
            Style::default().add_modifier(Modifier::DIM),
        ),
    ]);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.critical));
    frame.render_widget(Paragraph::new(line).block(block), area);
}

/// Shown in place of a view before any data has arrived.
pub(crate) fn render_placeholder(frame: &mut Frame, app: &App, area: Rect, title: &str) {
    let (text, style) = match (app.state, &app.last_error) {
        (DisplayState::Error, Some(err)) => (
            format!("Unable to fetch constraint records:\n{}", err),
            Style::default().fg(app.theme.critical),
        ),
        (_, Some(err)) => (
            format!("Fetching constraint records... (last attempt failed: {})", err),
            Style::default().fg(app.theme.warning),
        ),
        _ => (
            format!("Fetching constraint records from {}...", app.source_description()),
            Style::default().add_modifier(Modifier::DIM),
        ),
    };

    let block = Block::default()
        .title(title.to_string())
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.border));
    let paragraph = Paragraph::new(format!("\n{}", text))
        .alignment(Alignment::Center)
        .style(style)
        .wrap(Wrap { trim: true })
        .block(block);
    frame.render_widget(paragraph, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::AppOptions;
    use crate::source::{ChannelSource, FetchEvent};
    use gridwatch_odp::{decode_response, FetchError};
    use ratatui::{backend::TestBackend, Terminal};
    use tokio::sync::mpsc::UnboundedSender;

    const SCENARIO: &str = r#"[{"id":1,"ts":"2024-01-01T00:00:00Z","type":"thermal","value":12.5}]"#;

    fn app() -> (UnboundedSender<FetchEvent>, App) {
        let (tx, source) = ChannelSource::create("test");
        let app = App::with_theme(Box::new(source), AppOptions::default(), Theme::dark());
        (tx, app)
    }

    fn draw(app: &App, width: u16, height: u16) -> String {
        let mut terminal = Terminal::new(TestBackend::new(width, height)).unwrap();
        terminal.draw(|frame| render(frame, app)).unwrap();
        let buffer = terminal.backend().buffer();
        let mut text = String::new();
        for y in 0..buffer.area.height {
            for x in 0..buffer.area.width {
                text.push_str(buffer[(x, y)].symbol());
            }
            text.push('\n');
        }
        text
    }

    fn send_scenario(tx: &UnboundedSender<FetchEvent>) {
        tx.send(FetchEvent::Batch(decode_response(SCENARIO.as_bytes()).unwrap()))
            .unwrap();
    }

    #[test]
    fn test_idle_shows_loading() {
        let (_tx, app) = app();
        let screen = draw(&app, 100, 30);
        assert!(screen.contains("Loading..."));
        assert!(screen.contains("Fetching constraint records"));
    }

    #[test]
    fn test_chart_shows_scenario_label() {
        let (tx, mut app) = app();
        send_scenario(&tx);
        app.reload_data();

        let screen = draw(&app, 120, 30);
        assert!(screen.contains("thermal, 12.5"));
        assert!(screen.contains("1 records"));
    }

    #[test]
    fn test_table_shows_record() {
        let (tx, mut app) = app();
        send_scenario(&tx);
        app.reload_data();
        app.set_view(View::Table);

        let screen = draw(&app, 120, 30);
        assert!(screen.contains("2024-01-01 00:00"));
        assert!(screen.contains("thermal"));
        assert!(screen.contains("12.5"));
    }

    #[test]
    fn test_stale_marker_after_failure() {
        let (tx, mut app) = app();
        send_scenario(&tx);
        tx.send(FetchEvent::Failed(FetchError::Timeout)).unwrap();
        app.reload_data();

        let screen = draw(&app, 140, 30);
        assert!(screen.contains("STALE"));
        assert!(screen.contains("thermal, 12.5"));
    }

    #[test]
    fn test_error_banner_keeps_data() {
        let (tx, mut app) = app();
        send_scenario(&tx);
        for _ in 0..4 {
            tx.send(FetchEvent::Failed(FetchError::Timeout)).unwrap();
        }
        app.reload_data();
        assert_eq!(app.state, DisplayState::Error);

        let screen = draw(&app, 120, 30);
        assert!(screen.contains("4 consecutive fetch failures"));
        assert!(screen.contains("thermal, 12.5"));
    }

    #[test]
    fn test_detail_overlay() {
        let (tx, mut app) = app();
        send_scenario(&tx);
        app.reload_data();
        app.enter_detail();
        assert!(app.show_detail_overlay);

        let screen = draw(&app, 120, 30);
        assert!(screen.contains("Constraint Detail"));
        assert!(screen.contains("2024-01-01 00:00:00 UTC"));
    }

    #[test]
    fn test_too_small_terminal() {
        let (_tx, app) = app();
        let screen = draw(&app, 40, 10);
        assert!(screen.contains("Terminal too small"));
    }
}
