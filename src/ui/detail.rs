//! Detail overlay rendering.
//!
//! Displays a modal overlay with detailed information about a selected record.

use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Sparkline, Wrap},
    Frame,
};

use gridwatch_types::format_value;

use crate::app::App;

/// Minimum width required for the detail overlay to render properly.
const MIN_OVERLAY_WIDTH: u16 = 50;
/// Minimum height required for the detail overlay to render properly.
const MIN_OVERLAY_HEIGHT: u16 = 16;

/// Render the record detail as a modal overlay.
///
/// Shows the selected record's fields, its amp readings when it has them,
/// and the recorded history of its value.
pub fn render_overlay(frame: &mut Frame, app: &App, area: Rect) {
    // Skip rendering if terminal is too small for the overlay
    if area.width < MIN_OVERLAY_WIDTH || area.height < MIN_OVERLAY_HEIGHT {
        return;
    }

    let Some(row) = app.selected_row() else {
        return;
    };
    let record = &row.record;

    let overlay_width = (area.width * 80 / 100).clamp(MIN_OVERLAY_WIDTH, 90);
    let overlay_height = (area.height * 70 / 100).clamp(MIN_OVERLAY_HEIGHT, 24);

    let x = area.x + (area.width.saturating_sub(overlay_width)) / 2;
    let y = area.y + (area.height.saturating_sub(overlay_height)) / 2;
    let overlay_area = Rect::new(x, y, overlay_width, overlay_height);

    // Clear the area behind the overlay
    frame.render_widget(Clear, overlay_area);

    let chunks = Layout::vertical([
        Constraint::Min(10),   // Fields
        Constraint::Length(5), // History sparkline
        Constraint::Length(1), // Footer
    ])
    .split(overlay_area);

    // ===== FIELDS =====
    let status_style = app.theme.status_style(row.status);
    let bold = Style::default().add_modifier(Modifier::BOLD);

    let mut lines = vec![
        Line::from(vec![Span::styled(format!(" {} ", record.constraint_type), bold)]),
        Line::from(""),
        field("Id", record.id.clone()),
        field("Time", record.timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string()),
        field(
            "Location",
            record.location.clone().unwrap_or_else(|| "-".to_string()),
        ),
        Line::from(vec![
            Span::raw(" Value:       "),
            Span::styled(
                match &record.unit {
                    Some(unit) => format!("{} {}", format_value(record.value), unit),
                    None => format_value(record.value),
                },
                bold,
            ),
            Span::raw("    Status: "),
            Span::styled(
                format!("{} {}", row.status.symbol(), row.status.label()),
                status_style.add_modifier(Modifier::BOLD),
            ),
        ]),
    ];

    if let Some(ref readings) = record.readings {
        lines.push(Line::from(""));
        lines.push(field("Present", format!("{} A", format_value(readings.present_amps))));
        lines.push(field("Trim", format!("{} A", format_value(readings.trim_amps))));
        if let Some(release) = readings.release_limit_amps {
            lines.push(field("Release", format!("{} A", format_value(release))));
        }
        lines.push(field("Headroom", format!("{} A", format_value(readings.headroom_amps()))));
        if readings.breach {
            lines.push(Line::from(Span::styled(
                " Provider reports a breach",
                app.theme.status_style(crate::data::HealthStatus::Critical),
            )));
        }
    }

    let fields_block = Block::default()
        .title(" Constraint Detail ")
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.highlight));

    frame.render_widget(
        Paragraph::new(lines).block(fields_block).wrap(Wrap { trim: false }),
        chunks[0],
    );

    // ===== HISTORY =====
    let history: Vec<u64> = app
        .history
        .sparkline(&record.id)
        .into_iter()
        .map(u64::from)
        .collect();
    let points = app.history.series(&record.id).map_or(0, |s| s.points.len());

    let history_block = Block::default()
        .title(format!(" History ({} points) ", points))
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.border));

    let sparkline = Sparkline::default()
        .block(history_block)
        .data(history)
        .max(7)
        .style(status_style);
    frame.render_widget(sparkline, chunks[1]);

    // ===== FOOTER =====
    let footer = Paragraph::new(Line::from(vec![Span::styled(
        " Press Esc to close ",
        Style::default().add_modifier(Modifier::DIM),
    )]));
    frame.render_widget(footer, chunks[2]);
}

fn field(name: &str, value: String) -> Line<'static> {
    Line::from(vec![
        Span::raw(format!(" {:<12} ", format!("{}:", name))),
        Span::raw(value),
    ])
}
