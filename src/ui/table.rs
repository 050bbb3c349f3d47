//! Table view rendering.
//!
//! Displays every record of the latest batch with its value, health status
//! and a sparkline of recent values.

use std::cmp::Ordering;

use ratatui::{
    layout::{Constraint, Rect},
    style::Style,
    text::Span,
    widgets::{Block, Borders, Cell, Row, Table, TableState},
    Frame,
};

use gridwatch_types::format_value;

use crate::app::App;
use crate::data::ConstraintRow;

/// Sparkline characters (8 levels of height).
const SPARKLINE_CHARS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Column to sort by in the Table view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortColumn {
    /// Sort by value (utilisation for meter readings).
    #[default]
    Value,
    /// Sort by reading time.
    Time,
    /// Sort by constraint type / description.
    Type,
    /// Sort by constraint id.
    Id,
}

impl SortColumn {
    /// Cycle to the next sort column.
    pub fn next(self) -> Self {
        match self {
            SortColumn::Value => SortColumn::Time,
            SortColumn::Time => SortColumn::Type,
            SortColumn::Type => SortColumn::Id,
            SortColumn::Id => SortColumn::Value,
        }
    }

    fn label(self) -> &'static str {
        match self {
            SortColumn::Value => "value",
            SortColumn::Time => "time",
            SortColumn::Type => "type",
            SortColumn::Id => "id",
        }
    }
}

/// Render the Table view showing all records in a sortable table.
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let Some(ref data) = app.data else {
        super::render_placeholder(frame, app, area, " Records ");
        return;
    };

    let rows_data = app.visible_rows();

    let header = Row::new(vec![
        Cell::from(format_header("Time", SortColumn::Time, app)),
        Cell::from(format_header("Id", SortColumn::Id, app)),
        Cell::from(format_header("Constraint", SortColumn::Type, app)),
        Cell::from("Location"),
        Cell::from(format_header("Value", SortColumn::Value, app)),
        Cell::from("Trend"),
        Cell::from("Status"),
    ])
    .height(1)
    .style(app.theme.header);

    let rows: Vec<Row> = rows_data
        .iter()
        .map(|row| {
            let record = &row.record;
            let status_style = app.theme.status_style(row.status);
            let sparkline = render_sparkline(&app.history.sparkline(&record.id));

            Row::new(vec![
                Cell::from(record.timestamp.format("%Y-%m-%d %H:%M").to_string()),
                Cell::from(record.id.clone()),
                Cell::from(record.constraint_type.clone()),
                Cell::from(record.location.clone().unwrap_or_else(|| "-".to_string())),
                Cell::from(format_value(record.value)).style(status_style),
                Cell::from(sparkline),
                Cell::from(row.status.symbol()).style(status_style),
            ])
        })
        .collect();

    let widths = [
        Constraint::Length(16), // Time
        Constraint::Fill(1),    // Id
        Constraint::Fill(4),    // Constraint - gets the largest share
        Constraint::Fill(2),    // Location
        Constraint::Length(8),  // Value
        Constraint::Min(8),     // Trend/Sparkline - fixed 8 for sparkline chars
        Constraint::Min(6),     // Status - fixed minimum
    ];

    let selected_visual_index = app.selected_index.min(rows_data.len().saturating_sub(1));

    let sort_dir = if app.sort_ascending { "↑" } else { "↓" };

    // Build title with filter info
    let filter_info = if app.filter_active {
        format!(" /{}_", app.filter_text)
    } else if !app.filter_text.is_empty() {
        format!(" /{}/ [c:clear]", app.filter_text)
    } else {
        String::new()
    };

    // Show scroll position if there are items
    let position_info = if !rows_data.is_empty() {
        format!(" [{}/{}]", selected_visual_index + 1, rows_data.len())
    } else {
        String::new()
    };

    let skipped_info = if data.skipped > 0 {
        format!(" ({} malformed skipped)", data.skipped)
    } else {
        String::new()
    };

    let title = format!(
        " Records ({}/{}){} [s:sort {}{}]{}{} ",
        rows_data.len(),
        data.len(),
        skipped_info,
        app.sort_column.label(),
        sort_dir,
        filter_info,
        position_info
    );

    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_type(app.theme.border_type)
                .border_style(Style::default().fg(app.theme.border)),
        )
        .row_highlight_style(app.theme.selected)
        .highlight_symbol("▶ ");

    let mut state = TableState::default();
    state.select(Some(selected_visual_index));

    frame.render_stateful_widget(table, area, &mut state);
}

fn format_header(name: &str, col: SortColumn, app: &App) -> Span<'static> {
    if app.sort_column == col {
        let arrow = if app.sort_ascending { "↑" } else { "↓" };
        Span::raw(format!("{}{}", name, arrow))
    } else {
        Span::raw(name.to_string())
    }
}

/// Sort rows by the given column and direction.
pub fn sort_rows_by(rows: &mut [&ConstraintRow], column: SortColumn, ascending: bool) {
    rows.sort_by(|a, b| {
        let (a, b) = (&a.record, &b.record);
        let primary = match column {
            SortColumn::Value => a.value.total_cmp(&b.value),
            SortColumn::Time => a.timestamp.cmp(&b.timestamp),
            SortColumn::Type => a.constraint_type.cmp(&b.constraint_type),
            SortColumn::Id => a.id.cmp(&b.id),
        };

        let primary = if ascending {
            primary
        } else {
            primary.reverse()
        };

        // Use secondary sort by id for stability when primary values are equal
        if primary == Ordering::Equal {
            a.id.cmp(&b.id)
        } else {
            primary
        }
    });
}

fn render_sparkline(data: &[u8]) -> String {
    if data.is_empty() {
        return "        ".to_string(); // 8 spaces placeholder
    }

    // Take last 8 values
    let values: Vec<u8> = data.iter().rev().take(8).rev().copied().collect();

    values.iter().map(|&v| SPARKLINE_CHARS[v.min(7) as usize]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::HealthStatus;
    use chrono::{TimeZone, Utc};
    use gridwatch_types::ConstraintRecord;

    fn row(id: &str, minute: u32, kind: &str, value: f64) -> ConstraintRow {
        ConstraintRow {
            record: ConstraintRecord::new(
                id,
                Utc.with_ymd_and_hms(2024, 1, 1, 0, minute, 0).unwrap(),
                kind,
                value,
            ),
            status: HealthStatus::Healthy,
        }
    }

    fn ids(rows: &[&ConstraintRow]) -> Vec<String> {
        rows.iter().map(|r| r.record.id.clone()).collect()
    }

    #[test]
    fn test_sort_by_value_descending() {
        let (a, b, c) = (row("a", 0, "t", 1.0), row("b", 1, "t", 3.0), row("c", 2, "t", 2.0));
        let mut rows = vec![&a, &b, &c];
        sort_rows_by(&mut rows, SortColumn::Value, false);
        assert_eq!(ids(&rows), vec!["b", "c", "a"]);
    }

    #[test]
    fn test_sort_by_time_and_type() {
        let (a, b, c) = (row("a", 2, "voltage", 1.0), row("b", 0, "thermal", 1.0), row("c", 1, "fault", 1.0));
        let mut rows = vec![&a, &b, &c];

        sort_rows_by(&mut rows, SortColumn::Time, true);
        assert_eq!(ids(&rows), vec!["b", "c", "a"]);

        sort_rows_by(&mut rows, SortColumn::Type, true);
        assert_eq!(ids(&rows), vec!["c", "b", "a"]);
    }

    #[test]
    fn test_ties_broken_by_id() {
        let (a, b) = (row("b", 0, "t", 1.0), row("a", 0, "t", 1.0));
        let mut rows = vec![&a, &b];
        sort_rows_by(&mut rows, SortColumn::Value, false);
        assert_eq!(ids(&rows), vec!["a", "b"]);
    }

    #[test]
    fn test_sort_column_cycles() {
        let mut col = SortColumn::default();
        for _ in 0..4 {
            col = col.next();
        }
        assert_eq!(col, SortColumn::Value);
    }

    #[test]
    fn test_render_sparkline() {
        assert_eq!(render_sparkline(&[]), "        ");
        assert_eq!(render_sparkline(&[0, 7]), "▁█");
    }
}
