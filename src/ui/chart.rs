//! Chart view rendering.
//!
//! Plots the recorded values of the highest-valued constraints over time,
//! with a reference line at the allowable utilisation when utilisation is
//! being plotted.

use chrono::{DateTime, Local, Utc};
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{
        Axis, Block, Borders, Chart, Dataset, GraphType, LegendPosition, List, ListItem,
        ListState,
    },
    Frame,
};

use gridwatch_types::{format_value, ALLOWABLE_UTILISATION};

use crate::app::{App, ChartSeries};

/// Legend text of the reference line.
pub const ALLOWABLE_LABEL: &str = "Allowable utilisation";

/// Points used to draw the reference line as a dotted series.
const REFERENCE_DOTS: usize = 80;

/// Minimum width before the ranking panel is shown beside the chart.
const RANKING_MIN_WIDTH: u16 = 100;

/// Render the Chart view.
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    if app.data.is_none() {
        super::render_placeholder(frame, app, area, " Constraints ");
        return;
    }

    let series = app.chart_series();

    let (chart_area, ranking_area) = if area.width >= RANKING_MIN_WIDTH {
        let chunks = Layout::horizontal([Constraint::Fill(1), Constraint::Length(38)]).split(area);
        (chunks[0], Some(chunks[1]))
    } else {
        (area, None)
    };

    render_chart(frame, app, &series, chart_area);
    if let Some(ranking_area) = ranking_area {
        render_ranking(frame, app, &series, ranking_area);
    }
}

fn render_chart(frame: &mut Frame, app: &App, series: &[ChartSeries], area: Rect) {
    let block = Block::default()
        .title(format!(" Top {} constraints ", app.options.top_n))
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.border));

    if series.is_empty() {
        let empty = ratatui::widgets::Paragraph::new(vec![
            Line::from(""),
            Line::from(Span::styled(
                "  No constraints reported",
                Style::default().add_modifier(Modifier::DIM),
            )),
        ])
        .block(block);
        frame.render_widget(empty, area);
        return;
    }

    let reference = app.allowable_line(series).map(|[start, end]| dotted(start, end));
    let (x_bounds, y_bounds) = bounds(series, reference.is_some());

    let mut datasets: Vec<Dataset> = series
        .iter()
        .enumerate()
        .map(|(rank, s)| {
            let mut style = Style::default().fg(app.theme.series_color(rank));
            if rank == app.selected_index {
                style = style.add_modifier(Modifier::BOLD);
            }
            Dataset::default()
                .name(s.label.clone())
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Line)
                .style(style)
                .data(&s.points)
        })
        .collect();

    if let Some(ref dots) = reference {
        datasets.push(
            Dataset::default()
                .name(ALLOWABLE_LABEL)
                .marker(symbols::Marker::Dot)
                .graph_type(GraphType::Scatter)
                .style(Style::default().fg(app.theme.reference))
                .data(dots),
        );
    }

    let x_axis = Axis::default()
        .title("Time")
        .style(Style::default().fg(app.theme.border))
        .bounds(x_bounds)
        .labels(time_labels(x_bounds));

    let y_title = if reference.is_some() { "Utilisation" } else { "Value" };
    let y_axis = Axis::default()
        .title(y_title)
        .style(Style::default().fg(app.theme.border))
        .bounds(y_bounds)
        .labels(vec![
            Span::raw(format_value(y_bounds[0])),
            Span::raw(format_value((y_bounds[0] + y_bounds[1]) / 2.0)),
            Span::raw(format_value(y_bounds[1])),
        ]);

    let chart = Chart::new(datasets)
        .block(block)
        .x_axis(x_axis)
        .y_axis(y_axis)
        .legend_position(Some(LegendPosition::TopLeft))
        .hidden_legend_constraints((Constraint::Ratio(1, 2), Constraint::Ratio(1, 2)));

    frame.render_widget(chart, area);
}

/// Ranked list of plotted constraints, with the selection.
fn render_ranking(frame: &mut Frame, app: &App, series: &[ChartSeries], area: Rect) {
    let items: Vec<ListItem> = series
        .iter()
        .enumerate()
        .map(|(rank, s)| {
            ListItem::new(Line::from(vec![
                Span::styled("■ ", Style::default().fg(app.theme.series_color(rank))),
                Span::styled(format!("{:<4} ", s.status.symbol()), app.theme.status_style(s.status)),
                Span::raw(s.label.clone()),
            ]))
        })
        .collect();

    let list = List::new(items)
        .block(
            Block::default()
                .title(" Ranking [Enter:detail] ")
                .borders(Borders::ALL)
                .border_type(app.theme.border_type)
                .border_style(Style::default().fg(app.theme.border)),
        )
        .highlight_style(app.theme.selected);

    let mut state = ListState::default();
    if !series.is_empty() {
        state.select(Some(app.selected_index.min(series.len() - 1)));
    }
    frame.render_stateful_widget(list, area, &mut state);
}

/// Axis bounds covering every series.
///
/// A single instant is widened by 30 seconds each side so the point is not
/// drawn on the axis. With a reference line the y range always includes it.
fn bounds(series: &[ChartSeries], with_reference: bool) -> ([f64; 2], [f64; 2]) {
    let points = series.iter().flat_map(|s| s.points.iter());

    let (mut x_min, mut x_max) = (f64::MAX, f64::MIN);
    let (mut y_min, mut y_max) = (0.0f64, f64::MIN);
    for &(x, y) in points {
        x_min = x_min.min(x);
        x_max = x_max.max(x);
        y_min = y_min.min(y);
        y_max = y_max.max(y);
    }

    if x_min > x_max {
        // No points recorded
        let now = Utc::now().timestamp() as f64;
        (x_min, x_max) = (now, now);
    }
    if x_max - x_min < 1.0 {
        x_min -= 30.0;
        x_max += 30.0;
    }

    if with_reference {
        y_max = y_max.max(ALLOWABLE_UTILISATION);
    }
    if y_max <= y_min {
        y_max = y_min + 1.0;
    }
    let headroom = (y_max - y_min) * 0.1;

    ([x_min, x_max], [y_min, y_max + headroom])
}

/// Evenly spaced points between two ends, drawn as a dotted line.
fn dotted(start: (f64, f64), end: (f64, f64)) -> Vec<(f64, f64)> {
    if start.0 >= end.0 {
        // One instant: span the widened x range instead
        return dotted((start.0 - 30.0, start.1), (end.0 + 30.0, end.1));
    }
    let step = (end.0 - start.0) / (REFERENCE_DOTS - 1) as f64;
    (0..REFERENCE_DOTS)
        .map(|i| (start.0 + step * i as f64, start.1))
        .collect()
}

/// Local wall-clock labels for the start, middle and end of the x axis.
fn time_labels(bounds: [f64; 2]) -> Vec<Span<'static>> {
    let mid = (bounds[0] + bounds[1]) / 2.0;
    [bounds[0], mid, bounds[1]]
        .iter()
        .map(|&secs| {
            let label = DateTime::<Utc>::from_timestamp(secs as i64, 0)
                .map(|t| t.with_timezone(&Local).format("%H:%M").to_string())
                .unwrap_or_default();
            Span::raw(label)
        })
        .collect()
}
