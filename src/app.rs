//! Application state and navigation logic.

use std::time::{Duration, Instant};

use anyhow::Result;
use gridwatch_types::{format_value, ALLOWABLE_UTILISATION};
use tracing::{debug, error, warn};

use crate::data::{ConstraintData, ConstraintRow, HealthStatus, History, Thresholds};
use crate::source::{DataSource, FetchEvent};
use crate::ui::table::{sort_rows_by, SortColumn};
use crate::ui::Theme;

/// Longest constraint description shown in chart legends.
pub const LEGEND_MAX_CHARS: usize = 50;

/// The current view/tab in the TUI.
///
/// Record detail is shown as an overlay (controlled by `App::show_detail_overlay`)
/// rather than as a separate view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    /// Line chart of the highest-valued constraints over time.
    Chart,
    /// Every record of the latest batch.
    Table,
}

impl View {
    /// Cycle to the next view.
    pub fn next(self) -> Self {
        match self {
            View::Chart => View::Table,
            View::Table => View::Chart,
        }
    }

    /// Cycle to the previous view.
    pub fn prev(self) -> Self {
        // Two views: previous and next coincide
        self.next()
    }

    /// Returns the display label for this view.
    pub fn label(&self) -> &'static str {
        match self {
            View::Chart => "Chart",
            View::Table => "Table",
        }
    }
}

/// What the dashboard is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayState {
    /// No batch received yet.
    Idle,
    /// Showing the last good batch, possibly stale.
    Displaying,
    /// Too many consecutive failures, or a fatal one.
    Error,
}

/// Tunables for the app, usually taken from [`Settings`](crate::Settings).
#[derive(Debug, Clone)]
pub struct AppOptions {
    pub thresholds: Thresholds,
    /// Constraints plotted on the chart.
    pub top_n: usize,
    /// Points kept per constraint.
    pub max_history: usize,
    /// Consecutive failed fetches tolerated; one more switches to the error
    /// display.
    pub failure_threshold: u32,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            top_n: 10,
            max_history: crate::data::history::DEFAULT_MAX_POINTS,
            failure_threshold: 3,
        }
    }
}

/// One line on the chart.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSeries {
    pub id: String,
    /// Legend text, e.g. `"thermal, 12.5"`.
    pub label: String,
    /// `(unix seconds, value)` points in time order.
    pub points: Vec<(f64, f64)>,
    pub status: HealthStatus,
    /// Whether the values are utilisation ratios.
    pub utilisation: bool,
}

/// Main application state.
pub struct App {
    pub running: bool,
    pub current_view: View,
    pub show_help: bool,
    pub show_detail_overlay: bool,

    // Data source
    source: Box<dyn DataSource>,
    pub data: Option<ConstraintData>,
    pub history: History,
    pub options: AppOptions,

    // Fetch state
    pub state: DisplayState,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
    /// Set when a failure ended the session.
    pub fatal_error: Option<String>,
    pub last_success: Option<Instant>,

    // Navigation state
    pub selected_index: usize,

    // Sorting (Table view)
    pub sort_column: SortColumn,
    pub sort_ascending: bool,

    // Search/filter
    pub filter_text: String,
    pub filter_active: bool,

    // UI
    pub theme: Theme,

    // Status message (temporary feedback)
    pub status_message: Option<(String, Instant)>,
}

impl App {
    /// Create a new App with the given data source and options.
    pub fn new(source: Box<dyn DataSource>, options: AppOptions) -> Self {
        Self::with_theme(source, options, Theme::auto_detect())
    }

    /// Create a new App with an explicit theme.
    pub fn with_theme(source: Box<dyn DataSource>, options: AppOptions, theme: Theme) -> Self {
        Self {
            running: true,
            current_view: View::Chart,
            show_help: false,
            show_detail_overlay: false,
            source,
            data: None,
            history: History::new(options.max_history),
            options,
            state: DisplayState::Idle,
            consecutive_failures: 0,
            last_error: None,
            fatal_error: None,
            last_success: None,
            selected_index: 0,
            sort_column: SortColumn::default(),
            sort_ascending: false, // Default descending (highest value first)
            filter_text: String::new(),
            filter_active: false,
            theme,
            status_message: None,
        }
    }

    /// Returns a description of the current data source.
    pub fn source_description(&self) -> &str {
        self.source.description()
    }

    /// Set a temporary status message that will be shown for a few seconds.
    pub fn set_status_message(&mut self, message: String) {
        self.status_message = Some((message, Instant::now()));
    }

    /// Get the current status message if it hasn't expired (3 seconds).
    pub fn get_status_message(&self) -> Option<&str> {
        if let Some((msg, time)) = &self.status_message {
            if time.elapsed() < Duration::from_secs(3) {
                return Some(msg);
            }
        }
        None
    }

    /// Drain completed fetches from the data source.
    ///
    /// Returns true if anything was received.
    pub fn reload_data(&mut self) -> bool {
        let mut received = false;
        while let Some(event) = self.source.poll() {
            self.apply_event(event);
            received = true;
        }
        received
    }

    /// Apply one fetch result to the display state.
    pub fn apply_event(&mut self, event: FetchEvent) {
        match event {
            FetchEvent::Batch(batch) => {
                let data = ConstraintData::from_batch(batch, &self.options.thresholds);
                let added = self.history.record(&data);
                debug!(
                    records = data.len(),
                    skipped = data.skipped,
                    points_added = added,
                    "displaying new batch"
                );

                self.data = Some(data);
                self.state = DisplayState::Displaying;
                self.consecutive_failures = 0;
                self.last_error = None;
                self.last_success = Some(Instant::now());
                self.clamp_selection();
            }
            FetchEvent::Failed(e) if e.is_fatal() => {
                error!(error = %e, "fatal fetch error, stopping");
                let message = e.to_string();
                self.state = DisplayState::Error;
                self.last_error = Some(message.clone());
                self.fatal_error = Some(message);
                self.quit();
            }
            FetchEvent::Failed(e) => {
                self.consecutive_failures += 1;
                self.last_error = Some(e.to_string());
                if self.consecutive_failures > self.options.failure_threshold {
                    if self.state != DisplayState::Error {
                        warn!(
                            failures = self.consecutive_failures,
                            error = %e,
                            "too many consecutive fetch failures"
                        );
                    }
                    self.state = DisplayState::Error;
                }
            }
        }
    }

    /// Ask the source to fetch now.
    pub fn request_refresh(&mut self) {
        self.source.refresh();
        self.set_status_message("Refreshing...".to_string());
    }

    /// Whether the shown data predates a failed fetch.
    pub fn is_stale(&self) -> bool {
        self.data.is_some() && self.consecutive_failures > 0
    }

    /// Time since the last successful fetch.
    pub fn data_age(&self) -> Option<Duration> {
        self.last_success.map(|t| t.elapsed())
    }

    /// Rows of the Table view, filtered and sorted.
    pub fn visible_rows(&self) -> Vec<&ConstraintRow> {
        let Some(ref data) = self.data else {
            return Vec::new();
        };
        let mut rows: Vec<&ConstraintRow> =
            data.rows.iter().filter(|row| self.matches_row(row)).collect();
        sort_rows_by(&mut rows, self.sort_column, self.sort_ascending);
        rows
    }

    /// Rows plotted on the Chart view, highest value first.
    pub fn chart_rows(&self) -> Vec<&ConstraintRow> {
        match self.data {
            Some(ref data) => data.top(self.options.top_n),
            None => Vec::new(),
        }
    }

    /// Number of selectable items in the current view.
    fn item_count(&self) -> usize {
        match self.current_view {
            View::Chart => self.chart_rows().len(),
            View::Table => self.visible_rows().len(),
        }
    }

    /// The row under the cursor in the current view.
    pub fn selected_row(&self) -> Option<&ConstraintRow> {
        match self.current_view {
            View::Chart => self.chart_rows().get(self.selected_index).copied(),
            View::Table => self.visible_rows().get(self.selected_index).copied(),
        }
    }

    /// Series for the chart: one per plotted constraint, from history.
    pub fn chart_series(&self) -> Vec<ChartSeries> {
        self.chart_rows()
            .into_iter()
            .map(|row| {
                let points = self
                    .history
                    .series(&row.record.id)
                    .map(|s| {
                        s.points
                            .iter()
                            .map(|(ts, v)| (ts.timestamp() as f64, *v))
                            .collect()
                    })
                    .unwrap_or_default();
                ChartSeries {
                    id: row.record.id.clone(),
                    label: format!(
                        "{}, {}",
                        row.record.short_type(LEGEND_MAX_CHARS),
                        format_value(row.record.value)
                    ),
                    points,
                    status: row.status,
                    utilisation: row.record.is_utilisation(),
                }
            })
            .collect()
    }

    /// Reference line at the allowable utilisation across the plotted time
    /// range. Only drawn when utilisation series are plotted.
    pub fn allowable_line(&self, series: &[ChartSeries]) -> Option<[(f64, f64); 2]> {
        if !series.iter().any(|s| s.utilisation) {
            return None;
        }
        let (start, end) = self.history.time_bounds(series.iter().map(|s| s.id.as_str()))?;
        Some([
            (start.timestamp() as f64, ALLOWABLE_UTILISATION),
            (end.timestamp() as f64, ALLOWABLE_UTILISATION),
        ])
    }

    fn clamp_selection(&mut self) {
        let count = self.item_count();
        if self.selected_index >= count {
            self.selected_index = count.saturating_sub(1);
        }
    }

    /// Switch to the next view.
    pub fn next_view(&mut self) {
        self.set_view(self.current_view.next());
    }

    /// Switch to the previous view.
    pub fn prev_view(&mut self) {
        self.set_view(self.current_view.prev());
    }

    /// Switch to a specific view.
    pub fn set_view(&mut self, view: View) {
        self.current_view = view;
        self.selected_index = 0;
    }

    /// Move selection down by one item.
    pub fn select_next(&mut self) {
        self.select_next_n(1);
    }

    /// Move selection up by one item.
    pub fn select_prev(&mut self) {
        self.select_prev_n(1);
    }

    /// Move selection down by n items.
    pub fn select_next_n(&mut self, n: usize) {
        let max = self.item_count().saturating_sub(1);
        self.selected_index = (self.selected_index + n).min(max);
    }

    /// Move selection up by n items.
    pub fn select_prev_n(&mut self, n: usize) {
        self.selected_index = self.selected_index.saturating_sub(n);
    }

    /// Jump to the first item in the list.
    pub fn select_first(&mut self) {
        self.selected_index = 0;
    }

    /// Jump to the last item in the list.
    pub fn select_last(&mut self) {
        self.selected_index = self.item_count().saturating_sub(1);
    }

    /// Open the detail overlay for the currently selected record.
    pub fn enter_detail(&mut self) {
        if self.selected_row().is_some() {
            self.show_detail_overlay = true;
        }
    }

    /// Navigate back: close overlay first, then return to the Chart view.
    pub fn go_back(&mut self) {
        if self.show_detail_overlay {
            self.show_detail_overlay = false;
            return;
        }
        if self.current_view != View::Chart {
            self.set_view(View::Chart);
        }
    }

    /// Close the detail overlay if open.
    pub fn close_overlay(&mut self) {
        self.show_detail_overlay = false;
    }

    /// Toggle the help overlay.
    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }

    /// Cycle to the next sort column.
    pub fn cycle_sort(&mut self) {
        self.sort_column = self.sort_column.next();
    }

    /// Toggle sort direction between ascending and descending.
    pub fn toggle_sort_direction(&mut self) {
        self.sort_ascending = !self.sort_ascending;
    }

    /// Enter filter input mode (starts capturing keystrokes for search).
    pub fn start_filter(&mut self) {
        self.filter_active = true;
    }

    /// Exit filter input mode without clearing the filter text.
    pub fn cancel_filter(&mut self) {
        self.filter_active = false;
    }

    /// Clear the filter text and exit filter mode.
    pub fn clear_filter(&mut self) {
        self.filter_text.clear();
        self.filter_active = false;
    }

    /// Append a character to the filter text.
    pub fn filter_push(&mut self, c: char) {
        self.filter_text.push(c);
        self.clamp_selection();
    }

    /// Remove the last character from the filter text.
    pub fn filter_pop(&mut self) {
        self.filter_text.pop();
    }

    /// Check if a row matches the current filter (type, id or location).
    pub fn matches_row(&self, row: &ConstraintRow) -> bool {
        if self.filter_text.is_empty() {
            return true;
        }
        let search = self.filter_text.to_lowercase();
        let record = &row.record;
        record.constraint_type.to_lowercase().contains(&search)
            || record.id.to_lowercase().contains(&search)
            || record
                .location
                .as_deref()
                .is_some_and(|l| l.to_lowercase().contains(&search))
    }

    /// Signal the application to quit.
    pub fn quit(&mut self) {
        self.running = false;
    }

    /// Stop the data source. Called once the render loop has ended.
    pub fn shutdown(&mut self) {
        self.source.shutdown();
    }

    /// Export current state to a file.
    pub fn export_state(&self, path: &std::path::Path) -> Result<()> {
        let Some(ref data) = self.data else {
            anyhow::bail!("No data to export");
        };

        let mut export = data.export_json();
        export["stale"] = serde_json::json!(self.is_stale());
        let json = serde_json::to_string_pretty(&export)?;
        std::fs::write(path, json)?;

        Ok(())
    }
}
