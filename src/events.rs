use std::time::Duration;

use anyhow::Result;
use crossterm::event::{
    self, Event, KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};

use crate::app::{App, View};

/// File written by the `e` key.
pub const EXPORT_FILE: &str = "gridwatch_export.json";

/// Poll for events with a timeout
pub fn poll_event(timeout: Duration) -> Result<Option<Event>> {
    if event::poll(timeout)? {
        Ok(Some(event::read()?))
    } else {
        Ok(None)
    }
}

/// Handle a key event
pub fn handle_key_event(app: &mut App, key: KeyEvent) {
    // Ctrl+C always quits, raw mode swallows the signal
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.quit();
        return;
    }

    // If help is shown, any key closes it
    if app.show_help {
        app.show_help = false;
        return;
    }

    // If detail overlay is shown, handle overlay-specific keys
    if app.show_detail_overlay {
        match key.code {
            KeyCode::Esc | KeyCode::Enter | KeyCode::Backspace | KeyCode::Char('q') => {
                app.close_overlay();
            }
            // Allow scrolling through records while overlay is open
            KeyCode::Up | KeyCode::Char('k') => app.select_prev(),
            KeyCode::Down | KeyCode::Char('j') => app.select_next(),
            KeyCode::PageUp => app.select_prev_n(10),
            KeyCode::PageDown => app.select_next_n(10),
            KeyCode::Home => app.select_first(),
            KeyCode::End => app.select_last(),
            _ => {}
        }
        return;
    }

    // If filter input is active, handle text input
    if app.filter_active {
        handle_filter_input(app, key);
        return;
    }

    match key.code {
        // Quit
        KeyCode::Char('q') => app.quit(),

        // View switching
        KeyCode::Tab => {
            if key.modifiers.contains(KeyModifiers::SHIFT) {
                app.prev_view();
            } else {
                app.next_view();
            }
        }
        KeyCode::BackTab => app.prev_view(),

        // Direct view access
        KeyCode::Char('1') => app.set_view(View::Chart),
        KeyCode::Char('2') => app.set_view(View::Table),

        // Navigation (up/down for items, left/right for tabs)
        KeyCode::Up | KeyCode::Char('k') => app.select_prev(),
        KeyCode::Down | KeyCode::Char('j') => app.select_next(),
        KeyCode::Left | KeyCode::Char('h') => app.prev_view(),
        KeyCode::Right | KeyCode::Char('l') => app.next_view(),
        KeyCode::PageUp => app.select_prev_n(10),
        KeyCode::PageDown => app.select_next_n(10),
        KeyCode::Home => app.select_first(),
        KeyCode::End => app.select_last(),

        // Enter detail overlay
        KeyCode::Enter => app.enter_detail(),

        // Go back (Esc and Backspace)
        KeyCode::Esc | KeyCode::Backspace => app.go_back(),

        // Fetch now
        KeyCode::Char('r') => app.request_refresh(),

        // Help
        KeyCode::Char('?') => app.toggle_help(),

        // Sorting (Table view)
        KeyCode::Char('s') if app.current_view == View::Table => app.cycle_sort(),
        KeyCode::Char('S') if app.current_view == View::Table => app.toggle_sort_direction(),

        // Filter (start typing to filter)
        KeyCode::Char('/') => {
            app.set_view(View::Table);
            app.start_filter();
        }

        // Clear filter
        KeyCode::Char('c') => {
            if !app.filter_text.is_empty() {
                app.clear_filter();
            }
        }

        // Export
        KeyCode::Char('e') => {
            let export_path = std::path::PathBuf::from(EXPORT_FILE);
            match app.export_state(&export_path) {
                Ok(()) => {
                    app.set_status_message(format!("Exported to {}", export_path.display()));
                }
                Err(e) => {
                    app.set_status_message(format!("Export failed: {}", e));
                }
            }
        }

        _ => {}
    }
}

/// Handle key input while filter is active
fn handle_filter_input(app: &mut App, key: KeyEvent) {
    match key.code {
        // Confirm filter
        KeyCode::Enter => {
            app.filter_active = false;
        }

        // Cancel filter (keep text but exit input mode)
        KeyCode::Esc => {
            app.cancel_filter();
        }

        // Backspace
        KeyCode::Backspace => {
            app.filter_pop();
            if app.filter_text.is_empty() {
                app.filter_active = false;
            }
        }

        // Type characters
        KeyCode::Char(c) => {
            app.filter_push(c);
        }

        _ => {}
    }
}

/// Handle mouse events
pub fn handle_mouse_event(app: &mut App, mouse: MouseEvent, content_start_row: u16) {
    match mouse.kind {
        // Scroll wheel
        MouseEventKind::ScrollUp => {
            app.select_prev();
        }
        MouseEventKind::ScrollDown => {
            app.select_next();
        }

        // Click to select
        MouseEventKind::Down(MouseButton::Left) => {
            let clicked_row = mouse.row;

            // Table rows start after the block border and the column header
            if app.current_view == View::Table && clicked_row > content_start_row + 1 {
                let item_row = (clicked_row - content_start_row - 2) as usize;
                if item_row < app.visible_rows().len() {
                    app.selected_index = item_row;
                }
            }

            // Check for tab clicks (row 1, after header)
            if clicked_row == 1 {
                // Approximate tab positions: Chart (0-9), Table (10-19)
                if mouse.column < 10 {
                    app.set_view(View::Chart);
                } else if mouse.column < 20 {
                    app.set_view(View::Table);
                }
            }
        }

        // Right-click goes back
        MouseEventKind::Down(MouseButton::Right) => {
            app.go_back();
        }

        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::AppOptions;
    use crate::source::{ChannelSource, FetchEvent};
    use crate::ui::Theme;
    use chrono::{TimeZone, Utc};
    use crossterm::event::KeyEventKind;
    use gridwatch_odp::Batch;
    use gridwatch_types::ConstraintRecord;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn app_with_records() -> App {
        let (tx, source) = ChannelSource::create("test");
        let mut app = App::with_theme(Box::new(source), AppOptions::default(), Theme::dark());
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        tx.send(FetchEvent::Batch(Batch::new(vec![
            ConstraintRecord::new("1", ts, "thermal", 12.5),
            ConstraintRecord::new("2", ts, "voltage", 3.0),
        ])))
        .unwrap();
        app.reload_data();
        app
    }

    #[test]
    fn test_quit_keys() {
        let mut app = app_with_records();
        handle_key_event(&mut app, key(KeyCode::Char('q')));
        assert!(!app.running);

        let mut app = app_with_records();
        handle_key_event(
            &mut app,
            KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL),
        );
        assert!(!app.running);
    }

    #[test]
    fn test_view_keys() {
        let mut app = app_with_records();
        handle_key_event(&mut app, key(KeyCode::Char('2')));
        assert_eq!(app.current_view, View::Table);
        handle_key_event(&mut app, key(KeyCode::Tab));
        assert_eq!(app.current_view, View::Chart);
        handle_key_event(&mut app, key(KeyCode::Right));
        assert_eq!(app.current_view, View::Table);
        handle_key_event(&mut app, key(KeyCode::Esc));
        assert_eq!(app.current_view, View::Chart);
    }

    #[test]
    fn test_navigation_and_detail() {
        let mut app = app_with_records();
        handle_key_event(&mut app, key(KeyCode::Down));
        assert_eq!(app.selected_index, 1);
        handle_key_event(&mut app, key(KeyCode::Down));
        assert_eq!(app.selected_index, 1);
        handle_key_event(&mut app, key(KeyCode::Home));
        assert_eq!(app.selected_index, 0);

        handle_key_event(&mut app, key(KeyCode::Enter));
        assert!(app.show_detail_overlay);
        // Quit key closes the overlay instead of quitting
        handle_key_event(&mut app, key(KeyCode::Char('q')));
        assert!(!app.show_detail_overlay);
        assert!(app.running);
    }

    #[test]
    fn test_filter_input() {
        let mut app = app_with_records();
        handle_key_event(&mut app, key(KeyCode::Char('/')));
        assert!(app.filter_active);
        assert_eq!(app.current_view, View::Table);

        for c in "volt".chars() {
            handle_key_event(&mut app, key(KeyCode::Char(c)));
        }
        handle_key_event(&mut app, key(KeyCode::Enter));
        assert!(!app.filter_active);
        assert_eq!(app.visible_rows().len(), 1);

        handle_key_event(&mut app, key(KeyCode::Char('c')));
        assert!(app.filter_text.is_empty());
    }

    #[test]
    fn test_sort_keys_only_in_table() {
        let mut app = app_with_records();
        let initial = app.sort_column;
        handle_key_event(&mut app, key(KeyCode::Char('s')));
        assert_eq!(app.sort_column, initial);

        app.set_view(View::Table);
        handle_key_event(&mut app, key(KeyCode::Char('s')));
        assert_ne!(app.sort_column, initial);
        handle_key_event(&mut app, key(KeyCode::Char('S')));
        assert!(app.sort_ascending);
    }

    #[test]
    fn test_help_closes_on_any_key() {
        let mut app = app_with_records();
        handle_key_event(&mut app, key(KeyCode::Char('?')));
        assert!(app.show_help);
        handle_key_event(&mut app, key(KeyCode::Char('x')));
        assert!(!app.show_help);
    }

    #[test]
    fn test_table_click_selects_row() {
        let mut app = app_with_records();
        app.set_view(View::Table);
        let click = MouseEvent {
            kind: MouseEventKind::Down(MouseButton::Left),
            column: 20,
            row: crate::ui::CONTENT_START_ROW + 3,
            modifiers: KeyModifiers::NONE,
        };
        handle_mouse_event(&mut app, click, crate::ui::CONTENT_START_ROW);
        assert_eq!(app.selected_index, 1);
    }

    #[test]
    fn test_key_event_kind_default_is_press() {
        assert_eq!(key(KeyCode::Char('q')).kind, KeyEventKind::Press);
    }
}
