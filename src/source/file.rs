//! File-based data source.
//!
//! Replays a saved portal response, for offline inspection and demos.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use gridwatch_odp::{decode_response, FetchError};

use super::{DataSource, FetchEvent};

/// A data source that reads constraint records from a saved JSON response.
///
/// The file may hold either a bare array of records or the portal's
/// `{ "total_count": n, "results": [...] }` envelope, e.g. as saved with
/// `curl "$ENDPOINT?apikey=$ODP_API_KEY" > records.json`.
///
/// The source tracks the file's modification time and only returns
/// new data when the file has been updated.
#[derive(Debug)]
pub struct FileSource {
    path: PathBuf,
    description: String,
    last_modified: Option<SystemTime>,
    /// A read has been attempted at least once
    polled: bool,
    /// Re-read on the next poll even if the file is unchanged
    force: bool,
}

impl FileSource {
    /// Create a new file source for the given path.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let description = format!("file: {}", path.display());
        Self {
            path,
            description,
            last_modified: None,
            polled: false,
            force: false,
        }
    }

    /// Returns the path being replayed.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the file's modification time.
    fn get_modified_time(&self) -> Option<SystemTime> {
        fs::metadata(&self.path).ok()?.modified().ok()
    }

    /// Read and decode the file.
    fn read_file(&self) -> FetchEvent {
        match fs::read(&self.path) {
            Ok(content) => match decode_response(&content) {
                Ok(batch) => FetchEvent::Batch(batch),
                Err(e) => FetchEvent::Failed(e),
            },
            Err(e) => FetchEvent::Failed(FetchError::Connection(format!("Read error: {}", e))),
        }
    }
}

impl DataSource for FileSource {
    fn poll(&mut self) -> Option<FetchEvent> {
        let current_modified = self.get_modified_time();

        // Check if file has been modified since last read
        let file_changed = match (&self.last_modified, &current_modified) {
            (None, None) => !self.polled, // Report a missing file once
            (None, Some(_)) => true,      // First poll, or the file appeared
            (Some(_), None) => false,     // File disappeared, keep what we have
            (Some(last), Some(current)) => current > last,
        };

        if !(file_changed || std::mem::take(&mut self.force)) {
            return None;
        }

        self.polled = true;
        self.last_modified = current_modified;
        Some(self.read_file())
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn refresh(&mut self) {
        self.force = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Seek, Write};
    use tempfile::NamedTempFile;

    fn sample_json() -> &'static str {
        r#"[{"id":1,"ts":"2024-01-01T00:00:00Z","type":"thermal","value":12.5}]"#
    }

    #[test]
    fn test_file_source_new() {
        let source = FileSource::new("/tmp/records.json");
        assert_eq!(source.path(), Path::new("/tmp/records.json"));
        assert_eq!(source.description(), "file: /tmp/records.json");
    }

    #[test]
    fn test_file_source_poll_reads_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", sample_json()).unwrap();

        let mut source = FileSource::new(file.path());

        // First poll should return data
        match source.poll() {
            Some(FetchEvent::Batch(batch)) => {
                assert_eq!(batch.len(), 1);
                assert_eq!(batch.records[0].label(), "thermal, 12.5");
            }
            other => panic!("expected a batch, got {:?}", other),
        }

        // Second poll without file change should return None
        assert!(source.poll().is_none());
    }

    #[test]
    fn test_file_source_refresh_rereads() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", sample_json()).unwrap();

        let mut source = FileSource::new(file.path());
        assert!(source.poll().is_some());
        assert!(source.poll().is_none());

        source.refresh();
        assert!(matches!(source.poll(), Some(FetchEvent::Batch(_))));
        assert!(source.poll().is_none());
    }

    #[test]
    fn test_file_source_detects_changes() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", sample_json()).unwrap();

        let mut source = FileSource::new(file.path());

        // First poll
        let _ = source.poll();

        // Modify the file (need to wait a bit for mtime to change)
        std::thread::sleep(std::time::Duration::from_millis(10));
        file.rewind().unwrap();
        writeln!(
            file,
            r#"[{{"id":2,"ts":"2024-01-01T00:01:00Z","type":"voltage","value":1.5}}]"#
        )
        .unwrap();
        file.flush().unwrap();

        // Note: This may not fire on filesystems with low mtime resolution
        if let Some(FetchEvent::Batch(batch)) = source.poll() {
            assert_eq!(batch.records[0].id, "2");
        }
    }

    #[test]
    fn test_file_source_missing_file() {
        let mut source = FileSource::new("/nonexistent/path/records.json");

        match source.poll() {
            Some(FetchEvent::Failed(FetchError::Connection(message))) => {
                assert!(message.contains("Read error"));
            }
            other => panic!("expected a read failure, got {:?}", other),
        }
        // Failure is reported once, not on every poll
        assert!(source.poll().is_none());
    }

    #[test]
    fn test_file_source_invalid_json() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "not valid json").unwrap();

        let mut source = FileSource::new(file.path());

        assert!(matches!(
            source.poll(),
            Some(FetchEvent::Failed(FetchError::Schema(_)))
        ));
    }
}
