//! Data source abstraction for receiving constraint record batches.
//!
//! This module provides a trait-based abstraction for receiving fetch results
//! from various sources (the live portal, saved response files, in-memory
//! channels).

mod channel;
mod file;
mod odp;

pub use channel::ChannelSource;
pub use file::FileSource;
pub use odp::OdpSource;

use std::fmt::Debug;

use gridwatch_odp::{Batch, FetchError};

/// Outcome of one fetch cycle.
#[derive(Debug)]
pub enum FetchEvent {
    /// A batch of well-formed records (possibly empty).
    Batch(Batch),
    /// The fetch failed after any retries.
    Failed(FetchError),
}

/// Trait for receiving constraint records from various sources.
///
/// Implementations of this trait deliver fetch results from different
/// backends - portal polling, file replay, or in-memory channels.
///
/// # Example
///
/// ```
/// use gridwatch::{DataSource, FetchEvent, FileSource};
///
/// let mut source = FileSource::new("records.json");
/// while let Some(event) = source.poll() {
///     match event {
///         FetchEvent::Batch(batch) => println!("Got {} records", batch.len()),
///         FetchEvent::Failed(error) => eprintln!("fetch failed: {}", error),
///     }
/// }
/// ```
pub trait DataSource: Send + Debug {
    /// Poll for the next fetch result.
    ///
    /// Returns `Some(event)` if a fetch has completed since the last poll,
    /// `None` otherwise. This method must not block.
    fn poll(&mut self) -> Option<FetchEvent>;

    /// Returns a human-readable description of the source.
    ///
    /// Used for display in the TUI status bar.
    fn description(&self) -> &str;

    /// Ask for a fetch now instead of waiting for the next interval.
    fn refresh(&mut self) {}

    /// Stop scheduling fetches.
    fn shutdown(&mut self) {}
}
