//! Channel-based data source.
//!
//! Receives fetch results via a tokio mpsc channel. This is useful when the
//! dashboard is embedded in a program that already fetches records itself,
//! and for driving the app in tests.

use tokio::sync::mpsc;

use super::{DataSource, FetchEvent};

/// A data source that receives fetch results via a channel.
///
/// The producer sends [`FetchEvent`]s through the channel in the order they
/// happen, and this source hands them to the TUI one poll at a time.
///
/// # Example
///
/// ```
/// use gridwatch::{Batch, ChannelSource, FetchEvent};
///
/// // Create a channel pair
/// let (tx, source) = ChannelSource::create("embedded fetcher");
/// tx.send(FetchEvent::Batch(Batch::new(Vec::new()))).unwrap();
/// ```
#[derive(Debug)]
pub struct ChannelSource {
    receiver: mpsc::UnboundedReceiver<FetchEvent>,
    description: String,
}

impl ChannelSource {
    /// Create a new channel source.
    ///
    /// # Arguments
    ///
    /// * `receiver` - The receiving end of an unbounded channel
    /// * `source_description` - A description of where results come from
    pub fn new(receiver: mpsc::UnboundedReceiver<FetchEvent>, source_description: &str) -> Self {
        let description = format!("channel: {}", source_description);
        Self {
            receiver,
            description,
        }
    }

    /// Create a channel pair for sending fetch results to a ChannelSource.
    ///
    /// Returns (sender, source) where the sender can be used to push
    /// results and the source can be used with the dashboard.
    pub fn create(source_description: &str) -> (mpsc::UnboundedSender<FetchEvent>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        let source = Self::new(rx, source_description);
        (tx, source)
    }
}

impl DataSource for ChannelSource {
    fn poll(&mut self) -> Option<FetchEvent> {
        self.receiver.try_recv().ok()
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn shutdown(&mut self) {
        self.receiver.close();
    }
}
