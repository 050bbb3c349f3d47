//! Live portal data source.
//!
//! Polls the Open Data Portal on a background task and hands each result to
//! the TUI through a channel, so a slow or hanging request never blocks
//! rendering.

use std::time::Duration;

use gridwatch_odp::{Batch, FetchQuery, OdpClient};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::{DataSource, FetchEvent};
use crate::recorder::CsvRecorder;

/// A data source that fetches constraint records from the portal on an
/// interval.
///
/// The first fetch starts immediately. After a fatal failure (rejected key)
/// the task reports it and stops polling. Refresh requests made while a
/// fetch is in flight are answered by that fetch.
#[derive(Debug)]
pub struct OdpSource {
    receiver: mpsc::Receiver<FetchEvent>,
    description: String,
    shutdown: watch::Sender<bool>,
    refresh: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

impl OdpSource {
    /// Spawn the polling task. Must be called within a tokio runtime.
    ///
    /// Each successful batch is appended to `recorder`, if given, before it
    /// is delivered.
    pub fn spawn(
        client: OdpClient,
        query: FetchQuery,
        interval: Duration,
        recorder: Option<CsvRecorder>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(16);
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        // One slot: repeated presses collapse into a single pending request
        let (refresh_tx, mut refresh_rx) = mpsc::channel(1);

        let description = match &query.der_name {
            Some(der) => format!("odp: {} ({})", host(client.endpoint()), der),
            None => format!("odp: {}", host(client.endpoint())),
        };

        let handle = tokio::spawn(async move {
            let mut recorder = recorder;
            loop {
                let result = tokio::select! {
                    result = client.fetch_with_retry(&query) => result,
                    _ = shutdown_rx.changed() => break,
                };
                // This fetch answers refreshes requested while it ran
                while refresh_rx.try_recv().is_ok() {}

                let mut fatal = false;
                let event = match result {
                    Ok(batch) => {
                        info!(
                            records = batch.len(),
                            skipped = batch.skipped,
                            total = ?batch.total_count,
                            "fetched constraint records"
                        );
                        if let Some(current) = recorder.take() {
                            recorder = record_batch(current, batch.clone()).await;
                        }
                        FetchEvent::Batch(batch)
                    }
                    Err(e) if e.is_fatal() => {
                        error!(error = %e, "fetch failed permanently, polling stopped");
                        fatal = true;
                        FetchEvent::Failed(e)
                    }
                    Err(e) => {
                        warn!(error = %e, "fetch failed, keeping last data");
                        FetchEvent::Failed(e)
                    }
                };

                if tx.send(event).await.is_err() || fatal {
                    // Receiver dropped, or nothing left to do
                    break;
                }

                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    _ = tokio::time::sleep(interval) => {}
                    Some(()) = refresh_rx.recv() => debug!("refresh requested"),
                }
            }
        });

        Self {
            receiver: rx,
            description,
            shutdown: shutdown_tx,
            refresh: refresh_tx,
            handle,
        }
    }

    /// Whether the polling task has stopped.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl DataSource for OdpSource {
    fn poll(&mut self) -> Option<FetchEvent> {
        self.receiver.try_recv().ok()
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn refresh(&mut self) {
        // Full means a refresh is already pending
        let _ = self.refresh.try_send(());
    }

    fn shutdown(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

/// Append a batch to the CSV log off the async workers.
///
/// Returns the recorder for the next batch, or None if the write task
/// panicked.
async fn record_batch(mut recorder: CsvRecorder, batch: Batch) -> Option<CsvRecorder> {
    let result = tokio::task::spawn_blocking(move || {
        let result = recorder.record(&batch);
        (recorder, result)
    })
    .await;

    match result {
        Ok((recorder, Ok(written))) => {
            debug!(written, "appended batch to csv log");
            Some(recorder)
        }
        Ok((recorder, Err(e))) => {
            warn!(path = %recorder.path().display(), error = %e, "failed to record batch");
            Some(recorder)
        }
        Err(e) => {
            error!(error = %e, "csv recorder task failed, recording disabled");
            None
        }
    }
}

/// Host part of a URL, for display.
fn host(url: &str) -> &str {
    let rest = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
    rest.split('/').next().unwrap_or(rest)
}
