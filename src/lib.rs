//! # gridwatch
//!
//! A live terminal dashboard for electrical network constraints published on
//! UK Power Networks' Open Data Portal.
//!
//! Constraint records are fetched periodically from the portal's records API,
//! appended to a CSV log, and plotted as a line chart of the highest-valued
//! constraints, with an allowable-utilisation reference line when the values
//! are utilisation ratios. A failed fetch never clears the screen: the last
//! good data stays up, marked stale.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Application                          │
//! │  ┌─────────┐    ┌──────────┐    ┌─────────┐    ┌─────────┐ │
//! │  │  app    │───▶│   data   │───▶│   ui    │───▶│ Terminal│ │
//! │  │ (state) │    │(processing)   │(rendering)   │         │ │
//! │  └────┬────┘    └──────────┘    └─────────┘    └─────────┘ │
//! │       │                                                     │
//! │       ▼                                                     │
//! │  ┌─────────┐        ┌──────────┐                            │
//! │  │ source  │◀───────│ recorder │◀── OdpSource (portal poll) │
//! │  │ (input) │        │  (CSV)   │                            │
//! │  └─────────┘        └──────────┘                            │
//! │       ▲                                                     │
//! │       └── FileSource | ChannelSource                        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **[`app`]**: Application state, fetch-failure tracking, view navigation
//! - **[`source`]**: Data source abstraction ([`DataSource`] trait) with implementations
//!   for portal polling, saved response files, and channel-based input
//! - **[`data`]**: Data models and processing - converts fetched batches into
//!   health-annotated [`ConstraintData`] and keeps per-constraint [`History`]
//! - **[`recorder`]**: Deduplicating CSV log of every fetched record
//! - **[`config`]**: Layered [`Settings`] and the portal [`ApiKey`]
//! - **[`ui`]**: Terminal rendering using ratatui - chart, table, detail overlay,
//!   and theme support
//!
//! ## Usage
//!
//! ### As a CLI tool
//!
//! ```bash
//! # Live dashboard (reads ODP_API_KEY from the environment or .env)
//! gridwatch
//!
//! # Only constraints for one DER site, polling every minute
//! gridwatch --der Wissington --interval 1m
//!
//! # Fetch once and print the ranked constraints
//! gridwatch --once
//!
//! # Replay a saved portal response
//! gridwatch --file response.json
//! ```
//!
//! ### As a library with file source
//!
//! ```
//! use gridwatch::{App, AppOptions, FileSource};
//!
//! let source = Box::new(FileSource::new("response.json"));
//! let app = App::new(source, AppOptions::default());
//! ```
//!
//! ### As a library with channel source
//!
//! ```
//! use gridwatch::{App, AppOptions, Batch, ChannelSource, FetchEvent};
//!
//! // Create a channel for delivering fetch results
//! let (tx, source) = ChannelSource::create("replay");
//! let mut app = App::new(Box::new(source), AppOptions::default());
//!
//! tx.send(FetchEvent::Batch(Batch::new(Vec::new()))).unwrap();
//! assert!(app.reload_data());
//! ```
//!
//! ### Polling the portal
//!
//! ```no_run
//! use gridwatch::{ApiKey, OdpSource, Settings};
//!
//! # tokio_test::block_on(async {
//! let settings = Settings::load(None)?;
//! let client = settings.client(&ApiKey::from_env()?)?;
//! let source = OdpSource::spawn(client, settings.query(), settings.poll_interval, None);
//! # Ok::<(), anyhow::Error>(())
//! # });
//! ```

pub mod app;
pub mod config;
pub mod data;
pub mod events;
pub mod recorder;
pub mod source;
pub mod ui;

// Re-export main types for convenience
pub use app::{App, AppOptions, ChartSeries, DisplayState, View};
pub use config::{ApiKey, ConfigError, Settings};
pub use data::{ConstraintData, ConstraintRow, HealthStatus, History, Series, Thresholds};
pub use recorder::CsvRecorder;
pub use source::{ChannelSource, DataSource, FetchEvent, FileSource, OdpSource};

pub use gridwatch_odp::{Batch, FetchError, FetchQuery, OdpClient};
pub use gridwatch_types::{AmpReadings, ConstraintRecord};
