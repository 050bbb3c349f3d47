//! Data models and processing for fetched constraint records.
//!
//! This module handles the transformation of fetched record batches into
//! structured, health-annotated data suitable for display.
//!
//! ## Submodules
//!
//! - [`duration`]: Parsing and formatting of duration strings (e.g., "30s", "500ms")
//! - [`history`]: Per-constraint history for the chart and sparklines
//! - [`monitor`]: Core data models ([`ConstraintData`], [`ConstraintRow`], [`HealthStatus`])
//!
//! ## Data Flow
//!
//! ```text
//! Batch (decoded records)
//!        │
//!        ▼
//! ConstraintData::from_batch()
//!        │
//!        ├──▶ ConstraintRow (with health status computed from Thresholds)
//!        │
//!        └──▶ History::record() (for the chart and sparklines)
//! ```

pub mod duration;
pub mod history;
pub mod monitor;

pub use history::{History, Series};
pub use monitor::{ConstraintData, ConstraintRow, HealthStatus, Thresholds};
