//! # gridwatch-types
//!
//! Core types for electrical network constraint data. This crate defines the
//! record model shared by the ODP fetcher and the gridwatch dashboard.
//!
//! ## Features
//!
//! - `serde`: JSON serialization of records (enables `chrono/serde`)
//!
//! ## Example
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use gridwatch_types::{AmpReadings, ConstraintRecord};
//!
//! let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
//!
//! // A generic record carries its value directly
//! let record = ConstraintRecord::new("1", ts, "thermal", 12.5);
//! assert_eq!(record.label(), "thermal, 12.5");
//!
//! // A meter reading derives its value from the amps
//! let readings = AmpReadings::new(450.0, 500.0);
//! let record = ConstraintRecord::from_readings("C-17", ts, "Bramford 132kV", readings).unwrap();
//! assert_eq!(record.value, 0.9);
//! ```

mod readings;
mod record;

pub use readings::*;
pub use record::*;

/// Utilisation at which a constraint is at its limit.
///
/// Values above this mean more load is flowing through the constraint than
/// its trim setting allows.
pub const ALLOWABLE_UTILISATION: f64 = 1.0;

/// Unit attached to records whose value is a utilisation ratio.
pub const UTILISATION_UNIT: &str = "utilisation";
