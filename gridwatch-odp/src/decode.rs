//! Decoding of records responses.
//!
//! The portal's v2.1 records endpoint wraps results in an envelope:
//!
//! ```json
//! { "total_count": 2, "results": [ { "timestamp": "...", "constraint_id": 7, ... } ] }
//! ```
//!
//! A bare array of records is accepted as well, using either the portal's
//! field names or the compact `id`/`ts`/`type`/`value` form. Records are
//! converted one at a time so a single malformed entry never costs the
//! whole batch.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use gridwatch_types::{AmpReadings, ConstraintRecord};

use crate::FetchError;

/// The records returned by one fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// Well-formed records, in the order the provider returned them.
    pub records: Vec<ConstraintRecord>,
    /// Number of malformed records that were dropped.
    pub skipped: usize,
    /// Total matching records reported by the provider, if it said.
    pub total_count: Option<u64>,
    /// When the batch was received.
    pub fetched_at: DateTime<Utc>,
}

impl Batch {
    /// Create a batch received now with nothing skipped.
    pub fn new(records: Vec<ConstraintRecord>) -> Self {
        Self {
            records,
            skipped: 0,
            total_count: None,
            fetched_at: Utc::now(),
        }
    }

    /// Number of well-formed records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the provider reported no constraints.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Why a single record was dropped.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("missing field `{0}`")]
    MissingField(&'static str),

    #[error("invalid timestamp {0:?}")]
    InvalidTimestamp(String),

    #[error("trim limit {0} cannot yield a utilisation")]
    NoUtilisation(f64),

    #[error("value is not a finite number")]
    NonFinite,

    #[error("{0}")]
    Shape(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Envelope {
    Records(Vec<serde_json::Value>),
    Paged {
        #[serde(default)]
        total_count: Option<u64>,
        results: Vec<serde_json::Value>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(i64),
    Text(String),
}

impl RawId {
    fn into_string(self) -> String {
        match self {
            RawId::Number(n) => n.to_string(),
            RawId::Text(s) => s,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawFlag {
    Bool(bool),
    Number(i64),
    Text(String),
}

impl RawFlag {
    fn is_set(&self) -> bool {
        match self {
            RawFlag::Bool(b) => *b,
            RawFlag::Number(n) => *n != 0,
            RawFlag::Text(s) => matches!(
                s.trim().to_ascii_lowercase().as_str(),
                "true" | "yes" | "y" | "1"
            ),
        }
    }
}

/// One record as it appears on the wire.
#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(alias = "constraint_id")]
    id: Option<RawId>,
    #[serde(alias = "timestamp")]
    ts: Option<String>,
    #[serde(rename = "type", alias = "constraint_description")]
    constraint_type: Option<String>,
    value: Option<f64>,
    unit: Option<String>,
    #[serde(alias = "der_name")]
    location: Option<String>,
    present_amps_value: Option<f64>,
    trim_amps: Option<f64>,
    release_limit_amps: Option<f64>,
    breach_flag: Option<RawFlag>,
}

impl RawRecord {
    fn into_record(self) -> Result<ConstraintRecord, RecordError> {
        let id = self.id.ok_or(RecordError::MissingField("id"))?.into_string();
        let ts = self.ts.ok_or(RecordError::MissingField("ts"))?;
        let timestamp = parse_timestamp(&ts)?;
        let constraint_type = self.constraint_type.ok_or(RecordError::MissingField("type"))?;

        let readings = self.trim_amps.map(|trim| {
            AmpReadings {
                // Missing meter readings count as no load
                present_amps: self.present_amps_value.unwrap_or(0.0),
                trim_amps: trim,
                release_limit_amps: self.release_limit_amps,
                breach: self.breach_flag.as_ref().is_some_and(RawFlag::is_set),
            }
        });

        let mut record = match (self.value, readings) {
            (Some(value), readings) => {
                if !value.is_finite() {
                    return Err(RecordError::NonFinite);
                }
                let mut record = ConstraintRecord::new(id, timestamp, constraint_type, value);
                record.readings = readings;
                record
            }
            (None, Some(readings)) => {
                let trim = readings.trim_amps;
                ConstraintRecord::from_readings(id, timestamp, constraint_type, readings)
                    .ok_or(RecordError::NoUtilisation(trim))?
            }
            (None, None) => return Err(RecordError::MissingField("value")),
        };

        if let Some(location) = self.location {
            record.location = Some(location);
        }
        if let Some(unit) = self.unit {
            record.unit = Some(unit);
        }
        Ok(record)
    }
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, RecordError> {
    DateTime::parse_from_rfc3339(s.trim())
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|_| RecordError::InvalidTimestamp(s.to_string()))
}

/// Convert a single JSON value into a record.
pub fn decode_record(value: serde_json::Value) -> Result<ConstraintRecord, RecordError> {
    serde_json::from_value::<RawRecord>(value)?.into_record()
}

/// Decode a records response body into a batch.
///
/// Fails with [`FetchError::Schema`] only when the body as a whole is not a
/// records response. Malformed records are logged and counted in
/// [`Batch::skipped`].
pub fn decode_response(body: &[u8]) -> Result<Batch, FetchError> {
    let envelope: Envelope = serde_json::from_slice(body).map_err(|e| {
        FetchError::Schema(format!(
            "expected a JSON array of records or an object with `results`: {}",
            e
        ))
    })?;

    let (total_count, raw) = match envelope {
        Envelope::Records(raw) => (None, raw),
        Envelope::Paged {
            total_count,
            results,
        } => (total_count, results),
    };

    let mut records = Vec::with_capacity(raw.len());
    let mut skipped = 0;

    for (index, value) in raw.into_iter().enumerate() {
        match decode_record(value) {
            Ok(record) => records.push(record),
            Err(error) => {
                warn!(index, %error, "skipping malformed constraint record");
                skipped += 1;
            }
        }
    }

    debug!(records = records.len(), skipped, "decoded records response");

    Ok(Batch {
        records,
        skipped,
        total_count,
        fetched_at: Utc::now(),
    })
}
