//! Constraint record - a single reported network constraint event.

use chrono::{DateTime, Utc};

use crate::{AmpReadings, UTILISATION_UNIT};

/// A single reported network constraint event.
///
/// Records are immutable once fetched. Each poll of the provider produces a
/// fresh set that supersedes the previous one.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConstraintRecord {
    /// Provider identifier for the constraint.
    pub id: String,

    /// When the reading was taken.
    pub timestamp: DateTime<Utc>,

    /// Asset or site the constraint applies to (the DER name for ODP data).
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub location: Option<String>,

    /// Kind of constraint, or its description for ODP data.
    pub constraint_type: String,

    /// Magnitude of the constraint.
    pub value: f64,

    /// Unit of `value`, if known.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub unit: Option<String>,

    /// Amp readings the value was derived from, for meter-reading records.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub readings: Option<AmpReadings>,
}

impl ConstraintRecord {
    /// Create a record with a directly reported value.
    pub fn new(
        id: impl Into<String>,
        timestamp: DateTime<Utc>,
        constraint_type: impl Into<String>,
        value: f64,
    ) -> Self {
        Self {
            id: id.into(),
            timestamp,
            location: None,
            constraint_type: constraint_type.into(),
            value,
            unit: None,
            readings: None,
        }
    }

    /// Create a record whose value is the utilisation of the given readings.
    ///
    /// Returns `None` if no utilisation can be computed.
    pub fn from_readings(
        id: impl Into<String>,
        timestamp: DateTime<Utc>,
        constraint_type: impl Into<String>,
        readings: AmpReadings,
    ) -> Option<Self> {
        let value = readings.utilisation()?;
        Some(Self {
            id: id.into(),
            timestamp,
            location: None,
            constraint_type: constraint_type.into(),
            value,
            unit: Some(UTILISATION_UNIT.to_string()),
            readings: Some(readings),
        })
    }

    /// Set the location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Set the unit.
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Display label: constraint type and value, e.g. `"thermal, 12.5"`.
    pub fn label(&self) -> String {
        format!("{}, {}", self.constraint_type, format_value(self.value))
    }

    /// Constraint type cut to at most `max_chars` characters.
    pub fn short_type(&self, max_chars: usize) -> &str {
        match self.constraint_type.char_indices().nth(max_chars) {
            Some((idx, _)) => &self.constraint_type[..idx],
            None => &self.constraint_type,
        }
    }

    /// Whether the provider flagged a breach on this record.
    pub fn is_breached(&self) -> bool {
        self.readings.as_ref().is_some_and(|r| r.breach)
    }

    /// Whether the value is a utilisation ratio.
    pub fn is_utilisation(&self) -> bool {
        self.unit.as_deref() == Some(UTILISATION_UNIT)
    }
}

/// Format a value with at most three decimals and no trailing zeros.
///
/// `12.5` renders as `"12.5"`, `0.83333` as `"0.833"`, `7.0` as `"7"`.
pub fn format_value(value: f64) -> String {
    let s = format!("{:.3}", value);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" {
        "0".to_string()
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_label() {
        let record = ConstraintRecord::new("1", ts(), "thermal", 12.5);
        assert_eq!(record.label(), "thermal, 12.5");
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(12.5), "12.5");
        assert_eq!(format_value(7.0), "7");
        assert_eq!(format_value(0.833333), "0.833");
        assert_eq!(format_value(0.0), "0");
        assert_eq!(format_value(-0.0001), "0");
        assert_eq!(format_value(-1.25), "-1.25");
    }

    #[test]
    fn test_from_readings() {
        let readings = AmpReadings::new(300.0, 400.0).breach(true);
        let record = ConstraintRecord::from_readings("C-1", ts(), "Line A", readings)
            .unwrap()
            .with_location("Solar Farm");

        assert_eq!(record.value, 0.75);
        assert!(record.is_utilisation());
        assert!(record.is_breached());
        assert_eq!(record.location.as_deref(), Some("Solar Farm"));
    }

    #[test]
    fn test_from_readings_without_trim() {
        let readings = AmpReadings::new(300.0, 0.0);
        assert!(ConstraintRecord::from_readings("C-1", ts(), "Line A", readings).is_none());
    }

    #[test]
    fn test_short_type() {
        let record = ConstraintRecord::new("1", ts(), "Bramford–Sizewell 400kV", 1.0);
        assert_eq!(record.short_type(8), "Bramford");
        assert_eq!(record.short_type(9), "Bramford–");
        assert_eq!(record.short_type(100), "Bramford–Sizewell 400kV");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serde_skips_empty_fields() {
        let record = ConstraintRecord::new("1", ts(), "thermal", 12.5);
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("location").is_none());
        assert!(json.get("readings").is_none());
        assert_eq!(json["constraint_type"], "thermal");
    }
}
