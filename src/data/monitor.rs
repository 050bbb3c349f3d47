//! Constraint data ranking and health computation.
//!
//! This module turns a fetched [`Batch`] into rows annotated with a health
//! status, ranked by how close each constraint is to its limit.

use std::fs;
use std::path::Path;
use std::time::Instant;

use anyhow::Result;
use chrono::{DateTime, Utc};
use gridwatch_odp::{decode_response, Batch};
use gridwatch_types::ConstraintRecord;

/// Utilisation thresholds for health status computation.
#[derive(Debug, Clone, PartialEq)]
pub struct Thresholds {
    /// Utilisation at which a constraint is shown as a warning.
    pub warning: f64,
    /// Utilisation at which a constraint is shown as critical.
    pub critical: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            warning: 0.9,
            critical: 1.0,
        }
    }
}

impl Thresholds {
    /// Health of a single record.
    ///
    /// A provider breach flag is always critical. Utilisation thresholds only
    /// apply to records whose value is a utilisation ratio.
    pub fn status(&self, record: &ConstraintRecord) -> HealthStatus {
        if record.is_breached() {
            return HealthStatus::Critical;
        }
        if !record.is_utilisation() {
            return HealthStatus::Healthy;
        }
        if record.value >= self.critical {
            HealthStatus::Critical
        } else if record.value >= self.warning {
            HealthStatus::Warning
        } else {
            HealthStatus::Healthy
        }
    }
}

/// Health status for a constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
}

impl HealthStatus {
    /// Returns a short symbol for display.
    pub fn symbol(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "OK",
            HealthStatus::Warning => "WARN",
            HealthStatus::Critical => "CRIT",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "Healthy",
            HealthStatus::Warning => "Near limit",
            HealthStatus::Critical => "At or over limit",
        }
    }
}

/// A record with its computed health.
#[derive(Debug, Clone)]
pub struct ConstraintRow {
    pub record: ConstraintRecord,
    pub status: HealthStatus,
}

/// The latest record set, ready for display.
#[derive(Debug, Clone)]
pub struct ConstraintData {
    /// Rows in the order the provider returned them.
    pub rows: Vec<ConstraintRow>,
    /// Malformed records dropped from the batch.
    pub skipped: usize,
    /// Total matching records reported by the provider.
    pub total_count: Option<u64>,
    /// When the batch was fetched.
    pub fetched_at: DateTime<Utc>,
    /// When the batch reached the dashboard.
    pub last_updated: Instant,
}

impl ConstraintData {
    /// Load and decode a saved records response.
    pub fn load(path: &Path, thresholds: &Thresholds) -> Result<Self> {
        let content = fs::read(path)?;
        let batch = decode_response(&content)?;
        Ok(Self::from_batch(batch, thresholds))
    }

    /// Convert a fetched batch into display data.
    pub fn from_batch(batch: Batch, thresholds: &Thresholds) -> Self {
        let rows = batch
            .records
            .into_iter()
            .map(|record| ConstraintRow {
                status: thresholds.status(&record),
                record,
            })
            .collect();

        Self {
            rows,
            skipped: batch.skipped,
            total_count: batch.total_count,
            fetched_at: batch.fetched_at,
            last_updated: Instant::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows sorted by value, highest first. Ties keep provider order.
    pub fn ranked(&self) -> Vec<&ConstraintRow> {
        let mut rows: Vec<&ConstraintRow> = self.rows.iter().collect();
        rows.sort_by(|a, b| b.record.value.total_cmp(&a.record.value));
        rows
    }

    /// The `n` highest-valued constraints, one row per constraint id.
    ///
    /// When a batch holds several readings for the same constraint the most
    /// recent one represents it.
    pub fn top(&self, n: usize) -> Vec<&ConstraintRow> {
        let mut latest: Vec<&ConstraintRow> = Vec::new();
        for row in &self.rows {
            match latest.iter_mut().find(|r| r.record.id == row.record.id) {
                Some(existing) if existing.record.timestamp < row.record.timestamp => {
                    *existing = row;
                }
                Some(_) => {}
                None => latest.push(row),
            }
        }
        latest.sort_by(|a, b| b.record.value.total_cmp(&a.record.value));
        latest.truncate(n);
        latest
    }

    /// Counts of (healthy, warning, critical) rows.
    pub fn counts(&self) -> (usize, usize, usize) {
        self.rows.iter().fold((0, 0, 0), |(h, w, c), row| match row.status {
            HealthStatus::Healthy => (h + 1, w, c),
            HealthStatus::Warning => (h, w + 1, c),
            HealthStatus::Critical => (h, w, c + 1),
        })
    }

    /// Worst status across all rows.
    pub fn worst(&self) -> HealthStatus {
        self.rows
            .iter()
            .map(|r| r.status)
            .max()
            .unwrap_or(HealthStatus::Healthy)
    }

    /// Most recent reading timestamp in the set.
    pub fn latest_timestamp(&self) -> Option<DateTime<Utc>> {
        self.rows.iter().map(|r| r.record.timestamp).max()
    }

    /// JSON export of the set: a summary plus every record, ranked.
    pub fn export_json(&self) -> serde_json::Value {
        let (healthy, warning, critical) = self.counts();
        let records: Vec<serde_json::Value> = self
            .ranked()
            .into_iter()
            .map(|row| {
                serde_json::json!({
                    "label": row.record.label(),
                    "status": format!("{:?}", row.status),
                    "record": row.record,
                })
            })
            .collect();

        serde_json::json!({
            "summary": {
                "total_records": self.rows.len(),
                "healthy": healthy,
                "warning": warning,
                "critical": critical,
                "skipped": self.skipped,
                "total_count": self.total_count,
                "fetched_at": self.fetched_at,
            },
            "records": records,
        })
    }
}
