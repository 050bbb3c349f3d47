//! Per-constraint value history for the chart and trend sparklines.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};

use super::monitor::ConstraintData;

/// Default number of points kept per constraint.
pub const DEFAULT_MAX_POINTS: usize = 60;

/// Batches a constraint may be missing from before its series is dropped.
pub const FORGET_AFTER_BATCHES: u64 = 120;

/// Recorded values for one constraint.
#[derive(Debug, Clone, Default)]
pub struct Series {
    /// Points in timestamp order.
    pub points: VecDeque<(DateTime<Utc>, f64)>,
    /// Number of the last batch this constraint appeared in.
    last_batch: u64,
}

impl Series {
    /// Insert a point, keeping timestamp order.
    ///
    /// Returns false if a point with this timestamp is already recorded.
    fn insert(&mut self, ts: DateTime<Utc>, value: f64) -> bool {
        match self.points.back() {
            Some(&(last, _)) if ts > last => {
                self.points.push_back((ts, value));
                true
            }
            None => {
                self.points.push_back((ts, value));
                true
            }
            Some(_) => match self.points.binary_search_by(|(t, _)| t.cmp(&ts)) {
                Ok(_) => false,
                Err(idx) => {
                    self.points.insert(idx, (ts, value));
                    true
                }
            },
        }
    }

    pub fn latest(&self) -> Option<(DateTime<Utc>, f64)> {
        self.points.back().copied()
    }
}

/// Tracks recorded values over time, keyed by constraint id.
///
/// The provider publishes a new reading roughly once a minute while the
/// dashboard may poll more often, so a reading whose timestamp is already
/// recorded is not added again. Constraints that stop appearing are
/// forgotten after [`FORGET_AFTER_BATCHES`] batches.
#[derive(Debug, Clone)]
pub struct History {
    series: HashMap<String, Series>,
    max_points: usize,
    batches: u64,
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_POINTS)
    }
}

impl History {
    /// Create a new empty history keeping at most `max_points` per constraint.
    pub fn new(max_points: usize) -> Self {
        Self {
            series: HashMap::new(),
            max_points: max_points.max(1),
            batches: 0,
        }
    }

    /// Record every row of a new data set. Returns how many points were added.
    pub fn record(&mut self, data: &ConstraintData) -> usize {
        self.batches += 1;
        let mut added = 0;
        for row in &data.rows {
            let series = self.series.entry(row.record.id.clone()).or_default();
            series.last_batch = self.batches;
            if series.insert(row.record.timestamp, row.record.value) {
                added += 1;
            }
            while series.points.len() > self.max_points {
                series.points.pop_front();
            }
        }

        let batches = self.batches;
        self.series
            .retain(|_, series| batches - series.last_batch <= FORGET_AFTER_BATCHES);
        added
    }

    pub fn series(&self, id: &str) -> Option<&Series> {
        self.series.get(id)
    }

    /// Number of constraints with recorded history.
    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Earliest and latest timestamps across the given constraints.
    pub fn time_bounds<'a, I>(&self, ids: I) -> Option<(DateTime<Utc>, DateTime<Utc>)>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut bounds: Option<(DateTime<Utc>, DateTime<Utc>)> = None;
        for id in ids {
            let Some(series) = self.series.get(id) else {
                continue;
            };
            let (Some(first), Some(last)) = (series.points.front(), series.points.back()) else {
                continue;
            };
            bounds = Some(match bounds {
                None => (first.0, last.0),
                Some((lo, hi)) => (lo.min(first.0), hi.max(last.0)),
            });
        }
        bounds
    }

    /// Sparkline data for a constraint (normalized to 0-7 for 8 bar levels).
    ///
    /// Returns an empty Vec if there's not enough history.
    pub fn sparkline(&self, id: &str) -> Vec<u8> {
        let Some(series) = self.series.get(id) else {
            return Vec::new();
        };
        if series.points.len() < 2 {
            return Vec::new();
        }

        let values: Vec<f64> = series.points.iter().map(|(_, v)| *v).collect();
        let max = values.iter().copied().fold(f64::MIN, f64::max);
        let min = values.iter().copied().fold(f64::MAX, f64::min);
        let range = max - min;

        values
            .iter()
            .map(|&v| {
                if range <= f64::EPSILON {
                    return 3;
                }
                let normalized = ((v - min) / range * 7.0).round() as u8;
                normalized.min(7)
            })
            .collect()
    }

    /// Change between the two most recent points of a constraint.
    ///
    /// Returns None if there's not enough history.
    pub fn trend(&self, id: &str) -> Option<f64> {
        let series = self.series.get(id)?;
        let len = series.points.len();
        if len < 2 {
            return None;
        }
        let (_, current) = series.points[len - 1];
        let (_, previous) = series.points[len - 2];
        Some(current - previous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Thresholds;
    use chrono::TimeZone;
    use gridwatch_odp::Batch;
    use gridwatch_types::ConstraintRecord;

    fn ts(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, minute, 0).unwrap()
    }

    fn data(records: Vec<ConstraintRecord>) -> ConstraintData {
        ConstraintData::from_batch(Batch::new(records), &Thresholds::default())
    }

    #[test]
    fn test_record_appends_new_timestamps() {
        let mut history = History::new(10);
        history.record(&data(vec![ConstraintRecord::new("1", ts(0), "thermal", 1.0)]));
        history.record(&data(vec![ConstraintRecord::new("1", ts(1), "thermal", 2.0)]));

        let series = history.series("1").unwrap();
        assert_eq!(series.points.len(), 2);
        assert_eq!(series.latest(), Some((ts(1), 2.0)));
        assert_eq!(history.trend("1"), Some(1.0));
    }

    #[test]
    fn test_repeated_timestamp_not_duplicated() {
        let mut history = History::new(10);
        let set = data(vec![ConstraintRecord::new("1", ts(0), "thermal", 1.0)]);
        assert_eq!(history.record(&set), 1);
        assert_eq!(history.record(&set), 0);
        assert_eq!(history.series("1").unwrap().points.len(), 1);
    }

    #[test]
    fn test_out_of_order_points_are_sorted() {
        let mut history = History::new(10);
        history.record(&data(vec![
            ConstraintRecord::new("1", ts(5), "thermal", 5.0),
            ConstraintRecord::new("1", ts(2), "thermal", 2.0),
            ConstraintRecord::new("1", ts(3), "thermal", 3.0),
        ]));

        let times: Vec<_> = history.series("1").unwrap().points.iter().map(|p| p.0).collect();
        assert_eq!(times, vec![ts(2), ts(3), ts(5)]);
    }

    #[test]
    fn test_bounded_history() {
        let mut history = History::new(3);
        for minute in 0..6 {
            history.record(&data(vec![ConstraintRecord::new("1", ts(minute), "t", minute as f64)]));
        }
        let series = history.series("1").unwrap();
        assert_eq!(series.points.len(), 3);
        assert_eq!(series.points.front().unwrap().0, ts(3));
    }

    #[test]
    fn test_vanished_constraint_forgotten() {
        let mut history = History::new(10);
        history.record(&data(vec![
            ConstraintRecord::new("gone", ts(0), "t", 1.0),
            ConstraintRecord::new("kept", ts(0), "t", 1.0),
        ]));
        for _ in 0..FORGET_AFTER_BATCHES {
            history.record(&data(vec![ConstraintRecord::new("kept", ts(0), "t", 1.0)]));
        }
        assert!(history.series("gone").is_some());

        history.record(&data(vec![ConstraintRecord::new("kept", ts(0), "t", 1.0)]));
        assert!(history.series("gone").is_none());
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_time_bounds() {
        let mut history = History::default();
        history.record(&data(vec![
            ConstraintRecord::new("a", ts(1), "t", 1.0),
            ConstraintRecord::new("b", ts(4), "t", 1.0),
        ]));
        history.record(&data(vec![ConstraintRecord::new("a", ts(7), "t", 1.0)]));

        assert_eq!(history.time_bounds(["a", "b"]), Some((ts(1), ts(7))));
        assert_eq!(history.time_bounds(["b"]), Some((ts(4), ts(4))));
        assert_eq!(history.time_bounds(["missing"]), None);
    }

    #[test]
    fn test_sparkline() {
        let mut history = History::default();
        assert!(history.sparkline("1").is_empty());

        for (minute, value) in [(0, 0.2), (1, 0.6), (2, 1.0)] {
            history.record(&data(vec![ConstraintRecord::new("1", ts(minute), "t", value)]));
        }
        assert_eq!(history.sparkline("1"), vec![0, 4, 7]);
    }
}
