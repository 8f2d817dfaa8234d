//! Record accumulation and ordering
//!
//! The aggregator collects parsed records in arrival order, then sorts them
//! once by observation time. Arrival order only matters for two things:
//! breaking time ties (the sort is stable) and picking the representative
//! aperture position (the last record added).

use crate::schema::{AperturePosition, MeasurementRecord, MeasurementTable};

use tracing::warn;

/// Accumulates records for one aggregation key
#[derive(Debug, Default)]
pub struct Aggregator {
    /// Records in arrival order
    records: Vec<MeasurementRecord>,
    /// Number of records whose position differed from the one before
    position_conflicts: usize,
}

/// Output of [`Aggregator::finalize`]
#[derive(Debug, Clone, PartialEq)]
pub struct FinalizedTable {
    /// Records sorted by time
    pub table: MeasurementTable,
    /// Position of the last record added, `None` when nothing was added
    pub position: Option<AperturePosition>,
    /// Number of position changes seen while accumulating
    pub position_conflicts: usize,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop everything accumulated so far
    pub fn reset(&mut self) {
        self.records.clear();
        self.position_conflicts = 0;
    }

    /// Append a record; duplicates are kept
    pub fn add(&mut self, record: MeasurementRecord) {
        if let Some(prev) = self.records.last() {
            if !prev.position().same_as(&record.position()) {
                self.position_conflicts += 1;
            }
        }
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn position_conflicts(&self) -> usize {
        self.position_conflicts
    }

    /// Sort by time and derive the aperture position, leaving the
    /// aggregator empty
    pub fn finalize(&mut self) -> FinalizedTable {
        let mut records = std::mem::take(&mut self.records);
        let position_conflicts = std::mem::take(&mut self.position_conflicts);

        // Taken before sorting: the last fragment enumerated, not the
        // chronologically last observation
        let position = records.last().map(MeasurementRecord::position);

        if position_conflicts > 0 {
            warn!(
                position_conflicts,
                records = records.len(),
                "Fragments disagree on aperture position; using the last one added"
            );
        }

        // sort_by is stable, so equal times keep arrival order
        records.sort_by(|a, b| a.time.total_cmp(&b.time));

        FinalizedTable {
            table: MeasurementTable::from_sorted(records),
            position,
            position_conflicts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(time: f64, flux: f32, x: i32) -> MeasurementRecord {
        MeasurementRecord {
            time,
            flux,
            background: 1.0,
            quality: 0,
            x,
            y: 877,
            ra: 84.29,
            dec: -80.47,
        }
    }

    #[test]
    fn test_finalize_sorts_by_time() {
        let mut agg = Aggregator::new();
        agg.add(record(5.0, 50.0, 10));
        agg.add(record(3.0, 30.0, 10));
        agg.add(record(4.0, 40.0, 10));

        let finalized = agg.finalize();
        let times: Vec<f64> = finalized.table.times().collect();
        assert_eq!(times, vec![3.0, 4.0, 5.0]);
        assert!(agg.is_empty());
    }

    #[test]
    fn test_ties_keep_arrival_order() {
        let mut agg = Aggregator::new();
        agg.add(record(2.0, 1.0, 10));
        agg.add(record(1.0, 2.0, 10));
        agg.add(record(2.0, 3.0, 10));
        agg.add(record(2.0, 4.0, 10));

        let finalized = agg.finalize();
        let fluxes: Vec<f32> = finalized.table.records().iter().map(|r| r.flux).collect();
        assert_eq!(fluxes, vec![2.0, 1.0, 3.0, 4.0]);
    }

    #[test]
    fn test_duplicates_are_kept() {
        let mut agg = Aggregator::new();
        agg.add(record(1.0, 1.0, 10));
        agg.add(record(1.0, 1.0, 10));
        assert_eq!(agg.finalize().table.len(), 2);
    }

    #[test]
    fn test_position_is_last_added_not_latest_time() {
        let mut agg = Aggregator::new();
        agg.add(record(5.0, 1.0, 11));
        agg.add(record(3.0, 1.0, 12));
        agg.add(record(4.0, 1.0, 13));

        let finalized = agg.finalize();
        assert_eq!(finalized.position.unwrap().x, 13);
        assert_eq!(finalized.position_conflicts, 2);
    }

    #[test]
    fn test_consistent_positions_have_no_conflicts() {
        let mut agg = Aggregator::new();
        agg.add(record(1.0, 1.0, 10));
        agg.add(record(2.0, 1.0, 10));
        assert_eq!(agg.position_conflicts(), 0);
    }

    #[test]
    fn test_empty_finalize() {
        let mut agg = Aggregator::new();
        let finalized = agg.finalize();
        assert!(finalized.table.is_empty());
        assert!(finalized.position.is_none());
    }

    #[test]
    fn test_reset() {
        let mut agg = Aggregator::new();
        agg.add(record(1.0, 1.0, 10));
        agg.add(record(2.0, 1.0, 11));
        agg.reset();
        assert!(agg.is_empty());
        assert_eq!(agg.position_conflicts(), 0);
        assert!(agg.finalize().position.is_none());
    }

    #[test]
    fn test_negative_and_large_times_order() {
        let mut agg = Aggregator::new();
        for t in [1e9, -2.5, 0.0, 1325.29, -0.0] {
            agg.add(record(t, 1.0, 10));
        }
        let times: Vec<f64> = agg.finalize().table.times().collect();
        assert!(times.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(times[0], -2.5);
        assert_eq!(times[4], 1e9);
    }
}
