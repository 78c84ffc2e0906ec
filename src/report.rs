// src/report.rs
//
// Per-lane tally of committed trips for one input.

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

use crate::pipeline::TripSummary;
use crate::zones::LaneLabel;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LaneStats {
    pub count: usize,
    pub min_kmh: f64,
    pub mean_kmh: f64,
    pub max_kmh: f64,
}

#[derive(Debug, Default)]
pub struct TripReport {
    speeds: BTreeMap<LaneLabel, Vec<f64>>,
}

impl TripReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, trip: &TripSummary) {
        self.speeds
            .entry(trip.lane_label)
            .or_default()
            .push(trip.spatial_speed_kmh);
    }

    pub fn total(&self) -> usize {
        self.speeds.values().map(Vec::len).sum()
    }

    pub fn lane(&self, label: LaneLabel) -> Option<LaneStats> {
        let speeds = self.speeds.get(&label)?;
        if speeds.is_empty() {
            return None;
        }
        let min = speeds.iter().copied().fold(f64::INFINITY, f64::min);
        let max = speeds.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = speeds.iter().sum::<f64>() / speeds.len() as f64;
        Some(LaneStats {
            count: speeds.len(),
            min_kmh: min,
            mean_kmh: mean,
            max_kmh: max,
        })
    }

    pub fn lanes(&self) -> Vec<(LaneLabel, LaneStats)> {
        self.speeds
            .keys()
            .filter_map(|&label| self.lane(label).map(|s| (label, s)))
            .collect()
    }

    pub fn log(&self) {
        if self.total() == 0 {
            info!("  🛣️  No trips committed");
            return;
        }
        info!("  🛣️  Trips committed: {}", self.total());
        for (label, stats) in self.lanes() {
            info!(
                "     {:<12} n={:<4} min={:>7.1} mean={:>7.1} max={:>7.1} km/h",
                label.as_str(),
                stats.count,
                stats.min_kmh,
                stats.mean_kmh,
                stats.max_kmh
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zones::CellId;
    use chrono::NaiveDate;

    fn trip(id: u32, lane: LaneLabel, kmh: f64) -> TripSummary {
        let t = NaiveDate::from_ymd_opt(2019, 10, 30)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        TripSummary {
            object_id: id,
            class_id: 3,
            lane_label: lane,
            spatial_speed_kmh: kmh,
            root_timestamp: t,
            end_timestamp: t,
            root_cell: CellId(0),
            end_cell: CellId(1),
            frame_index: 0,
            crossings: 2,
        }
    }

    #[test]
    fn test_per_lane_stats() {
        let mut report = TripReport::new();
        report.add(&trip(1, LaneLabel::On, 30.0));
        report.add(&trip(2, LaneLabel::On, 50.0));
        report.add(&trip(3, LaneLabel::On, 40.0));
        report.add(&trip(4, LaneLabel::OnToUnder, 20.0));

        let on = report.lane(LaneLabel::On).unwrap();
        assert_eq!(on.count, 3);
        assert_eq!(on.min_kmh, 30.0);
        assert_eq!(on.max_kmh, 50.0);
        assert!((on.mean_kmh - 40.0).abs() < 1e-9);

        assert_eq!(report.lane(LaneLabel::OnToUnder).unwrap().count, 1);
        assert!(report.lane(LaneLabel::Under).is_none());
        assert_eq!(report.total(), 4);
        assert_eq!(report.lanes().len(), 2);
    }

    #[test]
    fn test_empty_report() {
        let report = TripReport::new();
        assert_eq!(report.total(), 0);
        assert!(report.lanes().is_empty());
        report.log();
    }
}
