// src/pipeline/metrics.rs
//
// Counters for the replay loop. Shared handles so a reporter can read them
// while the engine owns the writer side.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct PipelineMetrics {
    pub total_frames: Arc<AtomicU64>,
    pub observations: Arc<AtomicU64>,
    pub geometry_misses: Arc<AtomicU64>,
    pub crossings_recorded: Arc<AtomicU64>,
    pub trips_committed: Arc<AtomicU64>,
    pub temporal_anomalies: Arc<AtomicU64>,
    pub histories_expired: Arc<AtomicU64>,
    pub objects_skipped: Arc<AtomicU64>,
    pub started_at: Instant,
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            total_frames: Arc::new(AtomicU64::new(0)),
            observations: Arc::new(AtomicU64::new(0)),
            geometry_misses: Arc::new(AtomicU64::new(0)),
            crossings_recorded: Arc::new(AtomicU64::new(0)),
            trips_committed: Arc::new(AtomicU64::new(0)),
            temporal_anomalies: Arc::new(AtomicU64::new(0)),
            histories_expired: Arc::new(AtomicU64::new(0)),
            objects_skipped: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }

    pub fn inc(&self, counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn fps(&self) -> f64 {
        let frames = self.total_frames.load(Ordering::Relaxed);
        let elapsed = self.started_at.elapsed().as_secs_f64();
        if elapsed > 0.01 {
            frames as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_frames: self.total_frames.load(Ordering::Relaxed),
            fps: self.fps(),
            observations: self.observations.load(Ordering::Relaxed),
            geometry_misses: self.geometry_misses.load(Ordering::Relaxed),
            crossings_recorded: self.crossings_recorded.load(Ordering::Relaxed),
            trips_committed: self.trips_committed.load(Ordering::Relaxed),
            temporal_anomalies: self.temporal_anomalies.load(Ordering::Relaxed),
            histories_expired: self.histories_expired.load(Ordering::Relaxed),
            objects_skipped: self.objects_skipped.load(Ordering::Relaxed),
            elapsed_secs: self.started_at.elapsed().as_secs_f64(),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSummary {
    pub total_frames: u64,
    pub fps: f64,
    pub observations: u64,
    pub geometry_misses: u64,
    pub crossings_recorded: u64,
    pub trips_committed: u64,
    pub temporal_anomalies: u64,
    pub histories_expired: u64,
    pub objects_skipped: u64,
    pub elapsed_secs: f64,
}
