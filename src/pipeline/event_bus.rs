// src/pipeline/event_bus.rs
//
// Engine → driver events. The engine publishes, the driver drains after
// each frame and decides what to write or log.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::VecDeque;
use tracing::warn;

use crate::analysis::history::ObjectState;
use crate::types::ObjectId;
use crate::zones::{CellId, LaneLabel};

/// One-time record of a completed root → end measurement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TripSummary {
    pub object_id: ObjectId,
    pub class_id: u32,
    pub lane_label: LaneLabel,
    pub spatial_speed_kmh: f64,
    pub root_timestamp: NaiveDateTime,
    pub end_timestamp: NaiveDateTime,
    pub root_cell: CellId,
    pub end_cell: CellId,
    pub frame_index: u64,
    pub crossings: usize,
}

/// Which speed computation hit a non-positive interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SpeedSegment {
    Instant,
    Spatial,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    TripCommitted(TripSummary),

    TemporalAnomaly {
        object_id: ObjectId,
        frame_index: u64,
        segment: SpeedSegment,
        from_cell: CellId,
        to_cell: CellId,
        elapsed_us: i64,
    },

    HistoryExpired {
        object_id: ObjectId,
        state: ObjectState,
        last_seen: NaiveDateTime,
    },

    ObjectSkipped {
        object_id: ObjectId,
        frame_index: u64,
        reason: String,
    },
}

pub struct EventBus {
    events: VecDeque<EngineEvent>,
    max_pending: usize,
}

impl EventBus {
    pub fn new(max_pending: usize) -> Self {
        let max_pending = max_pending.max(1);
        Self {
            events: VecDeque::with_capacity(max_pending.min(1024)),
            max_pending,
        }
    }

    pub fn publish(&mut self, event: EngineEvent) {
        if self.events.len() >= self.max_pending {
            warn!(
                "Event bus full ({} events), dropping oldest",
                self.max_pending
            );
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    pub fn drain(&mut self) -> Vec<EngineEvent> {
        self.events.drain(..).collect()
    }

    #[cfg(test)]
    pub fn pending_count(&self) -> usize {
        self.events.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skipped(id: ObjectId) -> EngineEvent {
        EngineEvent::ObjectSkipped {
            object_id: id,
            frame_index: 0,
            reason: "test".to_string(),
        }
    }

    #[test]
    fn test_drain_empties_in_order() {
        let mut bus = EventBus::new(8);
        bus.publish(skipped(1));
        bus.publish(skipped(2));
        assert_eq!(bus.pending_count(), 2);
        assert_eq!(bus.drain(), vec![skipped(1), skipped(2)]);
        assert_eq!(bus.pending_count(), 0);
    }

    #[test]
    fn test_full_bus_drops_oldest() {
        let mut bus = EventBus::new(2);
        bus.publish(skipped(1));
        bus.publish(skipped(2));
        bus.publish(skipped(3));
        assert_eq!(bus.drain(), vec![skipped(2), skipped(3)]);
    }

    #[test]
    fn test_event_json_is_tagged() {
        let json = serde_json::to_value(skipped(9)).unwrap();
        assert_eq!(json["event"], "object_skipped");
        assert_eq!(json["object_id"], 9);
    }
}
