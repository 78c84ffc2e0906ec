// src/pipeline/frame_context.rs
//
// One frame's worth of tracker output and the overlay hints the engine
// produced for it. The engine reads `observations` and fills `hints`.

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::analysis::history::ObjectState;
use crate::types::{ObjectId, Observation};
use crate::zones::{CellId, LaneLabel};

/// What a renderer needs to annotate one object in one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverlayHint {
    pub object_id: ObjectId,
    pub cell: Option<CellId>,
    pub state: Option<ObjectState>,
    pub instant_speed_kmh: Option<f64>,
    pub spatial_speed_kmh: Option<f64>,
    pub lane_label: Option<LaneLabel>,
}

impl OverlayHint {
    pub fn bare(object_id: ObjectId) -> Self {
        Self {
            object_id,
            cell: None,
            state: None,
            instant_speed_kmh: None,
            spatial_speed_kmh: None,
            lane_label: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FrameContext {
    pub frame_index: u64,
    pub timestamp: NaiveDateTime,
    pub observations: Vec<Observation>,
    pub hints: Vec<OverlayHint>,
}

impl FrameContext {
    pub fn new(frame_index: u64, timestamp: NaiveDateTime, observations: Vec<Observation>) -> Self {
        Self {
            frame_index,
            timestamp,
            observations,
            hints: Vec::new(),
        }
    }

    #[cfg(test)]
    pub fn hint_for(&self, object_id: ObjectId) -> Option<&OverlayHint> {
        self.hints.iter().find(|h| h.object_id == object_id)
    }
}
