// src/analysis/transition_engine.rs
//
// Per-frame root → end state machine.
//
//   UNSEEN ──root cell──▶ ENTERED_ROOT ──new cell──▶ IN_TRANSIT ──end cell──▶ COMMITTED
//
// For each tracked centroid of a target class:
//   1. locate the cell (outside the grid = nothing to do)
//   2. first visit of that cell by this object:
//        root cell          → record it (opens the history on first sighting)
//        other cell, rooted → record it + instant speed vs the previous record;
//                             end cell additionally → spatial speed, lane, commit
//   3. revisit → no new record; re-expose what was computed on the first visit
//
// COMMITTED is terminal: the object keeps getting hints but never new records.
// A crossing whose timestamp does not move forward gets no speed and raises
// a TemporalAnomaly; an end crossing hit by that stays uncommitted.

use chrono::{Duration, NaiveDateTime};
use tracing::{debug, info, warn};

use super::history::{CrossingRecord, ObjectHistoryStore, TripResult};
use super::speed::SpeedEstimator;
use crate::error::{ConfigError, TransitionError};
use crate::pipeline::{
    EngineEvent, EventBus, FrameContext, OverlayHint, PipelineMetrics, SpeedSegment, TripSummary,
};
use crate::types::{Config, Observation};
use crate::zones::{CellId, ZoneFamily, ZoneLayout, ZoneRole};

pub struct TransitionEngine {
    layout: ZoneLayout,
    speed: SpeedEstimator,
    histories: ObjectHistoryStore,
    target_class_ids: Vec<u32>,
    idle_timeout: Option<Duration>,
    events: EventBus,
    metrics: PipelineMetrics,
}

impl TransitionEngine {
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        config.validate()?;
        let layout = ZoneLayout::build(&config.grid, &config.zones)?;
        let speed = SpeedEstimator::new(config.calibration.pixel_to_meter_scale)?;
        let idle_timeout = config
            .engine
            .history_idle_timeout_secs
            .map(|secs| Duration::microseconds((secs * 1_000_000.0).round() as i64));

        info!(
            "Zone layout: {}x{} grid, root-on={} root-under={} end-on={} end-under={}, {} lane pair(s)",
            layout.grid.rows(),
            layout.grid.cols(),
            layout.zones.root_on.len(),
            layout.zones.root_under.len(),
            layout.zones.end_on.len(),
            layout.zones.end_under.len(),
            layout.lanes.len()
        );

        Ok(Self {
            layout,
            speed,
            histories: ObjectHistoryStore::new(),
            target_class_ids: config.engine.target_class_ids.clone(),
            idle_timeout,
            events: EventBus::new(config.engine.max_pending_events),
            metrics: PipelineMetrics::new(),
        })
    }

    pub fn histories(&self) -> &ObjectHistoryStore {
        &self.histories
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        self.events.drain()
    }

    pub fn is_target(&self, class_id: u32) -> bool {
        self.target_class_ids.contains(&class_id)
    }

    /// Applies one frame. Objects are evaluated independently: a failure on
    /// one is reported and skipped without touching the others.
    pub fn process_frame(&mut self, ctx: &mut FrameContext) {
        self.metrics.inc(&self.metrics.total_frames);

        for obs in &ctx.observations {
            if !self.is_target(obs.class_id) {
                continue;
            }
            self.metrics.inc(&self.metrics.observations);

            match self.evaluate(obs) {
                Ok(hint) => ctx.hints.push(hint),
                Err(e) => {
                    warn!("Frame {}: skipping object: {}", ctx.frame_index, e);
                    self.metrics.inc(&self.metrics.objects_skipped);
                    self.events.publish(EngineEvent::ObjectSkipped {
                        object_id: obs.object_id,
                        frame_index: obs.frame_index,
                        reason: e.to_string(),
                    });
                }
            }
        }

        self.expire_idle(ctx.timestamp);
    }

    /// Runs the state machine for a single observation.
    pub fn evaluate(&mut self, obs: &Observation) -> Result<OverlayHint, TransitionError> {
        if !obs.centroid.is_finite() {
            return Err(TransitionError::NonFiniteCentroid {
                object_id: obs.object_id,
                x: obs.centroid.x,
                y: obs.centroid.y,
            });
        }

        if let Some(history) = self.histories.get_mut(obs.object_id) {
            history.touch(obs.timestamp);
        }

        let mut hint = OverlayHint::bare(obs.object_id);
        let Some(cell) = self.layout.grid.locate(obs.centroid) else {
            self.metrics.inc(&self.metrics.geometry_misses);
            hint.state = self.histories.get(obs.object_id).map(|h| h.state());
            return Ok(hint);
        };
        hint.cell = Some(cell);

        let role = self.layout.grid.role(cell);
        let visited = self
            .histories
            .get(obs.object_id)
            .map(|h| h.has_visited(cell))
            .unwrap_or(false);

        if visited {
            self.revisit(obs, cell, role, &mut hint);
        } else if let ZoneRole::Root(family) = role {
            self.enter_root(obs, cell, family);
        } else {
            self.advance(obs, cell, role, &mut hint);
        }

        hint.state = self.histories.get(obs.object_id).map(|h| h.state());
        Ok(hint)
    }

    fn enter_root(&mut self, obs: &Observation, cell: CellId, family: ZoneFamily) {
        let record = new_record(obs, cell, None);
        match self.histories.get_mut(obs.object_id) {
            None => {
                self.histories.begin(record, family);
                self.metrics.inc(&self.metrics.crossings_recorded);
                debug!(
                    "Object {} entered root-{} at cell {} (frame {})",
                    obs.object_id,
                    family.as_str(),
                    cell,
                    obs.frame_index
                );
            }
            Some(history) if history.is_committed() => {}
            Some(history) => {
                if history.push(record) {
                    self.metrics.inc(&self.metrics.crossings_recorded);
                }
            }
        }
    }

    fn advance(&mut self, obs: &Observation, cell: CellId, role: ZoneRole, hint: &mut OverlayHint) {
        let Some(history) = self.histories.get_mut(obs.object_id) else {
            // never touched a root zone
            return;
        };
        if history.is_committed() {
            return;
        }

        let prev = history.last().clone();
        let instant = match self
            .speed
            .instant_speed(prev.centroid, prev.timestamp, obs.centroid, obs.timestamp)
        {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(
                    "Object {}: non-positive interval {} → {} ({} µs), instant speed skipped",
                    obs.object_id, prev.cell_id, cell, e.elapsed_us
                );
                self.metrics.inc(&self.metrics.temporal_anomalies);
                self.events.publish(EngineEvent::TemporalAnomaly {
                    object_id: obs.object_id,
                    frame_index: obs.frame_index,
                    segment: SpeedSegment::Instant,
                    from_cell: prev.cell_id,
                    to_cell: cell,
                    elapsed_us: e.elapsed_us,
                });
                None
            }
        };

        history.push(new_record(obs, cell, instant));
        history.mark_in_transit();
        self.metrics.inc(&self.metrics.crossings_recorded);
        hint.instant_speed_kmh = instant;
        debug!(
            "Object {} → cell {} ({}) instant={:?} km/h",
            obs.object_id,
            cell,
            self.layout.grid.cell(cell).map(|c| c.name()).unwrap_or_default(),
            instant
        );

        let ZoneRole::End(end_family) = role else {
            return;
        };

        let root = history.root().clone();
        let spatial = match self
            .speed
            .spatial_speed(root.centroid, root.timestamp, obs.centroid, obs.timestamp)
        {
            Ok(v) => v,
            Err(e) => {
                warn!(
                    "Object {}: non-positive root → end interval ({} µs), not committing",
                    obs.object_id, e.elapsed_us
                );
                self.metrics.inc(&self.metrics.temporal_anomalies);
                self.events.publish(EngineEvent::TemporalAnomaly {
                    object_id: obs.object_id,
                    frame_index: obs.frame_index,
                    segment: SpeedSegment::Spatial,
                    from_cell: root.cell_id,
                    to_cell: cell,
                    elapsed_us: e.elapsed_us,
                });
                return;
            }
        };

        let Some(lane_label) = self.layout.lanes.classify(history.root_family(), end_family) else {
            warn!(
                "Object {}: no lane for root-{} → end-{}",
                obs.object_id,
                history.root_family().as_str(),
                end_family.as_str()
            );
            return;
        };

        history.commit(TripResult {
            spatial_speed_kmh: spatial,
            lane_label,
            end_cell: cell,
        });
        self.metrics.inc(&self.metrics.trips_committed);
        hint.spatial_speed_kmh = Some(spatial);
        hint.lane_label = Some(lane_label);

        let summary = TripSummary {
            object_id: obs.object_id,
            class_id: obs.class_id,
            lane_label,
            spatial_speed_kmh: spatial,
            root_timestamp: root.timestamp,
            end_timestamp: obs.timestamp,
            root_cell: root.cell_id,
            end_cell: cell,
            frame_index: obs.frame_index,
            crossings: history.records().len(),
        };
        info!(
            "✅ Object {} committed: lane={} speed={:.1} km/h ({} crossings)",
            obs.object_id,
            lane_label.as_str(),
            spatial,
            summary.crossings
        );
        self.events.publish(EngineEvent::TripCommitted(summary));
    }

    fn revisit(&self, obs: &Observation, cell: CellId, role: ZoneRole, hint: &mut OverlayHint) {
        let Some(history) = self.histories.get(obs.object_id) else {
            return;
        };
        if history.is_committed() && role.is_end() {
            if let Some(result) = history.result() {
                hint.spatial_speed_kmh = Some(result.spatial_speed_kmh);
                hint.lane_label = Some(result.lane_label);
            }
        } else if !role.is_end() {
            hint.instant_speed_kmh = history.record_for(cell).and_then(|r| r.instant_speed_kmh);
        }
    }

    /// Drops histories not seen for longer than the idle timeout. A tracker
    /// id that shows up again afterwards starts from scratch.
    pub fn expire_idle(&mut self, now: NaiveDateTime) {
        let Some(timeout) = self.idle_timeout else {
            return;
        };
        // a timeout reaching before the representable range never fires
        let Some(cutoff) = now.checked_sub_signed(timeout) else {
            return;
        };
        for history in self.histories.evict_idle(cutoff) {
            debug!(
                "Object {} expired in state {} (last seen {})",
                history.object_id,
                history.state().as_str(),
                history.last_seen()
            );
            self.metrics.inc(&self.metrics.histories_expired);
            self.events.publish(EngineEvent::HistoryExpired {
                object_id: history.object_id,
                state: history.state(),
                last_seen: history.last_seen(),
            });
        }
    }

    /// Forgets every object, e.g. between unrelated input files.
    pub fn reset(&mut self) {
        self.histories.clear();
        self.events.drain();
    }
}

fn new_record(obs: &Observation, cell: CellId, instant: Option<f64>) -> CrossingRecord {
    CrossingRecord {
        object_id: obs.object_id,
        cell_id: cell,
        frame_index: obs.frame_index,
        timestamp: obs.timestamp,
        centroid: obs.centroid,
        instant_speed_kmh: instant,
        spatial_speed_kmh: None,
        lane_label: None,
    }
}
