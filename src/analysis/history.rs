// src/analysis/history.rs
//
// Per-object crossing history.
//
// Each tracked object that has touched a root zone owns an append-only list
// of crossing records, at most one per cell. The first root crossing anchors
// the spatial speed; the result frozen at commit time is never recomputed.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::types::{ObjectId, Point};
use crate::zones::{CellId, LaneLabel, ZoneFamily};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ObjectState {
    EnteredRoot,
    InTransit,
    Committed,
}

impl ObjectState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EnteredRoot => "ENTERED_ROOT",
            Self::InTransit => "IN_TRANSIT",
            Self::Committed => "COMMITTED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrossingRecord {
    pub object_id: ObjectId,
    pub cell_id: CellId,
    pub frame_index: u64,
    pub timestamp: NaiveDateTime,
    pub centroid: Point,
    pub instant_speed_kmh: Option<f64>,
    pub spatial_speed_kmh: Option<f64>,
    pub lane_label: Option<LaneLabel>,
}

/// Measurement frozen at the COMMITTED transition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TripResult {
    pub spatial_speed_kmh: f64,
    pub lane_label: LaneLabel,
    pub end_cell: CellId,
}

#[derive(Debug, Clone)]
pub struct ObjectHistory {
    pub object_id: ObjectId,
    state: ObjectState,
    records: Vec<CrossingRecord>,
    by_cell: HashMap<CellId, usize>,
    root_index: usize,
    root_family: ZoneFamily,
    last_seen: NaiveDateTime,
    result: Option<TripResult>,
}

impl ObjectHistory {
    fn new(root: CrossingRecord, root_family: ZoneFamily) -> Self {
        let mut by_cell = HashMap::new();
        by_cell.insert(root.cell_id, 0);
        Self {
            object_id: root.object_id,
            state: ObjectState::EnteredRoot,
            last_seen: root.timestamp,
            records: vec![root],
            by_cell,
            root_index: 0,
            root_family,
            result: None,
        }
    }

    pub fn state(&self) -> ObjectState {
        self.state
    }

    pub fn records(&self) -> &[CrossingRecord] {
        &self.records
    }

    pub fn record_for(&self, cell: CellId) -> Option<&CrossingRecord> {
        self.by_cell.get(&cell).map(|&i| &self.records[i])
    }

    pub fn has_visited(&self, cell: CellId) -> bool {
        self.by_cell.contains_key(&cell)
    }

    pub fn root(&self) -> &CrossingRecord {
        &self.records[self.root_index]
    }

    pub fn root_family(&self) -> ZoneFamily {
        self.root_family
    }

    pub fn last(&self) -> &CrossingRecord {
        // never empty: constructed with the root record
        &self.records[self.records.len() - 1]
    }

    pub fn last_seen(&self) -> NaiveDateTime {
        self.last_seen
    }

    pub fn result(&self) -> Option<&TripResult> {
        self.result.as_ref()
    }

    pub fn is_committed(&self) -> bool {
        self.state == ObjectState::Committed
    }

    pub(crate) fn touch(&mut self, timestamp: NaiveDateTime) {
        if timestamp > self.last_seen {
            self.last_seen = timestamp;
        }
    }

    /// Appends a record for a cell not yet visited. Returns false (and keeps
    /// the history unchanged) if the cell already has a record.
    pub(crate) fn push(&mut self, record: CrossingRecord) -> bool {
        if self.by_cell.contains_key(&record.cell_id) {
            return false;
        }
        self.touch(record.timestamp);
        self.by_cell.insert(record.cell_id, self.records.len());
        self.records.push(record);
        true
    }

    pub(crate) fn mark_in_transit(&mut self) {
        if self.state == ObjectState::EnteredRoot {
            self.state = ObjectState::InTransit;
        }
    }

    /// Freezes the trip result. Only the first call has any effect.
    pub(crate) fn commit(&mut self, result: TripResult) -> bool {
        if self.result.is_some() {
            return false;
        }
        if let Some(&i) = self.by_cell.get(&result.end_cell) {
            self.records[i].spatial_speed_kmh = Some(result.spatial_speed_kmh);
            self.records[i].lane_label = Some(result.lane_label);
        }
        self.result = Some(result);
        self.state = ObjectState::Committed;
        true
    }
}

/// All live object histories, keyed by tracker identity.
#[derive(Debug, Default)]
pub struct ObjectHistoryStore {
    histories: BTreeMap<ObjectId, ObjectHistory>,
}

impl ObjectHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: ObjectId) -> Option<&ObjectHistory> {
        self.histories.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: ObjectId) -> Option<&mut ObjectHistory> {
        self.histories.get_mut(&id)
    }

    /// Starts a history at the object's first root-zone sighting.
    /// Returns false if the object already has one.
    pub(crate) fn begin(&mut self, root: CrossingRecord, family: ZoneFamily) -> bool {
        if self.histories.contains_key(&root.object_id) {
            return false;
        }
        self.histories
            .insert(root.object_id, ObjectHistory::new(root, family));
        true
    }

    /// Removes histories whose last sighting is older than `cutoff`.
    pub(crate) fn evict_idle(&mut self, cutoff: NaiveDateTime) -> Vec<ObjectHistory> {
        let stale: Vec<ObjectId> = self
            .histories
            .iter()
            .filter(|(_, h)| h.last_seen < cutoff)
            .map(|(id, _)| *id)
            .collect();
        stale
            .into_iter()
            .filter_map(|id| self.histories.remove(&id))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.histories.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.histories.is_empty()
    }

    pub fn clear(&mut self) {
        self.histories.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn ts(ms: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2019, 10, 30)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
            + Duration::milliseconds(ms)
    }

    fn rec(id: ObjectId, cell: usize, ms: i64) -> CrossingRecord {
        CrossingRecord {
            object_id: id,
            cell_id: CellId(cell),
            frame_index: (ms / 33) as u64,
            timestamp: ts(ms),
            centroid: Point::new(0.0, 0.0),
            instant_speed_kmh: None,
            spatial_speed_kmh: None,
            lane_label: None,
        }
    }

    #[test]
    fn test_begin_only_once() {
        let mut store = ObjectHistoryStore::new();
        assert!(store.begin(rec(7, 1, 0), ZoneFamily::On));
        assert!(!store.begin(rec(7, 2, 33), ZoneFamily::Under));
        let h = store.get(7).unwrap();
        assert_eq!(h.state(), ObjectState::EnteredRoot);
        assert_eq!(h.root().cell_id, CellId(1));
        assert_eq!(h.root_family(), ZoneFamily::On);
    }

    #[test]
    fn test_push_rejects_duplicate_cell() {
        let mut store = ObjectHistoryStore::new();
        store.begin(rec(7, 1, 0), ZoneFamily::On);
        let h = store.get_mut(7).unwrap();
        assert!(h.push(rec(7, 2, 33)));
        assert!(!h.push(rec(7, 2, 66)));
        assert!(!h.push(rec(7, 1, 99)));
        assert_eq!(h.records().len(), 2);
        assert_eq!(h.record_for(CellId(2)).unwrap().timestamp, ts(33));
        assert_eq!(h.last().cell_id, CellId(2));
    }

    #[test]
    fn test_commit_is_write_once() {
        let mut store = ObjectHistoryStore::new();
        store.begin(rec(7, 1, 0), ZoneFamily::On);
        let h = store.get_mut(7).unwrap();
        h.push(rec(7, 5, 1000));
        h.mark_in_transit();
        assert_eq!(h.state(), ObjectState::InTransit);

        let first = TripResult {
            spatial_speed_kmh: 42.0,
            lane_label: LaneLabel::On,
            end_cell: CellId(5),
        };
        assert!(h.commit(first));
        assert!(!h.commit(TripResult {
            spatial_speed_kmh: 99.0,
            ..first
        }));
        assert_eq!(h.state(), ObjectState::Committed);
        assert_eq!(h.result().unwrap().spatial_speed_kmh, 42.0);
        assert_eq!(h.record_for(CellId(5)).unwrap().spatial_speed_kmh, Some(42.0));
        assert_eq!(h.record_for(CellId(5)).unwrap().lane_label, Some(LaneLabel::On));
    }

    #[test]
    fn test_evict_idle() {
        let mut store = ObjectHistoryStore::new();
        store.begin(rec(1, 1, 0), ZoneFamily::On);
        store.begin(rec(2, 1, 5000), ZoneFamily::On);
        store.get_mut(1).unwrap().touch(ts(1000));

        let evicted = store.evict_idle(ts(2000));
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].object_id, 1);
        assert_eq!(evicted[0].last_seen(), ts(1000));
        assert!(store.get(1).is_none());
        assert_eq!(store.len(), 1);
    }
}
