// src/zones/lane.rs

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::classifier::ZoneSets;
use super::grid::ZoneFamily;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LaneLabel {
    /// Entered and left through the "on" family
    On,
    /// Entered and left through the "under" family
    Under,
    /// Entered on the "on" side, left through the opposite-direction lane
    OnToUnder,
    /// Entered on the "under" side, left through the opposite-direction lane
    UnderToOn,
}

impl LaneLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::On => "on",
            Self::Under => "under",
            Self::OnToUnder => "on-to-under",
            Self::UnderToOn => "under-to-on",
        }
    }
}

/// Fixed (root family, end family) → lane lookup, built from the zone sets.
#[derive(Debug, Clone)]
pub struct LaneClassifier {
    table: HashMap<(ZoneFamily, ZoneFamily), LaneLabel>,
}

impl LaneClassifier {
    pub fn new(zones: &ZoneSets) -> Self {
        let mut table = HashMap::new();
        for root in zones.root_families() {
            for end in zones.end_families() {
                let label = match (root, end) {
                    (ZoneFamily::On, ZoneFamily::On) => LaneLabel::On,
                    (ZoneFamily::Under, ZoneFamily::Under) => LaneLabel::Under,
                    (ZoneFamily::On, ZoneFamily::Under) => LaneLabel::OnToUnder,
                    (ZoneFamily::Under, ZoneFamily::On) => LaneLabel::UnderToOn,
                };
                table.insert((root, end), label);
            }
        }
        Self { table }
    }

    pub fn classify(&self, root: ZoneFamily, end: ZoneFamily) -> Option<LaneLabel> {
        self.table.get(&(root, end)).copied()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }
}
