// src/zones/mod.rs
//
// Static geometry of the monitored segment:
//   GridConfig → grid (cells) → classifier (root/end roles) → lane (lookup)
//
// Everything here is built once at startup and read-only afterwards.

pub mod classifier;
pub mod grid;
pub mod lane;

pub use classifier::{ZoneClassifier, ZoneSets};
pub use grid::{CellId, Grid, ZoneFamily, ZoneRole};
pub use lane::{LaneClassifier, LaneLabel};

use crate::error::ConfigError;
use crate::types::{GridConfig, ZoneConfig};

/// Grid with zone roles applied, plus the derived lane table.
#[derive(Debug, Clone)]
pub struct ZoneLayout {
    pub grid: Grid,
    pub zones: ZoneSets,
    pub lanes: LaneClassifier,
}

impl ZoneLayout {
    pub fn build(grid_cfg: &GridConfig, zone_cfg: &ZoneConfig) -> Result<Self, ConfigError> {
        let mut grid = Grid::new(grid_cfg)?;
        let zones = ZoneClassifier::classify(&mut grid, zone_cfg)?;
        let lanes = LaneClassifier::new(&zones);
        Ok(Self { grid, zones, lanes })
    }
}
