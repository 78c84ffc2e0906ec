use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Identity assigned by the upstream tracker. Never interpreted here.
pub type ObjectId = u32;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub grid: GridConfig,
    pub zones: ZoneConfig,
    pub calibration: CalibrationConfig,
    pub engine: EngineConfig,
    pub input: InputConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub rows: usize,
    pub cols: usize,
    pub cell_width_px: f64,
    pub cell_height_px: f64,
    /// Top-left corner of cell (0, 0) in image pixels
    pub origin_px: [f64; 2],
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            rows: 11,
            cols: 9,
            cell_width_px: 40.0,
            cell_height_px: 30.0,
            origin_px: [577.0, 288.0],
        }
    }
}

/// Half-open row range with an optional half-open column range.
/// Omitting `cols` selects every column of the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneSpan {
    pub rows: [usize; 2],
    #[serde(default)]
    pub cols: Option<[usize; 2]>,
}

impl ZoneSpan {
    pub fn new(rows: [usize; 2], cols: Option<[usize; 2]>) -> Self {
        Self { rows, cols }
    }

    /// Column range with `None` expanded to the full grid width.
    pub fn columns(&self, grid_cols: usize) -> [usize; 2] {
        self.cols.unwrap_or([0, grid_cols])
    }

    pub fn is_empty(&self, grid_cols: usize) -> bool {
        let [c0, c1] = self.columns(grid_cols);
        self.rows[0] >= self.rows[1] || c0 >= c1
    }
}

/// Entry ("root") and exit ("end") spans for the two directional families.
/// An absent span leaves that family unused.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneConfig {
    pub root_on: Option<ZoneSpan>,
    pub root_under: Option<ZoneSpan>,
    pub end_on: Option<ZoneSpan>,
    pub end_under: Option<ZoneSpan>,
}

impl Default for ZoneConfig {
    fn default() -> Self {
        // "on" traffic enters at the bottom-left and leaves at the top-left,
        // "under" traffic enters at the top-right and leaves at the bottom-right.
        Self {
            root_on: Some(ZoneSpan::new([8, 9], Some([0, 5]))),
            root_under: Some(ZoneSpan::new([0, 1], Some([5, 9]))),
            end_on: Some(ZoneSpan::new([0, 1], Some([0, 5]))),
            end_under: Some(ZoneSpan::new([8, 9], Some([5, 9]))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    pub pixel_to_meter_scale: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            pixel_to_meter_scale: 0.05,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Tracker class ids that participate in measurement (COCO 3 = motorbike)
    pub target_class_ids: Vec<u32>,
    /// Histories idle for longer than this are evicted. `None` keeps them
    /// for the whole session.
    pub history_idle_timeout_secs: Option<f64>,
    pub max_pending_events: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            target_class_ids: vec![3],
            history_idle_timeout_secs: Some(10.0),
            max_pending_events: 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub input_dir: String,
    pub output_dir: String,
    /// Used to synthesize timestamps for observations that carry none
    pub fps: f64,
    pub start_time: NaiveDateTime,
}

impl Default for InputConfig {
    fn default() -> Self {
        let start_time = NaiveDate::from_ymd_opt(2019, 10, 30)
            .and_then(|d| d.and_hms_opt(8, 0, 0))
            .unwrap_or_default();
        Self {
            input_dir: "tracks".to_string(),
            output_dir: "output".to_string(),
            fps: 30.0,
            start_time,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Checks the options that are not covered by grid/zone construction.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let scale = self.calibration.pixel_to_meter_scale;
        if !scale.is_finite() || scale <= 0.0 {
            return Err(ConfigError::InvalidScale(scale));
        }
        if !self.input.fps.is_finite() || self.input.fps <= 0.0 {
            return Err(ConfigError::InvalidFps(self.input.fps));
        }
        if let Some(secs) = self.engine.history_idle_timeout_secs {
            if !secs.is_finite() || secs <= 0.0 {
                return Err(ConfigError::InvalidIdleTimeout(secs));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// One tracked object in one frame, as delivered by the upstream tracker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub object_id: ObjectId,
    pub class_id: u32,
    pub centroid: Point,
    pub frame_index: u64,
    pub timestamp: NaiveDateTime,
}
