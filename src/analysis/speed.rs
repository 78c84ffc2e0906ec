// src/analysis/speed.rs
//
// Pixel displacement + timestamps → km/h.
//
// Both the instant (cell to cell) and spatial (root to end) speeds use the
// same formula: distance_px · scale / elapsed_hours. Spatial speed is an
// average over the whole segment and inherits any missed or false zone
// crossing as estimation error.

use chrono::NaiveDateTime;

use crate::error::ConfigError;
use crate::types::Point;

const SECONDS_PER_HOUR: f64 = 3600.0;

/// A speed sample could not be computed because time did not move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NonPositiveElapsed {
    pub elapsed_us: i64,
}

#[derive(Debug, Clone, Copy)]
pub struct SpeedEstimator {
    meters_per_pixel: f64,
}

impl SpeedEstimator {
    pub fn new(meters_per_pixel: f64) -> Result<Self, ConfigError> {
        if !meters_per_pixel.is_finite() || meters_per_pixel <= 0.0 {
            return Err(ConfigError::InvalidScale(meters_per_pixel));
        }
        Ok(Self { meters_per_pixel })
    }

    pub fn instant_speed(
        &self,
        p0: Point,
        t0: NaiveDateTime,
        p1: Point,
        t1: NaiveDateTime,
    ) -> Result<f64, NonPositiveElapsed> {
        let elapsed = t1 - t0;
        // Nanosecond precision would overflow past ~292 years; micros is plenty
        let elapsed_us = elapsed.num_microseconds().unwrap_or(i64::MAX);
        if elapsed_us <= 0 {
            return Err(NonPositiveElapsed { elapsed_us });
        }
        let seconds = elapsed_us as f64 / 1_000_000.0;
        let meters = p0.distance(&p1) * self.meters_per_pixel;
        Ok(meters * SECONDS_PER_HOUR / seconds)
    }

    /// Average speed over the whole root → end segment.
    pub fn spatial_speed(
        &self,
        root: Point,
        root_time: NaiveDateTime,
        end: Point,
        end_time: NaiveDateTime,
    ) -> Result<f64, NonPositiveElapsed> {
        self.instant_speed(root, root_time, end, end_time)
    }
}
