// src/error.rs
//
// Typed errors at the engine boundary. The driver wraps these in anyhow.

use thiserror::Error;

/// Invalid construction parameters. Fatal: the engine refuses to start.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("degenerate grid: {0}")]
    DegenerateGrid(String),

    #[error("zone span '{zone}' is empty")]
    EmptySpan { zone: &'static str },

    #[error("zone span '{zone}' lies outside the {rows}x{cols} grid")]
    SpanOutOfRange {
        zone: &'static str,
        rows: usize,
        cols: usize,
    },

    #[error("zone spans '{first}' and '{second}' overlap at cell ({row}, {col})")]
    OverlappingSpans {
        first: &'static str,
        second: &'static str,
        row: usize,
        col: usize,
    },

    #[error("no {0} zone span configured")]
    MissingZones(&'static str),

    #[error("pixel_to_meter_scale must be finite and positive, got {0}")]
    InvalidScale(f64),

    #[error("input fps must be finite and positive, got {0}")]
    InvalidFps(f64),

    #[error("history_idle_timeout_secs must be finite and positive, got {0}")]
    InvalidIdleTimeout(f64),
}

/// Failure evaluating one object in one frame. Only that object is skipped.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransitionError {
    #[error("object {object_id}: non-finite centroid ({x}, {y})")]
    NonFiniteCentroid { object_id: u32, x: f64, y: f64 },
}
